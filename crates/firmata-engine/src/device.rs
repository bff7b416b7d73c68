// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Arduino-style convenience wrapper
//!
//! [`Device`] turns one friendly call into the one or two board operations
//! it needs, and logs every call under the device name.

use std::thread;
use std::time::Duration;

use tracing::info;

use crate::board::{Board, FirmataBoard};
use crate::constants::{DEFAULT_SERVO_MAX_PULSE, DEFAULT_SERVO_MIN_PULSE, PINS_PER_PORT};
use crate::error::{FirmataError, FirmataResult, IndexKind};
use crate::pins::PinMode;
use crate::transport::Transport;

pub struct Device<B: FirmataBoard = Board> {
    name: String,
    port: String,
    board: B,
}

impl Device<Board> {
    /// Device backed by a default [`Board`]
    ///
    /// `port` is a label for the serial device; opening it is up to the
    /// caller.
    pub fn new(name: impl Into<String>, port: impl Into<String>) -> Self {
        Self::with_board(name, port, Board::default())
    }
}

impl<B: FirmataBoard> Device<B> {
    pub fn with_board(name: impl Into<String>, port: impl Into<String>, board: B) -> Self {
        Self {
            name: name.into(),
            port: port.into(),
            board,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn connect(&self, transport: Box<dyn Transport>) -> FirmataResult<()> {
        info!("[{}] Connecting on {}", self.name, self.port);
        self.board.connect(transport)
    }

    pub fn disconnect(&self) {
        info!("[{}] Disconnecting", self.name);
        self.board.disconnect();
    }

    /// Set a pin mode; input and analog pins also start reporting
    pub fn pin_mode(&self, pin: u8, mode: PinMode) -> FirmataResult<()> {
        self.board.set_pin_mode(pin, mode)?;
        match mode {
            PinMode::Input | PinMode::Pullup => {
                self.board.enable_digital_reporting(pin / PINS_PER_PORT, true)?;
            }
            PinMode::Analog => {
                let channel = self.board.pin(pin)?.analog_channel.ok_or(
                    FirmataError::OutOfRange {
                        kind: IndexKind::AnalogChannel,
                        index: usize::from(pin),
                        limit: 0,
                    },
                )?;
                self.board.enable_analog_reporting(channel, true)?;
            }
            _ => {}
        }
        info!("[{}] pinMode({}, {})", self.name, pin, mode);
        Ok(())
    }

    pub fn digital_write(&self, pin: u8, high: bool) -> FirmataResult<()> {
        self.board.digital_write(pin, high)?;
        info!("[{}] digitalWrite({}, {})", self.name, pin, u8::from(high));
        Ok(())
    }

    /// Move a servo, switching the pin to servo mode first if needed
    pub fn servo_write(&self, pin: u8, angle: u16) -> FirmataResult<()> {
        self.ensure_mode(pin, PinMode::Servo)?;
        self.board.servo_write(pin, angle)?;
        info!("[{}] servoWrite({}, {})", self.name, pin, angle);
        Ok(())
    }

    /// Write a PWM level, switching the pin to PWM mode first if needed
    pub fn pwm_write(&self, pin: u8, level: u8) -> FirmataResult<()> {
        self.ensure_mode(pin, PinMode::Pwm)?;
        self.board.pwm_write(pin, u32::from(level))?;
        info!("[{}] pwmWrite({}, {})", self.name, pin, level);
        Ok(())
    }

    pub fn servo_config(&self, pin: u8, min_pulse: u16, max_pulse: u16) -> FirmataResult<()> {
        self.board.servo_config(pin, min_pulse, max_pulse)?;
        info!(
            "[{}] servoConfig({}, {}, {})",
            self.name, pin, min_pulse, max_pulse
        );
        Ok(())
    }

    /// Put a pin in servo mode with the Arduino Servo library's pulse range
    pub fn servo_attach(&self, pin: u8) -> FirmataResult<()> {
        self.ensure_mode(pin, PinMode::Servo)?;
        self.board
            .servo_config(pin, DEFAULT_SERVO_MIN_PULSE, DEFAULT_SERVO_MAX_PULSE)?;
        info!("[{}] servoAttach({})", self.name, pin);
        Ok(())
    }

    /// Last reported analog value of a pin in analog mode
    pub fn analog_read(&self, pin: u8) -> FirmataResult<u32> {
        let state = self.board.pin(pin)?;
        if state.mode != Some(PinMode::Analog) {
            return Err(FirmataError::ModeMismatch {
                pin,
                required: &[PinMode::Analog],
                actual: state.mode,
            });
        }
        info!("[{}] analogRead({}) = {}", self.name, pin, state.value);
        Ok(state.value)
    }

    /// Last reported level of a digital input
    pub fn digital_read(&self, pin: u8) -> FirmataResult<bool> {
        let state = self.board.pin(pin)?;
        if !state.mode.is_some_and(PinMode::is_digital_input) {
            return Err(FirmataError::ModeMismatch {
                pin,
                required: &[PinMode::Input, PinMode::Pullup],
                actual: state.mode,
            });
        }
        info!("[{}] digitalRead({}) = {}", self.name, pin, state.value);
        Ok(state.value != 0)
    }

    pub fn delay(&self, duration: Duration) {
        thread::sleep(duration);
    }

    fn ensure_mode(&self, pin: u8, mode: PinMode) -> FirmataResult<()> {
        if self.board.pin(pin)?.mode != Some(mode) {
            self.board.set_pin_mode(pin, mode)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::I2cReadMode;
    use crate::pins::{Pin, PinCapability, PinTable};
    use crate::session::ConnectionState;
    use parking_lot::Mutex;

    /// Records calls and keeps a pin table, without any wire traffic
    struct RecordingBoard {
        pins: Mutex<PinTable>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingBoard {
        fn new() -> Self {
            let caps = |extra: &[(PinMode, u8)]| {
                let mut caps = vec![
                    PinCapability { mode: PinMode::Input, resolution: 1 },
                    PinCapability { mode: PinMode::Output, resolution: 1 },
                ];
                caps.extend(extra.iter().map(|&(mode, resolution)| PinCapability { mode, resolution }));
                caps
            };
            let mut table: Vec<Vec<PinCapability>> = (0..16).map(|_| caps(&[])).collect();
            table[3] = caps(&[(PinMode::Pwm, 8)]);
            table[9] = caps(&[(PinMode::Servo, 14)]);
            table[14] = caps(&[(PinMode::Analog, 10)]);
            table[15] = caps(&[(PinMode::Analog, 10)]);
            Self {
                pins: Mutex::new(PinTable::from_capabilities(table)),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl FirmataBoard for RecordingBoard {
        fn connect(&self, _transport: Box<dyn Transport>) -> FirmataResult<()> {
            self.record("connect".into());
            Ok(())
        }
        fn disconnect(&self) {
            self.record("disconnect".into());
        }
        fn state(&self) -> ConnectionState {
            ConnectionState::Ready
        }
        fn set_pin_mode(&self, pin: u8, mode: PinMode) -> FirmataResult<()> {
            self.record(format!("set_pin_mode({}, {})", pin, mode));
            self.pins.lock().set_mode(pin, mode)
        }
        fn digital_write(&self, pin: u8, high: bool) -> FirmataResult<()> {
            self.record(format!("digital_write({}, {})", pin, high));
            Ok(())
        }
        fn analog_write(&self, pin: u8, value: u32) -> FirmataResult<()> {
            self.record(format!("analog_write({}, {})", pin, value));
            Ok(())
        }
        fn pwm_write(&self, pin: u8, value: u32) -> FirmataResult<()> {
            self.record(format!("pwm_write({}, {})", pin, value));
            Ok(())
        }
        fn servo_write(&self, pin: u8, angle: u16) -> FirmataResult<()> {
            self.record(format!("servo_write({}, {})", pin, angle));
            Ok(())
        }
        fn servo_config(&self, pin: u8, min_pulse: u16, max_pulse: u16) -> FirmataResult<()> {
            self.record(format!("servo_config({}, {}, {})", pin, min_pulse, max_pulse));
            Ok(())
        }
        fn enable_analog_reporting(&self, channel: u8, enable: bool) -> FirmataResult<()> {
            self.record(format!("report_analog({}, {})", channel, enable));
            Ok(())
        }
        fn enable_digital_reporting(&self, port: u8, enable: bool) -> FirmataResult<()> {
            self.record(format!("report_digital({}, {})", port, enable));
            Ok(())
        }
        fn i2c_config(&self, _delay_us: u16) -> FirmataResult<()> {
            Ok(())
        }
        fn i2c_write(&self, _address: u8, _data: &[u8]) -> FirmataResult<()> {
            Ok(())
        }
        fn i2c_read(
            &self,
            _address: u8,
            _register: Option<u16>,
            _len: u16,
            _mode: I2cReadMode,
        ) -> FirmataResult<()> {
            Ok(())
        }
        fn pin(&self, index: u8) -> FirmataResult<Pin> {
            self.pins.lock().get(index)
        }
    }

    fn device() -> Device<RecordingBoard> {
        Device::with_board("uno", "/dev/ttyACM0", RecordingBoard::new())
    }

    #[test]
    fn test_input_mode_enables_port_reporting() {
        let device = device();
        device.pin_mode(10, PinMode::Input).unwrap();
        assert_eq!(
            device.board().calls(),
            vec!["set_pin_mode(10, INPUT)", "report_digital(1, true)"]
        );
    }

    #[test]
    fn test_analog_mode_enables_channel_reporting() {
        let device = device();
        device.pin_mode(15, PinMode::Analog).unwrap();
        assert_eq!(
            device.board().calls(),
            vec!["set_pin_mode(15, ANALOG)", "report_analog(1, true)"]
        );
    }

    #[test]
    fn test_output_mode_has_no_reporting() {
        let device = device();
        device.pin_mode(13, PinMode::Output).unwrap();
        assert_eq!(device.board().calls(), vec!["set_pin_mode(13, OUTPUT)"]);
    }

    #[test]
    fn test_servo_write_switches_mode_once() {
        let device = device();
        device.servo_write(9, 90).unwrap();
        device.servo_write(9, 45).unwrap();
        assert_eq!(
            device.board().calls(),
            vec!["set_pin_mode(9, SERVO)", "servo_write(9, 90)", "servo_write(9, 45)"]
        );
    }

    #[test]
    fn test_servo_attach_uses_default_pulse_range() {
        let device = device();
        device.servo_attach(9).unwrap();
        device.servo_attach(9).unwrap();
        assert_eq!(
            device.board().calls(),
            vec![
                "set_pin_mode(9, SERVO)",
                "servo_config(9, 544, 2400)",
                "servo_config(9, 544, 2400)"
            ]
        );
    }

    #[test]
    fn test_pwm_write_switches_mode() {
        let device = device();
        device.pwm_write(3, 128).unwrap();
        assert_eq!(
            device.board().calls(),
            vec!["set_pin_mode(3, PWM)", "pwm_write(3, 128)"]
        );
    }

    #[test]
    fn test_reads_require_matching_mode() {
        let device = device();
        assert!(matches!(
            device.analog_read(14),
            Err(FirmataError::ModeMismatch { pin: 14, actual: None, .. })
        ));
        device.pin_mode(14, PinMode::Analog).unwrap();
        device.board().pins.lock().set_value(14, 700).unwrap();
        assert_eq!(device.analog_read(14).unwrap(), 700);

        assert!(device.digital_read(2).is_err());
        device.pin_mode(2, PinMode::Input).unwrap();
        device.board().pins.lock().apply_digital_report(0, 0b100);
        assert!(device.digital_read(2).unwrap());
    }

    #[test]
    fn test_accessors() {
        let device = device();
        assert_eq!(device.name(), "uno");
        assert_eq!(device.port(), "/dev/ttyACM0");
        device.delay(Duration::from_millis(1));
        device.disconnect();
        assert_eq!(device.board().calls(), vec!["disconnect"]);
    }
}
