// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Board facade
//!
//! [`Board`] is the synchronous entry point. Commands are validated against
//! the pin table, encoded and written on the caller's thread; inbound
//! reports are applied by the listener thread. The only blocking wait is the
//! capability handshake inside [`Board::connect`].

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Receiver;
use parking_lot::{Mutex, RwLockWriteGuard};
use tracing::{debug, error, info, trace, warn};

use crate::constants::{
    I2C_MAX_ADDRESS, MAX_14BIT, MAX_NIBBLE_INDEX, MAX_SERVO_ANGLE, PINS_PER_PORT,
};
use crate::decoder::{Decoder, DEFAULT_MAX_SYSEX_SIZE};
use crate::encoder::{self, I2cReadMode};
use crate::error::{FirmataError, FirmataResult, IndexKind};
use crate::events::{BoardEvent, EventBus, DEFAULT_EVENT_CAPACITY};
use crate::frame::FirmwareInfo;
use crate::listener::Listener;
use crate::pins::{Pin, PinMode, PinTable};
use crate::session::{BoardInfo, ConnectionState, ReadyWait, Session};
use crate::transport::Transport;

/// Connection tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// How long `connect` waits for the capability reply
    pub handshake_timeout: Duration,
    pub read_buffer_size: usize,
    pub max_sysex_size: usize,
    pub event_channel_capacity: usize,
    /// Ask for the firmware name during the handshake
    pub query_firmware: bool,
    /// Ask for the analog channel mapping once the handshake completes
    pub query_analog_mapping: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_millis(5000),
            read_buffer_size: 256,
            max_sysex_size: DEFAULT_MAX_SYSEX_SIZE,
            event_channel_capacity: DEFAULT_EVENT_CAPACITY,
            query_firmware: true,
            query_analog_mapping: true,
        }
    }
}

/// Operations a Firmata board exposes to higher layers
///
/// [`Board`] is the wire implementation. Code written against this trait
/// can be exercised with a test double instead of a transport.
pub trait FirmataBoard: Send + Sync {
    fn connect(&self, transport: Box<dyn Transport>) -> FirmataResult<()>;
    fn disconnect(&self);
    fn state(&self) -> ConnectionState;

    fn set_pin_mode(&self, pin: u8, mode: PinMode) -> FirmataResult<()>;
    fn digital_write(&self, pin: u8, high: bool) -> FirmataResult<()>;
    fn analog_write(&self, pin: u8, value: u32) -> FirmataResult<()>;
    fn pwm_write(&self, pin: u8, value: u32) -> FirmataResult<()>;
    fn servo_write(&self, pin: u8, angle: u16) -> FirmataResult<()>;
    fn servo_config(&self, pin: u8, min_pulse: u16, max_pulse: u16) -> FirmataResult<()>;

    fn enable_analog_reporting(&self, channel: u8, enable: bool) -> FirmataResult<()>;
    fn enable_digital_reporting(&self, port: u8, enable: bool) -> FirmataResult<()>;

    fn i2c_config(&self, delay_us: u16) -> FirmataResult<()>;
    fn i2c_write(&self, address: u8, data: &[u8]) -> FirmataResult<()>;
    fn i2c_read(
        &self,
        address: u8,
        register: Option<u16>,
        len: u16,
        mode: I2cReadMode,
    ) -> FirmataResult<()>;

    /// Snapshot of one pin
    fn pin(&self, index: u8) -> FirmataResult<Pin>;
}

struct Connection {
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
    listener: Listener,
}

/// A connection-capable Firmata client
///
/// At most one connection exists at a time. Dropping the board disconnects.
pub struct Board {
    config: BoardConfig,
    events: Arc<EventBus>,
    connection: Mutex<Option<Connection>>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(BoardConfig::default())
    }
}

impl Board {
    pub fn new(config: BoardConfig) -> Self {
        let events = Arc::new(EventBus::new(config.event_channel_capacity));
        Self {
            config,
            events,
            connection: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Receive notifications for this and all later connections
    pub fn subscribe(&self) -> Receiver<BoardEvent> {
        self.events.subscribe()
    }

    /// Start the listener and wait for the capability reply
    ///
    /// # Errors
    ///
    /// `AlreadyConnected` when a connection exists, `Timeout` when the board
    /// does not answer in time, `Transport` when a handshake write fails,
    /// `Disconnected` when the handshake is cancelled or the listener stops.
    pub fn connect(&self, transport: Box<dyn Transport>) -> FirmataResult<()> {
        let transport: Arc<dyn Transport> = Arc::from(transport);
        let session = {
            let mut connection = self.connection.lock();
            if connection.is_some() {
                return Err(FirmataError::AlreadyConnected);
            }

            let session = Arc::new(Session::new(Arc::clone(&self.events)));
            let listener = Listener::spawn(
                Arc::clone(&transport),
                Arc::clone(&session),
                Decoder::new(self.config.max_sysex_size),
                self.config.read_buffer_size,
            )?;
            *connection = Some(Connection {
                transport: Arc::clone(&transport),
                session: Arc::clone(&session),
                listener,
            });
            session
        };

        if !session.begin_handshake() {
            if session.state() == ConnectionState::Degraded {
                warn!("[FIRMATA-BOARD] Transport lost before the handshake started");
                self.teardown(&session);
            } else {
                debug!("[FIRMATA-BOARD] Handshake cancelled by disconnect");
            }
            return Err(FirmataError::Disconnected);
        }
        debug!("[FIRMATA-BOARD] Listener started, querying capabilities");

        if let Err(e) = self.send_handshake(transport.as_ref()) {
            if session.state() == ConnectionState::Disconnected {
                debug!("[FIRMATA-BOARD] Handshake cancelled by disconnect");
                return Err(FirmataError::Disconnected);
            }
            error!("[FIRMATA-BOARD] Handshake write failed: {}", e);
            self.teardown(&session);
            return Err(FirmataError::Transport(e));
        }

        let timeout = self.config.handshake_timeout;
        match session.wait_until_ready(timeout) {
            ReadyWait::Ready => {}
            ReadyWait::TimedOut => {
                warn!(
                    "[FIRMATA-BOARD] No capability reply after {:?}, giving up",
                    timeout
                );
                self.teardown(&session);
                return Err(FirmataError::Timeout {
                    operation: "capability handshake",
                    after: timeout,
                });
            }
            ReadyWait::Cancelled => {
                debug!("[FIRMATA-BOARD] Handshake cancelled by disconnect");
                return Err(FirmataError::Disconnected);
            }
            ReadyWait::Lost => {
                self.teardown(&session);
                return Err(FirmataError::Disconnected);
            }
        }

        if self.config.query_analog_mapping {
            if let Err(e) = self.send(&transport, &session, &encoder::analog_mapping_query()) {
                self.teardown(&session);
                return Err(e);
            }
        }

        info!(
            "[FIRMATA-BOARD] Connected: {} pins",
            session.pins.read().len()
        );
        Ok(())
    }

    fn send_handshake(&self, transport: &dyn Transport) -> std::io::Result<()> {
        transport.write(&encoder::protocol_version_query())?;
        if self.config.query_firmware {
            transport.write(&encoder::firmware_query())?;
        }
        transport.write(&encoder::capability_query())
    }

    /// Stop the listener and release the transport. Calling it again is a
    /// no-op.
    pub fn disconnect(&self) {
        let connection = self.connection.lock().take();
        if let Some(connection) = connection {
            Self::shutdown(connection);
            info!("[FIRMATA-BOARD] Disconnected");
        }
    }

    /// Tear down `session` if it is still the active connection
    fn teardown(&self, session: &Arc<Session>) {
        let connection = {
            let mut current = self.connection.lock();
            match current.as_ref() {
                Some(c) if Arc::ptr_eq(&c.session, session) => current.take(),
                _ => None,
            }
        };
        if let Some(connection) = connection {
            Self::shutdown(connection);
        }
    }

    fn shutdown(mut connection: Connection) {
        connection.session.set_state(ConnectionState::Disconnected);
        connection.listener.request_stop();
        if let Err(e) = connection.transport.close() {
            warn!("[FIRMATA-BOARD] Error closing transport: {}", e);
        }
        connection.listener.stop();
        connection.session.pins.write().clear();
    }

    pub fn state(&self) -> ConnectionState {
        self.connection
            .lock()
            .as_ref()
            .map_or(ConnectionState::Disconnected, |c| c.session.state())
    }

    fn session(&self) -> Option<Arc<Session>> {
        self.connection
            .lock()
            .as_ref()
            .map(|c| Arc::clone(&c.session))
    }

    /// Transport and session of a connection that accepts commands
    fn active(&self) -> FirmataResult<(Arc<dyn Transport>, Arc<Session>)> {
        let connection = self.connection.lock();
        let connection = connection.as_ref().ok_or(FirmataError::NotConnected)?;
        match connection.session.state() {
            ConnectionState::Ready => Ok((
                Arc::clone(&connection.transport),
                Arc::clone(&connection.session),
            )),
            ConnectionState::Degraded => Err(FirmataError::Disconnected),
            _ => Err(FirmataError::NotConnected),
        }
    }

    fn send(
        &self,
        transport: &Arc<dyn Transport>,
        session: &Session,
        bytes: &[u8],
    ) -> FirmataResult<()> {
        let _sending = session.send_lock.lock();
        self.write_frame(transport, session, bytes)
    }

    /// Send a frame whose pin table change is already applied under `pins`
    ///
    /// The table lock is released before the write; `saved` is restored if
    /// the write fails.
    fn send_applied(
        &self,
        transport: &Arc<dyn Transport>,
        session: &Session,
        pins: RwLockWriteGuard<'_, PinTable>,
        saved: Vec<Pin>,
        bytes: &[u8],
    ) -> FirmataResult<()> {
        let sending = session.send_lock.lock();
        drop(pins);
        let result = self.write_frame(transport, session, bytes);
        drop(sending);
        if result.is_err() {
            session.pins.write().restore(&saved);
        }
        result
    }

    fn write_frame(
        &self,
        transport: &Arc<dyn Transport>,
        session: &Session,
        bytes: &[u8],
    ) -> FirmataResult<()> {
        trace!("[FIRMATA-BOARD] -> {:02X?}", bytes);
        transport.write(bytes).map_err(|e| {
            if session.mark_degraded() {
                error!("[FIRMATA-BOARD] Transport write failed: {}", e);
            }
            FirmataError::Transport(e)
        })
    }

    /// Encode and send a frame that needs no pin table access
    fn command(&self, bytes: &[u8]) -> FirmataResult<()> {
        let (transport, session) = self.active()?;
        self.send(&transport, &session, bytes)
    }

    pub fn set_pin_mode(&self, pin: u8, mode: PinMode) -> FirmataResult<()> {
        let (transport, session) = self.active()?;
        let mut pins = session.pins.write();
        let saved = pins.pin_ref(pin)?.clone();
        if !saved.supports(mode) {
            return Err(FirmataError::UnsupportedMode { pin, mode });
        }
        pins.set_mode(pin, mode)?;
        self.send_applied(
            &transport,
            &session,
            pins,
            vec![saved],
            &encoder::set_pin_mode(pin, mode),
        )
    }

    /// Drive a digital output
    ///
    /// The whole port is written; the other pins keep their cached level.
    pub fn digital_write(&self, pin: u8, high: bool) -> FirmataResult<()> {
        let (transport, session) = self.active()?;
        let mut pins = session.pins.write();
        let saved = pins.pin_ref(pin)?.clone();
        require_mode(&saved, &[PinMode::Output])?;

        let port = pin / PINS_PER_PORT;
        if port > MAX_NIBBLE_INDEX {
            return Err(FirmataError::out_of_range(
                IndexKind::Port,
                port,
                usize::from(MAX_NIBBLE_INDEX) + 1,
            ));
        }
        let bit = 1u8 << (pin % PINS_PER_PORT);
        let mut value = pins.port_value(port);
        if high {
            value |= bit;
        } else {
            value &= !bit;
        }

        pins.set_value(pin, u32::from(high))?;
        self.send_applied(
            &transport,
            &session,
            pins,
            vec![saved],
            &encoder::digital_write(port, value),
        )
    }

    /// Write a PWM level or servo position, whichever mode the pin is in
    pub fn analog_write(&self, pin: u8, value: u32) -> FirmataResult<()> {
        self.write_value(pin, value, &[PinMode::Pwm, PinMode::Servo])
    }

    pub fn pwm_write(&self, pin: u8, value: u32) -> FirmataResult<()> {
        self.write_value(pin, value, &[PinMode::Pwm])
    }

    /// Move a servo to `angle` degrees (0-180)
    pub fn servo_write(&self, pin: u8, angle: u16) -> FirmataResult<()> {
        if angle > MAX_SERVO_ANGLE {
            return Err(FirmataError::InvalidValue {
                pin,
                value: u32::from(angle),
                max: u32::from(MAX_SERVO_ANGLE),
            });
        }
        self.write_value(pin, u32::from(angle), &[PinMode::Servo])
    }

    fn write_value(&self, pin: u8, value: u32, required: &'static [PinMode]) -> FirmataResult<()> {
        let (transport, session) = self.active()?;
        let mut pins = session.pins.write();
        let saved = pins.pin_ref(pin)?.clone();
        let mode = require_mode(&saved, required)?;
        let max = saved.max_value(mode).unwrap_or(u32::from(MAX_14BIT));
        if value > max {
            return Err(FirmataError::InvalidValue { pin, value, max });
        }

        pins.set_value(pin, value)?;
        self.send_applied(
            &transport,
            &session,
            pins,
            vec![saved],
            &encoder::analog_write(pin, value),
        )
    }

    /// Set the pulse range of a servo pin, in microseconds
    pub fn servo_config(&self, pin: u8, min_pulse: u16, max_pulse: u16) -> FirmataResult<()> {
        let (transport, session) = self.active()?;
        if !session.pins.read().pin_ref(pin)?.supports(PinMode::Servo) {
            return Err(FirmataError::UnsupportedMode {
                pin,
                mode: PinMode::Servo,
            });
        }
        if max_pulse > MAX_14BIT || min_pulse > max_pulse {
            return Err(FirmataError::InvalidValue {
                pin,
                value: u32::from(min_pulse.max(max_pulse)),
                max: u32::from(MAX_14BIT),
            });
        }
        self.send(
            &transport,
            &session,
            &encoder::servo_config(pin, min_pulse, max_pulse),
        )
    }

    pub fn enable_analog_reporting(&self, channel: u8, enable: bool) -> FirmataResult<()> {
        let (transport, session) = self.active()?;
        {
            let pins = session.pins.read();
            if channel > MAX_NIBBLE_INDEX || pins.analog_pin(channel).is_none() {
                return Err(FirmataError::out_of_range(
                    IndexKind::AnalogChannel,
                    channel,
                    pins.analog_channel_count(),
                ));
            }
        }
        self.send(&transport, &session, &encoder::report_analog(channel, enable))
    }

    pub fn enable_digital_reporting(&self, port: u8, enable: bool) -> FirmataResult<()> {
        let (transport, session) = self.active()?;
        let limit = session
            .pins
            .read()
            .port_count()
            .min(usize::from(MAX_NIBBLE_INDEX) + 1);
        if usize::from(port) >= limit {
            return Err(FirmataError::out_of_range(IndexKind::Port, port, limit));
        }
        self.send(&transport, &session, &encoder::report_digital(port, enable))
    }

    pub fn i2c_config(&self, delay_us: u16) -> FirmataResult<()> {
        check_14bit("I2C read delay", delay_us)?;
        self.command(&encoder::i2c_config(delay_us))
    }

    pub fn i2c_write(&self, address: u8, data: &[u8]) -> FirmataResult<()> {
        check_i2c_address(address)?;
        self.command(&encoder::i2c_write(address, data))
    }

    /// Request a read; the data arrives as a [`BoardEvent::I2cReply`]
    pub fn i2c_read(
        &self,
        address: u8,
        register: Option<u16>,
        len: u16,
        mode: I2cReadMode,
    ) -> FirmataResult<()> {
        check_i2c_address(address)?;
        if let Some(register) = register {
            check_14bit("I2C register", register)?;
        }
        check_14bit("I2C read length", len)?;
        self.command(&encoder::i2c_read(address, register, len, mode))
    }

    pub fn i2c_stop_reading(&self, address: u8) -> FirmataResult<()> {
        check_i2c_address(address)?;
        self.command(&encoder::i2c_stop_reading(address))
    }

    /// Ask for a pin's mode and value; the reply updates the pin table and
    /// is published as [`BoardEvent::PinState`]
    pub fn query_pin_state(&self, pin: u8) -> FirmataResult<()> {
        let (transport, session) = self.active()?;
        session.pins.read().pin_ref(pin)?;
        self.send(&transport, &session, &encoder::pin_state_query(pin))
    }

    pub fn query_firmware(&self) -> FirmataResult<()> {
        self.command(&encoder::firmware_query())
    }

    /// Milliseconds between analog and I2C samples
    pub fn set_sampling_interval(&self, interval_ms: u16) -> FirmataResult<()> {
        check_14bit("sampling interval", interval_ms)?;
        self.command(&encoder::sampling_interval(interval_ms))
    }

    /// Send a system reset and forget cached modes and values
    pub fn reset(&self) -> FirmataResult<()> {
        let (transport, session) = self.active()?;
        let mut pins = session.pins.write();
        let saved = pins.snapshot();
        pins.reset_states();
        self.send_applied(&transport, &session, pins, saved, &encoder::system_reset())
    }

    /// Snapshot of every pin; empty when not connected
    pub fn pins(&self) -> Vec<Pin> {
        self.session()
            .map(|s| s.pins.read().snapshot())
            .unwrap_or_default()
    }

    pub fn pin(&self, index: u8) -> FirmataResult<Pin> {
        let session = self.session().ok_or(FirmataError::NotConnected)?;
        let pin = session.pins.read().get(index);
        pin
    }

    pub fn firmware(&self) -> Option<FirmwareInfo> {
        self.session().and_then(|s| s.info.read().firmware.clone())
    }

    pub fn protocol_version(&self) -> Option<(u8, u8)> {
        self.session().and_then(|s| s.info.read().protocol_version)
    }

    pub fn info(&self) -> BoardInfo {
        self.session()
            .map(|s| s.info.read().clone())
            .unwrap_or_default()
    }

    /// Bytes the decoder discarded on the current connection
    pub fn desync_count(&self) -> u64 {
        self.session().map_or(0, |s| s.desync_count())
    }
}

impl Drop for Board {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn require_mode(pin: &Pin, required: &'static [PinMode]) -> FirmataResult<PinMode> {
    match pin.mode {
        Some(mode) if required.contains(&mode) => Ok(mode),
        actual => Err(FirmataError::ModeMismatch {
            pin: pin.index,
            required,
            actual,
        }),
    }
}

fn check_14bit(parameter: &'static str, value: u16) -> FirmataResult<()> {
    if value > MAX_14BIT {
        return Err(FirmataError::InvalidParameter {
            parameter,
            value: u32::from(value),
            max: u32::from(MAX_14BIT),
        });
    }
    Ok(())
}

fn check_i2c_address(address: u8) -> FirmataResult<()> {
    if address > I2C_MAX_ADDRESS {
        return Err(FirmataError::out_of_range(
            IndexKind::I2cAddress,
            address,
            usize::from(I2C_MAX_ADDRESS) + 1,
        ));
    }
    Ok(())
}

impl FirmataBoard for Board {
    fn connect(&self, transport: Box<dyn Transport>) -> FirmataResult<()> {
        Board::connect(self, transport)
    }

    fn disconnect(&self) {
        Board::disconnect(self)
    }

    fn state(&self) -> ConnectionState {
        Board::state(self)
    }

    fn set_pin_mode(&self, pin: u8, mode: PinMode) -> FirmataResult<()> {
        Board::set_pin_mode(self, pin, mode)
    }

    fn digital_write(&self, pin: u8, high: bool) -> FirmataResult<()> {
        Board::digital_write(self, pin, high)
    }

    fn analog_write(&self, pin: u8, value: u32) -> FirmataResult<()> {
        Board::analog_write(self, pin, value)
    }

    fn pwm_write(&self, pin: u8, value: u32) -> FirmataResult<()> {
        Board::pwm_write(self, pin, value)
    }

    fn servo_write(&self, pin: u8, angle: u16) -> FirmataResult<()> {
        Board::servo_write(self, pin, angle)
    }

    fn servo_config(&self, pin: u8, min_pulse: u16, max_pulse: u16) -> FirmataResult<()> {
        Board::servo_config(self, pin, min_pulse, max_pulse)
    }

    fn enable_analog_reporting(&self, channel: u8, enable: bool) -> FirmataResult<()> {
        Board::enable_analog_reporting(self, channel, enable)
    }

    fn enable_digital_reporting(&self, port: u8, enable: bool) -> FirmataResult<()> {
        Board::enable_digital_reporting(self, port, enable)
    }

    fn i2c_config(&self, delay_us: u16) -> FirmataResult<()> {
        Board::i2c_config(self, delay_us)
    }

    fn i2c_write(&self, address: u8, data: &[u8]) -> FirmataResult<()> {
        Board::i2c_write(self, address, data)
    }

    fn i2c_read(
        &self,
        address: u8,
        register: Option<u16>,
        len: u16,
        mode: I2cReadMode,
    ) -> FirmataResult<()> {
        Board::i2c_read(self, address, register, len, mode)
    }

    fn pin(&self, index: u8) -> FirmataResult<Pin> {
        Board::pin(self, index)
    }
}
