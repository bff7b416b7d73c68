// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pin modes and the per-connection pin table
//!
//! The table is populated from the capability reply received while
//! connecting. It is mutated by the caller (mode changes, writes) and by the
//! listener (input reports), so it always lives behind a lock and every read
//! hands out a copy.

use std::fmt;

use crate::constants::PINS_PER_PORT;
use crate::error::{FirmataError, FirmataResult, IndexKind};

/// Pin modes defined by Firmata 2.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PinMode {
    Input = 0x00,
    Output = 0x01,
    Analog = 0x02,
    Pwm = 0x03,
    Servo = 0x04,
    Shift = 0x05,
    I2c = 0x06,
    OneWire = 0x07,
    Stepper = 0x08,
    Encoder = 0x09,
    Serial = 0x0A,
    Pullup = 0x0B,
}

impl PinMode {
    pub const ALL: [PinMode; 12] = [
        PinMode::Input,
        PinMode::Output,
        PinMode::Analog,
        PinMode::Pwm,
        PinMode::Servo,
        PinMode::Shift,
        PinMode::I2c,
        PinMode::OneWire,
        PinMode::Stepper,
        PinMode::Encoder,
        PinMode::Serial,
        PinMode::Pullup,
    ];

    /// Wire value of this mode
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Modes whose value is fed by digital port reports
    pub fn is_digital_input(self) -> bool {
        matches!(self, PinMode::Input | PinMode::Pullup)
    }
}

impl TryFrom<u8> for PinMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PinMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_u8() == value)
            .ok_or(value)
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PinMode::Input => "INPUT",
            PinMode::Output => "OUTPUT",
            PinMode::Analog => "ANALOG",
            PinMode::Pwm => "PWM",
            PinMode::Servo => "SERVO",
            PinMode::Shift => "SHIFT",
            PinMode::I2c => "I2C",
            PinMode::OneWire => "ONEWIRE",
            PinMode::Stepper => "STEPPER",
            PinMode::Encoder => "ENCODER",
            PinMode::Serial => "SERIAL",
            PinMode::Pullup => "PULLUP",
        };
        f.write_str(name)
    }
}

/// One supported mode of a pin, with its resolution in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PinCapability {
    pub mode: PinMode,
    pub resolution: u8,
}

/// Snapshot of a single pin
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pin {
    pub index: u8,
    pub capabilities: Vec<PinCapability>,
    /// `None` until the host sets a mode or a pin state reply reports one
    pub mode: Option<PinMode>,
    pub value: u32,
    pub analog_channel: Option<u8>,
}

impl Pin {
    fn new(index: u8, capabilities: Vec<PinCapability>) -> Self {
        Self {
            index,
            capabilities,
            mode: None,
            value: 0,
            analog_channel: None,
        }
    }

    pub fn supports(&self, mode: PinMode) -> bool {
        self.capabilities.iter().any(|c| c.mode == mode)
    }

    pub fn resolution(&self, mode: PinMode) -> Option<u8> {
        self.capabilities
            .iter()
            .find(|c| c.mode == mode)
            .map(|c| c.resolution)
    }

    /// Largest value representable at the pin's resolution for `mode`
    pub fn max_value(&self, mode: PinMode) -> Option<u32> {
        self.resolution(mode).map(|bits| match bits {
            0 => 0,
            32.. => u32::MAX,
            bits => (1u32 << bits) - 1,
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct PinTable {
    pins: Vec<Pin>,
}

impl PinTable {
    /// Build a table from a capability reply
    ///
    /// Analog channels are numbered in pin order over analog-capable pins
    /// until an analog mapping reply says otherwise.
    pub fn from_capabilities(capabilities: Vec<Vec<PinCapability>>) -> Self {
        let mut table = Self::default();
        table.apply_capabilities(capabilities);
        table
    }

    /// Replace capability sets, keeping the mode and value of pins that
    /// still exist
    pub fn apply_capabilities(&mut self, capabilities: Vec<Vec<PinCapability>>) {
        let mut next_channel = 0u8;
        let pins = capabilities
            .into_iter()
            .enumerate()
            .map(|(index, caps)| {
                let mut pin = Pin::new(index as u8, caps);
                if let Some(previous) = self.pins.get(index) {
                    pin.mode = previous.mode.filter(|m| pin.supports(*m));
                    pin.value = previous.value;
                }
                if pin.supports(PinMode::Analog) {
                    pin.analog_channel = Some(next_channel);
                    next_channel = next_channel.saturating_add(1);
                }
                pin
            })
            .collect();
        self.pins = pins;
    }

    /// Apply an analog mapping reply: entry `i` is the channel of pin `i`
    pub fn apply_analog_mapping(&mut self, mapping: &[Option<u8>]) {
        for pin in &mut self.pins {
            pin.analog_channel = mapping.get(pin.index as usize).copied().flatten();
        }
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn port_count(&self) -> usize {
        self.pins.len().div_ceil(PINS_PER_PORT as usize)
    }

    pub fn get(&self, index: u8) -> FirmataResult<Pin> {
        self.pin_ref(index).cloned()
    }

    pub(crate) fn pin_ref(&self, index: u8) -> FirmataResult<&Pin> {
        self.pins
            .get(index as usize)
            .ok_or_else(|| FirmataError::out_of_range(IndexKind::Pin, index, self.pins.len()))
    }

    fn pin_mut(&mut self, index: u8) -> FirmataResult<&mut Pin> {
        let len = self.pins.len();
        self.pins
            .get_mut(index as usize)
            .ok_or_else(|| FirmataError::out_of_range(IndexKind::Pin, index, len))
    }

    /// Record a mode change. The caller checks the capability set first.
    ///
    /// Changing to a different mode clears the cached value.
    pub fn set_mode(&mut self, index: u8, mode: PinMode) -> FirmataResult<()> {
        let pin = self.pin_mut(index)?;
        if pin.mode != Some(mode) {
            pin.mode = Some(mode);
            pin.value = 0;
        }
        Ok(())
    }

    pub fn set_value(&mut self, index: u8, value: u32) -> FirmataResult<()> {
        self.pin_mut(index)?.value = value;
        Ok(())
    }

    /// Cached output bits of one port
    ///
    /// Only pins in `Output` mode contribute; the others read as 0.
    pub fn port_value(&self, port: u8) -> u8 {
        self.port_pins(port)
            .filter(|pin| pin.mode == Some(PinMode::Output) && pin.value != 0)
            .fold(0u8, |acc, pin| acc | (1 << (pin.index % PINS_PER_PORT)))
    }

    fn port_pins(&self, port: u8) -> impl Iterator<Item = &Pin> {
        let start = port as usize * PINS_PER_PORT as usize;
        self.pins.iter().skip(start).take(PINS_PER_PORT as usize)
    }

    /// Apply a digital port report to the port's input pins
    pub fn apply_digital_report(&mut self, port: u8, value: u8) {
        let start = port as usize * PINS_PER_PORT as usize;
        for pin in self.pins.iter_mut().skip(start).take(PINS_PER_PORT as usize) {
            if pin.mode.is_some_and(PinMode::is_digital_input) {
                pin.value = u32::from((value >> (pin.index % PINS_PER_PORT)) & 1);
            }
        }
    }

    /// Apply an analog report; returns the pin the channel maps to
    ///
    /// Pins explicitly set to a non-analog mode keep their value.
    pub fn apply_analog_report(&mut self, channel: u8, value: u16) -> Option<u8> {
        let pin = self
            .pins
            .iter_mut()
            .find(|pin| pin.analog_channel == Some(channel))?;
        if matches!(pin.mode, None | Some(PinMode::Analog)) {
            pin.value = u32::from(value);
        }
        Some(pin.index)
    }

    /// Apply a pin state reply. Unknown pins are ignored.
    pub fn apply_pin_state(&mut self, index: u8, mode: PinMode, value: u32) -> bool {
        match self.pins.get_mut(index as usize) {
            Some(pin) => {
                pin.mode = Some(mode);
                pin.value = value;
                true
            }
            None => false,
        }
    }

    pub fn analog_pin(&self, channel: u8) -> Option<u8> {
        self.pins
            .iter()
            .find(|pin| pin.analog_channel == Some(channel))
            .map(|pin| pin.index)
    }

    pub fn analog_channel_count(&self) -> usize {
        self.pins.iter().filter(|p| p.analog_channel.is_some()).count()
    }

    pub fn snapshot(&self) -> Vec<Pin> {
        self.pins.clone()
    }

    /// Forget modes and values after a system reset
    pub fn reset_states(&mut self) {
        for pin in &mut self.pins {
            pin.mode = None;
            pin.value = 0;
        }
    }

    /// Put back the mode and value of pins saved before a failed send
    pub(crate) fn restore(&mut self, saved: &[Pin]) {
        for saved in saved {
            if let Some(pin) = self.pins.get_mut(saved.index as usize) {
                pin.mode = saved.mode;
                pin.value = saved.value;
            }
        }
    }

    pub fn clear(&mut self) {
        self.pins.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(mode: PinMode, resolution: u8) -> PinCapability {
        PinCapability { mode, resolution }
    }

    fn digital() -> Vec<PinCapability> {
        vec![cap(PinMode::Input, 1), cap(PinMode::Output, 1), cap(PinMode::Pullup, 1)]
    }

    fn sample_table() -> PinTable {
        let mut caps: Vec<Vec<PinCapability>> = (0..10).map(|_| digital()).collect();
        caps[3].push(cap(PinMode::Pwm, 8));
        caps[5].push(cap(PinMode::Servo, 14));
        caps[8].push(cap(PinMode::Analog, 10));
        caps[9].push(cap(PinMode::Analog, 10));
        PinTable::from_capabilities(caps)
    }

    #[test]
    fn test_mode_from_wire() {
        assert_eq!(PinMode::try_from(0x04), Ok(PinMode::Servo));
        assert_eq!(PinMode::try_from(0x0B), Ok(PinMode::Pullup));
        assert_eq!(PinMode::try_from(0x7E), Err(0x7E));
    }

    #[test]
    fn test_get_out_of_range() {
        let table = sample_table();
        assert_eq!(table.len(), 10);
        assert!(matches!(
            table.get(10),
            Err(FirmataError::OutOfRange { kind: IndexKind::Pin, index: 10, limit: 10 })
        ));
    }

    #[test]
    fn test_new_pins_are_unset() {
        let pin = sample_table().get(5).unwrap();
        assert_eq!(pin.mode, None);
        assert_eq!(pin.value, 0);
        assert!(pin.supports(PinMode::Servo));
        assert!(!pin.supports(PinMode::Analog));
    }

    #[test]
    fn test_max_value_from_resolution() {
        let table = sample_table();
        assert_eq!(table.get(3).unwrap().max_value(PinMode::Pwm), Some(255));
        assert_eq!(table.get(8).unwrap().max_value(PinMode::Analog), Some(1023));
        assert_eq!(table.get(3).unwrap().max_value(PinMode::Servo), None);
    }

    #[test]
    fn test_sequential_analog_channels() {
        let table = sample_table();
        assert_eq!(table.analog_pin(0), Some(8));
        assert_eq!(table.analog_pin(1), Some(9));
        assert_eq!(table.analog_pin(2), None);
    }

    #[test]
    fn test_mapping_overrides_channels() {
        let mut table = sample_table();
        let mut mapping = vec![None; 10];
        mapping[9] = Some(0);
        table.apply_analog_mapping(&mapping);
        assert_eq!(table.analog_pin(0), Some(9));
        assert_eq!(table.get(8).unwrap().analog_channel, None);
    }

    #[test]
    fn test_port_value_only_counts_outputs() {
        let mut table = sample_table();
        table.set_mode(2, PinMode::Output).unwrap();
        table.set_value(2, 1).unwrap();
        table.set_mode(4, PinMode::Input).unwrap();
        table.set_value(4, 1).unwrap();
        assert_eq!(table.port_value(0), 0b0000_0100);
        assert_eq!(table.port_value(1), 0);
        assert_eq!(table.port_count(), 2);
    }

    #[test]
    fn test_mode_change_clears_value() {
        let mut table = sample_table();
        table.set_mode(3, PinMode::Pwm).unwrap();
        table.set_value(3, 200).unwrap();
        table.set_mode(3, PinMode::Pwm).unwrap();
        assert_eq!(table.get(3).unwrap().value, 200);
        table.set_mode(3, PinMode::Output).unwrap();
        assert_eq!(table.get(3).unwrap().value, 0);
    }

    #[test]
    fn test_digital_report_updates_inputs_only() {
        let mut table = sample_table();
        table.set_mode(0, PinMode::Input).unwrap();
        table.set_mode(1, PinMode::Pullup).unwrap();
        table.set_mode(2, PinMode::Output).unwrap();
        table.apply_digital_report(0, 0b0000_0111);
        assert_eq!(table.get(0).unwrap().value, 1);
        assert_eq!(table.get(1).unwrap().value, 1);
        assert_eq!(table.get(2).unwrap().value, 0);
        table.apply_digital_report(0, 0);
        assert_eq!(table.get(0).unwrap().value, 0);
    }

    #[test]
    fn test_analog_report() {
        let mut table = sample_table();
        table.set_mode(8, PinMode::Analog).unwrap();
        assert_eq!(table.apply_analog_report(0, 512), Some(8));
        assert_eq!(table.get(8).unwrap().value, 512);
        assert_eq!(table.apply_analog_report(7, 1), None);

        table.set_mode(9, PinMode::Output).unwrap();
        assert_eq!(table.apply_analog_report(1, 99), Some(9));
        assert_eq!(table.get(9).unwrap().value, 0);
    }

    #[test]
    fn test_capabilities_refresh_keeps_state() {
        let mut table = sample_table();
        table.set_mode(5, PinMode::Servo).unwrap();
        table.set_value(5, 90).unwrap();
        let caps: Vec<Vec<PinCapability>> = table.snapshot().into_iter().map(|p| p.capabilities).collect();
        table.apply_capabilities(caps);
        let pin = table.get(5).unwrap();
        assert_eq!(pin.mode, Some(PinMode::Servo));
        assert_eq!(pin.value, 90);
    }

    #[test]
    fn test_restore_puts_back_saved_pins() {
        let mut table = sample_table();
        table.set_mode(2, PinMode::Output).unwrap();
        table.set_value(2, 1).unwrap();
        let saved = table.snapshot();

        table.reset_states();
        table.set_mode(4, PinMode::Input).unwrap();
        table.restore(&saved[2..3]);

        assert_eq!(table.get(2).unwrap().mode, Some(PinMode::Output));
        assert_eq!(table.get(2).unwrap().value, 1);
        // Pins not in the saved slice are left alone
        assert_eq!(table.get(4).unwrap().mode, Some(PinMode::Input));
    }

    #[test]
    fn test_pin_state_and_reset() {
        let mut table = sample_table();
        assert!(table.apply_pin_state(3, PinMode::Pwm, 128));
        assert!(!table.apply_pin_state(42, PinMode::Pwm, 1));
        assert_eq!(table.get(3).unwrap().mode, Some(PinMode::Pwm));
        table.reset_states();
        assert_eq!(table.get(3).unwrap().mode, None);
        table.clear();
        assert!(table.is_empty());
    }
}
