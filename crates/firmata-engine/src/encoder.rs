// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Outbound command frames
//!
//! Each function returns the exact bytes for one command. Index and value
//! checks happen in the board before these are called; anything wider than
//! the wire field is masked.

use crate::codec::{encode_14bit, encode_7bit};
use crate::constants::*;
use crate::pins::PinMode;

/// Read mode of an I2C read request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cReadMode {
    Once,
    Continuously,
}

impl I2cReadMode {
    fn bits(self) -> u8 {
        match self {
            I2cReadMode::Once => I2C_MODE_READ_ONCE,
            I2cReadMode::Continuously => I2C_MODE_READ_CONTINUOUSLY,
        }
    }
}

fn sysex(command: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 3);
    out.push(START_SYSEX);
    out.push(command);
    out.extend_from_slice(body);
    out.push(END_SYSEX);
    out
}

pub fn set_pin_mode(pin: u8, mode: PinMode) -> [u8; 3] {
    [SET_PIN_MODE, pin & DATA_MASK, mode.as_u8()]
}

/// Write all 8 bits of a digital port
pub fn digital_write(port: u8, port_value: u8) -> [u8; 3] {
    let [low, high] = encode_7bit(port_value);
    [DIGITAL_MESSAGE | (port & MAX_NIBBLE_INDEX), low, high]
}

/// Analog, PWM or servo value
///
/// Pins above 15 or values above 14 bits use the extended analog message.
pub fn analog_write(pin: u8, value: u32) -> Vec<u8> {
    if pin > MAX_NIBBLE_INDEX || value > u32::from(MAX_14BIT) {
        return extended_analog(pin, value);
    }
    let [low, high] = encode_14bit(value as u16);
    vec![ANALOG_MESSAGE | pin, low, high]
}

pub fn extended_analog(pin: u8, value: u32) -> Vec<u8> {
    let mut body = vec![pin & DATA_MASK, (value as u8) & DATA_MASK, ((value >> 7) as u8) & DATA_MASK];
    let mut rest = value >> 14;
    while rest > 0 {
        body.push((rest as u8) & DATA_MASK);
        rest >>= 7;
    }
    sysex(EXTENDED_ANALOG, &body)
}

pub fn report_analog(channel: u8, enable: bool) -> [u8; 2] {
    [REPORT_ANALOG | (channel & MAX_NIBBLE_INDEX), u8::from(enable)]
}

pub fn report_digital(port: u8, enable: bool) -> [u8; 2] {
    [REPORT_DIGITAL | (port & MAX_NIBBLE_INDEX), u8::from(enable)]
}

/// Delay in microseconds between an I2C write and the following read
pub fn i2c_config(delay_us: u16) -> Vec<u8> {
    sysex(I2C_CONFIG, &encode_14bit(delay_us))
}

fn i2c_request(address: u8, mode_bits: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 2);
    body.push(address & DATA_MASK);
    body.push(mode_bits << I2C_MODE_SHIFT);
    body.extend_from_slice(payload);
    sysex(I2C_REQUEST, &body)
}

/// Write bytes to a 7-bit I2C address
pub fn i2c_write(address: u8, data: &[u8]) -> Vec<u8> {
    let payload: Vec<u8> = data.iter().flat_map(|&b| encode_7bit(b)).collect();
    i2c_request(address, I2C_MODE_WRITE, &payload)
}

/// Request `len` bytes, optionally starting at `register`
pub fn i2c_read(address: u8, register: Option<u16>, len: u16, mode: I2cReadMode) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4);
    if let Some(register) = register {
        payload.extend_from_slice(&encode_14bit(register));
    }
    payload.extend_from_slice(&encode_14bit(len));
    i2c_request(address, mode.bits(), &payload)
}

pub fn i2c_stop_reading(address: u8) -> Vec<u8> {
    i2c_request(address, I2C_MODE_STOP_READING, &[])
}

/// Servo pulse range in microseconds
pub fn servo_config(pin: u8, min_pulse: u16, max_pulse: u16) -> Vec<u8> {
    let [min_low, min_high] = encode_14bit(min_pulse);
    let [max_low, max_high] = encode_14bit(max_pulse);
    sysex(SERVO_CONFIG, &[pin & DATA_MASK, min_low, min_high, max_low, max_high])
}

pub fn capability_query() -> Vec<u8> {
    sysex(CAPABILITY_QUERY, &[])
}

pub fn analog_mapping_query() -> Vec<u8> {
    sysex(ANALOG_MAPPING_QUERY, &[])
}

pub fn pin_state_query(pin: u8) -> Vec<u8> {
    sysex(PIN_STATE_QUERY, &[pin & DATA_MASK])
}

pub fn firmware_query() -> Vec<u8> {
    sysex(REPORT_FIRMWARE, &[])
}

pub fn protocol_version_query() -> [u8; 1] {
    [PROTOCOL_VERSION]
}

pub fn system_reset() -> [u8; 1] {
    [SYSTEM_RESET]
}

/// Interval in milliseconds between analog and I2C samples
pub fn sampling_interval(interval_ms: u16) -> Vec<u8> {
    sysex(SAMPLING_INTERVAL, &encode_14bit(interval_ms))
}
