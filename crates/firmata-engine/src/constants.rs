// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Wire bytes of the Firmata protocol, version 2.6
//!
//! See <https://github.com/firmata/protocol/blob/master/protocol.md>.

// --- Status bytes ---
// The low nibble of digital/analog messages and report toggles carries the
// port or channel.
pub const DIGITAL_MESSAGE: u8 = 0x90;
pub const DIGITAL_MESSAGE_END: u8 = 0x9F;
pub const ANALOG_MESSAGE: u8 = 0xE0;
pub const ANALOG_MESSAGE_END: u8 = 0xEF;
pub const REPORT_ANALOG: u8 = 0xC0;
pub const REPORT_DIGITAL: u8 = 0xD0;
pub const START_SYSEX: u8 = 0xF0;
pub const SET_PIN_MODE: u8 = 0xF4;
pub const END_SYSEX: u8 = 0xF7;
pub const PROTOCOL_VERSION: u8 = 0xF9;
pub const SYSTEM_RESET: u8 = 0xFF;

// --- Sysex commands ---
pub const ANALOG_MAPPING_QUERY: u8 = 0x69;
pub const ANALOG_MAPPING_RESPONSE: u8 = 0x6A;
pub const CAPABILITY_QUERY: u8 = 0x6B;
pub const CAPABILITY_RESPONSE: u8 = 0x6C;
pub const PIN_STATE_QUERY: u8 = 0x6D;
pub const PIN_STATE_RESPONSE: u8 = 0x6E;
pub const EXTENDED_ANALOG: u8 = 0x6F;
pub const SERVO_CONFIG: u8 = 0x70;
pub const STRING_DATA: u8 = 0x71;
pub const I2C_REQUEST: u8 = 0x76;
pub const I2C_REPLY: u8 = 0x77;
pub const I2C_CONFIG: u8 = 0x78;
pub const REPORT_FIRMWARE: u8 = 0x79;
pub const SAMPLING_INTERVAL: u8 = 0x7A;

/// Ends one pin's mode list in a capability reply
pub const CAPABILITY_PIN_END: u8 = 0x7F;
/// Marks a pin without an analog channel in an analog mapping reply
pub const NO_ANALOG_CHANNEL: u8 = 0x7F;

/// Mask for a 7-bit data byte
pub const DATA_MASK: u8 = 0x7F;

// --- I2C read/write mode, bits 3-4 of the second request byte ---
pub const I2C_MODE_WRITE: u8 = 0b00;
pub const I2C_MODE_READ_ONCE: u8 = 0b01;
pub const I2C_MODE_READ_CONTINUOUSLY: u8 = 0b10;
pub const I2C_MODE_STOP_READING: u8 = 0b11;
pub const I2C_MODE_SHIFT: u8 = 3;

/// Largest 7-bit I2C address
pub const I2C_MAX_ADDRESS: u8 = 0x7F;

/// Digital pins per port
pub const PINS_PER_PORT: u8 = 8;

/// Ports and analog channels addressable through a status nibble
pub const MAX_NIBBLE_INDEX: u8 = 0x0F;

/// Largest value carried by a two-byte 7-bit pair
pub const MAX_14BIT: u16 = 0x3FFF;

/// Default servo pulse range in microseconds (Arduino Servo library)
pub const DEFAULT_SERVO_MIN_PULSE: u16 = 544;
pub const DEFAULT_SERVO_MAX_PULSE: u16 = 2400;

/// Highest servo angle accepted by `servo_write`
pub const MAX_SERVO_ANGLE: u16 = 180;
