// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Decoded inbound messages

use crate::pins::{PinCapability, PinMode};

/// Data returned by an I2C read
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct I2cReply {
    pub address: u16,
    pub register: u16,
    pub data: Vec<u8>,
}

/// Firmware name and version reported by the board
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FirmwareInfo {
    pub major: u8,
    pub minor: u8,
    pub name: String,
}

/// One complete message from the board
///
/// Frames are produced by [`crate::decoder::Decoder`] and consumed once by
/// the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Bits of an 8-pin digital port
    DigitalPortReport { port: u8, value: u8 },
    /// Sample of an analog channel
    AnalogPinReport { channel: u8, value: u16 },
    ProtocolVersion { major: u8, minor: u8 },
    /// Supported modes per pin, indexed by pin number
    CapabilityReply(Vec<Vec<PinCapability>>),
    /// Analog channel per pin, indexed by pin number
    AnalogMappingReply(Vec<Option<u8>>),
    PinStateReply { pin: u8, mode: PinMode, value: u32 },
    I2cReply(I2cReply),
    FirmwareReport(FirmwareInfo),
    StringData(String),
    /// A sysex message with no command byte
    SysexEnd,
    /// A well-formed sysex message this client does not interpret
    UnknownSysex { command: u8, payload: Vec<u8> },
}
