// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Incremental message decoder
//!
//! Bytes are pushed one at a time and the decoder keeps its partial state
//! between calls, so transport reads may split frames anywhere. Bytes that
//! cannot start or continue a frame are discarded and counted; decoding
//! never fails.

use tracing::{debug, warn};

use crate::codec::{decode_14bit, decode_7bit_pair, decode_multibyte_string};
use crate::constants::*;
use crate::error::{FirmataError, FirmataResult};
use crate::frame::{FirmwareInfo, Frame, I2cReply};
use crate::pins::{PinCapability, PinMode};

/// Default limit on a sysex body, in bytes
pub const DEFAULT_MAX_SYSEX_SIZE: usize = 1024;

/// Pin state values use at most four 7-bit groups
const MAX_PIN_STATE_GROUPS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    AwaitingDigital { port: u8, low: Option<u8> },
    AwaitingAnalog { channel: u8, low: Option<u8> },
    AwaitingVersion { major: Option<u8> },
    AwaitingSysex,
}

#[derive(Debug)]
pub struct Decoder {
    state: State,
    sysex: Vec<u8>,
    max_sysex_size: usize,
    desync_count: u64,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SYSEX_SIZE)
    }
}

impl Decoder {
    pub fn new(max_sysex_size: usize) -> Self {
        Self {
            state: State::Idle,
            sysex: Vec::new(),
            max_sysex_size,
            desync_count: 0,
        }
    }

    /// Total bytes discarded since creation
    pub fn desync_count(&self) -> u64 {
        self.desync_count
    }

    /// True when no partial frame is buffered
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.sysex.clear();
    }

    /// Decode every complete frame in `bytes`
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Push one byte, returning a frame when it completes one
    pub fn push(&mut self, byte: u8) -> Option<Frame> {
        if byte & 0x80 != 0 {
            self.push_status(byte)
        } else {
            self.push_data(byte)
        }
    }

    fn push_status(&mut self, byte: u8) -> Option<Frame> {
        if byte == END_SYSEX && self.state == State::AwaitingSysex {
            self.state = State::Idle;
            let body = std::mem::take(&mut self.sysex);
            return match parse_sysex(&body) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!("[FIRMATA-DECODER] Dropping sysex ({} bytes): {}", body.len(), e);
                    self.discard(body.len() + 2);
                    None
                }
            };
        }

        if self.state != State::Idle {
            let partial = self.partial_len();
            debug!(
                "[FIRMATA-DECODER] Status 0x{:02X} interrupted a partial frame, discarding {} bytes",
                byte, partial
            );
            self.discard(partial);
            self.reset();
        }

        self.state = match byte {
            DIGITAL_MESSAGE..=DIGITAL_MESSAGE_END => State::AwaitingDigital {
                port: byte & 0x0F,
                low: None,
            },
            ANALOG_MESSAGE..=ANALOG_MESSAGE_END => State::AwaitingAnalog {
                channel: byte & 0x0F,
                low: None,
            },
            PROTOCOL_VERSION => State::AwaitingVersion { major: None },
            START_SYSEX => State::AwaitingSysex,
            _ => {
                debug!("[FIRMATA-DECODER] Discarding unexpected status byte 0x{:02X}", byte);
                self.discard(1);
                State::Idle
            }
        };
        None
    }

    fn push_data(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            State::Idle => {
                debug!("[FIRMATA-DECODER] Discarding stray data byte 0x{:02X}", byte);
                self.discard(1);
                None
            }
            State::AwaitingDigital { port, low: None } => {
                self.state = State::AwaitingDigital { port, low: Some(byte) };
                None
            }
            State::AwaitingDigital { port, low: Some(low) } => {
                self.state = State::Idle;
                Some(Frame::DigitalPortReport {
                    port,
                    value: decode_7bit_pair(low, byte),
                })
            }
            State::AwaitingAnalog { channel, low: None } => {
                self.state = State::AwaitingAnalog { channel, low: Some(byte) };
                None
            }
            State::AwaitingAnalog { channel, low: Some(low) } => {
                self.state = State::Idle;
                Some(Frame::AnalogPinReport {
                    channel,
                    value: decode_14bit(low, byte),
                })
            }
            State::AwaitingVersion { major: None } => {
                self.state = State::AwaitingVersion { major: Some(byte) };
                None
            }
            State::AwaitingVersion { major: Some(major) } => {
                self.state = State::Idle;
                Some(Frame::ProtocolVersion { major, minor: byte })
            }
            State::AwaitingSysex => {
                if self.sysex.len() >= self.max_sysex_size {
                    warn!(
                        "[FIRMATA-DECODER] Sysex exceeds {} bytes, dropping it",
                        self.max_sysex_size
                    );
                    // The rest of the body is discarded byte by byte from Idle
                    self.discard(self.partial_len() + 1);
                    self.reset();
                } else {
                    self.sysex.push(byte);
                }
                None
            }
        }
    }

    fn partial_len(&self) -> usize {
        match self.state {
            State::Idle => 0,
            State::AwaitingDigital { low, .. } | State::AwaitingAnalog { low, .. } => {
                1 + usize::from(low.is_some())
            }
            State::AwaitingVersion { major } => 1 + usize::from(major.is_some()),
            State::AwaitingSysex => 1 + self.sysex.len(),
        }
    }

    fn discard(&mut self, count: usize) {
        self.desync_count = self.desync_count.saturating_add(count as u64);
    }
}

/// Interpret a sysex body (the bytes between 0xF0 and 0xF7)
pub fn parse_sysex(body: &[u8]) -> FirmataResult<Frame> {
    let Some((&command, payload)) = body.split_first() else {
        return Ok(Frame::SysexEnd);
    };

    match command {
        CAPABILITY_RESPONSE => parse_capabilities(payload).map(Frame::CapabilityReply),
        ANALOG_MAPPING_RESPONSE => Ok(Frame::AnalogMappingReply(
            payload
                .iter()
                .map(|&b| (b != NO_ANALOG_CHANNEL).then_some(b))
                .collect(),
        )),
        PIN_STATE_RESPONSE => parse_pin_state(payload),
        I2C_REPLY => parse_i2c_reply(payload).map(Frame::I2cReply),
        REPORT_FIRMWARE => match payload {
            [major, minor, name @ ..] => Ok(Frame::FirmwareReport(FirmwareInfo {
                major: *major,
                minor: *minor,
                name: decode_multibyte_string(name),
            })),
            _ => Err(desync("firmware report shorter than 2 bytes")),
        },
        STRING_DATA => Ok(Frame::StringData(decode_multibyte_string(payload))),
        _ => Ok(Frame::UnknownSysex {
            command,
            payload: payload.to_vec(),
        }),
    }
}

fn desync(reason: impl Into<String>) -> FirmataError {
    FirmataError::ProtocolDesync(reason.into())
}

fn parse_capabilities(payload: &[u8]) -> FirmataResult<Vec<Vec<PinCapability>>> {
    let mut pins = Vec::new();
    let mut current = Vec::new();
    let mut i = 0;

    while i < payload.len() {
        if payload[i] == CAPABILITY_PIN_END {
            pins.push(std::mem::take(&mut current));
            i += 1;
            continue;
        }
        let (mode, resolution) = match payload.get(i..i + 2) {
            Some(&[mode, resolution]) => (mode, resolution),
            _ => return Err(desync("capability entry missing resolution")),
        };
        match PinMode::try_from(mode) {
            Ok(mode) => current.push(PinCapability { mode, resolution }),
            Err(raw) => debug!(
                "[FIRMATA-DECODER] Ignoring unknown mode 0x{:02X} for pin {}",
                raw,
                pins.len()
            ),
        }
        i += 2;
    }

    if !current.is_empty() {
        return Err(desync("capability reply missing pin terminator"));
    }
    Ok(pins)
}

fn parse_pin_state(payload: &[u8]) -> FirmataResult<Frame> {
    let [pin, mode, value_bytes @ ..] = payload else {
        return Err(desync("pin state reply shorter than 2 bytes"));
    };
    let mode = PinMode::try_from(*mode)
        .map_err(|raw| desync(format!("pin state reply with unknown mode 0x{:02X}", raw)))?;
    let value = value_bytes
        .iter()
        .take(MAX_PIN_STATE_GROUPS)
        .enumerate()
        .fold(0u32, |acc, (i, &b)| acc | (u32::from(b & DATA_MASK) << (7 * i)));
    Ok(Frame::PinStateReply {
        pin: *pin,
        mode,
        value,
    })
}

fn parse_i2c_reply(payload: &[u8]) -> FirmataResult<I2cReply> {
    let [addr_lsb, addr_msb, reg_lsb, reg_msb, data @ ..] = payload else {
        return Err(desync("I2C reply shorter than 4 bytes"));
    };
    if data.len() % 2 != 0 {
        return Err(desync("I2C reply data has an odd byte count"));
    }
    Ok(I2cReply {
        address: decode_14bit(*addr_lsb, *addr_msb),
        register: decode_14bit(*reg_lsb, *reg_msb),
        data: data
            .chunks_exact(2)
            .map(|pair| decode_7bit_pair(pair[0], pair[1]))
            .collect(),
    })
}
