// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the protocol engine

use std::fmt;
use std::io;
use std::time::Duration;

use crate::pins::PinMode;

/// Result type alias for engine operations
pub type FirmataResult<T> = Result<T, FirmataError>;

/// What an out-of-range index referred to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Pin,
    Port,
    AnalogChannel,
    I2cAddress,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Pin => write!(f, "pin"),
            IndexKind::Port => write!(f, "port"),
            IndexKind::AnalogChannel => write!(f, "analog channel"),
            IndexKind::I2cAddress => write!(f, "I2C address"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FirmataError {
    /// Index beyond the board's pin table, checked before any byte is sent
    #[error("{kind} {index} out of range (limit {limit})")]
    OutOfRange {
        kind: IndexKind,
        index: usize,
        limit: usize,
    },

    /// The capability reply does not list this mode for the pin
    #[error("pin {pin} does not support mode {mode}")]
    UnsupportedMode { pin: u8, mode: PinMode },

    /// The pin is not currently in a mode compatible with the operation
    #[error("pin {pin} must be in mode {} (current: {})", describe_modes(.required), describe_mode(.actual))]
    ModeMismatch {
        pin: u8,
        required: &'static [PinMode],
        actual: Option<PinMode>,
    },

    #[error("value {value} for pin {pin} exceeds maximum {max}")]
    InvalidValue { pin: u8, value: u32, max: u32 },

    /// A command argument does not fit its wire encoding
    #[error("{parameter} {value} exceeds maximum {max}")]
    InvalidParameter {
        parameter: &'static str,
        value: u32,
        max: u32,
    },

    #[error("no active connection")]
    NotConnected,

    #[error("board is already connected")]
    AlreadyConnected,

    /// The listener stopped; the caller must disconnect and reconnect
    #[error("connection lost")]
    Disconnected,

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Malformed frame contents. The decoder logs and drops these.
    #[error("protocol desync: {0}")]
    ProtocolDesync(String),
}

fn describe_mode(mode: &Option<PinMode>) -> String {
    match mode {
        Some(mode) => mode.to_string(),
        None => "UNSET".to_string(),
    }
}

fn describe_modes(modes: &[PinMode]) -> String {
    modes
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(" or ")
}

impl FirmataError {
    pub(crate) fn out_of_range(kind: IndexKind, index: impl Into<usize>, limit: usize) -> Self {
        FirmataError::OutOfRange {
            kind,
            index: index.into(),
            limit,
        }
    }

    /// True for errors that leave the connection unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, FirmataError::Transport(_) | FirmataError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_mismatch_message() {
        let err = FirmataError::ModeMismatch {
            pin: 5,
            required: &[PinMode::Servo],
            actual: None,
        };
        assert_eq!(err.to_string(), "pin 5 must be in mode SERVO (current: UNSET)");

        let err = FirmataError::ModeMismatch {
            pin: 3,
            required: &[PinMode::Pwm, PinMode::Servo],
            actual: Some(PinMode::Input),
        };
        assert_eq!(err.to_string(), "pin 3 must be in mode PWM or SERVO (current: INPUT)");
    }

    #[test]
    fn test_out_of_range_message() {
        let err = FirmataError::out_of_range(IndexKind::AnalogChannel, 9u8, 6);
        assert_eq!(err.to_string(), "analog channel 9 out of range (limit 6)");
    }

    #[test]
    fn test_invalid_parameter_message() {
        let err = FirmataError::InvalidParameter {
            parameter: "sampling interval",
            value: 20000,
            max: 16383,
        };
        assert_eq!(err.to_string(), "sampling interval 20000 exceeds maximum 16383");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(FirmataError::Disconnected.is_fatal());
        assert!(FirmataError::from(io::Error::from(io::ErrorKind::BrokenPipe)).is_fatal());
        assert!(!FirmataError::NotConnected.is_fatal());
        assert!(!FirmataError::ProtocolDesync("x".into()).is_fatal());
    }
}
