// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Ensures configuration values are within ranges the engine can work with.

use crate::{ConfigError, ConfigResult, FirmataConfig};

/// Smallest sysex body that still fits a capability reply for a tiny board
const MIN_SYSEX_SIZE: usize = 16;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MustBePositive { field: String },
    BelowMinimum { field: String, value: usize, minimum: usize },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MustBePositive { field } => {
                write!(f, "{} must be greater than zero", field)
            }
            Self::BelowMinimum {
                field,
                value,
                minimum,
            } => {
                write!(f, "{} = {} is below the minimum of {}", field, value, minimum)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &FirmataConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_serial(config, &mut errors);
    validate_connection(config, &mut errors);
    validate_decoder(config, &mut errors);
    validate_logging(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_serial(config: &FirmataConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.serial.baud_rate == 0 {
        errors.push(ConfigValidationError::MustBePositive {
            field: "serial.baud_rate".to_string(),
        });
    }
}

fn validate_connection(config: &FirmataConfig, errors: &mut Vec<ConfigValidationError>) {
    let connection = &config.connection;
    if connection.handshake_timeout_ms == 0 {
        errors.push(ConfigValidationError::MustBePositive {
            field: "connection.handshake_timeout_ms".to_string(),
        });
    }
    if connection.read_buffer_size == 0 {
        errors.push(ConfigValidationError::MustBePositive {
            field: "connection.read_buffer_size".to_string(),
        });
    }
    if connection.event_channel_capacity == 0 {
        errors.push(ConfigValidationError::MustBePositive {
            field: "connection.event_channel_capacity".to_string(),
        });
    }
}

fn validate_decoder(config: &FirmataConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.decoder.max_sysex_size < MIN_SYSEX_SIZE {
        errors.push(ConfigValidationError::BelowMinimum {
            field: "decoder.max_sysex_size".to_string(),
            value: config.decoder.max_sysex_size,
            minimum: MIN_SYSEX_SIZE,
        });
    }
}

fn validate_logging(config: &FirmataConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("must be one of {}", LOG_LEVELS.join(", ")),
        });
    }
}
