// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `firmata.toml`.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FirmataConfig {
    pub serial: SerialConfig,
    pub connection: ConnectionConfig,
    pub decoder: DecoderConfig,
    pub logging: LoggingConfig,
}

/// Serial link settings, consumed by whatever opens the physical port
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyACM0` or `COM3`
    pub port: String,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 57600, // StandardFirmata default
        }
    }
}

/// Connection and handshake settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// How long `connect()` waits for the capability reply
    pub handshake_timeout_ms: u64,
    /// Size of the listener's transport read buffer
    pub read_buffer_size: usize,
    /// Capacity of each subscriber's event channel
    pub event_channel_capacity: usize,
    pub query_firmware: bool,
    pub query_analog_mapping: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 5000,
            read_buffer_size: 256,
            event_channel_capacity: 1024,
            query_firmware: true,
            query_analog_mapping: true,
        }
    }
}

/// Incoming message decoder settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Sysex bodies longer than this are discarded
    pub max_sysex_size: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_sysex_size: 1024,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse a format name, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FirmataConfig::default();
        assert_eq!(config.serial.baud_rate, 57600);
        assert_eq!(config.connection.handshake_timeout_ms, 5000);
        assert_eq!(config.decoder.max_sysex_size, 1024);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: FirmataConfig = toml::from_str(
            r#"
            [serial]
            port = "/dev/ttyACM0"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 57600);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.connection, ConnectionConfig::default());
    }

    #[test]
    fn test_json_roundtrip_shape() {
        let json = serde_json::to_value(FirmataConfig::default()).unwrap();
        assert_eq!(json["logging"]["format"], "text");
        assert_eq!(json["connection"]["read_buffer_size"], 256);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
