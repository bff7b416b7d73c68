// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{validate_config, ConfigError, ConfigResult, FirmataConfig, LogFormat};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "firmata.toml";

/// Find the Firmata configuration file
///
/// Search order:
/// 1. `FIRMATA_CONFIG_PATH` environment variable
/// 2. Current working directory: `./firmata.toml`
/// 3. Up to five parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("FIRMATA_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        } else {
            return Err(ConfigError::FileNotFound(format!(
                "Config file specified by FIRMATA_CONFIG_PATH not found: {}",
                path.display()
            )));
        }
    }

    let mut search_paths = Vec::new();

    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "Configuration file '{}' not found in any of these locations:\n{}\n\nSet FIRMATA_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides, keyed by dotted name
///
/// # Errors
///
/// Returns error if config file is not found, contains invalid TOML, or fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<FirmataConfig> {
    let config_file = if let Some(path) = config_path {
        path.to_path_buf()
    } else {
        find_config_file()?
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: FirmataConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    validate_config(&config)?;

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `FIRMATA_SERIAL_PORT` -> `serial.port`
/// - `FIRMATA_BAUD_RATE` -> `serial.baud_rate`
/// - `FIRMATA_HANDSHAKE_TIMEOUT_MS` -> `connection.handshake_timeout_ms`
/// - `FIRMATA_READ_BUFFER_SIZE` -> `connection.read_buffer_size`
/// - `FIRMATA_MAX_SYSEX_SIZE` -> `decoder.max_sysex_size`
/// - `FIRMATA_LOG_LEVEL` -> `logging.level`
/// - `FIRMATA_LOG_FORMAT` -> `logging.format`
///
/// Values that fail to parse are ignored.
pub fn apply_environment_overrides(config: &mut FirmataConfig) {
    let vars: HashMap<&str, String> = [
        ("FIRMATA_SERIAL_PORT", "serial.port"),
        ("FIRMATA_BAUD_RATE", "serial.baud_rate"),
        ("FIRMATA_HANDSHAKE_TIMEOUT_MS", "connection.handshake_timeout_ms"),
        ("FIRMATA_READ_BUFFER_SIZE", "connection.read_buffer_size"),
        ("FIRMATA_MAX_SYSEX_SIZE", "decoder.max_sysex_size"),
        ("FIRMATA_LOG_LEVEL", "logging.level"),
        ("FIRMATA_LOG_FORMAT", "logging.format"),
    ]
    .into_iter()
    .filter_map(|(var, key)| env::var(var).ok().map(|value| (key, value)))
    .collect();

    for (key, value) in vars {
        apply_override(config, key, &value);
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - Map of dotted keys to values (e.g., `{"serial.port": "/dev/ttyUSB0"}`)
pub fn apply_cli_overrides(config: &mut FirmataConfig, cli_args: &HashMap<String, String>) {
    for (key, value) in cli_args {
        apply_override(config, key, value);
    }
}

fn apply_override(config: &mut FirmataConfig, key: &str, value: &str) {
    match key {
        "serial.port" => config.serial.port = value.to_string(),
        "serial.baud_rate" => {
            if let Ok(baud) = value.parse::<u32>() {
                config.serial.baud_rate = baud;
            }
        }
        "connection.handshake_timeout_ms" => {
            if let Ok(ms) = value.parse::<u64>() {
                config.connection.handshake_timeout_ms = ms;
            }
        }
        "connection.read_buffer_size" => {
            if let Ok(size) = value.parse::<usize>() {
                config.connection.read_buffer_size = size;
            }
        }
        "connection.event_channel_capacity" => {
            if let Ok(size) = value.parse::<usize>() {
                config.connection.event_channel_capacity = size;
            }
        }
        "connection.query_firmware" => config.connection.query_firmware = parse_bool(value),
        "connection.query_analog_mapping" => {
            config.connection.query_analog_mapping = parse_bool(value)
        }
        "decoder.max_sysex_size" => {
            if let Ok(size) = value.parse::<usize>() {
                config.decoder.max_sysex_size = size;
            }
        }
        "logging.level" => config.logging.level = value.to_lowercase(),
        "logging.format" => {
            if let Some(format) = LogFormat::parse(value) {
                config.logging.format = format;
            }
        }
        _ => {}
    }
}

fn parse_bool(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "true" || value == "1" || value == "yes"
}
