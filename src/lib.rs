// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Firmata - host-side client for Firmata microcontroller boards
//!
//! Drives a board running StandardFirmata (or a compatible sketch) over any
//! byte stream: set pin modes, write digital/PWM/servo values, receive
//! digital and analog reports, and talk to I2C peripherals.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! firmata = "0.1"  # Default: engine + config + observability
//! ```
//!
//! ## Feature Flags
//!
//! - **`config`** (default): `firmata.toml` loader with environment and CLI overrides
//! - **`observability`** (default): logging initialisation and `--debug-<crate>` flags
//! - **`file-logging`**: daily-rotated JSON log files
//! - **`serde`**: serializable pin snapshots and connection state
//!
//! ## Usage
//!
//! ```rust,no_run
//! use firmata::prelude::*;
//! use std::net::TcpStream;
//!
//! let config = firmata::config::load_config(None, None)?;
//! let board = Board::new(firmata::board_config(&config));
//!
//! let stream = TcpStream::connect("192.168.1.50:3030")?;
//! stream.set_read_timeout(Some(std::time::Duration::from_millis(100)))?;
//! board.connect(Box::new(StreamTransport::new(stream.try_clone()?, stream)))?;
//!
//! let events = board.subscribe();
//! board.set_pin_mode(2, PinMode::Input)?;
//! board.enable_digital_reporting(0, true)?;
//! while let Ok(event) = events.recv() {
//!     if let BoardEvent::DigitalPortReport { port, value } = event {
//!         println!("port {} = {:08b}", port, value);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: firmata-config                             │
//! │  (firmata.toml, env + CLI overrides, validation)        │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Protocol: firmata-engine                               │
//! │  (codec, decoder, listener thread, pin table, Board)    │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Infrastructure: firmata-observability                  │
//! │  (tracing subscriber setup, per-crate debug flags)      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

// Re-export protocol engine
pub use firmata_engine as engine;

// Re-export foundation
#[cfg(feature = "config")]
pub use firmata_config as config;

// Re-export infrastructure
#[cfg(feature = "observability")]
pub use firmata_observability as observability;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::engine::{
        Board, BoardConfig, BoardEvent, ConnectionState, Device, FirmataBoard, FirmataError,
        FirmataResult, I2cReadMode, MemoryTransport, Pin, PinMode, StreamTransport, Transport,
    };

    #[cfg(feature = "config")]
    pub use crate::config::{load_config, FirmataConfig};

    #[cfg(feature = "observability")]
    pub use crate::observability::{init_logging, parse_debug_flags, CrateDebugFlags};
}

/// Translate the loaded configuration into the engine's board settings
#[cfg(feature = "config")]
pub fn board_config(config: &config::FirmataConfig) -> engine::BoardConfig {
    engine::BoardConfig {
        handshake_timeout: std::time::Duration::from_millis(config.connection.handshake_timeout_ms),
        read_buffer_size: config.connection.read_buffer_size,
        max_sysex_size: config.decoder.max_sysex_size,
        event_channel_capacity: config.connection.event_channel_capacity,
        query_firmware: config.connection.query_firmware,
        query_analog_mapping: config.connection.query_analog_mapping,
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let board = Board::default();
        assert_eq!(board.state(), ConnectionState::Disconnected);
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_default_config_matches_engine_defaults() {
        let converted = crate::board_config(&crate::config::FirmataConfig::default());
        let engine = crate::engine::BoardConfig::default();
        assert_eq!(converted.handshake_timeout, engine.handshake_timeout);
        assert_eq!(converted.read_buffer_size, engine.read_buffer_size);
        assert_eq!(converted.max_sysex_size, engine.max_sysex_size);
        assert_eq!(converted.event_channel_capacity, engine.event_channel_capacity);
        assert_eq!(converted.query_firmware, engine.query_firmware);
        assert_eq!(converted.query_analog_mapping, engine.query_analog_mapping);
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_loaded_file_reaches_board_config() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[connection]\nhandshake_timeout_ms = 250\nquery_firmware = false\n\n[decoder]\nmax_sysex_size = 64"
        )
        .unwrap();

        let config = crate::config::load_config(Some(file.path()), None).unwrap();
        let board = crate::board_config(&config);
        assert_eq!(board.handshake_timeout, std::time::Duration::from_millis(250));
        assert!(!board.query_firmware);
        assert_eq!(board.max_sysex_size, 64);
        assert_eq!(board.read_buffer_size, 256);
    }
}
