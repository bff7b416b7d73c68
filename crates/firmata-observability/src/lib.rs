// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # firmata-observability
//!
//! Logging setup shared by every Firmata crate, with per-crate debug flag
//! support.
//!
//! ## Features
//! - `file-logging`: daily-rotated JSON log files next to console output

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "firmata",
    "firmata-engine",
    "firmata-config",
    "firmata-observability",
];
