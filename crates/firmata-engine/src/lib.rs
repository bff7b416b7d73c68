// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# Firmata Engine

Host-side client for the Firmata 2.6 wire protocol.

## Layers

- **codec / encoder / decoder**: pure byte-level framing. The decoder is
  resumable, so transport reads may split frames anywhere.
- **pins**: the pin table every command validates against.
- **listener**: background thread that drains the transport, applies
  reports to the pin table and publishes [`BoardEvent`]s.
- **board**: the synchronous [`Board`] facade and the [`FirmataBoard`] trait.
- **device**: Arduino-style helpers on top of any [`FirmataBoard`].

## Example

```no_run
use firmata_engine::{Board, PinMode, StreamTransport};
use std::net::TcpStream;

# fn main() -> Result<(), Box<dyn std::error::Error>> {
let stream = TcpStream::connect("192.168.1.50:3030")?;
stream.set_read_timeout(Some(std::time::Duration::from_millis(100)))?;
let transport = StreamTransport::new(stream.try_clone()?, stream);

let board = Board::default();
board.connect(Box::new(transport))?;
board.set_pin_mode(13, PinMode::Output)?;
board.digital_write(13, true)?;
board.disconnect();
# Ok(())
# }
```
*/

pub mod board;
pub mod codec;
pub mod constants;
pub mod decoder;
pub mod device;
pub mod encoder;
pub mod error;
pub mod events;
pub mod frame;
mod listener;
pub mod pins;
mod session;
pub mod transport;

pub use board::{Board, BoardConfig, FirmataBoard};
pub use decoder::Decoder;
pub use device::Device;
pub use encoder::I2cReadMode;
pub use error::{FirmataError, FirmataResult, IndexKind};
pub use events::BoardEvent;
pub use frame::{FirmwareInfo, Frame, I2cReply};
pub use pins::{Pin, PinCapability, PinMode, PinTable};
pub use session::{BoardInfo, ConnectionState};
pub use transport::{MemoryTransport, StreamTransport, Transport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
