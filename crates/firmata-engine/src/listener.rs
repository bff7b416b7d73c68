// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Listener thread
//!
//! Owns the read side of the transport for the lifetime of a connection,
//! decodes frames, applies them to the session and publishes events. It
//! exits on shutdown, end of stream, or a read error; the last two mark the
//! session degraded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, trace};

use crate::decoder::Decoder;
use crate::error::FirmataResult;
use crate::events::BoardEvent;
use crate::frame::Frame;
use crate::session::Session;
use crate::transport::{is_retryable, Transport};

pub(crate) struct Listener {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl Listener {
    pub fn spawn(
        transport: Arc<dyn Transport>,
        session: Arc<Session>,
        decoder: Decoder,
        read_buffer_size: usize,
    ) -> FirmataResult<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("firmata-listener".to_string())
            .spawn(move || {
                run(transport, session, decoder, read_buffer_size, shutdown_clone);
            })?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    /// Ask the loop to exit after its current read
    pub fn request_stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Signal the loop and wait for it to finish
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if let Err(e) = handle.join() {
                error!("[FIRMATA-LISTENER] Join error: {:?}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Acquire)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
    mut decoder: Decoder,
    read_buffer_size: usize,
    shutdown: Arc<AtomicBool>,
) {
    let mut buf = vec![0u8; read_buffer_size.max(1)];
    debug!("[FIRMATA-LISTENER] Started");

    while !shutdown.load(Ordering::Acquire) {
        match transport.read(&mut buf) {
            Ok(0) => {
                if !shutdown.load(Ordering::Acquire) && session.mark_degraded() {
                    info!("[FIRMATA-LISTENER] Transport reached end of stream");
                }
                break;
            }
            Ok(n) => {
                trace!("[FIRMATA-LISTENER] <- {:02X?}", &buf[..n]);
                for frame in decoder.feed(&buf[..n]) {
                    apply_frame(&session, frame);
                }
                session.record_desync(decoder.desync_count());
            }
            Err(e) if is_retryable(&e) => continue,
            Err(e) => {
                if !shutdown.load(Ordering::Acquire) && session.mark_degraded() {
                    error!("[FIRMATA-LISTENER] Transport read failed: {}", e);
                }
                break;
            }
        }
    }

    session.events.publish(BoardEvent::Disconnected);
    debug!("[FIRMATA-LISTENER] Stopped");
}

/// Apply one decoded frame to the session
pub(crate) fn apply_frame(session: &Session, frame: Frame) {
    match frame {
        Frame::DigitalPortReport { port, value } => {
            session.pins.write().apply_digital_report(port, value);
            session
                .events
                .publish(BoardEvent::DigitalPortReport { port, value });
        }
        Frame::AnalogPinReport { channel, value } => {
            match session.pins.write().apply_analog_report(channel, value) {
                Some(pin) => session
                    .events
                    .publish(BoardEvent::AnalogPinReport { pin, value }),
                None => debug!(
                    "[FIRMATA-LISTENER] Analog report for unmapped channel {}",
                    channel
                ),
            }
        }
        Frame::ProtocolVersion { major, minor } => {
            debug!("[FIRMATA-LISTENER] Protocol version {}.{}", major, minor);
            session.info.write().protocol_version = Some((major, minor));
            session
                .events
                .publish(BoardEvent::ProtocolVersion { major, minor });
        }
        Frame::CapabilityReply(capabilities) => {
            let pin_count = capabilities.len();
            session.pins.write().apply_capabilities(capabilities);
            if session.mark_ready() {
                info!(
                    "[FIRMATA-LISTENER] Capability handshake complete ({} pins)",
                    pin_count
                );
                session.events.publish(BoardEvent::Ready);
            }
        }
        Frame::AnalogMappingReply(mapping) => {
            session.pins.write().apply_analog_mapping(&mapping);
        }
        Frame::PinStateReply { pin, mode, value } => {
            if session.pins.write().apply_pin_state(pin, mode, value) {
                session
                    .events
                    .publish(BoardEvent::PinState { pin, mode, value });
            } else {
                debug!("[FIRMATA-LISTENER] Pin state for unknown pin {}", pin);
            }
        }
        Frame::I2cReply(reply) => {
            session.events.publish(BoardEvent::I2cReply(reply));
        }
        Frame::FirmwareReport(firmware) => {
            info!(
                "[FIRMATA-LISTENER] Firmware {} {}.{}",
                firmware.name, firmware.major, firmware.minor
            );
            session.info.write().firmware = Some(firmware.clone());
            session.events.publish(BoardEvent::Firmware(firmware));
        }
        Frame::StringData(text) => {
            debug!("[FIRMATA-LISTENER] Board says: {}", text);
            session.events.publish(BoardEvent::StringData(text));
        }
        Frame::SysexEnd => {}
        Frame::UnknownSysex { command, payload } => {
            debug!(
                "[FIRMATA-LISTENER] Ignoring sysex 0x{:02X} ({} bytes)",
                command,
                payload.len()
            );
        }
    }
}
