// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Asynchronous board notifications
//!
//! Every subscriber gets its own bounded channel. The listener never blocks
//! on a slow subscriber: when a channel is full the event is dropped for that
//! subscriber only.

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::frame::{FirmwareInfo, I2cReply};
use crate::pins::PinMode;

/// Default per-subscriber queue length
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Notification published by the listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// Capability handshake finished; commands are accepted
    Ready,
    ProtocolVersion { major: u8, minor: u8 },
    Firmware(FirmwareInfo),
    DigitalPortReport { port: u8, value: u8 },
    /// Analog sample, already mapped from channel to pin
    AnalogPinReport { pin: u8, value: u16 },
    PinState { pin: u8, mode: PinMode, value: u32 },
    I2cReply(I2cReply),
    StringData(String),
    /// The listener stopped
    Disconnected,
}

#[derive(Debug)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<BoardEvent>>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> Receiver<BoardEvent> {
        let (tx, rx) = bounded(self.capacity);
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Deliver to every live subscriber, pruning dropped receivers
    pub fn publish(&self, event: BoardEvent) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }
        trace!("[FIRMATA-EVENTS] Publishing {:?}", event);
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("[FIRMATA-EVENTS] Subscriber queue full, dropping {:?}", event);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}
