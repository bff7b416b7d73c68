// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! State shared between the caller and the listener for one connection

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::events::EventBus;
use crate::frame::FirmwareInfo;
use crate::pins::PinTable;

/// Lifecycle of a board connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingCapabilities,
    Ready,
    /// The listener stopped on a transport failure; reconnect to recover
    Degraded,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::AwaitingCapabilities => "awaiting capabilities",
            ConnectionState::Ready => "ready",
            ConnectionState::Degraded => "degraded",
        };
        f.write_str(name)
    }
}

/// Identity reported by the board
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardInfo {
    pub firmware: Option<FirmwareInfo>,
    pub protocol_version: Option<(u8, u8)>,
}

/// Outcome of waiting for the capability handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadyWait {
    Ready,
    /// `disconnect()` ran while waiting
    Cancelled,
    /// The listener stopped while waiting
    Lost,
    TimedOut,
}

pub(crate) struct Session {
    pub pins: RwLock<PinTable>,
    pub info: RwLock<BoardInfo>,
    pub events: Arc<EventBus>,
    /// Held while a frame is written. Taken after `pins` when both are
    /// needed, so frames leave in the order their table updates were made.
    pub send_lock: Mutex<()>,
    state: Mutex<ConnectionState>,
    state_changed: Condvar,
    desync_count: AtomicU64,
}

impl Session {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            pins: RwLock::new(PinTable::default()),
            info: RwLock::new(BoardInfo::default()),
            events,
            send_lock: Mutex::new(()),
            state: Mutex::new(ConnectionState::Connecting),
            state_changed: Condvar::new(),
            desync_count: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
        self.state_changed.notify_all();
    }

    /// Move from `Connecting` to `AwaitingCapabilities`; false when a
    /// disconnect got there first
    pub fn begin_handshake(&self) -> bool {
        self.transition(ConnectionState::Connecting, ConnectionState::AwaitingCapabilities)
    }

    /// Move from `AwaitingCapabilities` to `Ready`; false in any other state
    pub fn mark_ready(&self) -> bool {
        self.transition(ConnectionState::AwaitingCapabilities, ConnectionState::Ready)
    }

    /// Record a transport failure. A session already being torn down stays
    /// `Disconnected`.
    pub fn mark_degraded(&self) -> bool {
        let mut state = self.state.lock();
        if matches!(*state, ConnectionState::Disconnected | ConnectionState::Degraded) {
            return false;
        }
        *state = ConnectionState::Degraded;
        self.state_changed.notify_all();
        true
    }

    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        let mut state = self.state.lock();
        if *state != from {
            return false;
        }
        *state = to;
        self.state_changed.notify_all();
        true
    }

    /// Block until the handshake completes, fails, or `timeout` elapses
    pub fn wait_until_ready(&self, timeout: Duration) -> ReadyWait {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            match *state {
                ConnectionState::Ready => return ReadyWait::Ready,
                ConnectionState::Disconnected => return ReadyWait::Cancelled,
                ConnectionState::Degraded => return ReadyWait::Lost,
                ConnectionState::Connecting | ConnectionState::AwaitingCapabilities => {}
            }
            if self.state_changed.wait_until(&mut state, deadline).timed_out() {
                return match *state {
                    ConnectionState::Ready => ReadyWait::Ready,
                    ConnectionState::Disconnected => ReadyWait::Cancelled,
                    ConnectionState::Degraded => ReadyWait::Lost,
                    _ => ReadyWait::TimedOut,
                };
            }
        }
    }

    pub fn desync_count(&self) -> u64 {
        self.desync_count.load(Ordering::Relaxed)
    }

    pub fn record_desync(&self, total: u64) {
        self.desync_count.store(total, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn session() -> Arc<Session> {
        Arc::new(Session::new(Arc::new(EventBus::default())))
    }

    #[test]
    fn test_mark_ready_requires_handshake_state() {
        let session = session();
        assert!(!session.mark_ready());
        assert!(session.begin_handshake());
        assert!(!session.begin_handshake());
        assert!(session.mark_ready());
        assert_eq!(session.state(), ConnectionState::Ready);
    }

    #[test]
    fn test_degraded_does_not_override_disconnect() {
        let session = session();
        session.set_state(ConnectionState::Disconnected);
        assert!(!session.mark_degraded());
        assert_eq!(session.state(), ConnectionState::Disconnected);

        session.set_state(ConnectionState::Ready);
        assert!(session.mark_degraded());
        assert!(!session.mark_degraded());
    }

    #[test]
    fn test_wait_times_out() {
        let session = session();
        session.set_state(ConnectionState::AwaitingCapabilities);
        let started = Instant::now();
        assert_eq!(session.wait_until_ready(Duration::from_millis(50)), ReadyWait::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_wakes_on_state_change() {
        let session = session();
        session.set_state(ConnectionState::AwaitingCapabilities);

        let waiter = {
            let session = Arc::clone(&session);
            thread::spawn(move || session.wait_until_ready(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        session.set_state(ConnectionState::Disconnected);
        assert_eq!(waiter.join().unwrap(), ReadyWait::Cancelled);
    }

    #[test]
    fn test_wait_reports_ready_and_lost() {
        let session = session();
        session.set_state(ConnectionState::Ready);
        assert_eq!(session.wait_until_ready(Duration::ZERO), ReadyWait::Ready);
        session.set_state(ConnectionState::Degraded);
        assert_eq!(session.wait_until_ready(Duration::ZERO), ReadyWait::Lost);
    }
}
