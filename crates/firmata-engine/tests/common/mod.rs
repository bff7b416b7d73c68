// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Simulated Uno-class board for integration tests
//!
//! Answers the handshake queries and tracks what the host writes. Input
//! reports are pushed by the test through the returned transport.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use firmata_engine::codec::{encode_14bit, encode_multibyte_string};
use firmata_engine::{BoardEvent, MemoryTransport};
use parking_lot::Mutex;

pub const PIN_COUNT: u8 = 20;
pub const PWM_PINS: [u8; 6] = [3, 5, 6, 9, 10, 11];
pub const FIRST_ANALOG_PIN: u8 = 14;

#[derive(Default)]
pub struct SimState {
    pub modes: HashMap<u8, u8>,
    pub values: HashMap<u8, u32>,
    pub frames: Vec<Vec<u8>>,
}

pub struct BoardSimulator {
    pub state: Arc<Mutex<SimState>>,
    pub transport: Arc<MemoryTransport>,
}

impl BoardSimulator {
    pub fn uno() -> Self {
        let state = Arc::new(Mutex::new(SimState::default()));
        let responder_state = Arc::clone(&state);
        let transport = Arc::new(MemoryTransport::with_responder(move |frame| {
            respond(&mut responder_state.lock(), frame)
        }));
        Self { state, transport }
    }

    pub fn boxed_transport(&self) -> Box<dyn firmata_engine::Transport> {
        Box::new(Arc::clone(&self.transport))
    }

    pub fn mode_of(&self, pin: u8) -> Option<u8> {
        self.state.lock().modes.get(&pin).copied()
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.state.lock().frames.clone()
    }

    pub fn last_frame(&self) -> Option<Vec<u8>> {
        self.state.lock().frames.last().cloned()
    }

    pub fn frame_count(&self) -> usize {
        self.state.lock().frames.len()
    }
}

pub fn capability_reply() -> Vec<u8> {
    let mut out = vec![0xF0, 0x6C];
    for pin in 0..PIN_COUNT {
        if pin >= 2 {
            out.extend_from_slice(&[0x00, 0x01, 0x01, 0x01, 0x0B, 0x01]);
        }
        if PWM_PINS.contains(&pin) {
            out.extend_from_slice(&[0x03, 0x08]);
        }
        if (2..FIRST_ANALOG_PIN).contains(&pin) {
            out.extend_from_slice(&[0x04, 0x0E]);
        }
        if pin >= FIRST_ANALOG_PIN {
            out.extend_from_slice(&[0x02, 0x0A]);
        }
        if pin == 18 || pin == 19 {
            out.extend_from_slice(&[0x06, 0x01]);
        }
        out.push(0x7F);
    }
    out.push(0xF7);
    out
}

pub fn analog_mapping_reply() -> Vec<u8> {
    let mut out = vec![0xF0, 0x6A];
    out.extend((0..PIN_COUNT).map(|pin| {
        if pin >= FIRST_ANALOG_PIN {
            pin - FIRST_ANALOG_PIN
        } else {
            0x7F
        }
    }));
    out.push(0xF7);
    out
}

pub fn firmware_reply() -> Vec<u8> {
    let mut out = vec![0xF0, 0x79, 0x02, 0x06];
    out.extend(encode_multibyte_string("SimFirmata"));
    out.push(0xF7);
    out
}

fn respond(state: &mut SimState, frame: &[u8]) -> Vec<u8> {
    state.frames.push(frame.to_vec());
    match frame {
        [0xF9] => vec![0xF9, 0x02, 0x06],
        [0xF0, 0x79, 0xF7] => firmware_reply(),
        [0xF0, 0x6B, 0xF7] => capability_reply(),
        [0xF0, 0x69, 0xF7] => analog_mapping_reply(),
        [0xF0, 0x6D, pin, 0xF7] => {
            let mode = state.modes.get(pin).copied().unwrap_or(0x01);
            let value = state.values.get(pin).copied().unwrap_or(0);
            let [low, high] = encode_14bit(value as u16);
            vec![0xF0, 0x6E, *pin, mode, low, high, 0xF7]
        }
        [0xF4, pin, mode] => {
            state.modes.insert(*pin, *mode);
            Vec::new()
        }
        [status, low, high] if *status & 0xF0 == 0xE0 => {
            let pin = status & 0x0F;
            state.values.insert(pin, u32::from(*low) | (u32::from(*high) << 7));
            Vec::new()
        }
        [0xF0, 0x76, address, mode, rest @ ..] if *mode >> 3 == 0x01 => {
            // Read once: answer with 1, 2, 3, ... for the requested length
            let (register, len_bytes) = match rest {
                [r0, r1, l0, l1, 0xF7] => ((*r0, *r1), (*l0, *l1)),
                [l0, l1, 0xF7] => ((0, 0), (*l0, *l1)),
                _ => return Vec::new(),
            };
            let len = u16::from(len_bytes.0) | (u16::from(len_bytes.1) << 7);
            let mut out = vec![0xF0, 0x77, *address, 0x00, register.0, register.1];
            for i in 1..=len {
                out.extend_from_slice(&encode_14bit(i));
            }
            out.push(0xF7);
            out
        }
        _ => Vec::new(),
    }
}

/// Wait for the first event matching `pred`, skipping others
pub fn wait_for<F>(events: &Receiver<BoardEvent>, mut pred: F) -> Option<BoardEvent>
where
    F: FnMut(&BoardEvent) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        match events.recv_timeout(remaining) {
            Ok(event) if pred(&event) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

/// Poll `check` until it holds or two seconds pass
pub fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    check()
}
