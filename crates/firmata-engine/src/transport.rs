// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Byte-stream transport boundary
//!
//! The engine reads from one thread and writes from another, so transports
//! take `&self` and synchronize internally. Opening and configuring the
//! physical port is left to the caller.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

/// Duplex byte stream to a board
///
/// `read` may block, but should return periodically with
/// `ErrorKind::TimedOut` (or `WouldBlock`) so the listener can observe
/// shutdown. `Ok(0)` means end of stream.
pub trait Transport: Send + Sync {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `data`
    fn write(&self, data: &[u8]) -> io::Result<()>;

    /// Release the stream. Pending and later reads return `Ok(0)`.
    fn close(&self) -> io::Result<()>;
}

/// Errors a listener treats as "no data yet"
pub fn is_retryable(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&self, data: &[u8]) -> io::Result<()> {
        (**self).write(data)
    }

    fn close(&self) -> io::Result<()> {
        (**self).close()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&self, data: &[u8]) -> io::Result<()> {
        (**self).write(data)
    }

    fn close(&self) -> io::Result<()> {
        (**self).close()
    }
}

/// Transport over separate reader and writer halves
///
/// Fits anything that splits into `Read` and `Write` handles, such as a
/// cloned serial port or a `TcpStream` to a network bridge. The reader
/// should have a read timeout configured.
pub struct StreamTransport<R, W> {
    reader: Mutex<R>,
    writer: Mutex<W>,
    closed: AtomicBool,
}

impl<R, W> StreamTransport<R, W>
where
    R: Read + Send,
    W: Write + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }
}

impl<R, W> Transport for StreamTransport<R, W>
where
    R: Read + Send,
    W: Write + Send,
{
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(0);
        }
        self.reader.lock().read(buf)
    }

    fn write(&self, data: &[u8]) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "transport closed"));
        }
        let mut writer = self.writer.lock();
        writer.write_all(data)?;
        writer.flush()
    }

    fn close(&self) -> io::Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.writer.lock().flush()?;
        }
        Ok(())
    }
}

/// Builds the bytes a simulated board sends back for one written frame
pub type Responder = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

enum Inbound {
    Data(Vec<u8>),
    Error(io::ErrorKind),
    Eof,
}

/// In-memory transport for tests and simulations
///
/// Inbound bytes are queued with [`inject`](Self::inject) or produced by a
/// responder that sees every written frame. Everything written is recorded.
pub struct MemoryTransport {
    inbound_tx: Sender<Inbound>,
    inbound_rx: Receiver<Inbound>,
    pending: Mutex<VecDeque<u8>>,
    written: Mutex<Vec<u8>>,
    responder: Option<Responder>,
    closed: AtomicBool,
    fail_writes: AtomicBool,
    poll_interval: Duration,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = channel::unbounded();
        Self {
            inbound_tx,
            inbound_rx,
            pending: Mutex::new(VecDeque::new()),
            written: Mutex::new(Vec::new()),
            responder: None,
            closed: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            poll_interval: Duration::from_millis(10),
        }
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(responder)),
            ..Self::new()
        }
    }

    /// Queue bytes for the reader
    pub fn inject(&self, bytes: &[u8]) {
        if !bytes.is_empty() {
            let _ = self.inbound_tx.send(Inbound::Data(bytes.to_vec()));
        }
    }

    /// Make the next read fail with `kind`
    pub fn inject_error(&self, kind: io::ErrorKind) {
        let _ = self.inbound_tx.send(Inbound::Error(kind));
    }

    /// Make the next read report end of stream
    pub fn inject_eof(&self) {
        let _ = self.inbound_tx.send(Inbound::Eof);
    }

    /// Copy of everything written so far
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    /// Drain the write log
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut *self.written.lock())
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn drain_pending(&self, buf: &mut [u8]) -> usize {
        let mut pending = self.pending.lock();
        let n = buf.len().min(pending.len());
        for (slot, byte) in buf.iter_mut().zip(pending.drain(..n)) {
            *slot = byte;
        }
        n
    }
}

impl Transport for MemoryTransport {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Ok(0);
        }
        let n = self.drain_pending(buf);
        if n > 0 {
            return Ok(n);
        }

        match self.inbound_rx.recv_timeout(self.poll_interval) {
            Ok(Inbound::Data(bytes)) => {
                self.pending.lock().extend(bytes);
                Ok(self.drain_pending(buf))
            }
            Ok(Inbound::Error(kind)) => Err(io::Error::new(kind, "injected read error")),
            Ok(Inbound::Eof) | Err(RecvTimeoutError::Disconnected) => Ok(0),
            Err(RecvTimeoutError::Timeout) => Err(io::ErrorKind::TimedOut.into()),
        }
    }

    fn write(&self, data: &[u8]) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "transport closed"));
        }
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "injected write error"));
        }
        self.written.lock().extend_from_slice(data);

        if let Some(responder) = &self.responder {
            let reply = responder(data);
            self.inject(&reply);
        }
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
