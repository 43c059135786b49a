//! Blocking socket transport: synchronous writes from the caller's thread and
//! one dedicated listener thread doing blocking reads.

use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::Transport;
use crate::error::TransportError;
use crate::ws::connection::{Connection, ConnectionState};
use crate::ws::opcode::Opcode;
use crate::ws::read::read_frame_blocking;

/// Set once the transport is torn down; wakes a waiting closing timer.
#[derive(Debug, Default)]
struct CloseSignal {
    closed: Mutex<bool>,
    wake: Condvar,
}

impl CloseSignal {
    fn is_set(&self) -> bool {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // true for the first caller only
    fn set(&self) -> bool {
        let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        let first = !*closed;
        *closed = true;
        self.wake.notify_all();
        first
    }

    /// Wait up to `timeout`; true if the transport was closed meanwhile.
    fn wait(&self, timeout: Duration) -> bool {
        let closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        let (closed, _) = self
            .wake
            .wait_timeout_while(closed, timeout, |closed| !*closed)
            .unwrap_or_else(PoisonError::into_inner);
        *closed
    }
}

#[derive(Debug)]
pub struct BlockingTransport {
    stream: Mutex<TcpStream>,
    signal: Arc<CloseSignal>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl BlockingTransport {
    /// Wrap a connected socket. The second value is the reading side for [`spawn_listener`].
    pub fn new(stream: TcpStream) -> io::Result<(Self, TcpStream)> {
        let reader = stream.try_clone()?;
        let transport = BlockingTransport {
            stream: Mutex::new(stream),
            signal: Arc::new(CloseSignal::default()),
            timer: Mutex::new(None),
        };
        Ok((transport, reader))
    }

    pub fn is_closed(&self) -> bool {
        self.signal.is_set()
    }

    /// Whether a closing timer thread is still waiting.
    pub fn is_timer_running(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(false, |timer| !timer.is_finished())
    }
}

impl Transport for BlockingTransport {
    fn write(&self, frame: Vec<u8>, opcode: Opcode, fin: bool) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        stream.write_all(&frame)?;
        stream.flush()?;
        debug!(opcode = ?opcode, fin, len = frame.len(), "frame written");
        Ok(())
    }

    fn closing(&self, timeout: Duration) {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.is_some() {
            return;
        }
        let stream = {
            let stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
            stream.try_clone()
        };
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "cannot arm closing timer");
                return;
            }
        };
        let signal = self.signal.clone();
        let spawned = thread::Builder::new()
            .name("ws-closing".to_string())
            .spawn(move || {
                if signal.wait(timeout) {
                    return;
                }
                // unblocks the listener, which then expires the close
                if signal.set() {
                    let _ = stream.shutdown(Shutdown::Both);
                }
            });
        match spawned {
            Ok(handle) => *timer = Some(handle),
            Err(err) => warn!(error = %err, "cannot start closing timer"),
        }
    }

    fn close(&self) {
        if !self.signal.set() {
            return;
        }
        {
            let stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(err) = stream.shutdown(Shutdown::Both) {
                if err.kind() != io::ErrorKind::NotConnected {
                    warn!(error = %err, "socket shutdown failed");
                }
            }
        }
        // woken above, the timer exits right away
        let timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(timer) = timer {
            if timer.join().is_err() {
                warn!("closing timer panicked");
            }
        }
        debug!("blocking transport closed");
    }
}

/// The running listener thread.
#[derive(Debug)]
pub struct ListenerHandle {
    thread: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the listener to leave its read loop.
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}

/// Start the reading loop for `connection` on its own thread.
pub fn spawn_listener(connection: Arc<Connection>, reader: TcpStream) -> io::Result<ListenerHandle> {
    let name = format!("ws-listener-{}", connection.info().id);
    let thread = thread::Builder::new()
        .name(name)
        .spawn(move || listen(&connection, reader))?;
    Ok(ListenerHandle { thread })
}

fn listen(connection: &Connection, mut reader: TcpStream) {
    let max_payload = connection.config().max_payload();
    loop {
        if connection.state() == ConnectionState::Closed {
            break;
        }
        match read_frame_blocking(&mut reader, max_payload) {
            Ok(frame) => {
                if let Err(err) = connection.receive(frame) {
                    debug!(id = %connection.info().id, error = %err, "receive failed");
                }
            }
            Err(err) => {
                match connection.state() {
                    ConnectionState::Closed => {}
                    ConnectionState::ClosingLocal => {
                        connection.expire_close();
                    }
                    _ => {
                        warn!(id = %connection.info().id, error = %err, protocol = err.is_protocol(), "read failed");
                        connection.fail(&err);
                    }
                }
                break;
            }
        }
    }
    debug!(id = %connection.info().id, "listener stopped");
}

#[cfg(test)]
#[path = "blocking_test.rs"]
mod tests;
