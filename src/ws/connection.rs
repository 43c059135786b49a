//! One WebSocket connection: state, closing handshake and handler dispatch.
//!
//! Everything shared between the reading side and writers lives behind one
//! mutex. Handlers are never called with that mutex held: events are queued
//! under the lock and drained afterwards by whichever thread holds the
//! dispatch lock, so a handler may send or close on the same connection.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::consts::*;
use super::decoding::decode_frame;
use super::encoding::encode_frame;
use super::event::EventKind;
use super::fragment::Fragments;
use super::frame::Frame;
use super::handler::Handler;
use super::message::{ClosingInfo, MessageKind};
use super::opcode::Opcode;
use super::reassemble::{Action, Reassembler};
use super::transport::Transport;
use crate::config::WebSocketConfig;
use crate::error::{Error, Result, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    ClosingLocal,
    ClosingRemote,
    Closed,
}

/// Clients mask what they send, servers do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// What the handshake told us about the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: Uuid,
    pub uri: String,
    pub key: String,
    pub protocols: String,
    pub extensions: String,
    parameters: HashMap<String, String>,
    headers: HashMap<String, String>,
}

impl ConnectionInfo {
    pub fn new(uri: &str) -> Self {
        ConnectionInfo {
            id: Uuid::new_v4(),
            uri: uri.to_string(),
            key: String::new(),
            protocols: String::new(),
            extensions: String::new(),
            parameters: HashMap::new(),
            headers: HashMap::new(),
        }
    }

    /// Collect `name=value` pairs from the query part of `uri`.
    pub fn with_query_parameters(mut self) -> Self {
        let query = match self.uri.split_once('?') {
            Some((_, query)) => query.to_string(),
            None => return self,
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            self.add_parameter(name, value);
        }
        self
    }

    pub fn add_parameter(&mut self, name: &str, value: &str) {
        self.parameters.insert(name.to_lowercase(), value.to_string());
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_lowercase(), value.to_string());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug)]
struct Inner {
    state: ConnectionState,
    // on_close may only fire while this is set
    open: bool,
    reassembler: Reassembler,
    queue: VecDeque<EventKind>,
    closing: Option<ClosingInfo>,
}

pub struct Connection {
    role: Role,
    config: WebSocketConfig,
    info: ConnectionInfo,
    transport: Arc<dyn Transport>,
    handler: Arc<dyn Handler>,
    inner: Mutex<Inner>,
    dispatching: Mutex<()>,
    // held for every outgoing frame, taken before `inner`; keeps the
    // fragments of one message together and orders them before our close
    writing: Mutex<()>,
    alive: AtomicBool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.info.id)
            .field("uri", &self.info.uri)
            .field("role", &self.role)
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    pub fn new(
        role: Role,
        config: WebSocketConfig,
        info: ConnectionInfo,
        transport: Arc<dyn Transport>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        Connection {
            role,
            config,
            info,
            transport,
            handler,
            inner: Mutex::new(Inner {
                state: ConnectionState::Connecting,
                open: false,
                reassembler: Reassembler::new(),
                queue: VecDeque::new(),
                closing: None,
            }),
            dispatching: Mutex::new(()),
            writing: Mutex::new(()),
            alive: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn role(&self) -> Role {
        self.role
    }
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }
    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Status code and reason of the close, once one was sent, received or synthesized.
    pub fn closing_info(&self) -> Option<ClosingInfo> {
        self.lock().closing.clone()
    }

    /// Cleared by `send_ping`, set again by the peer's pong.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// The handshake succeeded. Fires `on_open`; false if the connection was opened before.
    pub fn open(&self) -> bool {
        {
            let mut inner = self.lock();
            if inner.state != ConnectionState::Connecting {
                return false;
            }
            inner.state = ConnectionState::Open;
            inner.open = true;
            inner.queue.push_back(EventKind::Open);
        }
        info!(id = %self.info.id, uri = %self.info.uri, role = ?self.role, "websocket open");
        self.dispatch();
        true
    }

    pub fn send_text(&self, text: &str) -> Result<()> {
        self.send(text.as_bytes(), MessageKind::Text)
    }

    pub fn send_binary(&self, data: &[u8]) -> Result<()> {
        self.send(data, MessageKind::Binary)
    }

    fn writing(&self) -> MutexGuard<'_, ()> {
        self.writing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, payload: &[u8], kind: MessageKind) -> Result<()> {
        let result = {
            let _writing = self.writing();
            Fragments::new(payload, kind, self.config.fragment_size()).try_for_each(
                |(chunk, opcode, fin)| {
                    // no data frame may follow our close
                    if !self.is_open() {
                        return Err(Error::NotOpen);
                    }
                    self.write_frame(chunk, opcode, fin).map_err(Error::from)
                },
            )
        };
        match result {
            Ok(()) => {
                debug!(id = %self.info.id, kind = ?kind, len = payload.len(), "message sent");
                Ok(())
            }
            Err(Error::NotOpen) => Err(Error::NotOpen),
            Err(err) => Err(self.fail_with(err)),
        }
    }

    // control frames are refused once the connection left Open
    fn send_control(&self, payload: &[u8], opcode: Opcode) -> Result<()> {
        let written = {
            let _writing = self.writing();
            if !self.is_open() {
                return Err(Error::NotOpen);
            }
            self.write_frame(payload, opcode, true)
        };
        written.map_err(|err| self.fail_with(err))
    }

    /// Send a keepalive ping. The liveness flag stays false until the pong arrives.
    pub fn send_ping(&self) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotOpen);
        }
        self.alive.store(false, Ordering::SeqCst);
        self.send_control(PING_PAYLOAD, Opcode::Ping)
    }

    /// Start (or finish) the closing handshake from our side.
    pub fn close(&self, code: u16, reason: &str) -> Result<()> {
        let info = ClosingInfo::new(code, reason);
        let (previous, sent) = {
            let _writing = self.writing();
            let previous = {
                let mut inner = self.lock();
                let previous = inner.state;
                match previous {
                    ConnectionState::Open => {
                        inner.state = ConnectionState::ClosingLocal;
                        inner.closing = Some(info.clone());
                    }
                    // the peer's close was already answered, or we never opened
                    ConnectionState::ClosingRemote | ConnectionState::Connecting => {
                        inner.state = ConnectionState::Closed;
                        inner.open = false;
                    }
                    ConnectionState::ClosingLocal | ConnectionState::Closed => {}
                }
                previous
            };
            let sent = match previous {
                ConnectionState::Open => {
                    info!(id = %self.info.id, code = info.code, reason = %info.reason, "sending close");
                    self.write_frame(&info.encode(), Opcode::Close, true)
                }
                _ => Ok(()),
            };
            (previous, sent)
        };

        match previous {
            ConnectionState::Open => {
                sent.map_err(|err| self.fail_with(err))?;
                self.transport.closing(self.config.closing_timeout());
            }
            ConnectionState::ClosingRemote | ConnectionState::Connecting => {
                debug!(id = %self.info.id, from = ?previous, "closed without close frame");
                self.transport.close();
            }
            ConnectionState::ClosingLocal | ConnectionState::Closed => {}
        }
        Ok(())
    }

    /// Feed one decoded frame, in arrival order.
    ///
    /// A protocol violation fails the connection (no close frame is sent) and is returned.
    pub fn receive(&self, frame: Frame) -> Result<()> {
        debug!(
            id = %self.info.id,
            opcode = ?frame.opcode,
            fin = frame.fin(),
            len = frame.payload.len(),
            "frame received"
        );
        let pushed = {
            let mut inner = self.lock();
            match inner.state {
                ConnectionState::Connecting | ConnectionState::Closed => {
                    debug!(id = %self.info.id, state = ?inner.state, "frame ignored");
                    return Ok(());
                }
                _ => inner.reassembler.push(frame),
            }
        };
        let action = pushed.map_err(|err| self.fail_with(err))?;

        match action {
            Action::Dispatch(message) => {
                let event = match message.kind {
                    MessageKind::Text => EventKind::Message(message),
                    MessageKind::Binary => EventKind::Binary(message),
                };
                self.lock().queue.push_back(event);
                self.dispatch();
            }
            Action::Pending => {}
            Action::Pong(payload) => match self.send_control(&payload, Opcode::Pong) {
                Ok(()) | Err(Error::NotOpen) => {}
                Err(err) => return Err(err),
            },
            Action::Alive => self.alive.store(true, Ordering::SeqCst),
            Action::Close(info) => self.receive_close(info),
        }
        Ok(())
    }

    /// Decode raw bytes holding exactly one frame and feed it.
    pub fn receive_bytes(&self, bytes: &[u8]) -> Result<()> {
        let frame = decode_frame(bytes).map_err(|err| self.fail_with(err))?;
        self.receive(frame)
    }

    // The reply goes out before on_close runs, so a handler closing from
    // on_close finds the connection Closed and adds no second frame.
    fn receive_close(&self, info: ClosingInfo) {
        {
            let _writing = self.writing();
            let previous = {
                let mut inner = self.lock();
                let previous = inner.state;
                match previous {
                    ConnectionState::Open => inner.state = ConnectionState::ClosingRemote,
                    ConnectionState::ClosingLocal => inner.state = ConnectionState::Closed,
                    _ => return,
                }
                inner.closing = Some(info.clone());
                if inner.open {
                    inner.open = false;
                    inner.queue.push_back(EventKind::Close(info.clone()));
                }
                previous
            };
            info!(
                id = %self.info.id,
                code = info.code,
                reason = %info.reason,
                meaning = info.description(),
                "close received"
            );

            if previous == ConnectionState::Open {
                let answer = ClosingInfo::new(reply_code(info.code), "");
                if let Err(err) = self.write_frame(&answer.encode(), Opcode::Close, true) {
                    warn!(id = %self.info.id, error = %err, "close reply not sent");
                }
                self.lock().state = ConnectionState::Closed;
            }
        }
        self.dispatch();
        self.transport.close();
    }

    /// The peer did not answer our close in time.
    pub fn expire_close(&self) -> bool {
        {
            let mut inner = self.lock();
            if inner.state != ConnectionState::ClosingLocal {
                return false;
            }
            inner.state = ConnectionState::Closed;
            if inner.open {
                inner.open = false;
                let info = inner
                    .closing
                    .clone()
                    .unwrap_or_else(|| ClosingInfo::new(CLOSE_NORMAL, ""));
                inner.queue.push_back(EventKind::Close(info));
            }
        }
        warn!(id = %self.info.id, "closing handshake timed out");
        self.dispatch();
        self.transport.close();
        true
    }

    /// Transport or protocol failure: `on_error`, then `on_close`, then teardown.
    pub fn fail(&self, error: &Error) {
        let message = error.to_string();
        {
            let mut inner = self.lock();
            if inner.state == ConnectionState::Closed {
                return;
            }
            inner.state = ConnectionState::Closed;
            let info = ClosingInfo::new(CLOSE_ABNORMAL, &message);
            inner.closing = Some(info.clone());
            inner.queue.push_back(EventKind::Error(message.clone()));
            if inner.open {
                inner.open = false;
                inner.queue.push_back(EventKind::Close(info));
            }
        }
        warn!(id = %self.info.id, error = %message, "websocket failed");
        self.dispatch();
        self.transport.close();
    }

    fn fail_with(&self, err: impl Into<Error>) -> Error {
        let err = err.into();
        self.fail(&err);
        err
    }

    fn write_frame(
        &self,
        payload: &[u8],
        opcode: Opcode,
        fin: bool,
    ) -> std::result::Result<(), TransportError> {
        let mask = match self.role {
            Role::Client => Some(rand::rng().random::<[u8; 4]>()),
            Role::Server => None,
        };
        let frame = encode_frame(payload, opcode, fin, mask);
        self.transport.write(frame, opcode, fin)
    }

    fn dispatch(&self) {
        loop {
            let guard = match self.dispatching.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                // the current holder drains what we queued
                Err(TryLockError::WouldBlock) => return,
            };
            loop {
                let next = self.lock().queue.pop_front();
                match next {
                    Some(event) => self.deliver(event),
                    None => break,
                }
            }
            drop(guard);
            if self.lock().queue.is_empty() {
                return;
            }
        }
    }

    fn deliver(&self, event: EventKind) {
        let handler = &self.handler;
        match event {
            EventKind::Open => handler.on_open(self),
            EventKind::Message(message) => {
                debug!(id = %self.info.id, len = message.payload.len(), "OnMessage");
                handler.on_message(self, message)
            }
            EventKind::Binary(message) => {
                debug!(id = %self.info.id, len = message.payload.len(), last = message.last, "OnBinary");
                handler.on_binary(self, message)
            }
            EventKind::Error(error) => handler.on_error(self, &error),
            EventKind::Close(info) => handler.on_close(self, &info),
        }
    }
}

// 1005, 1006 and 1015 must never appear on the wire
fn reply_code(code: u16) -> u16 {
    match code {
        CLOSE_NO_STATUS | CLOSE_ABNORMAL | CLOSE_TLS => CLOSE_NORMAL,
        code => code,
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
