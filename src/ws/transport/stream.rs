//! Async transport over any tokio stream, e.g. a hyper `Upgraded` connection.
//!
//! Writes are queued on an unbounded channel and completed by a writer task;
//! a reader task decodes frames and feeds the connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Transport;
use crate::error::TransportError;
use crate::ws::connection::{Connection, ConnectionState};
use crate::ws::opcode::Opcode;
use crate::ws::read::read_frame;

#[derive(Debug)]
enum Outbound {
    Frame(Vec<u8>, Opcode, bool),
    Shutdown,
}

#[derive(Debug)]
pub struct StreamTransport {
    outbound: UnboundedSender<Outbound>,
    shutdown: Arc<Notify>,
    closed: AtomicBool,
    runtime: Handle,
}

/// The halves of the stream, waiting for their connection.
#[derive(Debug)]
pub struct StreamTasks<S> {
    reader: ReadHalf<S>,
    writer: WriteHalf<S>,
    outbound: UnboundedReceiver<Outbound>,
    shutdown: Arc<Notify>,
}

/// Split `io` into a transport for the connection and the tasks that drive it.
/// Must be called from within a tokio runtime.
pub fn split<S>(io: S) -> Result<(StreamTransport, StreamTasks<S>), TransportError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let runtime = Handle::try_current()
        .map_err(|err| TransportError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))?;
    let (reader, writer) = tokio::io::split(io);
    let (sender, receiver) = unbounded_channel();
    let shutdown = Arc::new(Notify::new());
    let transport = StreamTransport {
        outbound: sender,
        shutdown: shutdown.clone(),
        closed: AtomicBool::new(false),
        runtime,
    };
    let tasks = StreamTasks {
        reader,
        writer,
        outbound: receiver,
        shutdown,
    };
    Ok((transport, tasks))
}

impl Transport for StreamTransport {
    fn write(&self, frame: Vec<u8>, opcode: Opcode, fin: bool) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(Outbound::Frame(frame, opcode, fin))
            .map_err(|_| TransportError::Closed)
    }

    fn closing(&self, timeout: Duration) {
        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            shutdown.notify_one();
        });
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // the writer may already be gone
        let _ = self.outbound.send(Outbound::Shutdown);
        self.shutdown.notify_one();
        debug!("stream transport closed");
    }
}

impl<S> StreamTasks<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Run reader and writer until the connection is closed.
    pub fn spawn(self, connection: Arc<Connection>) -> JoinHandle<()> {
        let StreamTasks {
            reader,
            writer,
            outbound,
            shutdown,
        } = self;
        let read_future = read_messages(reader, connection.clone(), shutdown);
        let write_future = write_messages(writer, outbound, connection);
        tokio::spawn(async move {
            join(read_future, write_future).await;
        })
    }
}

async fn write_messages<S>(
    mut writer: WriteHalf<S>,
    mut outbound: UnboundedReceiver<Outbound>,
    connection: Arc<Connection>,
) where
    S: AsyncWrite,
{
    while let Some(command) = outbound.recv().await {
        match command {
            Outbound::Frame(buffer, opcode, fin) => {
                let written = async {
                    writer.write_all(&buffer).await?;
                    writer.flush().await
                };
                if let Err(err) = written.await {
                    connection.fail(&TransportError::Io(err).into());
                    break;
                }
                debug!(opcode = ?opcode, fin, len = buffer.len(), "frame written");
            }
            Outbound::Shutdown => {
                if let Err(err) = writer.shutdown().await {
                    debug!(error = %err, "stream shutdown failed");
                }
                break;
            }
        }
    }

    debug!(id = %connection.info().id, "stopping writing messages");
}

async fn read_messages<S>(mut reader: ReadHalf<S>, connection: Arc<Connection>, shutdown: Arc<Notify>)
where
    S: AsyncRead,
{
    let max_payload = connection.config().max_payload();
    loop {
        if connection.state() == ConnectionState::Closed {
            break;
        }
        let result = tokio::select! {
            result = read_frame(&mut reader, max_payload) => result,
            _ = shutdown.notified() => {
                // closing timer or teardown
                if connection.state() == ConnectionState::ClosingLocal {
                    connection.expire_close();
                }
                break;
            }
        };
        match result {
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

    debug!(id = %connection.info().id, "stopping reading messages");
}
