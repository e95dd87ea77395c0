//! Per-client connection: outbound queue, close signal and the read loop.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};

use crate::directory::ServerDirectory;
use crate::protocol::{ClientId, ServerMessage};
use crate::transport::{self, LineSink, LineSource};

enum Outbound {
    Message(ServerMessage),
    Close,
}

/// Cloneable handle used by the lobby and sessions to reach one client.
///
/// Sending never blocks: messages go to an unbounded queue drained by the
/// connection's writer task, so a slow client cannot stall a lock holder.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ClientId,
    outbox: mpsc::UnboundedSender<Outbound>,
    closed: Arc<watch::Sender<bool>>,
}

/// Receiving end of a [`ConnectionHandle`]'s queue.
pub struct Outbox {
    rx: mpsc::UnboundedReceiver<Outbound>,
}

impl ConnectionHandle {
    pub fn new(id: ClientId) -> (Self, Outbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        (
            Self {
                id,
                outbox: tx,
                closed: Arc::new(closed),
            },
            Outbox { rx },
        )
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Queue a message. Returns `false` if the client is already gone.
    pub fn send(&self, msg: ServerMessage) -> bool {
        if self.is_closed() {
            debug!("dropping {} for closed client {}", msg.kind(), self.id);
            return false;
        }
        match self.outbox.send(Outbound::Message(msg)) {
            Ok(()) => true,
            Err(_) => {
                warn!("client {} outbound queue is closed", self.id);
                false
            }
        }
    }

    /// Ask the connection to shut down after flushing what is already queued.
    pub fn close(&self) {
        if !self.closed.send_replace(true) {
            let _ = self.outbox.send(Outbound::Close);
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn close_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Outbox {
    /// Next queued message; `None` after a close request or once every
    /// handle is dropped.
    pub async fn next(&mut self) -> Option<ServerMessage> {
        match self.rx.recv().await? {
            Outbound::Message(msg) => Some(msg),
            Outbound::Close => None,
        }
    }

    /// Everything queued right now, up to a close request.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            match item {
                Outbound::Message(msg) => out.push(msg),
                Outbound::Close => break,
            }
        }
        out
    }
}

async fn write_loop<S: LineSink>(mut outbox: Outbox, mut sink: S, handle: ConnectionHandle) {
    while let Some(msg) = outbox.next().await {
        let line = msg.to_line();
        debug!("-> {}: {}", handle.id(), line);
        if let Err(e) = sink.send_line(&line).await {
            warn!("client {}: {}", handle.id(), e);
            break;
        }
    }
    let _ = sink.shutdown().await;
    // Wake the reader if the write side failed first.
    handle.close();
}

async fn next_line<R: LineSource>(
    reader: &mut R,
    idle_timeout: Option<Duration>,
) -> anyhow::Result<Option<String>> {
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, reader.recv_line())
            .await
            .map_err(|_| anyhow::anyhow!("Connection idle timeout exceeded ({:?})", limit))?,
        None => reader.recv_line().await,
    }
}

/// Drive one client connection until it closes.
///
/// Registers the client with the directory (which sends `CLIENT_ID` and the
/// roster), feeds every received line to it, and runs the disconnect cleanup
/// exactly once on the way out, however the loop ended.
pub async fn serve_connection<S>(directory: Arc<ServerDirectory>, stream: S) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let config = directory.config();
    let idle_timeout = config.idle_timeout();
    let (mut reader, writer) = transport::split(stream, config.max_line_length);

    let id = directory.allocate_client_id();
    let (handle, outbox) = ConnectionHandle::new(id);
    let writer_task = tokio::spawn(write_loop(outbox, writer, handle.clone()));
    let mut closed = handle.close_signal();
    directory.connect(handle.clone()).await;

    loop {
        let next = tokio::select! {
            _ = closed.wait_for(|closed| *closed) => {
                debug!("client {} closed by server", id);
                break;
            }
            next = next_line(&mut reader, idle_timeout) => next,
        };
        match next {
            Ok(Some(line)) => {
                debug!("<- {}: {}", id, line);
                directory.dispatch(id, &line).await;
            }
            Ok(None) => {
                info!("client {} disconnected", id);
                break;
            }
            Err(e) => {
                warn!("client {}: {}", id, e);
                break;
            }
        }
    }

    directory.disconnect(id).await;
    handle.close();
    let _ = writer_task.await;
    Ok(())
}
