//! One accepted peer and the task that drains it.
//!
//! A connection moves through `Connecting → Active → Closing → Closed`. It is
//! `Active` once its sink is in the registry and [`read_loop`] is running.
//! The loop ends (`Closing`) on end-of-stream, a read error, or eviction by a
//! broadcast whose write to this peer failed. It then removes its own sink and
//! drops the read side (`Closed`).

use std::{fmt, io, sync::Arc};

use tokio::{
    io::{AsyncBufRead, AsyncWrite},
    select,
    sync::Notify,
};
use tracing::{debug, info};

use crate::{
    message::read_message,
    registry::{ClientRegistry, ConnectionId, Registration},
    subscriber::SubscriberSlot,
};

/// Read side of an accepted peer, tied to the sink registered for it.
pub struct ClientConnection<R> {
    id: ConnectionId,
    reader: R,
    evicted: Arc<Notify>,
}

impl<R> ClientConnection<R> {
    pub fn new(registration: Registration, reader: R) -> Self {
        Self {
            id: registration.id,
            reader,
            evicted: registration.evicted,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<R> fmt::Debug for ClientConnection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Why a read loop stopped.
#[derive(Debug)]
pub enum ReadLoopExit {
    EndOfStream,
    ReadFailed(io::Error),
    Evicted,
}

/// Relays every line from `connection` until it closes, then unregisters it.
///
/// Each line goes to the subscriber first and is then broadcast to every
/// other registered client. A panicking subscriber unwinds through here
/// without unregistering; the hub runs this loop in its own task and removes
/// the connection when that task fails.
pub async fn read_loop<R, W>(
    connection: ClientConnection<R>,
    registry: Arc<ClientRegistry<W>>,
    subscriber: Arc<SubscriberSlot>,
) -> ReadLoopExit
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let ClientConnection {
        id,
        mut reader,
        evicted,
        ..
    } = connection;

    let exit = loop {
        select! {
            biased;
            _ = evicted.notified() => break ReadLoopExit::Evicted,
            message = read_message(&mut reader) => match message {
                Ok(Some(line)) => {
                    info!(connection = id, %line, "line received");
                    subscriber.notify(&line);
                    let report = registry.broadcast(&line, Some(id)).await;
                    debug!(
                        connection = id,
                        delivered = report.delivered,
                        evicted = report.evicted.len(),
                        "line relayed"
                    );
                }
                Ok(None) => break ReadLoopExit::EndOfStream,
                Err(error) => break ReadLoopExit::ReadFailed(error),
            },
        }
    };

    registry.remove(id).await;
    drop(reader);
    exit
}
