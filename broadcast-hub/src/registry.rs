use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{Mutex, Notify},
};
use tracing::{debug, warn};

use crate::message::write_message;

/// Identity of one connection within a hub. Never reused by the same registry.
pub type ConnectionId = u64;

/// What the registry hands back to the owner of a freshly registered sink.
#[derive(Debug)]
pub struct Registration {
    pub id: ConnectionId,
    /// Fired once if the registry evicts the sink after a failed write.
    pub evicted: Arc<Notify>,
}

/// Outcome of one broadcast call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub evicted: Vec<ConnectionId>,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.evicted.len()
    }
}

struct ClientSink<W> {
    writer: W,
    evicted: Arc<Notify>,
}

impl<W> ClientSink<W>
where
    W: AsyncWrite + Unpin,
{
    async fn release(mut self, id: ConnectionId) {
        if let Err(error) = self.writer.shutdown().await {
            debug!(connection = id, %error, "ignoring error while closing client sink");
        }
    }
}

/// Set of write sinks for the live connections of one hub.
///
/// A single lock guards membership changes and every broadcast, and it stays
/// held for all the writes of one broadcast. Two broadcasts on the same
/// registry therefore reach every recipient in the same order.
pub struct ClientRegistry<W> {
    clients: Mutex<HashMap<ConnectionId, ClientSink<W>>>,
    next_id: AtomicU64,
}

impl<W> ClientRegistry<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn register(&self, writer: W) -> Registration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let evicted = Arc::new(Notify::new());
        let sink = ClientSink {
            writer,
            evicted: Arc::clone(&evicted),
        };

        self.clients.lock().await.insert(id, sink);
        Registration { id, evicted }
    }

    /// Drops the sink registered under `id` and closes its write side.
    ///
    /// Returns `false` when `id` was not registered, which happens when a
    /// broadcast already evicted it.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.clients.lock().await.remove(&id);
        match removed {
            Some(sink) => {
                sink.release(id).await;
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Writes `message` to every registered sink except `exclude`.
    ///
    /// A failed write evicts that sink before the lock is released and wakes
    /// its read loop; the remaining recipients are still served.
    pub async fn broadcast(&self, message: &str, exclude: Option<ConnectionId>) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut clients = self.clients.lock().await;

        for (&id, sink) in clients.iter_mut() {
            if Some(id) == exclude {
                continue;
            }
            match write_message(&mut sink.writer, message).await {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    warn!(connection = id, %error, "evicting client after failed write");
                    report.evicted.push(id);
                }
            }
        }

        let evicted: Vec<_> = report
            .evicted
            .iter()
            .filter_map(|id| clients.remove(id).map(|sink| (*id, sink)))
            .collect();
        drop(clients);

        for (id, sink) in evicted {
            sink.evicted.notify_one();
            sink.release(id).await;
        }

        report
    }
}

#[cfg(test)]
impl<W> ClientRegistry<W> {
    pub(crate) async fn contains(&self, id: ConnectionId) -> bool {
        self.clients.lock().await.contains_key(&id)
    }

    pub(crate) async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}

impl<W> Default for ClientRegistry<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn default() -> Self {
        Self::new()
    }
}
