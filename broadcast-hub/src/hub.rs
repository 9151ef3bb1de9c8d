use std::{
    net::SocketAddr,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::{
    io::BufReader,
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
    config::HubConfig,
    connection::{ClientConnection, ReadLoopExit, read_loop},
    error::HubError,
    message::normalize,
    registry::{BroadcastReport, ClientRegistry},
    subscriber::SubscriberSlot,
};

type TcpRegistry = ClientRegistry<OwnedWriteHalf>;

/// A TCP endpoint that relays each line from one client to all the others.
///
/// Cloning gives another handle to the same hub, which is how callbacks and
/// the owning process share it.
///
/// Writes are not timed out. A client that stops reading without closing
/// eventually fills its socket buffer, after which every broadcast on the hub,
/// and the acceptance of new clients, waits on that write.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: HubConfig,
    registry: Arc<TcpRegistry>,
    subscriber: Arc<SubscriberSlot>,
    started: AtomicBool,
    local_addr: OnceLock<SocketAddr>,
}

impl BroadcastHub {
    pub fn new(port: u16) -> Self {
        Self::with_config(HubConfig::new("hub", port))
    }

    pub fn with_config(config: HubConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                config,
                registry: Arc::new(ClientRegistry::new()),
                subscriber: Arc::new(SubscriberSlot::new()),
                started: AtomicBool::new(false),
                local_addr: OnceLock::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Address the hub is bound to, once [`start`](Self::start) succeeded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr.get().copied()
    }

    /// Installs the callback that sees every accepted line. Replaces any
    /// previous callback; may be called before or after `start`.
    pub fn set_subscriber<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        if self.inner.subscriber.set(callback) {
            debug!(hub = %self.name(), "subscriber replaced");
        }
    }

    /// Binds the listening socket and spawns the accept loop.
    ///
    /// Returns as soon as the socket is bound. A failed bind leaves the hub
    /// unstarted so the caller may try again.
    pub async fn start(&self) -> Result<SocketAddr, HubError> {
        let name = self.name().to_string();
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(HubError::AlreadyStarted { name });
        }

        let bound = bind(&self.inner.config).await.and_then(|listener| {
            let addr = listener.local_addr().map_err(|source| HubError::LocalAddr {
                name: name.clone(),
                source,
            })?;
            Ok((listener, addr))
        });
        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(err) => {
                self.inner.started.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };
        let _ = self.inner.local_addr.set(local_addr);
        info!(hub = %name, %local_addr, "hub listening");

        let registry = Arc::clone(&self.inner.registry);
        let subscriber = Arc::clone(&self.inner.subscriber);
        tokio::spawn(
            accept_loop(listener, registry, subscriber).instrument(info_span!("hub", name = %name)),
        );

        Ok(local_addr)
    }

    /// Sends `line` to every connected client. Blank lines are dropped.
    pub async fn broadcast(&self, line: &str) -> BroadcastReport {
        match normalize(line) {
            Some(message) => self.inner.registry.broadcast(message, None).await,
            None => BroadcastReport::default(),
        }
    }

    pub async fn client_count(&self) -> usize {
        self.inner.registry.len().await
    }
}

async fn bind(config: &HubConfig) -> Result<TcpListener, HubError> {
    let addr = config.socket_addr();
    TcpListener::bind(addr)
        .await
        .map_err(|source| HubError::Bind {
            name: config.name.clone(),
            addr,
            source,
        })
}

/// Accepts until the listener fails. Connections already accepted keep
/// running after that.
async fn accept_loop(
    listener: TcpListener,
    registry: Arc<TcpRegistry>,
    subscriber: Arc<SubscriberSlot>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => spawn_connection(stream, peer, &registry, &subscriber).await,
            Err(error) => {
                error!(%error, "accept failed, hub no longer accepts connections");
                break;
            }
        }
    }
}

async fn spawn_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: &Arc<TcpRegistry>,
    subscriber: &Arc<SubscriberSlot>,
) {
    let (reader, writer) = stream.into_split();
    let registration = registry.register(writer).await;
    let connection = ClientConnection::new(registration, BufReader::new(reader));
    let id = connection.id();
    info!(connection = id, %peer, "client connected");

    let span = info_span!("connection", id, %peer);
    let reading = tokio::spawn(
        read_loop(connection, Arc::clone(registry), Arc::clone(subscriber))
            .instrument(span.clone()),
    );

    // The read loop unregisters itself on every normal exit. If it unwinds
    // (a panicking subscriber), the sink is removed here instead.
    let registry = Arc::clone(registry);
    tokio::spawn(
        async move {
            match reading.await {
                Ok(ReadLoopExit::EndOfStream) => info!("client disconnected"),
                Ok(ReadLoopExit::ReadFailed(error)) => {
                    info!(%error, "client disconnected after read error")
                }
                Ok(ReadLoopExit::Evicted) => info!("client dropped after failed write"),
                Err(error) => {
                    registry.remove(id).await;
                    warn!(%error, "read loop aborted, client removed");
                }
            }
        }
        .instrument(span),
    );
}
