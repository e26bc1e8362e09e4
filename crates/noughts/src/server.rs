//! `NoughtsServer` builder and server loop.
//!
//! This is the entry point for running a Noughts server. It ties the
//! layers together: transport → protocol → matchmaking / rooms → store.

use std::sync::Arc;
use std::time::Duration;

use noughts_protocol::{Codec, JsonCodec};
use noughts_room::{MatchmakingQueue, RoomConfig, RoomRegistry};
use noughts_session::ConnectionMapper;
use noughts_store::GameStore;
use noughts_transport::{
    PendingConnection, PendingWebSocket, Transport, TransportError, WebSocketConnection,
    WebSocketTransport,
};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{NoughtsError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// The queue and mapper are plain structs behind a `Mutex`; the registry
/// synchronizes itself.
pub(crate) struct ServerState<S: GameStore, C: Codec> {
    pub(crate) queue: Mutex<MatchmakingQueue>,
    pub(crate) registry: RoomRegistry<S>,
    pub(crate) mapper: Mutex<ConnectionMapper>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Noughts server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use noughts::prelude::*;
///
/// # async fn run() -> Result<(), NoughtsError> {
/// let server = NoughtsServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(Arc::new(MemoryStore::new()))
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct NoughtsServerBuilder {
    config: ServerConfig,
}

impl NoughtsServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Starts from an existing configuration, e.g. [`ServerConfig::from_env`].
    pub fn with_config(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a new peer may take over the WebSocket upgrade.
    pub fn handshake_timeout(mut self, limit: Duration) -> Self {
        self.config.handshake_timeout = limit;
        self
    }

    /// Sets eviction grace, persistence timeout and channel size.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    /// Binds the listener and builds the server around `store`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<S: GameStore>(
        self,
        store: Arc<S>,
    ) -> Result<NoughtsServer<S, JsonCodec>, NoughtsError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let state = Arc::new(ServerState {
            queue: Mutex::new(MatchmakingQueue::new()),
            registry: RoomRegistry::new(store, self.config.room),
            mapper: Mutex::new(ConnectionMapper::new()),
            codec: JsonCodec,
        });

        Ok(NoughtsServer {
            transport,
            handshake_timeout: self.config.handshake_timeout,
            state,
        })
    }
}

impl Default for NoughtsServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Noughts server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct NoughtsServer<S: GameStore, C: Codec> {
    transport: WebSocketTransport,
    handshake_timeout: Duration,
    state: Arc<ServerState<S, C>>,
}

impl NoughtsServer<noughts_store::MemoryStore, JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> NoughtsServerBuilder {
        NoughtsServerBuilder::new()
    }
}

impl<S, C> NoughtsServer<S, C>
where
    S: GameStore,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The room registry, for inspection.
    pub fn registry(&self) -> &RoomRegistry<S> {
        &self.state.registry
    }

    /// Runs the server accept loop.
    ///
    /// The loop only takes TCP connections off the listener. Each peer's
    /// WebSocket upgrade and everything after it run in that peer's own
    /// task, so a client that stalls mid-handshake delays no one else.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), NoughtsError> {
        tracing::info!(addr = ?self.local_addr().ok(), "noughts server running");

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    let limit = self.handshake_timeout;
                    tokio::spawn(async move {
                        let conn = match upgrade(pending, limit).await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::debug!(error = %e, "rejected client during handshake");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Completes a peer's WebSocket upgrade, giving up after `limit`.
async fn upgrade(
    pending: PendingWebSocket,
    limit: Duration,
) -> Result<WebSocketConnection, TransportError> {
    let peer = pending.peer_addr();
    match tokio::time::timeout(limit, pending.upgrade()).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Handshake {
            peer: peer.to_string(),
            reason: format!("no upgrade within {limit:?}"),
        }),
    }
}
