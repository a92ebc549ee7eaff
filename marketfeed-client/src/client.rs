//! Public client facade
//!
//! `FeedClient` composes the connection loop, heartbeat monitor,
//! subscription registry, and event bus behind the surface the dashboard
//! consumes. The client is explicitly constructed and ownership-scoped:
//! whoever builds it drives `connect()`/`disconnect()`, and every consumer
//! observes it through typed event receivers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use marketfeed_core::{ClientFrame, ConnectionState, FeedError, FeedResult};

use crate::bus::{EventBus, FeedEvent};
use crate::config::FeedConfig;
use crate::connection::{self, Command, Shared};
use crate::heartbeat::HeartbeatMonitor;
use crate::subscriptions::SubscriptionRegistry;
use crate::transport::{Transport, WsTransport};

/// Commands buffered towards the connection loop
const COMMAND_CAPACITY: usize = 64;

/// Reconnecting client for the dashboard's real-time data server
pub struct FeedClient {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    command_tx: RwLock<Option<mpsc::Sender<Command>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FeedClient {
    /// Client over the production WebSocket transport.
    pub fn new(config: FeedConfig) -> Self {
        Self::with_transport(config, Arc::new(WsTransport))
    }

    /// Client over a caller-supplied transport (tests use a mock here).
    pub fn with_transport(config: FeedConfig, transport: Arc<dyn Transport>) -> Self {
        let heartbeat = HeartbeatMonitor::new(config.liveness_threshold);
        Self {
            shared: Arc::new(Shared {
                config,
                state: RwLock::new(ConnectionState::Disconnected),
                subscriptions: SubscriptionRegistry::new(),
                heartbeat,
                bus: EventBus::new(),
            }),
            transport,
            command_tx: RwLock::new(None),
            task: Mutex::new(None),
        }
    }

    /// Establish the connection.
    ///
    /// Resolves once the transport reports open; fails with `Timeout`, a
    /// transport error, or `Cancelled` if `disconnect()` arrives first.
    /// A no-op when a connection is already established or an attempt
    /// (including automatic recovery) is in progress.
    pub async fn connect(&self) -> FeedResult<()> {
        {
            let mut state = self.shared.state.write();
            match *state {
                ConnectionState::Connected
                | ConnectionState::Connecting
                | ConnectionState::Reconnecting => return Ok(()),
                _ => *state = ConnectionState::Connecting,
            }
        }
        self.shared
            .bus
            .publish(FeedEvent::StatusChange(ConnectionState::Connecting));

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();
        *self.command_tx.write() = Some(command_tx);

        let task = tokio::spawn(connection::run(
            Arc::clone(&self.shared),
            Arc::clone(&self.transport),
            command_rx,
            ready_tx,
        ));
        *self.task.lock() = Some(task);

        match ready_rx.await {
            Ok(result) => result,
            Err(_) => Err(FeedError::Cancelled),
        }
    }

    /// Tear the connection down with a normal closure.
    ///
    /// Safe from any state; repeated calls are no-ops. Tracked subscription
    /// intent survives and is replayed by the next `connect()`.
    pub async fn disconnect(&self) {
        let command_tx = self.command_tx.write().take();
        let delivered = match command_tx {
            Some(tx) => tx.send(Command::Disconnect).await.is_ok(),
            None => false,
        };

        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }

        // The loop may already be gone (terminal error); settle locally so
        // `disconnect()` lands in `Disconnected` from any state, without a
        // duplicate event when already there.
        if !delivered && self.status() != ConnectionState::Disconnected {
            self.shared.set_state(ConnectionState::Disconnected);
            self.shared.bus.publish(FeedEvent::Disconnected);
        }
    }

    /// Subscribe to live data for a topic.
    ///
    /// Fails with `NotConnected` unless the connection is established. The
    /// tracked set is updated optimistically; an already-tracked topic
    /// skips the duplicate wire frame.
    pub async fn subscribe(&self, topic: &str) -> FeedResult<()> {
        if self.status() != ConnectionState::Connected {
            return Err(FeedError::NotConnected);
        }
        if !self.shared.subscriptions.track(topic) {
            debug!("[Feed WS] Already subscribed to {}", topic);
            return Ok(());
        }
        self.send(ClientFrame::Subscribe {
            symbol: topic.to_string(),
        })
        .await
    }

    /// Drop a topic from the tracked set.
    ///
    /// Applies in any state so the next replay will not resurrect the
    /// topic; the unsubscribe frame is only sent while connected.
    pub async fn unsubscribe(&self, topic: &str) -> FeedResult<()> {
        let was_tracked = self.shared.subscriptions.untrack(topic);
        if was_tracked && self.status() == ConnectionState::Connected {
            self.send(ClientFrame::Unsubscribe {
                symbol: topic.to_string(),
            })
            .await?;
        }
        Ok(())
    }

    /// Current lifecycle state.
    pub fn status(&self) -> ConnectionState {
        self.shared.status()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionState::Connected
    }

    /// Arrival time of the most recent inbound frame.
    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.shared.heartbeat.last_heartbeat()
    }

    /// Whether inbound traffic has been seen within the liveness threshold.
    pub fn is_healthy(&self) -> bool {
        self.shared.heartbeat.is_healthy()
    }

    /// Connection id reported by the server, once a heartbeat carried one.
    pub fn connection_id(&self) -> Option<String> {
        self.shared.heartbeat.connection_id()
    }

    /// Sorted list of tracked topics.
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.shared.subscriptions.topics()
    }

    /// Receiver for every event the client publishes.
    pub fn events(&self) -> broadcast::Receiver<FeedEvent> {
        self.shared.bus.subscribe()
    }

    /// Receiver limited to market data for one symbol.
    pub fn market_data(&self, symbol: &str) -> broadcast::Receiver<FeedEvent> {
        self.shared.bus.market_data(symbol)
    }

    /// Receiver limited to option chains for one underlying.
    pub fn option_chain(&self, symbol: &str) -> broadcast::Receiver<FeedEvent> {
        self.shared.bus.option_chain(symbol)
    }

    /// Receiver limited to updates for one position.
    pub fn position_updates(&self, position_id: &str) -> broadcast::Receiver<FeedEvent> {
        self.shared.bus.position_updates(position_id)
    }

    pub fn config(&self) -> &FeedConfig {
        &self.shared.config
    }

    /// Send primitive: all wire writes funnel through the connection loop.
    async fn send(&self, frame: ClientFrame) -> FeedResult<()> {
        let command_tx = self.command_tx.read().clone();
        match command_tx {
            Some(tx) => tx
                .send(Command::Send(frame))
                .await
                .map_err(|_| FeedError::NotConnected),
            None => {
                debug!("[Feed WS] Not connected; dropping outbound frame");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("status", &self.status())
            .field("subscriptions", &self.shared.subscriptions.len())
            .field("url", &self.shared.config.url)
            .finish()
    }
}
