//! Typed event fan-out
//!
//! Consumers subscribe to a broadcast channel of [`FeedEvent`] values
//! instead of registering stringly-named callbacks; payload shape is
//! guaranteed per variant at compile time. Narrow per-symbol / per-position
//! channels exist alongside the global one so a component can watch a
//! single entity without filtering the whole stream. Dropping a receiver is
//! deregistration.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use marketfeed_core::{
    ConnectionState, HeartbeatPayload, MarketData, OptionChain, PositionUpdate, ServerError,
    SignalSummary,
};

/// Buffered events per channel before slow receivers start lagging
const CHANNEL_CAPACITY: usize = 1024;

/// Everything the client publishes to consumers
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Connection established (initial or after recovery)
    Connected,
    /// Connection deliberately closed
    Disconnected,
    /// Any lifecycle transition, including the two above
    StatusChange(ConnectionState),
    /// Server heartbeat frame
    Heartbeat(HeartbeatPayload),
    /// Live quote
    MarketData(MarketData),
    /// Option chain slice
    OptionChain(OptionChain),
    /// Portfolio-wide signal snapshot
    Signals(SignalSummary),
    /// Position valuation update
    PositionUpdate(PositionUpdate),
    /// Application error reported by the server; connection unaffected
    ServerError(ServerError),
    /// Transport-level failure the reconnect policy could not recover from
    ConnectionError(String),
}

/// Key of a narrow per-entity channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ScopeKey {
    MarketData(String),
    OptionChain(String),
    Position(String),
}

/// Publish/subscribe fan-out for [`FeedEvent`]s
#[derive(Debug)]
pub struct EventBus {
    global: broadcast::Sender<FeedEvent>,
    scoped: RwLock<HashMap<ScopeKey, broadcast::Sender<FeedEvent>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (global, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            global,
            scoped: RwLock::new(HashMap::new()),
        }
    }

    /// Receiver for every event the client publishes.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.global.subscribe()
    }

    /// Receiver limited to `MarketData` events for one symbol.
    pub fn market_data(&self, symbol: &str) -> broadcast::Receiver<FeedEvent> {
        self.scoped_receiver(ScopeKey::MarketData(symbol.to_string()))
    }

    /// Receiver limited to `OptionChain` events for one underlying.
    pub fn option_chain(&self, symbol: &str) -> broadcast::Receiver<FeedEvent> {
        self.scoped_receiver(ScopeKey::OptionChain(symbol.to_string()))
    }

    /// Receiver limited to `PositionUpdate` events for one position.
    pub fn position_updates(&self, position_id: &str) -> broadcast::Receiver<FeedEvent> {
        self.scoped_receiver(ScopeKey::Position(position_id.to_string()))
    }

    /// Publish to the global channel and, where the event names an entity,
    /// to the matching narrow channel. Publishing with no receivers anywhere
    /// is a no-op, never an error. Scoped channels whose receivers are all
    /// gone are swept here, whatever their key.
    pub fn publish(&self, event: FeedEvent) {
        if let Some(key) = Self::scope_of(&event) {
            let mut scoped = self.scoped.write();
            scoped.retain(|_, sender| sender.receiver_count() > 0);
            if let Some(sender) = scoped.get(&key) {
                let _ = sender.send(event.clone());
            }
        }
        let _ = self.global.send(event);
    }

    fn scoped_receiver(&self, key: ScopeKey) -> broadcast::Receiver<FeedEvent> {
        let mut scoped = self.scoped.write();
        scoped
            .entry(key)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    fn scope_of(event: &FeedEvent) -> Option<ScopeKey> {
        match event {
            FeedEvent::MarketData(data) => Some(ScopeKey::MarketData(data.symbol.clone())),
            FeedEvent::OptionChain(chain) => Some(ScopeKey::OptionChain(chain.symbol.clone())),
            FeedEvent::PositionUpdate(update) => {
                Some(ScopeKey::Position(update.position_id.clone()))
            }
            _ => None,
        }
    }
}
