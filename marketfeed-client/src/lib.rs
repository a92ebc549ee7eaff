//! Real-time data client for the trading dashboard
//!
//! One persistent, reconnecting WebSocket connection multiplexes market
//! data, option chains, trading signals, and position updates for many
//! independent consumers. The crate owns the connection lifecycle (with
//! exponential-backoff recovery), liveness detection, subscription replay
//! across reconnects, and typed dispatch of inbound frames.
//!
//! Entry point is [`FeedClient`]; consumers receive data by subscribing to
//! its typed event channels rather than touching the socket directly.

pub mod bus;
pub mod client;
pub mod config;
mod connection;
pub mod heartbeat;
mod router;
pub mod subscriptions;
pub mod transport;

pub use bus::FeedEvent;
pub use client::FeedClient;
pub use config::FeedConfig;
pub use transport::{OutboundFrame, Transport, TransportEvent, TransportHandle, WsTransport};

pub use marketfeed_core::{ConnectionState, FeedError, FeedResult};
