//! Core types for the marketfeed real-time data client
//!
//! This crate defines the wire protocol spoken with the market-data/signal
//! server (JSON text frames tagged with a `type` field) and the shared
//! connection/error types consumed by the client engine.

pub mod error;
pub mod protocol;

pub use error::{FeedError, FeedResult};
pub use protocol::{
    ClientFrame, ConnectionState, FrameEnvelope, HeartbeatPayload, MarketData, OptionChain,
    OptionQuote, PositionUpdate, ServerError, SignalSummary,
};
