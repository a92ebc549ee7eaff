//! Error types for the marketfeed client

use thiserror::Error;

/// Errors surfaced by the real-time data client.
///
/// Transport-level failures are recovered internally by the reconnect
/// policy and reach consumers as state transitions; only the error classes
/// below escape through public call results.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Operation requires an established connection.
    #[error("not connected")]
    NotConnected,

    /// The connection attempt did not complete within the configured timeout.
    #[error("connection attempt timed out")]
    Timeout,

    /// Socket-level failure while opening or using the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// A pending connection attempt was cancelled by `disconnect()`.
    #[error("connection attempt cancelled")]
    Cancelled,

    /// The reconnect policy gave up after exhausting its retry budget.
    #[error("reconnect attempts exhausted after {0} tries")]
    Exhausted(u32),
}

/// Result type alias for client operations
pub type FeedResult<T> = Result<T, FeedError>;
