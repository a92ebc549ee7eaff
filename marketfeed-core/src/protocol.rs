//! Wire protocol types for the real-time data connection
//!
//! Every frame on the wire is a JSON text message of the shape
//! `{"type": "...", "data": {...}, "timestamp": "..."}`. Inbound frames are
//! decoded in two steps: first into a [`FrameEnvelope`] (which requires the
//! `type` tag), then the `data` object into the typed payload matching that
//! tag. Outbound frames are serialized directly from [`ClientFrame`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Connection state
// ============================================================================

/// Lifecycle state of the connection, owned by the connection machinery.
///
/// Consumers observe transitions via `StatusChange` events; none may set the
/// state directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection and no attempt in progress
    Disconnected,
    /// Initial connection attempt in progress
    Connecting,
    /// Connection established and live
    Connected,
    /// Connection lost; automatic recovery in progress
    Reconnecting,
    /// Recovery exhausted or fatal close; waiting for an explicit `connect()`
    Error,
}

// ============================================================================
// Client -> Server Frames
// ============================================================================

/// Frames sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Subscribe to live data for a symbol
    Subscribe { symbol: String },
    /// Unsubscribe from live data for a symbol
    Unsubscribe { symbol: String },
    /// Liveness probe
    Heartbeat { timestamp: DateTime<Utc> },
}

// ============================================================================
// Server -> Client Frames
// ============================================================================

/// Raw inbound frame envelope.
///
/// Decoding fails unless the frame carries a string `type` tag; the payload
/// stays opaque until the router dispatches on the tag.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameEnvelope {
    /// Frame type tag (`market_data`, `heartbeat`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Untyped payload, decoded per-tag by the router
    #[serde(default)]
    pub data: Value,
    /// Optional server-side send time
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Heartbeat payload (bidirectional; the server may add a connection id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

/// Live quote for a symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,
    pub price: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<Decimal>,
}

/// One quote row in an option chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    pub strike: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_interest: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implied_volatility: Option<Decimal>,
}

/// At-the-money option chain slice for an underlying
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChain {
    pub symbol: String,
    pub underlying_price: Decimal,
    pub expiration: String,
    pub atm_calls: Vec<OptionQuote>,
    pub atm_puts: Vec<OptionQuote>,
}

/// Portfolio-wide signal snapshot.
///
/// Signal content is opaque to the client; individual signals and the
/// recommendation object pass through untyped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSummary {
    pub market_bias: String,
    pub confidence: f64,
    #[serde(default)]
    pub signals: HashMap<String, Value>,
    #[serde(default)]
    pub recommendation: Value,
}

/// Valuation update for one open position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub position_id: String,
    pub symbol: String,
    pub current_value: Decimal,
    pub pnl: Decimal,
    pub pnl_percentage: Decimal,
}

/// Application-level error reported by the server.
///
/// Distinct from transport failures: these never affect connection state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn client_frame_serializes_with_type_and_data() {
        let frame = ClientFrame::Subscribe {
            symbol: "AAPL".to_string(),
        };
        let json: Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "subscribe");
        assert_eq!(json["data"]["symbol"], "AAPL");
    }

    #[test]
    fn envelope_requires_type_tag() {
        let err = serde_json::from_str::<FrameEnvelope>(r#"{"data": {"symbol": "AAPL"}}"#);
        assert!(err.is_err());

        let env: FrameEnvelope =
            serde_json::from_str(r#"{"type": "heartbeat", "data": {}}"#).unwrap();
        assert_eq!(env.kind, "heartbeat");
        assert!(env.timestamp.is_none());
    }

    #[test]
    fn market_data_decodes_numeric_fields() {
        let data: MarketData = serde_json::from_str(
            r#"{
                "symbol": "SPY",
                "price": 512.34,
                "volume": 1250000,
                "timestamp": "2025-06-02T14:30:00Z",
                "bid": 512.33
            }"#,
        )
        .unwrap();
        assert_eq!(data.price, dec!(512.34));
        assert_eq!(data.volume, dec!(1250000));
        assert_eq!(data.bid, Some(dec!(512.33)));
        assert!(data.ask.is_none());
    }

    #[test]
    fn option_chain_round_trips() {
        let chain = OptionChain {
            symbol: "QQQ".to_string(),
            underlying_price: dec!(430.10),
            expiration: "2025-06-20".to_string(),
            atm_calls: vec![OptionQuote {
                strike: dec!(430),
                bid: dec!(5.10),
                ask: dec!(5.25),
                last: Some(dec!(5.15)),
                volume: None,
                open_interest: None,
                delta: Some(dec!(0.51)),
                implied_volatility: None,
            }],
            atm_puts: vec![],
        };
        let json = serde_json::to_string(&chain).unwrap();
        let back: OptionChain = serde_json::from_str(&json).unwrap();
        assert_eq!(back.atm_calls.len(), 1);
        assert_eq!(back.atm_calls[0].strike, dec!(430));
    }

    #[test]
    fn server_error_tolerates_missing_optionals() {
        let err: ServerError = serde_json::from_str(r#"{"error": "unknown symbol"}"#).unwrap();
        assert_eq!(err.error, "unknown symbol");
        assert!(err.code.is_none());
        assert!(err.details.is_none());
    }
}
