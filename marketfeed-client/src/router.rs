//! Inbound frame routing
//!
//! Frames are decoded in two steps: envelope (which requires the `type`
//! tag), then the typed payload for that tag. Malformed or unknown frames
//! are logged and dropped; they never reach consumers and never affect
//! connection state.

use serde_json::Value;
use tracing::{debug, warn};

use marketfeed_core::{
    FrameEnvelope, HeartbeatPayload, MarketData, OptionChain, PositionUpdate, ServerError,
    SignalSummary,
};

use crate::bus::{EventBus, FeedEvent};
use crate::heartbeat::HeartbeatMonitor;

/// Route one raw text frame to the event bus.
pub(crate) fn route_frame(text: &str, bus: &EventBus, heartbeat: &HeartbeatMonitor) {
    let envelope: FrameEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("[Feed WS] Dropping malformed frame: {}", e);
            return;
        }
    };

    match envelope.kind.as_str() {
        "heartbeat" => {
            if let Some(payload) = decode::<HeartbeatPayload>(&envelope.kind, envelope.data) {
                heartbeat.record_heartbeat(&payload);
                bus.publish(FeedEvent::Heartbeat(payload));
            }
        }
        "market_data" => {
            if let Some(payload) = decode::<MarketData>(&envelope.kind, envelope.data) {
                debug!("[Feed WS] Market data for {}", payload.symbol);
                bus.publish(FeedEvent::MarketData(payload));
            }
        }
        "option_chain" => {
            if let Some(payload) = decode::<OptionChain>(&envelope.kind, envelope.data) {
                debug!("[Feed WS] Option chain for {}", payload.symbol);
                bus.publish(FeedEvent::OptionChain(payload));
            }
        }
        "signals" => {
            if let Some(payload) = decode::<SignalSummary>(&envelope.kind, envelope.data) {
                debug!("[Feed WS] Signal snapshot ({})", payload.market_bias);
                bus.publish(FeedEvent::Signals(payload));
            }
        }
        "position_update" => {
            if let Some(payload) = decode::<PositionUpdate>(&envelope.kind, envelope.data) {
                debug!("[Feed WS] Position update for {}", payload.position_id);
                bus.publish(FeedEvent::PositionUpdate(payload));
            }
        }
        // Server acknowledgements; the registry already applied the effect
        // optimistically, so these carry no information for consumers.
        "subscribe" | "unsubscribe" => {
            debug!("[Feed WS] {} acknowledged: {}", envelope.kind, envelope.data);
        }
        "error" => {
            if let Some(payload) = decode::<ServerError>(&envelope.kind, envelope.data) {
                warn!("[Feed WS] Server error: {}", payload.error);
                bus.publish(FeedEvent::ServerError(payload));
            }
        }
        other => {
            warn!("[Feed WS] Dropping frame with unknown type '{}'", other);
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(kind: &str, data: Value) -> Option<T> {
    match serde_json::from_value(data) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!("[Feed WS] Dropping '{}' frame with bad payload: {}", kind, e);
            None
        }
    }
}
