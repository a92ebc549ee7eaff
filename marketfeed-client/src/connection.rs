//! Connection state machine
//!
//! One spawned task (the connection loop) exclusively owns the transport
//! handle and serializes every wire effect. Other components reach the wire
//! only through the loop's command channel, so subscription replay after a
//! reconnect can never interleave with user-issued frames. The loop listens
//! for `Disconnect` at every await point, including the open attempt and
//! the backoff sleep, so teardown never leaves a stray timer behind.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use marketfeed_core::{ClientFrame, ConnectionState, FeedError, FeedResult};

use crate::bus::{EventBus, FeedEvent};
use crate::config::FeedConfig;
use crate::heartbeat::HeartbeatMonitor;
use crate::router;
use crate::subscriptions::SubscriptionRegistry;
use crate::transport::{OutboundFrame, Transport, TransportEvent, TransportHandle};

/// Commands accepted by the connection loop
#[derive(Debug)]
pub(crate) enum Command {
    /// Send a frame on the wire; dropped (logged) if no connection is open
    Send(ClientFrame),
    /// Tear the connection down with a normal closure
    Disconnect,
}

/// State shared between the client facade and the connection loop
#[derive(Debug)]
pub(crate) struct Shared {
    pub config: FeedConfig,
    pub state: RwLock<ConnectionState>,
    pub subscriptions: SubscriptionRegistry,
    pub heartbeat: HeartbeatMonitor,
    pub bus: EventBus,
}

impl Shared {
    pub fn status(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Transition to `next`, publishing a `StatusChange` if it changed.
    pub fn set_state(&self, next: ConnectionState) {
        {
            let mut state = self.state.write();
            if *state == next {
                return;
            }
            *state = next;
        }
        self.bus.publish(FeedEvent::StatusChange(next));
    }
}

/// What ended the connected inner loop
enum Exit {
    /// `disconnect()` was requested
    Requested,
    /// Server closed with a normal-closure code
    ClosedByServer,
    /// Server closed with a code that should not be retried
    Fatal(u16),
    /// Abnormal close or transport error; enter the reconnect path
    Retry,
}

/// How a peer close code maps onto the recovery policy
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CloseDisposition {
    Normal,
    Fatal,
    Retry,
}

/// Close codes 1000 (normal) and the policy/auth family are not transient:
/// retrying them would just be refused again.
pub(crate) fn close_disposition(code: u16) -> CloseDisposition {
    match code {
        1000 => CloseDisposition::Normal,
        1008 | 4400..=4499 => CloseDisposition::Fatal,
        _ => CloseDisposition::Retry,
    }
}

/// Delay before reconnect attempt `attempt` (1-based): `base * 2^(attempt-1)`.
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt.saturating_sub(1))
}

/// Run the connection loop until an explicit disconnect, a normal server
/// close, or a terminal error.
pub(crate) async fn run(
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    mut command_rx: mpsc::Receiver<Command>,
    ready: oneshot::Sender<FeedResult<()>>,
) {
    let mut ready = Some(ready);
    let mut attempt: u32 = 0;

    loop {
        info!("[Feed WS] Connecting to {}", shared.config.url);

        let opened = tokio::select! {
            result = tokio::time::timeout(
                shared.config.connect_timeout,
                transport.open(&shared.config.url),
            ) => match result {
                Ok(Ok(handle)) => Ok(handle),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(FeedError::Timeout),
            },
            _ = drain_until_disconnect(&mut command_rx) => {
                finish_disconnected(&shared, &mut ready);
                return;
            }
        };

        let mut handle = match opened {
            Ok(handle) => handle,
            Err(e) => {
                warn!("[Feed WS] Connection attempt failed: {}", e);
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(e));
                }
                if !wait_for_retry(&shared, &mut command_rx, &mut attempt, &mut ready).await {
                    return;
                }
                continue;
            }
        };

        info!("[Feed WS] Connected");
        attempt = 0;
        shared.set_state(ConnectionState::Connected);
        shared.bus.publish(FeedEvent::Connected);
        if let Some(tx) = ready.take() {
            let _ = tx.send(Ok(()));
        }

        // Replay runs to completion before any queued command is serviced,
        // once per connection epoch.
        replay_subscriptions(&shared, &handle).await;

        let start = tokio::time::Instant::now();
        let mut heartbeat = tokio::time::interval_at(
            start + shared.config.heartbeat_interval,
            shared.config.heartbeat_interval,
        );

        let exit = loop {
            tokio::select! {
                event = handle.inbound.recv() => match event {
                    Some(TransportEvent::Frame(text)) => {
                        shared.heartbeat.record_frame();
                        router::route_frame(&text, &shared.bus, &shared.heartbeat);
                    }
                    Some(TransportEvent::Closed { code }) => {
                        break match close_disposition(code) {
                            CloseDisposition::Normal => Exit::ClosedByServer,
                            CloseDisposition::Fatal => Exit::Fatal(code),
                            CloseDisposition::Retry => {
                                warn!("[Feed WS] Abnormal close (code {})", code);
                                Exit::Retry
                            }
                        };
                    }
                    Some(TransportEvent::Error(e)) => {
                        error!("[Feed WS] Transport error: {}", e);
                        break Exit::Retry;
                    }
                    None => {
                        warn!("[Feed WS] Transport stream ended");
                        break Exit::Retry;
                    }
                },
                command = command_rx.recv() => match command {
                    Some(Command::Send(frame)) => {
                        if send_frame(&handle.outbound, &frame).await.is_err() {
                            break Exit::Retry;
                        }
                    }
                    Some(Command::Disconnect) | None => break Exit::Requested,
                },
                _ = heartbeat.tick() => {
                    let probe = ClientFrame::Heartbeat { timestamp: Utc::now() };
                    if send_frame(&handle.outbound, &probe).await.is_err() {
                        break Exit::Retry;
                    }
                }
            }
        };

        match exit {
            Exit::Requested => {
                let _ = handle.outbound.send(OutboundFrame::Close).await;
                shared.set_state(ConnectionState::Disconnected);
                shared.bus.publish(FeedEvent::Disconnected);
                info!("[Feed WS] Disconnected");
                return;
            }
            Exit::ClosedByServer => {
                info!("[Feed WS] Connection closed by server");
                shared.set_state(ConnectionState::Disconnected);
                shared.bus.publish(FeedEvent::Disconnected);
                return;
            }
            Exit::Fatal(code) => {
                error!("[Feed WS] Server closed connection with fatal code {}", code);
                shared.set_state(ConnectionState::Error);
                shared
                    .bus
                    .publish(FeedEvent::ConnectionError(format!(
                        "connection closed with code {code}"
                    )));
                return;
            }
            Exit::Retry => {
                if !wait_for_retry(&shared, &mut command_rx, &mut attempt, &mut ready).await {
                    return;
                }
            }
        }
    }
}

/// Apply the backoff policy after a failure. Returns `false` when the loop
/// must stop (retry budget exhausted, or disconnect during the backoff).
async fn wait_for_retry(
    shared: &Shared,
    command_rx: &mut mpsc::Receiver<Command>,
    attempt: &mut u32,
    ready: &mut Option<oneshot::Sender<FeedResult<()>>>,
) -> bool {
    shared.set_state(ConnectionState::Reconnecting);

    *attempt += 1;
    if *attempt > shared.config.max_attempts {
        error!(
            "[Feed WS] Giving up after {} reconnect attempts",
            shared.config.max_attempts
        );
        shared.set_state(ConnectionState::Error);
        shared.bus.publish(FeedEvent::ConnectionError(
            FeedError::Exhausted(shared.config.max_attempts).to_string(),
        ));
        return false;
    }

    let delay = backoff_delay(shared.config.base_delay, *attempt);
    info!("[Feed WS] Reconnecting in {:?} (attempt {})", delay, attempt);

    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = drain_until_disconnect(command_rx) => {
            finish_disconnected(shared, ready);
            false
        }
    }
}

/// Wait for a `Disconnect` command (or the channel closing). `Send`
/// commands arriving while no connection is open are the send primitive's
/// documented no-op: logged and dropped.
async fn drain_until_disconnect(command_rx: &mut mpsc::Receiver<Command>) {
    loop {
        match command_rx.recv().await {
            Some(Command::Send(frame)) => {
                debug!("[Feed WS] Not connected; dropping outbound {:?}", frame);
            }
            Some(Command::Disconnect) | None => return,
        }
    }
}

/// Settle an explicit disconnect issued while no connection was open.
fn finish_disconnected(shared: &Shared, ready: &mut Option<oneshot::Sender<FeedResult<()>>>) {
    if let Some(tx) = ready.take() {
        let _ = tx.send(Err(FeedError::Cancelled));
    }
    shared.set_state(ConnectionState::Disconnected);
    shared.bus.publish(FeedEvent::Disconnected);
    info!("[Feed WS] Disconnected");
}

/// Re-issue a subscribe frame for every tracked topic, exactly once each.
///
/// Frames are sent from a snapshot; the tracked set itself is never
/// cleared, so an `unsubscribe` arriving mid-replay still lands in the
/// registry and its frame (queued behind the replay) converges the wire.
async fn replay_subscriptions(shared: &Shared, handle: &TransportHandle) {
    let snapshot = shared.subscriptions.topics();
    if snapshot.is_empty() {
        return;
    }

    info!("[Feed WS] Replaying {} subscriptions", snapshot.len());
    for symbol in snapshot {
        let frame = ClientFrame::Subscribe { symbol };
        if send_frame(&handle.outbound, &frame).await.is_err() {
            warn!("[Feed WS] Transport dropped during subscription replay");
            return;
        }
    }
}

async fn send_frame(
    outbound: &mpsc::Sender<OutboundFrame>,
    frame: &ClientFrame,
) -> FeedResult<()> {
    let json = serde_json::to_string(frame)
        .map_err(|e| FeedError::Transport(format!("frame serialization failed: {e}")))?;
    outbound
        .send(OutboundFrame::Text(json))
        .await
        .map_err(|_| FeedError::Transport("send channel closed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 4), Duration::from_secs(8));
        assert_eq!(backoff_delay(base, 5), Duration::from_secs(16));
    }

    #[test]
    fn close_codes_map_to_policy() {
        assert_eq!(close_disposition(1000), CloseDisposition::Normal);
        assert_eq!(close_disposition(1006), CloseDisposition::Retry);
        assert_eq!(close_disposition(1008), CloseDisposition::Fatal);
        assert_eq!(close_disposition(4401), CloseDisposition::Fatal);
        assert_eq!(close_disposition(1011), CloseDisposition::Retry);
    }
}
