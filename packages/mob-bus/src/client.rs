//! Bus adapter client: connect/publish/subscribe/listen over the minimal TCP
//! broker in `broker.rs`. Reconnects in the background on network churn;
//! publishes made while disconnected are dropped (no persistent outbox —
//! contracts require idempotent consumers, per the mission kernel's bus
//! contract).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mob_domain::MissionError;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, info, warn};

use crate::envelope::{ClientFrame, Envelope};

/// Bound on the inbound queue. Kept deliberately bounded; under overflow,
/// `InboundQueue` evicts the oldest buffered telemetry envelope first so
/// events and state changes are preserved.
const INBOUND_CAPACITY: usize = 1024;

/// `fleet/telemetry/<id>` is the only topic family the adapter is allowed to
/// drop preferentially under backpressure; `fleet/state/+` and
/// `fleet/event/+` carry one-shot transitions/events that must not be lost.
fn is_droppable_under_pressure(topic: &str) -> bool {
    topic.starts_with("fleet/telemetry/")
}

/// Bounded inbound mailbox implementing a drop-oldest-telemetry backpressure
/// policy: a plain `mpsc` channel can only ever drop the newest arrival,
/// which would let a burst of telemetry samples starve a state transition
/// sitting behind them. This queue instead evicts the oldest droppable
/// (telemetry) entry to make room, falling back to dropping the incoming
/// message only if nothing droppable is buffered.
struct InboundQueue {
    items: Mutex<VecDeque<Envelope>>,
    notify: Notify,
}

impl InboundQueue {
    fn new() -> Arc<Self> {
        Arc::new(Self { items: Mutex::new(VecDeque::new()), notify: Notify::new() })
    }

    async fn push(&self, envelope: Envelope) {
        let mut items = self.items.lock().await;
        if items.len() >= INBOUND_CAPACITY {
            if let Some(pos) = items.iter().position(|e| is_droppable_under_pressure(&e.topic)) {
                items.remove(pos);
            } else if is_droppable_under_pressure(&envelope.topic) {
                debug!(topic = %envelope.topic, "inbound queue full of non-droppable messages, dropping incoming telemetry");
                return;
            } else {
                // Queue is saturated with non-droppable event/state messages;
                // still bounded, so the oldest of those is evicted rather
                // than blocking the bus reader task indefinitely.
                items.pop_front();
            }
        }
        items.push_back(envelope);
        drop(items);
        self.notify.notify_one();
    }

    async fn pop(&self) -> Option<Envelope> {
        loop {
            {
                let mut items = self.items.lock().await;
                if let Some(envelope) = items.pop_front() {
                    return Some(envelope);
                }
            }
            self.notify.notified().await;
        }
    }
}
/// Outbound frames (subscribes + publishes) queued for the writer task.
const OUTBOUND_CAPACITY: usize = 256;

const INITIAL_CONNECT_ATTEMPTS: u32 = 10;
const INITIAL_CONNECT_INTERVAL: Duration = Duration::from_millis(500);
const RECONNECT_INTERVAL: Duration = Duration::from_millis(500);

pub struct BusClient {
    addr: String,
    connected: Arc<AtomicBool>,
    outbound_tx: mpsc::Sender<ClientFrame>,
    inbound: Arc<InboundQueue>,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl BusClient {
    /// Connect to the broker at `addr`. Blocks for up to ~5 seconds (10
    /// attempts, 500ms apart) before giving up, matching the bus adapter's
    /// bounded initial retry window.
    pub async fn connect(addr: impl Into<String>) -> Result<Self, MissionError> {
        let addr = addr.into();

        let mut last_err = None;
        let mut stream = None;
        for attempt in 0..INITIAL_CONNECT_ATTEMPTS {
            match TcpStream::connect(&addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    debug!(attempt, %addr, error = %e, "bus connect attempt failed");
                    last_err = Some(e);
                    tokio::time::sleep(INITIAL_CONNECT_INTERVAL).await;
                }
            }
        }
        let stream = stream.ok_or_else(|| {
            MissionError::TransientBus(format!(
                "could not reach broker at {addr} after {INITIAL_CONNECT_ATTEMPTS} attempts: {:?}",
                last_err
            ))
        })?;

        info!(%addr, "connected to bus broker");

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let inbound = InboundQueue::new();
        let connected = Arc::new(AtomicBool::new(true));
        let subscriptions = Arc::new(Mutex::new(Vec::new()));

        tokio::spawn(supervise(
            addr.clone(),
            stream,
            outbound_rx,
            inbound.clone(),
            connected.clone(),
            subscriptions.clone(),
        ));

        Ok(Self {
            addr,
            connected,
            outbound_tx,
            inbound,
            subscriptions,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Serialize `payload` and publish to `topic`. Non-blocking; dropped
    /// silently (logged at debug) if currently disconnected.
    pub async fn publish(&self, topic: impl Into<String>, payload: serde_json::Value) {
        if !self.is_connected() {
            debug!(addr = %self.addr, "publish dropped: bus disconnected");
            return;
        }
        let frame = ClientFrame::Pub { topic: topic.into(), payload };
        if self.outbound_tx.try_send(frame).is_err() {
            debug!(addr = %self.addr, "publish dropped: outbound queue full or closed");
        }
    }

    /// Subscribe to `pattern` (may contain a single-level `+` wildcard).
    /// Idempotent; re-sent automatically on reconnect.
    pub async fn subscribe(&self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        let mut subs = self.subscriptions.lock().await;
        if subs.contains(&pattern) {
            return;
        }
        subs.push(pattern.clone());
        drop(subs);
        let _ = self.outbound_tx.try_send(ClientFrame::Sub { topic: pattern });
    }

    /// Pull the next (topic, payload) pair. The bus reconnects indefinitely
    /// in the background, so in practice this only returns `None` if the
    /// underlying queue is ever torn down; callers still treat `None` as
    /// end-of-stream per the adapter's `listen()` contract.
    pub async fn recv(&self) -> Option<Envelope> {
        self.inbound.pop().await
    }
}

#[allow(clippy::too_many_arguments)]
async fn supervise(
    addr: String,
    mut stream: TcpStream,
    mut outbound_rx: mpsc::Receiver<ClientFrame>,
    inbound: Arc<InboundQueue>,
    connected: Arc<AtomicBool>,
    subscriptions: Arc<Mutex<Vec<String>>>,
) {
    loop {
        replay_subscriptions(&mut stream, &subscriptions).await;
        connected.store(true, Ordering::Relaxed);

        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => match serde_json::from_str::<Envelope>(&line) {
                            Ok(envelope) => inbound.push(envelope).await,
                            Err(e) => debug!(error = %e, "dropping malformed broker frame"),
                        },
                        Ok(None) | Err(_) => break,
                    }
                }
                frame = outbound_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            let mut line = serde_json::to_string(&frame).unwrap_or_default();
                            line.push('\n');
                            if write_half.write_all(line.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                        None => return, // client dropped, stop supervising
                    }
                }
            }
        }

        connected.store(false, Ordering::Relaxed);
        warn!(%addr, "bus connection lost, reconnecting in background");

        loop {
            tokio::time::sleep(RECONNECT_INTERVAL).await;
            match TcpStream::connect(&addr).await {
                Ok(s) => {
                    stream = s;
                    info!(%addr, "bus reconnected");
                    break;
                }
                Err(e) => debug!(%addr, error = %e, "bus reconnect attempt failed"),
            }
        }
    }
}

async fn replay_subscriptions(stream: &mut TcpStream, subscriptions: &Arc<Mutex<Vec<String>>>) {
    let subs = subscriptions.lock().await;
    for topic in subs.iter() {
        let frame = ClientFrame::Sub { topic: topic.clone() };
        let mut line = serde_json::to_string(&frame).unwrap_or_default();
        line.push('\n');
        let _ = stream.write_all(line.as_bytes()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(topic: &str) -> Envelope {
        Envelope::new(topic, serde_json::json!({}))
    }

    #[tokio::test]
    async fn drops_oldest_telemetry_before_events_under_pressure() {
        let queue = InboundQueue::new();
        for i in 0..INBOUND_CAPACITY {
            queue.push(envelope(&format!("fleet/telemetry/drone_{i}"))).await;
        }
        queue.push(envelope("fleet/event/scout_1")).await;

        let mut seen_event = false;
        let mut seen_oldest_telemetry = false;
        for _ in 0..INBOUND_CAPACITY {
            let e = queue.pop().await.unwrap();
            if e.topic == "fleet/event/scout_1" {
                seen_event = true;
            }
            if e.topic == "fleet/telemetry/drone_0" {
                seen_oldest_telemetry = true;
            }
        }
        assert!(seen_event, "event must survive telemetry backpressure");
        assert!(!seen_oldest_telemetry, "oldest telemetry should have been evicted to make room");
    }

    #[tokio::test]
    async fn fifo_order_preserved_within_a_topic() {
        let queue = InboundQueue::new();
        queue.push(envelope("fleet/state/scout_1")).await;
        queue.push(envelope("fleet/state/scout_1")).await;
        queue.push(envelope("fleet/state/scout_1")).await;

        // No topic-specific ordinal on Envelope, so this just asserts pop()
        // drains in push order (FIFO) rather than reordering.
        for _ in 0..3 {
            assert_eq!(queue.pop().await.unwrap().topic, "fleet/state/scout_1");
        }
    }
}
