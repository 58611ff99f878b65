//! Minimal pub/sub broker: every client connection can publish and subscribe;
//! published envelopes are fanned out to every connection whose subscribed
//! patterns match the topic. Newline-delimited JSON over TCP, grounded in the
//! same "never crash on a single bad peer" discipline the fleet's UDP hub
//! follows for malformed packets.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::envelope::{topic_matches, ClientFrame, Envelope};

/// Backlog depth for the internal fan-out channel. A slow consumer lags
/// rather than stalling publishers; lagged messages are dropped for that
/// consumer only, matching the bus adapter's documented backpressure policy.
const FANOUT_CAPACITY: usize = 1024;

pub struct Broker {
    fanout: broadcast::Sender<Envelope>,
}

impl Default for Broker {
    fn default() -> Self {
        let (fanout, _) = broadcast::channel(FANOUT_CAPACITY);
        Self { fanout }
    }
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind and serve forever. Returns only on a listener bind failure.
    pub async fn serve(self: Arc<Self>, bind_addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        info!(%bind_addr, "bus broker listening");
        loop {
            match listener.accept().await {
                Ok((socket, peer)) => {
                    let broker = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = broker.handle_connection(socket).await {
                            debug!(%peer, error = %e, "bus client connection ended");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "broker accept() failed, continuing");
                }
            }
        }
    }

    async fn handle_connection(&self, socket: TcpStream) -> std::io::Result<()> {
        let (read_half, mut write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half).lines();
        let mut rx = self.fanout.subscribe();
        let mut patterns: Vec<String> = Vec::new();

        loop {
            tokio::select! {
                line = reader.next_line() => {
                    let Some(line) = line? else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<ClientFrame>(&line) {
                        Ok(ClientFrame::Sub { topic }) => patterns.push(topic),
                        Ok(ClientFrame::Pub { topic, payload }) => {
                            let _ = self.fanout.send(Envelope::new(topic, payload));
                        }
                        Err(e) => debug!(error = %e, frame = %line, "dropping malformed client frame"),
                    }
                }
                recv = rx.recv() => {
                    match recv {
                        Ok(envelope) => {
                            if patterns.iter().any(|p| topic_matches(p, &envelope.topic)) {
                                let mut line = serde_json::to_string(&envelope).unwrap_or_default();
                                line.push('\n');
                                if write_half.write_all(line.as_bytes()).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "bus client lagged, dropping oldest messages");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
        Ok(())
    }
}
