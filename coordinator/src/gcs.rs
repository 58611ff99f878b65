//! GCS WebSocket broadcaster. Accepts operator frames, forwards each
//! to the Coordinator through `OperatorCommandSink`, and fans out whatever
//! the Coordinator pushes through `TelemetryBroadcaster` to every connected
//! client.
//!
//! The two handles are constructed together, before either the Coordinator
//! or this server exists, so neither side ever holds a strong reference to
//! the other's concrete type — breaking what would otherwise be a cyclic
//! GCS↔Coordinator dependency. Mirrors the constructor-time wiring of a
//! WebSocket namespace against its shared application state rather than
//! post-construction setters.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use base64::Engine;
use mob_domain::wire::{OperatorFrame, OutboundFrame, OutboundFrameType};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Bound on the outbound fan-out channel. Video frames are the only traffic
/// likely to overrun a slow consumer; a lagging client simply misses frames
/// (`broadcast::Receiver` reports `Lagged` rather than blocking the sender).
const BROADCAST_CAPACITY: usize = 256;
/// Bound on the operator-command inbound channel. Operator actions are rare
/// and latency-sensitive; this is generous headroom, not a real limit.
const COMMAND_CAPACITY: usize = 64;

/// Handle the Coordinator calls to forward a parsed operator frame to itself.
/// Cheaply cloneable; holding one never blocks on GCS internals.
#[derive(Clone)]
pub struct OperatorCommandSink {
    tx: mpsc::Sender<OperatorFrame>,
}

impl OperatorCommandSink {
    pub async fn send(&self, frame: OperatorFrame) {
        if self.tx.send(frame).await.is_err() {
            warn!("operator command dropped: coordinator command channel closed");
        }
    }
}

/// Handle the Coordinator calls to push an outbound frame to every connected
/// operator. Cheaply cloneable; a send with no subscribers is a silent no-op.
#[derive(Clone)]
pub struct TelemetryBroadcaster {
    tx: broadcast::Sender<OutboundFrame>,
}

impl TelemetryBroadcaster {
    pub fn broadcast(&self, frame: OutboundFrame) {
        // No receivers connected is the common case outside an active
        // operator session; not an error.
        let _ = self.tx.send(frame);
    }

    pub fn connected_clients(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Base64-encodes and fans out a single JPEG video frame. Encoding
    /// is skipped entirely when no operator is connected — the camera driver
    /// producing `jpeg_bytes` is an external collaborator; this is the narrow
    /// boundary it is consumed through.
    pub fn broadcast_video_frame(&self, jpeg_bytes: &[u8]) {
        if self.connected_clients() == 0 {
            return;
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(jpeg_bytes);
        self.broadcast(OutboundFrame::new(OutboundFrameType::VideoFrame, serde_json::json!({ "jpeg_base64": encoded })));
    }
}

/// Builds the two handles the Coordinator and GCS server are each wired with
/// at construction time, before either is built.
pub fn channel_pair() -> (OperatorCommandSink, mpsc::Receiver<OperatorFrame>, TelemetryBroadcaster) {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    (OperatorCommandSink { tx }, rx, TelemetryBroadcaster { tx: broadcast::channel(BROADCAST_CAPACITY).0 })
}

#[derive(Clone)]
struct GcsState {
    command_sink: OperatorCommandSink,
    broadcaster: TelemetryBroadcaster,
}

/// Binds and serves the GCS WebSocket endpoint at `/ws` until the process
/// exits. Bind failure is fatal (`FatalBind`).
pub async fn serve(bind_addr: String, command_sink: OperatorCommandSink, broadcaster: TelemetryBroadcaster) -> Result<(), mob_domain::MissionError> {
    let state = GcsState { command_sink, broadcaster };
    // The HTML/JS frontend is served from a different
    // origin than this WebSocket endpoint during development; permissive
    // CORS here mirrors the teacher's own `tower-http` cors layer.
    let app = Router::new().route("/ws", get(ws_upgrade)).layer(CorsLayer::permissive()).with_state(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| mob_domain::MissionError::FatalBind(format!("GCS WebSocket bind on {bind_addr} failed: {e}")))?;

    info!(bind_addr, "GCS WebSocket broadcaster listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| mob_domain::MissionError::FatalBind(format!("GCS WebSocket server crashed: {e}")))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<GcsState>) -> axum::response::Response {
    ws.on_upgrade(move |socket| handle_client(socket, state))
}

/// One task per connected operator client. Tolerates per-client send errors
/// by dropping the connection rather than affecting other clients.
async fn handle_client(mut socket: WebSocket, state: GcsState) {
    let mut outbound = state.broadcaster.tx.subscribe();
    info!("GCS client connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<OperatorFrame>(&text) {
                            Ok(frame) => state.command_sink.send(frame).await,
                            Err(e) => debug!(error = %e, "malformed operator frame, ignoring, connection kept"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary/ping/pong frames carry no operator semantics here
                    Some(Err(e)) => {
                        warn!(error = %e, "GCS client read error");
                        break;
                    }
                }
            }
            frame = outbound.recv() => {
                match frame {
                    Ok(frame) => {
                        let text = serde_json::to_string(&frame).unwrap_or_default();
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "GCS client lagging, dropped frames");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    info!("GCS client disconnected");
}
