use thiserror::Error;

/// Semantic error taxonomy shared by every mission-kernel process. Variant
/// names mirror the kind of failure, not the code path that produced it.
#[derive(Debug, Error)]
pub enum MissionError {
    /// publish/subscribe attempted while the bus adapter is disconnected.
    /// Recovered by the adapter's own reconnect loop; the publish is dropped.
    #[error("bus unavailable: {0}")]
    TransientBus(String),

    /// JSON decode failure or schema mismatch on a consumed bus message.
    /// Logged and dropped; the subscription continues.
    #[error("malformed payload on {topic}: {reason}")]
    MalformedPayload { topic: String, reason: String },

    /// Command arrived for a drone whose role forbids it, or whose current
    /// phase rejects the requested trigger. Logged; no state change occurs.
    #[error("precondition failed: {0}")]
    PreconditionFailure(String),

    /// Battery below threshold, heartbeat stale, or controller disconnected.
    /// Always resolved by firing `trigger_emergency`.
    #[error("resource shortage: {0}")]
    ResourceShortage(String),

    /// Vehicle mode flipped to MANUAL (or back) outside of the state
    /// machine's own control.
    #[error("local operator override: {0}")]
    LocalOperatorOverride(String),

    /// Missing config file, invalid schema, or unknown drone/controller type.
    /// Always aborts the process with exit code 1, before any bus connect.
    #[error("fatal configuration error: {0}")]
    FatalConfig(String),

    /// WebSocket port or broker unreachable after the bounded retry window.
    /// Always aborts the process with exit code 1.
    #[error("fatal bind error: {0}")]
    FatalBind(String),
}

impl MissionError {
    /// Fatal variants abort the process with exit code 1; everything else is
    /// absorbed at its source and never reaches a process boundary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MissionError::FatalConfig(_) | MissionError::FatalBind(_))
    }
}
