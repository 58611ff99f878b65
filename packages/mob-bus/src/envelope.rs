use serde::{Deserialize, Serialize};

/// A bus message: a topic and its JSON payload. Ownership lies with the bus;
/// payloads are plain values copied into and out of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self { topic: topic.into(), payload }
    }
}

/// Wire frames exchanged between a `BusClient` and the broker, one JSON
/// object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ClientFrame {
    Sub { topic: String },
    Pub { topic: String, payload: serde_json::Value },
}

/// Returns true if `pattern` matches `topic`, where `pattern` may contain a
/// single-level wildcard `+` in any segment (MQTT-style, single-level only —
/// no multi-level `#`).
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut p = pattern.split('/');
    let mut t = topic.split('/');
    loop {
        match (p.next(), t.next()) {
            (Some(ps), Some(ts)) => {
                if ps != "+" && ps != ts {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(topic_matches("fleet/connect", "fleet/connect"));
        assert!(!topic_matches("fleet/connect", "fleet/event"));
    }

    #[test]
    fn single_level_wildcard() {
        assert!(topic_matches("fleet/telemetry/+", "fleet/telemetry/scout_1"));
        assert!(!topic_matches("fleet/telemetry/+", "fleet/telemetry/scout_1/extra"));
        assert!(!topic_matches("fleet/telemetry/+", "fleet/state/scout_1"));
    }

    #[test]
    fn wildcard_does_not_cross_segments() {
        assert!(!topic_matches("fleet/+", "fleet/event/scout_1"));
    }
}
