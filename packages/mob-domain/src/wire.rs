//! Bus payload shapes and topic names. Shared
//! between the drone agent and the coordinator/relay so both sides of every
//! topic agree on a single Rust type rather than hand-rolled JSON on each end.

use serde::{Deserialize, Serialize};

use crate::phase::MissionPhase;
use crate::position::Position;
use crate::role::Role;
use crate::telemetry::Telemetry;

pub const TOPIC_FLEET_CONNECT: &str = "fleet/connect";
pub const TOPIC_FLEET_TELEMETRY_WILDCARD: &str = "fleet/telemetry/+";
pub const TOPIC_FLEET_STATE_WILDCARD: &str = "fleet/state/+";
pub const TOPIC_FLEET_EVENT_WILDCARD: &str = "fleet/event/+";
pub const TOPIC_FLEET_EVENT_TARGET_FOUND: &str = "fleet/event/target_found";
pub const TOPIC_FLEET_EVENT_CONFIRMATION: &str = "fleet/event/confirmation";
pub const TOPIC_FLEET_MAP_UPDATE: &str = "fleet/map/update";
pub const TOPIC_MISSION_START: &str = "mission/start";

pub fn topic_fleet_telemetry(drone_id: &str) -> String {
    format!("fleet/telemetry/{drone_id}")
}
pub fn topic_fleet_state(drone_id: &str) -> String {
    format!("fleet/state/{drone_id}")
}
pub fn topic_fleet_event(drone_id: &str) -> String {
    format!("fleet/event/{drone_id}")
}
pub fn topic_drone_command(drone_id: &str) -> String {
    format!("drone/command/{drone_id}")
}

/// `fleet_id` extraction out of a wildcard-matched topic, e.g.
/// `fleet/telemetry/scout_1` -> `scout_1`. Returns `None` if the topic has
/// fewer than three segments.
pub fn last_segment(topic: &str) -> Option<&str> {
    topic.rsplit('/').next()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectPayload {
    pub drone_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryPayload {
    #[serde(flatten)]
    pub telemetry: Telemetry,
    pub mission_phase: MissionPhase,
    pub drone_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatePayload {
    pub state: MissionPhase,
    pub drone_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FleetEventType {
    PendingConfirmation,
    TargetDeliveryRequest,
    AiDetection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetEventPayload {
    #[serde(rename = "type")]
    pub event_type: FleetEventType,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfirmationData {
    pub position: Position,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionAltitudeData {
    pub position: Position,
    pub altitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetFoundPayload {
    pub position: Position,
    pub source_drone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmationType {
    OperatorConfirmTarget,
    OperatorRejectTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationPayload {
    pub drone_id: String,
    #[serde(rename = "type")]
    pub kind: ConfirmationType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapUpdatePayload {
    pub drone_id: String,
    pub position: Position,
    pub altitude: f64,
    pub has_detection: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionStartType {
    MobEmergency,
    GeneralEmergency,
    UtilityHullInspection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionStartPayload {
    #[serde(rename = "type")]
    pub kind: MissionStartType,
    #[serde(default)]
    pub position: Option<Position>,
}

/// `drone/command/<id>` payloads. `command` tags the variant; fields beyond
/// the tag vary per command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DroneCommand {
    StartMission { #[serde(rename = "type")] kind: MissionStartType },
    StartPatrol,
    StartOverwatch { position: Position },
    StartVideoStream,
    LaunchAndStandby { position: Position },
    GotoWaypoint { position: Position },
    OperatorConfirmTarget,
    OperatorRejectTarget,
    ReturnToHome,
}

/// Operator-originated GCS WebSocket frame types. Any other `type`
/// value is logged and ignored by the broadcaster rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorFrameType {
    TriggerMobMode,
    ConfirmTarget,
    RejectTarget,
    TriggerPatrolMode,
    TriggerOverwatchMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorFrame {
    #[serde(rename = "type")]
    pub frame_type: OperatorFrameType,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Outbound GCS WebSocket frame. `Telemetry`/`VideoFrame` are fire-and-forget
/// fan-out; the event-tagged variants mirror a `fleet/event/<id>` dispatch
/// decision back to every connected operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundFrameType {
    Telemetry,
    VideoFrame,
    #[serde(rename = "TARGET_CONFIRMED")]
    TargetConfirmed,
    #[serde(rename = "TARGET_REJECTED")]
    TargetRejected,
    #[serde(rename = "PENDING_CONFIRMATION")]
    PendingConfirmation,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "WARNING")]
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundFrame {
    #[serde(rename = "type")]
    pub frame_type: OutboundFrameType,
    pub data: serde_json::Value,
}

impl OutboundFrame {
    pub fn new(frame_type: OutboundFrameType, data: serde_json::Value) -> Self {
        Self { frame_type, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drone_command_round_trips_through_json() {
        let cmd = DroneCommand::GotoWaypoint { position: Position::new(1.0, 2.0, 3.0) };
        let json = serde_json::to_string(&cmd).unwrap();
        let back: DroneCommand = serde_json::from_str(&json).unwrap();
        match back {
            DroneCommand::GotoWaypoint { position } => assert_eq!(position, Position::new(1.0, 2.0, 3.0)),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn last_segment_extracts_drone_id() {
        assert_eq!(last_segment("fleet/telemetry/scout_1"), Some("scout_1"));
        assert_eq!(last_segment("fleet/connect"), Some("connect"));
    }

    #[test]
    fn operator_frame_parses_trigger_mob_mode() {
        let json = r#"{"type":"TRIGGER_MOB_MODE"}"#;
        let frame: OperatorFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.frame_type, OperatorFrameType::TriggerMobMode);
    }

    #[test]
    fn outbound_frame_serializes_event_tag() {
        let frame = OutboundFrame::new(OutboundFrameType::TargetConfirmed, serde_json::json!({"drone_id": "scout_1"}));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "TARGET_CONFIRMED");
    }
}
