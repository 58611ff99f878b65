//! Fleet roster: the coordinator's view of every configured drone, keyed by
//! drone_id. Conceptually owned solely by the bus-handler task; shared
//! behind a mutex only because the search control loop and map-evolution
//! loop both need a read of "is the assigned scout still searching" without
//! routing every tick through the bus-handler's own event loop.

use std::collections::HashMap;

use mob_domain::{FleetVehicleRecord, MissionConfig, MissionPhase, Role};

pub struct Roster {
    drones: HashMap<String, FleetVehicleRecord>,
    /// Config-file order, kept alongside the lookup map so role-based
    /// selection (failover, fallback) is deterministic rather than at the
    /// mercy of `HashMap`'s iteration order.
    order: Vec<String>,
}

impl Roster {
    pub fn from_config(config: &MissionConfig) -> Self {
        let order = config.drones.iter().map(|d| d.id.clone()).collect();
        let drones = config
            .drones
            .iter()
            .map(|d| (d.id.clone(), FleetVehicleRecord::new(d.id.clone(), d.role)))
            .collect();
        Self { drones, order }
    }

    pub fn contains(&self, drone_id: &str) -> bool {
        self.drones.contains_key(drone_id)
    }

    pub fn mark_connected(&mut self, drone_id: &str, now_ms: u64) {
        if let Some(record) = self.drones.get_mut(drone_id) {
            record.phase = MissionPhase::Idle;
            record.last_seen_ms = now_ms;
        }
    }

    pub fn update_telemetry(&mut self, drone_id: &str, telemetry: mob_domain::Telemetry, phase: MissionPhase, now_ms: u64) {
        if let Some(record) = self.drones.get_mut(drone_id) {
            record.telemetry = Some(telemetry);
            record.phase = phase;
            record.last_seen_ms = now_ms;
        }
    }

    pub fn update_phase(&mut self, drone_id: &str, phase: MissionPhase, now_ms: u64) {
        if let Some(record) = self.drones.get_mut(drone_id) {
            record.phase = phase;
            record.last_seen_ms = now_ms;
        }
    }

    pub fn phase_of(&self, drone_id: &str) -> Option<MissionPhase> {
        self.drones.get(drone_id).map(|r| r.phase)
    }

    pub fn get(&self, drone_id: &str) -> Option<&FleetVehicleRecord> {
        self.drones.get(drone_id)
    }

    /// First drone of `role` whose phase is in `acceptable`, in roster
    /// (config) order. Used for the scout/utility failover dance in
    /// TRIGGER_MOB_MODE and the utility-over-scout fallback in
    /// TRIGGER_OVERWATCH_MODE.
    pub fn find_by_role(&self, role: Role, acceptable: &[MissionPhase]) -> Option<&FleetVehicleRecord> {
        self.order
            .iter()
            .filter_map(|id| self.drones.get(id))
            .filter(|d| d.role == role)
            .find(|d| acceptable.contains(&d.phase))
    }

    pub fn any_idle_payload(&self) -> Option<&FleetVehicleRecord> {
        self.order
            .iter()
            .filter_map(|id| self.drones.get(id))
            .find(|d| d.role == Role::Payload && d.phase == MissionPhase::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mob_domain::{DroneEntry, DroneKind};

    fn config_with(entries: Vec<(&str, Role)>) -> MissionConfig {
        let mut config = MissionConfig::default();
        config.drones = entries
            .into_iter()
            .map(|(id, role)| DroneEntry { id: id.to_string(), kind: DroneKind::Simulated, role })
            .collect();
        config
    }

    #[test]
    fn find_by_role_prefers_config_order_over_hashmap_order() {
        let config = config_with(vec![
            ("scout_z", Role::Scout),
            ("scout_a", Role::Scout),
        ]);
        let roster = Roster::from_config(&config);
        let found = roster.find_by_role(Role::Scout, &[MissionPhase::Idle]).unwrap();
        assert_eq!(found.drone_id, "scout_z", "first-in-config-order scout should win regardless of map iteration order");
    }

    #[test]
    fn unknown_drone_is_not_in_roster() {
        let roster = Roster::from_config(&config_with(vec![("scout_1", Role::Scout)]));
        assert!(!roster.contains("ghost"));
        assert!(roster.get("ghost").is_none());
    }
}
