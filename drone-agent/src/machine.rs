//! Shared, task-safe wrapper around `mob_fsm::DroneStateMachine`. Three tasks
//! per agent (bus listener, health monitor, current role behavior) all fire
//! triggers against the same machine; this type serializes access with a
//! mutex and fans out every resulting phase to a `watch` channel so the
//! behavior supervisor can react to transitions it didn't itself cause.

use mob_domain::{MissionPhase, MissionType, Role};
use mob_fsm::{DroneStateMachine, Trigger};
use tokio::sync::{watch, Mutex};

pub struct SharedMachine {
    fsm: Mutex<DroneStateMachine>,
    mission_type: Mutex<MissionType>,
    phase_tx: watch::Sender<MissionPhase>,
}

impl SharedMachine {
    pub fn new(drone_id: impl Into<String>, role: Role) -> Self {
        let fsm = DroneStateMachine::new(drone_id, role);
        let (phase_tx, _rx) = watch::channel(fsm.phase());
        Self { fsm: Mutex::new(fsm), mission_type: Mutex::new(MissionType::Idle), phase_tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<MissionPhase> {
        self.phase_tx.subscribe()
    }

    pub async fn phase(&self) -> MissionPhase {
        self.fsm.lock().await.phase()
    }

    pub async fn role(&self) -> Role {
        self.fsm.lock().await.role()
    }

    pub async fn mission_type(&self) -> MissionType {
        *self.mission_type.lock().await
    }

    pub async fn set_mission_type(&self, mission_type: MissionType) {
        *self.mission_type.lock().await = mission_type;
    }

    /// Fire `trigger` against the current mission_type. On success, updates
    /// the mission_type if provided and publishes the new phase to every
    /// subscriber. Silent no-op on rejection, per the kernel's
    /// precondition-failure semantics.
    pub async fn fire(&self, trigger: Trigger, new_mission_type: Option<MissionType>) -> Option<MissionPhase> {
        let mission_type = match new_mission_type {
            Some(mt) => mt,
            None => self.mission_type().await,
        };
        let mut fsm = self.fsm.lock().await;
        let result = fsm.fire(trigger, mission_type);
        let new_phase = fsm.phase();
        drop(fsm);

        if let Some(phase) = result {
            if let Some(mt) = new_mission_type {
                *self.mission_type.lock().await = mt;
            }
            let _ = self.phase_tx.send(new_phase);
        }
        result
    }

    pub async fn reset_to_idle(&self) {
        let mut fsm = self.fsm.lock().await;
        fsm.reset_to_idle();
        let phase = fsm.phase();
        drop(fsm);
        *self.mission_type.lock().await = MissionType::Idle;
        let _ = self.phase_tx.send(phase);
    }
}
