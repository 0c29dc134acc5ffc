use serde::Serialize;

use super::state::{EmergencySnapshot, SessionWarning};

/// Broadcast to front-ends as the session evolves.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EmergencyEvent {
    StateChanged { snapshot: EmergencySnapshot },
    Heartbeat { snapshot: EmergencySnapshot },
    Escalated { level: u8, description: String },
    ContactNotified { name: String, notified: u32, total: u32 },
    Warning { warning: SessionWarning, message: String },
    DeactivationRejected { snapshot: EmergencySnapshot },
    Deactivated { snapshot: EmergencySnapshot },
}
