use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calculator::display::format_elapsed;
use crate::models::LocationSample;

/// Duress severity. Only ever moves up within a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum EscalationLevel {
    Active = 1,
    ContactsNotified = 2,
    ServicesAlerted = 3,
}

impl Default for EscalationLevel {
    fn default() -> Self {
        EscalationLevel::Active
    }
}

impl EscalationLevel {
    pub const MAX: EscalationLevel = EscalationLevel::ServicesAlerted;

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Next level up, saturating at [`EscalationLevel::MAX`].
    pub fn raised(&self) -> Self {
        match self {
            EscalationLevel::Active => EscalationLevel::ContactsNotified,
            EscalationLevel::ContactsNotified | EscalationLevel::ServicesAlerted => {
                EscalationLevel::ServicesAlerted
            }
        }
    }

    pub fn is_max(&self) -> bool {
        *self == Self::MAX
    }

    pub fn description(&self) -> &'static str {
        match self {
            EscalationLevel::Active => "Recording and sharing location",
            EscalationLevel::ContactsNotified => "Additional contacts notified",
            EscalationLevel::ServicesAlerted => "Emergency services alerted",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Inactive,
    Active,
    /// Still active, with the fake power-off screen showing.
    Decoy,
    Deactivated,
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Inactive
    }
}

/// Non-fatal acquisition failures shown to the user. Platform error details
/// stay in the log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionWarning {
    LocationUnavailable,
    RecordingUnavailable,
}

impl SessionWarning {
    pub fn message(&self) -> &'static str {
        match self {
            SessionWarning::LocationUnavailable => "Location unavailable",
            SessionWarning::RecordingUnavailable => "Camera or microphone unavailable",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmergencySession {
    pub session_id: Option<String>,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub escalation_level: EscalationLevel,
    pub elapsed_seconds: u64,
    pub contacts_total: u32,
    pub contacts_notified: u32,
    pub location: Option<LocationSample>,
    pub recording_active: bool,
    pub decoy_used: bool,
    pub warnings: Vec<SessionWarning>,
}

impl EmergencySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, session_id: String, started_at: DateTime<Utc>, contacts_total: u32) {
        *self = Self {
            session_id: Some(session_id),
            status: SessionStatus::Active,
            started_at: Some(started_at),
            contacts_total,
            ..Self::default()
        };
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, SessionStatus::Active | SessionStatus::Decoy)
    }

    pub fn decoy_shown(&self) -> bool {
        self.status == SessionStatus::Decoy
    }

    /// True while `session_id` names the live session.
    pub fn is_current(&self, session_id: &str) -> bool {
        self.is_active() && self.session_id.as_deref() == Some(session_id)
    }

    pub fn tick(&mut self) {
        if self.is_active() {
            self.elapsed_seconds += 1;
        }
    }

    /// Raises the level by one. Returns whether the level changed.
    pub fn escalate(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        let next = self.escalation_level.raised();
        let changed = next != self.escalation_level;
        self.escalation_level = next;
        changed
    }

    /// Jumps straight to the maximum level and shows the decoy. Returns whether
    /// anything changed.
    pub fn feign_power_off(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        let changed = !self.decoy_shown() || !self.escalation_level.is_max();
        self.escalation_level = EscalationLevel::MAX;
        self.status = SessionStatus::Decoy;
        self.decoy_used = true;
        changed
    }

    pub fn note_contact_notified(&mut self) -> bool {
        if !self.is_active() || self.contacts_notified >= self.contacts_total {
            return false;
        }
        self.contacts_notified += 1;
        true
    }

    pub fn attach_location(&mut self, sample: LocationSample) {
        self.location = Some(sample);
    }

    pub fn attach_address(&mut self, address: String) {
        if let Some(location) = self.location.as_mut() {
            location.resolved_address = Some(address);
        }
    }

    pub fn warn(&mut self, warning: SessionWarning) -> bool {
        if self.warnings.contains(&warning) {
            return false;
        }
        self.warnings.push(warning);
        true
    }

    /// Ends the session. Returns the final state (status `Deactivated`) and
    /// leaves `self` inactive.
    pub fn finish(&mut self) -> EmergencySession {
        let mut last = std::mem::take(self);
        last.status = SessionStatus::Deactivated;
        last.recording_active = false;
        last
    }

    pub fn snapshot(&self) -> EmergencySnapshot {
        EmergencySnapshot {
            session_id: self.session_id.clone(),
            status: self.status,
            started_at: self.started_at,
            escalation_level: self.escalation_level.as_u8(),
            escalation_description: self.escalation_level.description().to_string(),
            urgent: self.escalation_level.is_max(),
            elapsed_seconds: self.elapsed_seconds,
            elapsed_display: format_elapsed(self.elapsed_seconds),
            contacts_notified: self.contacts_notified,
            contacts_total: self.contacts_total,
            location: self.location.clone(),
            recording_active: self.recording_active,
            decoy_shown: self.decoy_shown(),
            decoy_used: self.decoy_used,
            warnings: self.warnings.clone(),
        }
    }
}

/// What front-ends render for the hidden mode.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmergencySnapshot {
    pub session_id: Option<String>,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub escalation_level: u8,
    pub escalation_description: String,
    pub urgent: bool,
    pub elapsed_seconds: u64,
    pub elapsed_display: String,
    pub contacts_notified: u32,
    pub contacts_total: u32,
    pub location: Option<LocationSample>,
    pub recording_active: bool,
    pub decoy_shown: bool,
    pub decoy_used: bool,
    pub warnings: Vec<SessionWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(contacts: u32) -> EmergencySession {
        let mut session = EmergencySession::new();
        session.begin("s-1".into(), Utc::now(), contacts);
        session
    }

    #[test]
    fn escalation_saturates_at_three() {
        let mut session = active(0);
        assert!(session.escalate());
        assert!(session.escalate());
        assert!(!session.escalate());
        assert!(!session.escalate());
        assert_eq!(session.escalation_level, EscalationLevel::ServicesAlerted);
        assert_eq!(session.snapshot().escalation_level, 3);
    }

    #[test]
    fn escalation_never_decreases() {
        let mut session = active(0);
        let mut last = session.escalation_level;
        for _ in 0..10 {
            session.escalate();
            session.tick();
            assert!(session.escalation_level >= last);
            last = session.escalation_level;
        }
    }

    #[test]
    fn decoy_jumps_straight_to_max() {
        let mut session = active(2);
        assert_eq!(session.escalation_level, EscalationLevel::Active);
        assert!(session.feign_power_off());
        assert_eq!(session.escalation_level, EscalationLevel::ServicesAlerted);
        assert!(session.decoy_shown());
        assert!(session.is_active());
        assert!(!session.feign_power_off());
    }

    #[test]
    fn inactive_session_ignores_events() {
        let mut session = EmergencySession::new();
        session.tick();
        assert!(!session.escalate());
        assert!(!session.feign_power_off());
        assert!(!session.note_contact_notified());
        assert_eq!(session, EmergencySession::default());
    }

    #[test]
    fn notifications_are_capped_by_contact_count() {
        let mut session = active(2);
        assert!(session.note_contact_notified());
        assert!(session.note_contact_notified());
        assert!(!session.note_contact_notified());
        assert_eq!(session.contacts_notified, 2);
    }

    #[test]
    fn warnings_are_recorded_once() {
        let mut session = active(0);
        assert!(session.warn(SessionWarning::RecordingUnavailable));
        assert!(!session.warn(SessionWarning::RecordingUnavailable));
        assert_eq!(session.warnings.len(), 1);
        assert!(session.is_active());
    }

    #[test]
    fn finish_returns_final_state_and_resets() {
        let mut session = active(1);
        session.recording_active = true;
        session.escalate();
        for _ in 0..5 {
            session.tick();
        }

        let last = session.finish();
        assert_eq!(last.status, SessionStatus::Deactivated);
        assert_eq!(last.elapsed_seconds, 5);
        assert_eq!(last.escalation_level, EscalationLevel::ContactsNotified);
        assert!(!last.recording_active);
        assert_eq!(session, EmergencySession::default());
        assert!(!session.is_current("s-1"));
    }

    #[test]
    fn snapshot_formats_elapsed_time() {
        let mut session = active(0);
        for _ in 0..75 {
            session.tick();
        }
        assert_eq!(session.snapshot().elapsed_display, "01:15");
    }
}
