use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum IncidentStatus {
    Active,
    Resolved,
    Interrupted,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Active => "Active",
            IncidentStatus::Resolved => "Resolved",
            IncidentStatus::Interrupted => "Interrupted",
        }
    }
}

/// Journal row for one emergency session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: IncidentStatus,
    pub peak_escalation: u8,
    pub elapsed_seconds: u64,
    pub contacts_notified: u32,
    pub decoy_used: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
