use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in metres.
    pub accuracy: f64,
    pub captured_at: DateTime<Utc>,
    pub resolved_address: Option<String>,
}
