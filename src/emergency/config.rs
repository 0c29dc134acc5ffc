use std::time::Duration;

/// Timing knobs for an emergency session.
#[derive(Debug, Clone)]
pub struct EmergencyConfig {
    /// Period of the elapsed-time counter.
    pub tick_interval: Duration,

    /// Each period raises the escalation level by one.
    pub escalation_interval: Duration,

    /// Gap between consecutive contact alerts; the first goes out immediately.
    pub contact_delay: Duration,

    /// Upper bound for a location fix and, separately, for address lookup.
    pub location_timeout: Duration,

    /// Journal progress every N elapsed ticks.
    pub journal_every_ticks: u64,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            escalation_interval: Duration::from_secs(30),
            contact_delay: Duration::from_secs(2),
            location_timeout: Duration::from_secs(10),
            journal_every_ticks: 10,
        }
    }
}
