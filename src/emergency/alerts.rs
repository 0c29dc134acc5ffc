use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::{log_info, log_warn};
use crate::models::EmergencyContact;

use super::controller::EmergencyController;

const ENABLE_LOGS: bool = true;

/// Alerts each contact in order: the first right away, the rest `delay` apart.
/// Stops early when cancelled or when the session it belongs to has ended.
pub(super) async fn alert_loop(
    controller: EmergencyController,
    session_id: String,
    contacts: Vec<EmergencyContact>,
    owner_name: String,
    delay: Duration,
    cancel_token: CancellationToken,
) {
    if contacts.is_empty() {
        log_warn!("No emergency contacts configured for session {}", session_id);
        return;
    }

    for (index, contact) in contacts.iter().enumerate() {
        if index > 0 {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    log_info!("Alert loop cancelled for session {}", session_id);
                    return;
                }
                _ = time::sleep(delay) => {}
            }
        }

        if cancel_token.is_cancelled()
            || !controller
                .notify_contact(&session_id, contact, &owner_name)
                .await
        {
            log_info!("Session {} ended; remaining alerts dropped", session_id);
            return;
        }
    }

    log_info!(
        "All {} contacts alerted for session {}",
        contacts.len(),
        session_id
    );
}
