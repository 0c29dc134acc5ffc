use log::info;

use crate::models::EmergencyContact;

/// Fire-and-forget alert delivery. Delivery is never confirmed back to the
/// caller.
pub trait ContactNotifier: Send + Sync {
    fn notify(&self, contact: &EmergencyContact, owner_name: &str);
}

/// Writes alerts to the log instead of sending them anywhere.
#[derive(Default)]
pub struct LogNotifier;

impl ContactNotifier for LogNotifier {
    fn notify(&self, contact: &EmergencyContact, owner_name: &str) {
        let owner = if owner_name.is_empty() {
            "your contact"
        } else {
            owner_name
        };
        info!(
            "Alert sent to {} at {}{}: {} may be in danger",
            contact.name,
            contact.phone,
            if contact.is_guardian { " (guardian)" } else { "" },
            owner
        );
    }
}
