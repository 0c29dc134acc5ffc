pub mod contact;
pub mod incident;
pub mod location;

pub use contact::EmergencyContact;
pub use incident::{IncidentRecord, IncidentStatus};
pub use location::LocationSample;
