mod alerts;
pub mod config;
pub mod controller;
pub mod decoy;
pub mod events;
pub mod state;

pub use config::EmergencyConfig;
pub use controller::{DeactivationOutcome, EmergencyController};
pub use decoy::{DecoyController, DecoyScreen, DECOY_MESSAGE};
pub use events::EmergencyEvent;
pub use state::{
    EmergencySession, EmergencySnapshot, EscalationLevel, SessionStatus, SessionWarning,
};
