use serde::Serialize;

use crate::error::SafetyError;

use super::controller::{DeactivationOutcome, EmergencyController};

pub const DECOY_MESSAGE: &str = "Powering off...";

/// What the screen shows while the device pretends to shut down.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DecoyScreen {
    pub message: &'static str,
}

impl Default for DecoyScreen {
    fn default() -> Self {
        Self {
            message: DECOY_MESSAGE,
        }
    }
}

/// Fake power-off. Raises the session to its maximum level while the screen
/// looks like the device is shutting down; the only way out is the
/// deactivation code.
#[derive(Clone)]
pub struct DecoyController {
    emergency: EmergencyController,
}

impl DecoyController {
    pub fn new(emergency: EmergencyController) -> Self {
        Self { emergency }
    }

    pub async fn feign_power_off(&self) -> Result<DecoyScreen, SafetyError> {
        self.emergency.feign_power_off().await?;
        Ok(DecoyScreen::default())
    }

    pub async fn screen(&self) -> Option<DecoyScreen> {
        self.emergency
            .snapshot()
            .await
            .decoy_shown
            .then(DecoyScreen::default)
    }

    pub async fn submit_code(&self, candidate: &str) -> DeactivationOutcome {
        self.emergency.attempt_deactivation(candidate).await
    }
}
