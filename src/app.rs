use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};
use serde::Serialize;

use crate::{
    calculator::{ButtonToken, CalculatorEngine, PressOutcome},
    emergency::{
        DeactivationOutcome, DecoyController, DecoyScreen, EmergencyController, EmergencySnapshot,
    },
    error::SafetyError,
    models::EmergencyContact,
    settings::{SettingsStore, SetupDraft},
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AppMode {
    Setup,
    Calculator,
    /// Contacts and the trigger are editable only once unlocked with the
    /// deactivation code.
    Settings { unlocked: bool },
    Emergency,
}

/// Everything a front-end can ask of the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppInput {
    Button(ButtonToken),
    /// Long press on the display.
    SettingsRequested,
    CloseSettings,
    UnlockSettings(String),
    /// Power button during an emergency.
    DecoyRequested,
    Deactivate(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppOutcome {
    Display(String),
    EmergencyActivated(EmergencySnapshot),
    Decoy(DecoyScreen),
    DeactivationRejected(EmergencySnapshot),
    Deactivated(EmergencySnapshot),
    ModeChanged(AppMode),
    SettingsLocked,
    Ignored,
}

/// Routes front-end input to the calculator, the emergency controller and the
/// settings store depending on the current mode.
pub struct App {
    mode: AppMode,
    engine: CalculatorEngine,
    settings: Arc<SettingsStore>,
    emergency: EmergencyController,
    decoy: DecoyController,
}

impl App {
    pub fn new(settings: Arc<SettingsStore>, emergency: EmergencyController) -> Self {
        let mode = if settings.is_setup_complete() {
            AppMode::Calculator
        } else {
            AppMode::Setup
        };

        Self {
            mode,
            engine: CalculatorEngine::new(),
            settings,
            decoy: DecoyController::new(emergency.clone()),
            emergency,
        }
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn display(&self) -> String {
        self.engine.display()
    }

    pub fn clear_label(&self) -> &'static str {
        self.engine.clear_label()
    }

    pub fn emergency(&self) -> &EmergencyController {
        &self.emergency
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub async fn handle(&mut self, input: AppInput) -> AppOutcome {
        if self.mode == AppMode::Emergency && !self.emergency.is_active().await {
            self.return_to_calculator();
        }

        match input {
            AppInput::Button(token) => self.press(token).await,
            AppInput::SettingsRequested => match self.mode {
                AppMode::Calculator | AppMode::Setup => {
                    self.mode = if self.settings.is_setup_complete() {
                        AppMode::Settings { unlocked: false }
                    } else {
                        AppMode::Setup
                    };
                    AppOutcome::ModeChanged(self.mode)
                }
                _ => AppOutcome::Ignored,
            },
            AppInput::CloseSettings => match self.mode {
                AppMode::Settings { .. } => {
                    self.return_to_calculator();
                    AppOutcome::ModeChanged(self.mode)
                }
                _ => AppOutcome::Ignored,
            },
            AppInput::UnlockSettings(code) => match self.mode {
                AppMode::Settings { unlocked: false } => {
                    if self.settings.verify_code(&code) {
                        self.mode = AppMode::Settings { unlocked: true };
                        AppOutcome::ModeChanged(self.mode)
                    } else {
                        warn!("Settings unlock rejected");
                        AppOutcome::SettingsLocked
                    }
                }
                _ => AppOutcome::Ignored,
            },
            AppInput::DecoyRequested => {
                if self.mode != AppMode::Emergency {
                    return AppOutcome::Ignored;
                }
                match self.decoy.feign_power_off().await {
                    Ok(screen) => AppOutcome::Decoy(screen),
                    Err(_) => AppOutcome::Ignored,
                }
            }
            AppInput::Deactivate(code) => {
                if self.mode != AppMode::Emergency {
                    return AppOutcome::Ignored;
                }
                match self.decoy.submit_code(&code).await {
                    DeactivationOutcome::Deactivated(last) => {
                        self.return_to_calculator();
                        AppOutcome::Deactivated(last)
                    }
                    DeactivationOutcome::Rejected(snapshot) => {
                        AppOutcome::DeactivationRejected(snapshot)
                    }
                    DeactivationOutcome::NotActive => {
                        self.return_to_calculator();
                        AppOutcome::Ignored
                    }
                }
            }
        }
    }

    /// Commits the setup wizard and opens the calculator.
    pub fn complete_setup(&mut self, draft: SetupDraft) -> Result<()> {
        if !matches!(
            self.mode,
            AppMode::Setup | AppMode::Settings { unlocked: true }
        ) {
            return Err(SafetyError::Auth.into());
        }
        self.settings.complete_setup(draft)?;
        info!("Setup complete");
        self.return_to_calculator();
        Ok(())
    }

    pub fn add_contact(&self, contact: EmergencyContact) -> Result<()> {
        self.require_unlocked()?;
        self.settings.add_contact(contact)
    }

    pub fn remove_contact(&self, contact_id: &str) -> Result<()> {
        self.require_unlocked()?;
        self.settings.remove_contact(contact_id)
    }

    pub fn set_trigger_sequence(&self, sequence: &str) -> Result<()> {
        self.require_unlocked()?;
        let mut next = self.settings.snapshot();
        next.trigger_sequence = sequence.to_string();
        self.settings.update(next)
    }

    async fn press(&mut self, token: ButtonToken) -> AppOutcome {
        if self.mode != AppMode::Calculator {
            return AppOutcome::Ignored;
        }

        let trigger = self.settings.trigger_sequence();
        match self.engine.press(token, &trigger) {
            PressOutcome::Updated => AppOutcome::Display(self.engine.display()),
            PressOutcome::Triggered => {
                let snapshot = self.emergency.activate().await;
                self.mode = AppMode::Emergency;
                AppOutcome::EmergencyActivated(snapshot)
            }
        }
    }

    fn return_to_calculator(&mut self) {
        self.engine.reset();
        self.mode = if self.settings.is_setup_complete() {
            AppMode::Calculator
        } else {
            AppMode::Setup
        };
    }

    fn require_unlocked(&self) -> Result<(), SafetyError> {
        match self.mode {
            AppMode::Settings { unlocked: true } => Ok(()),
            _ => Err(SafetyError::Auth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Platform;
    use crate::settings::UserSettings;

    fn configured() -> Arc<SettingsStore> {
        let contact = EmergencyContact::new("Sam", "555-0100", None, true).unwrap();
        Arc::new(SettingsStore::in_memory(UserSettings {
            setup_complete: true,
            deactivation_code: "9999".into(),
            trigger_sequence: "1234".into(),
            contacts: vec![contact],
            owner_name: "Alex".into(),
            owner_phone: "555-0199".into(),
        }))
    }

    fn app(settings: Arc<SettingsStore>) -> App {
        let emergency = EmergencyController::new(settings.clone(), Platform::simulated());
        App::new(settings, emergency)
    }

    async fn type_keys(app: &mut App, keys: &str) -> AppOutcome {
        let mut last = AppOutcome::Ignored;
        for key in keys.chars() {
            last = app
                .handle(AppInput::Button(ButtonToken::from_key(key).unwrap()))
                .await;
        }
        last
    }

    #[tokio::test(start_paused = true)]
    async fn incomplete_setup_starts_in_setup_mode() {
        let settings = Arc::new(SettingsStore::in_memory(UserSettings::default()));
        let mut app = app(settings);
        assert_eq!(app.mode(), AppMode::Setup);
        assert_eq!(type_keys(&mut app, "1234").await, AppOutcome::Ignored);
        assert!(!app.emergency().is_active().await);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_switches_to_emergency_and_blocks_buttons() {
        let mut app = app(configured());
        assert_eq!(type_keys(&mut app, "12").await, AppOutcome::Display("12".into()));

        let outcome = type_keys(&mut app, "34").await;
        assert!(matches!(outcome, AppOutcome::EmergencyActivated(_)));
        assert_eq!(app.mode(), AppMode::Emergency);
        assert_eq!(type_keys(&mut app, "5").await, AppOutcome::Ignored);
        assert_eq!(
            app.handle(AppInput::SettingsRequested).await,
            AppOutcome::Ignored
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deactivation_returns_to_a_fresh_calculator() {
        let mut app = app(configured());
        type_keys(&mut app, "1234").await;

        let rejected = app.handle(AppInput::Deactivate("0000".into())).await;
        assert!(matches!(rejected, AppOutcome::DeactivationRejected(ref s) if s.escalation_level == 2));

        let outcome = app.handle(AppInput::Deactivate("9999".into())).await;
        assert!(matches!(outcome, AppOutcome::Deactivated(_)));
        assert_eq!(app.mode(), AppMode::Calculator);
        assert_eq!(app.display(), "0");
        assert_eq!(app.clear_label(), "AC");
    }

    #[tokio::test(start_paused = true)]
    async fn decoy_is_ignored_outside_emergency() {
        let mut app = app(configured());
        assert_eq!(app.handle(AppInput::DecoyRequested).await, AppOutcome::Ignored);

        type_keys(&mut app, "1234").await;
        assert_eq!(
            app.handle(AppInput::DecoyRequested).await,
            AppOutcome::Decoy(DecoyScreen::default())
        );
        assert_eq!(app.emergency().snapshot().await.escalation_level, 3);
    }

    #[tokio::test]
    async fn settings_edits_require_unlock() {
        let mut app = app(configured());
        let contact = EmergencyContact::new("Kim", "555-0101", None, false).unwrap();
        assert_eq!(
            app.add_contact(contact.clone())
                .unwrap_err()
                .downcast::<SafetyError>()
                .unwrap(),
            SafetyError::Auth
        );

        app.handle(AppInput::SettingsRequested).await;
        assert_eq!(app.mode(), AppMode::Settings { unlocked: false });
        assert_eq!(
            app.handle(AppInput::UnlockSettings("1111".into())).await,
            AppOutcome::SettingsLocked
        );
        app.handle(AppInput::UnlockSettings("9999".into())).await;
        assert_eq!(app.mode(), AppMode::Settings { unlocked: true });

        app.add_contact(contact).unwrap();
        app.set_trigger_sequence("5*5").unwrap();
        assert_eq!(app.settings().trigger_sequence(), "5×5");
        assert!(app.set_trigger_sequence("12a").is_err());
        assert_eq!(app.settings().contacts().len(), 2);

        app.handle(AppInput::CloseSettings).await;
        assert_eq!(app.mode(), AppMode::Calculator);
    }
}
