use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::calculator::{history::HISTORY_CAPACITY, ButtonToken};
use crate::error::SafetyError;
use crate::models::EmergencyContact;

pub const DEFAULT_TRIGGER_SEQUENCE: &str = "1234";
pub const MIN_DEACTIVATION_CODE_LEN: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub setup_complete: bool,
    pub deactivation_code: String,
    pub trigger_sequence: String,
    pub contacts: Vec<EmergencyContact>,
    pub owner_name: String,
    pub owner_phone: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            setup_complete: false,
            deactivation_code: String::new(),
            trigger_sequence: DEFAULT_TRIGGER_SEQUENCE.into(),
            contacts: Vec::new(),
            owner_name: String::new(),
            owner_phone: String::new(),
        }
    }
}

/// Maps typed keys onto the characters the input history records (`*` to
/// `×`, `/` to `÷`, ...). Rejects sequences the history could never match.
pub fn normalize_trigger(sequence: &str) -> Result<String, SafetyError> {
    if sequence.is_empty() {
        return Err(SafetyError::config("trigger sequence must not be empty"));
    }

    let normalized = sequence
        .chars()
        .map(|key| {
            ButtonToken::from_key(key)
                .map(|token| token.as_char())
                .ok_or_else(|| {
                    SafetyError::config(format!("trigger key '{key}' is not a calculator key"))
                })
        })
        .collect::<Result<String, _>>()?;

    if normalized.chars().count() > HISTORY_CAPACITY {
        return Err(SafetyError::config(format!(
            "trigger sequence must be at most {HISTORY_CAPACITY} keys"
        )));
    }
    Ok(normalized)
}

impl UserSettings {
    /// Rules a completed setup must satisfy. The trigger must already be in
    /// normalized form.
    pub fn validate(&self) -> Result<(), SafetyError> {
        if normalize_trigger(&self.trigger_sequence)? != self.trigger_sequence {
            return Err(SafetyError::config(
                "trigger sequence contains unnormalized keys",
            ));
        }
        if self.deactivation_code.chars().count() < MIN_DEACTIVATION_CODE_LEN {
            return Err(SafetyError::config(format!(
                "deactivation code must be at least {MIN_DEACTIVATION_CODE_LEN} characters"
            )));
        }
        if self.contacts.is_empty() {
            return Err(SafetyError::config("at least one emergency contact is required"));
        }
        Ok(())
    }
}

/// Everything the setup wizard collects before settings are committed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SetupDraft {
    pub owner_name: String,
    pub owner_phone: String,
    pub trigger_sequence: String,
    pub deactivation_code: String,
    pub confirm_code: String,
    pub contacts: Vec<EmergencyContact>,
}

impl SetupDraft {
    pub fn into_settings(self) -> Result<UserSettings, SafetyError> {
        if self.deactivation_code != self.confirm_code {
            return Err(SafetyError::config("deactivation codes do not match"));
        }

        let trigger_sequence = if self.trigger_sequence.is_empty() {
            DEFAULT_TRIGGER_SEQUENCE.to_string()
        } else {
            normalize_trigger(&self.trigger_sequence)?
        };

        let settings = UserSettings {
            setup_complete: true,
            deactivation_code: self.deactivation_code,
            trigger_sequence,
            contacts: self.contacts,
            owner_name: self.owner_name.trim().to_string(),
            owner_phone: self.owner_phone.trim().to_string(),
        };
        settings.validate()?;
        Ok(settings)
    }
}

pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Settings at {} are unreadable ({err}); using defaults", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// Store without a backing file.
    pub fn in_memory(settings: UserSettings) -> Self {
        Self {
            path: None,
            data: RwLock::new(settings),
        }
    }

    pub fn snapshot(&self) -> UserSettings {
        self.read().clone()
    }

    pub fn is_setup_complete(&self) -> bool {
        self.read().setup_complete
    }

    pub fn trigger_sequence(&self) -> String {
        self.read().trigger_sequence.clone()
    }

    pub fn contacts(&self) -> Vec<EmergencyContact> {
        self.read().contacts.clone()
    }

    /// Plain comparison against the stored deactivation code. An unset code
    /// never matches.
    pub fn verify_code(&self, candidate: &str) -> bool {
        let guard = self.read();
        !guard.deactivation_code.is_empty() && guard.deactivation_code == candidate
    }

    pub fn complete_setup(&self, draft: SetupDraft) -> Result<()> {
        let settings = draft.into_settings()?;
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn update(&self, mut settings: UserSettings) -> Result<()> {
        if settings.setup_complete {
            settings.trigger_sequence = normalize_trigger(&settings.trigger_sequence)?;
            settings.validate()?;
        }
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn add_contact(&self, contact: EmergencyContact) -> Result<()> {
        let mut next = self.snapshot();
        next.contacts.push(contact);
        self.update(next)
    }

    pub fn remove_contact(&self, contact_id: &str) -> Result<()> {
        let mut next = self.snapshot();
        let before = next.contacts.len();
        next.contacts.retain(|contact| contact.id != contact_id);
        if next.contacts.len() == before {
            return Err(SafetyError::ContactNotFound(contact_id.to_string()).into());
        }
        self.update(next)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
