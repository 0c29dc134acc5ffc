use std::{env, path::PathBuf};

use crate::emergency::EmergencyConfig;

pub const DATA_DIR_ENV: &str = "SAFECALC_DATA_DIR";
pub const DEBUG_ENV: &str = "SAFECALC_DEBUG";
const DEFAULT_DATA_DIR: &str = ".safecalc";

/// Process-level configuration read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// Journal every tick instead of every few.
    pub debug: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_values(
            env::var(DATA_DIR_ENV).ok().as_deref(),
            env::var(DEBUG_ENV).ok().as_deref(),
        )
    }

    fn from_values(data_dir: Option<&str>, debug: Option<&str>) -> Self {
        let data_dir = data_dir
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let debug = debug
            .map(|value| matches!(value.trim(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);

        Self { data_dir, debug }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("incidents.sqlite3")
    }

    pub fn emergency_config(&self) -> EmergencyConfig {
        let journal_every_ticks = if self.debug { 1 } else { 10 };
        EmergencyConfig {
            journal_every_ticks,
            ..EmergencyConfig::default()
        }
    }
}
