//! Domain errors. Plumbing failures (I/O, SQLite, providers) travel as
//! `anyhow::Error`; these are the cases callers are expected to match on.

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SafetyError {
    #[error("invalid setup: {0}")]
    Config(String),

    #[error("incorrect code")]
    Auth,

    #[error("no emergency session is active")]
    NotActive,

    #[error("contact {0} not found")]
    ContactNotFound(String),
}

impl SafetyError {
    pub fn config(message: impl Into<String>) -> Self {
        SafetyError::Config(message.into())
    }
}
