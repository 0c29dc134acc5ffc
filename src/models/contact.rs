use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SafetyError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub id: String,
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub is_guardian: bool,
}

impl EmergencyContact {
    /// Builds a contact with a fresh id. Name and phone are required.
    pub fn new(
        name: &str,
        phone: &str,
        email: Option<&str>,
        is_guardian: bool,
    ) -> Result<Self, SafetyError> {
        let name = name.trim();
        let phone = phone.trim();
        if name.is_empty() || phone.is_empty() {
            return Err(SafetyError::config("contact name and phone are required"));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
            email: email
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            is_guardian,
        })
    }
}
