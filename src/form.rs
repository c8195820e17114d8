//! Guest form validation.
//!
//! The page posts a name and a guest type. Before anything reaches the
//! delivery pipeline the name is sanitized (trimmed, angle brackets removed)
//! and checked against the configured length bounds, and the guest type is
//! parsed against the configured option list.

use serde::Deserialize;

use crate::config::FormConfig;
use crate::types::UserType;

/// Form input exactly as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_type: Option<String>,
}

/// Form input that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidForm {
    pub name: String,
    pub user_type: UserType,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Name must be at least {min} characters")]
    NameTooShort { min: usize },
    #[error("Name must be at most {max} characters")]
    NameTooLong { max: usize },
    #[error("Please choose a guest type")]
    MissingUserType,
    #[error("Unknown guest type '{0}'")]
    UnknownUserType(String),
}

/// Trim surrounding whitespace and strip `<` / `>`.
pub fn sanitize_name(input: &str) -> String {
    input.trim().replace(['<', '>'], "")
}

impl RawForm {
    pub fn new(name: impl Into<String>, user_type: Option<&str>) -> Self {
        Self {
            name: name.into(),
            user_type: user_type.map(str::to_string),
        }
    }

    /// Sanitize and check the form against `rules`.
    ///
    /// Length is counted in characters, after sanitizing.
    pub fn validate(&self, rules: &FormConfig) -> Result<ValidForm, ValidationError> {
        let name = sanitize_name(&self.name);
        let len = name.chars().count();
        if len < rules.name_min_len {
            return Err(ValidationError::NameTooShort {
                min: rules.name_min_len,
            });
        }
        if len > rules.name_max_len {
            return Err(ValidationError::NameTooLong {
                max: rules.name_max_len,
            });
        }

        let raw_type = self
            .user_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ValidationError::MissingUserType)?;

        let user_type: UserType = raw_type
            .parse()
            .map_err(|_| ValidationError::UnknownUserType(raw_type.to_string()))?;

        let offered = rules
            .user_types
            .iter()
            .any(|t| t.trim().eq_ignore_ascii_case(user_type.as_str()));
        if !offered {
            return Err(ValidationError::UnknownUserType(raw_type.to_string()));
        }

        Ok(ValidForm { name, user_type })
    }
}
