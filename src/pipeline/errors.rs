//! Structured errors for rank spec validation.
//!
//! Every diagnostic carries a stable machine-readable [`ErrorCode`], a JSON
//! pointer into the offending spec, a human message and an optional hint.

use std::fmt;

use serde::Serialize;

/// Stable error codes, serialized in snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A value is out of its allowed range.
    InvalidValue,
    /// A field required by another setting is absent.
    MissingField,
    /// Two settings that can't be used together.
    InvalidCombo,
    /// A runtime limit is zero or otherwise unusable.
    LimitExceeded,
    UnknownField,
    /// Catch-all for custom rules.
    ValidationFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidValue => "invalid_value",
            Self::MissingField => "missing_field",
            Self::InvalidCombo => "invalid_combo",
            Self::LimitExceeded => "limit_exceeded",
            Self::UnknownField => "unknown_field",
            Self::ValidationFailed => "validation_failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single problem found in a [`RankSpec`](super::spec::RankSpec).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankSpecError {
    pub code: ErrorCode,
    /// JSON pointer to the offending field (`""` for the whole spec).
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl RankSpecError {
    pub fn new(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for RankSpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.code)?;
        if !self.path.is_empty() {
            write!(f, "{}: ", self.path)?;
        }
        f.write_str(&self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RankSpecError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_path_and_hint() {
        let err = RankSpecError::new(ErrorCode::InvalidValue, "/rank/damping", "damping must be in (0, 1)")
            .with_hint("Use 0.85");
        assert_eq!(
            err.to_string(),
            "[invalid_value] /rank/damping: damping must be in (0, 1) (hint: Use 0.85)"
        );
    }

    #[test]
    fn test_display_without_path() {
        let err = RankSpecError::new(ErrorCode::ValidationFailed, "", "bad");
        assert_eq!(err.to_string(), "[validation_failed] bad");
    }

    #[test]
    fn test_serializes_code_snake_case() {
        let err = RankSpecError::new(ErrorCode::MissingField, "/anchor", "missing");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "missing_field");
        assert!(json.get("hint").is_none());
    }
}
