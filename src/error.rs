//! Structured error taxonomy for the session boundary. One type, stable
//! `class` + `origin` tags, `thiserror`-derived `Display`.

use std::fmt;
use thiserror::Error as ThisError;

///
/// SessionError
/// Error surfaced across the session boundary; the only errors this
/// crate adds beyond whatever the provider raises (spec §6, §7).
///

#[derive(Debug, ThisError)]
#[error("{origin}:{class}: {message}")]
pub struct SessionError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
    /// The underlying provider/transaction failure, when this error
    /// wraps one (origin == `Provider`).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SessionError {
    #[must_use]
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn identity_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Conflict, ErrorOrigin::ActionAssignment, message)
    }

    #[must_use]
    pub fn invalid_action(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::Unsupported,
            ErrorOrigin::ActionAssignment,
            message,
        )
    }

    #[must_use]
    pub fn cycle_detected(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Dependency,
            message,
        )
    }

    #[must_use]
    pub fn provider(source: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self {
            class: ErrorClass::Internal,
            origin: ErrorOrigin::Provider,
            message: source.to_string(),
            source: Some(source),
        }
    }

    #[must_use]
    pub const fn is_identity_conflict(&self) -> bool {
        matches!(
            (self.class, self.origin),
            (ErrorClass::Conflict, ErrorOrigin::ActionAssignment)
        )
    }

    #[must_use]
    pub const fn is_cycle_detected(&self) -> bool {
        matches!(
            (self.class, self.origin),
            (ErrorClass::InvariantViolation, ErrorOrigin::Dependency)
        )
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Conflict,
    InvariantViolation,
    Internal,
    Unsupported,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Conflict => "conflict",
            Self::InvariantViolation => "invariant_violation",
            Self::Internal => "internal",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy, scoped to the session's own seams.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    IdentityMap,
    ActionAssignment,
    Dependency,
    Materialization,
    Commit,
    Provider,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::IdentityMap => "identity_map",
            Self::ActionAssignment => "action_assignment",
            Self::Dependency => "dependency",
            Self::Materialization => "materialization",
            Self::Commit => "commit",
            Self::Provider => "provider",
        };
        write!(f, "{label}")
    }
}
