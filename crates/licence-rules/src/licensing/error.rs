use std::fmt;

use serde::Serialize;

use super::domain::EntityError;
use super::repository::RepositoryError;

/// One offending field, addressed by a human-readable path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Every violation found in a payload, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<Violation>);

impl ValidationErrors {
    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(Violation::new(path, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&joined)
    }
}

impl std::error::Error for ValidationErrors {}

/// Error taxonomy surfaced by the licensing engines and service.
#[derive(Debug, thiserror::Error)]
pub enum LicensingError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Reference(String),
    #[error("processing error: {0}")]
    Processing(String),
    #[error(transparent)]
    Repository(RepositoryError),
    #[error(transparent)]
    Entity(#[from] EntityError),
}

impl LicensingError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }

    /// Violations carried by a validation failure, empty otherwise.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation(errors) => &errors.0,
            _ => &[],
        }
    }
}

impl From<ValidationErrors> for LicensingError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

impl From<RepositoryError> for LicensingError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict { constraint } => Self::Conflict(format!(
                "a record with the same unique value already exists (constraint {constraint})"
            )),
            RepositoryError::Reference { constraint } => Self::Reference(format!(
                "the record refers to data that does not exist (constraint {constraint})"
            )),
            RepositoryError::FieldTooLong(detail) => Self::Validation(ValidationErrors(vec![
                Violation::new("", format!("a value exceeds its column length: {detail}")),
            ])),
            other => Self::Repository(other),
        }
    }
}
