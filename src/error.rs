//! Error types for the onboarding core.

use std::time::Duration;

use crate::onboarding::steps::Step;
use crate::submission::SessionToken;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Durable key-value storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Step-level conditions. These never escalate past the calling screen.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("Selection for {field} rejected: {reason}")]
    ConstraintViolation { field: String, reason: String },

    #[error("Step {step} cannot advance, missing: {}", missing.join(", "))]
    GateNotSatisfied {
        step: Step,
        missing: Vec<&'static str>,
    },

    #[error("Step {step} is terminal")]
    Terminal { step: Step },

    #[error("Step {step} completes only through a successful submission")]
    AwaitsSubmission { step: Step },

    #[error("Answer does not belong to step {step}")]
    WrongStep { step: Step },
}

/// Merge-time validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Missing credentials: {}", missing.join(", "))]
    MissingCredentials { missing: Vec<&'static str> },

    #[error("Password and confirmation do not match")]
    PasswordMismatch,

    #[error("Missing profile fields: {}", missing.join(", "))]
    MissingProfile { missing: Vec<&'static str> },

    #[error("Snapshot read failed: {0}")]
    Storage(#[from] StorageError),
}

/// Submission errors surfaced to the terminal step.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Account service unreachable: {reason}")]
    Transport {
        reason: String,
        timeout: Option<Duration>,
    },

    #[error("Account service rejected registration ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response from account service: {0}")]
    InvalidResponse(String),

    #[error("Failed to persist session: {0}")]
    Storage(#[from] StorageError),

    /// The account was created but its token could not be stored locally.
    #[error("Account created but the session could not be stored: {source}")]
    SessionNotPersisted {
        token: SessionToken,
        source: StorageError,
    },

    #[error("A submission is already in flight")]
    InFlight,

    #[error("Submission payload invalid: {0}")]
    Invalid(#[from] ReconcileError),
}

impl SubmissionError {
    /// Whether retrying the same payload can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Storage(_) | Self::InFlight)
    }

    /// Whether the user has to go back and re-enter credentials.
    pub fn routes_to_credentials(&self) -> bool {
        match self {
            Self::Rejected { .. } => true,
            Self::Invalid(ReconcileError::MissingCredentials { .. })
            | Self::Invalid(ReconcileError::PasswordMismatch) => true,
            _ => false,
        }
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
