use thiserror::Error;

/// The six error kinds the engine can surface. `InvalidInput`, `Security`,
/// `BudgetExhausted`, and `Cryptographic` are never masked: the engine
/// propagates them to the caller unchanged. `Configuration` is raised at
/// rule-compile time. `Processing` is the one variant that gets aggregated
/// into a `ProcessResult` instead of aborting the run, unless the
/// `processingErrors` policy says otherwise.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnonymizeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("security error: {0}")]
    Security(String),

    #[error(
        "privacy budget exhausted for context '{context}': requested {requested}, remaining {remaining}"
    )]
    BudgetExhausted {
        context: String,
        requested: f64,
        remaining: f64,
    },

    #[error("cryptographic error: {0}")]
    Cryptographic(String),

    #[error("processing error at {path}: {message}")]
    Processing { path: String, message: String },
}

impl AnonymizeError {
    /// Errors in this category must never be masked or aggregated: the
    /// engine propagates them verbatim and stops processing immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnonymizeError::Security(_)
                | AnonymizeError::BudgetExhausted { .. }
                | AnonymizeError::Cryptographic(_)
        )
    }
}

pub type AnonymizeResult<T> = Result<T, AnonymizeError>;
