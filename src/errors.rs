//! # Error Types Module
//!
//! Structured errors for every failure class the dialogue can hit. Validation and
//! extraction errors are user-correctable and resolved inside the handlers by a
//! reprompt; the rest are reported to the user and to the logs.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::transaction_model::TransactionType;

/// A field value the user typed was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("description is empty")]
    EmptyDescription,

    #[error("not a number: {0}")]
    InvalidAmount(String),

    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("amount {0} is too large")]
    AmountTooLarge(Decimal),

    #[error("unrecognised date: {0}")]
    InvalidDate(String),

    #[error("date {0} is in the future")]
    FutureDate(NaiveDate),

    #[error("{label} is not one of the {kind} categories")]
    InvalidCategory { label: String, kind: TransactionType },
}

impl ValidationError {
    /// Localization key of the reprompt shown to the user
    pub fn message_key(&self) -> &'static str {
        match self {
            ValidationError::EmptyDescription => "error-empty-description",
            ValidationError::InvalidAmount(_) => "error-invalid-amount",
            ValidationError::NonPositiveAmount => "error-non-positive-amount",
            ValidationError::AmountTooLarge(_) => "error-amount-too-large",
            ValidationError::InvalidDate(_) => "error-invalid-date",
            ValidationError::FutureDate(_) => "error-future-date",
            ValidationError::InvalidCategory { .. } => "error-invalid-category",
        }
    }
}

/// The text-extraction collaborator could not produce a usable draft
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extraction service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("unexpected response format: {0}")]
    UnexpectedResponse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The service answered, but found no amount in the text
    #[error("nothing extractable in the text")]
    NothingExtracted,

    #[error("extracted amount {0} is out of range")]
    AmountOutOfRange(Decimal),
}

/// Storage-level failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored session cannot be decoded: {0}")]
    SessionDecode(String),

    #[error("stored row is invalid: {0}")]
    InvalidRow(String),
}

/// Failures surfaced by the dialogue handlers to the transport layer
#[derive(Debug, Error)]
pub enum DialogueError {
    /// The session does not hold the draft its state requires
    #[error("corrupted session for user {user_id}: {reason}")]
    SessionDecode { user_id: i64, reason: String },

    #[error("user {user_id} is not allowed to use the bot")]
    Unauthorized { user_id: i64 },

    #[error("storage failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for DialogueError {
    fn from(err: StoreError) -> Self {
        DialogueError::Store(err)
    }
}
