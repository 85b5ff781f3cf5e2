//! Draft transaction editing.
//!
//! Applies one validated field edit to a transaction and renders the
//! confirmation card. The same edit path serves both an unsaved draft and a
//! persisted record; only where the result is written differs.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::dialogue::SessionState;
use crate::errors::{ExtractionError, ValidationError};
use crate::transaction_model::{
    Transaction, TransactionField, TransactionType, DEFAULT_CURRENCY, MAX_AMOUNT,
};
use crate::validators::{
    capitalize_first, validate_amount, validate_category, validate_date, validate_description,
};

/// Where an accepted field edit is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    /// The unsaved draft in the session
    Draft,
    /// A persisted record, written through to the transaction store
    Record,
}

impl EditTarget {
    /// The edit target and field a session is currently waiting on, if any
    pub fn of(state: &SessionState) -> Option<(EditTarget, TransactionField)> {
        match state {
            SessionState::EditingDraftField { field } => Some((EditTarget::Draft, *field)),
            SessionState::EditingRecordField { field } => Some((EditTarget::Record, *field)),
            _ => None,
        }
    }
}

/// Validate `input` for `field` and write it into `transaction`.
/// On rejection the transaction is left untouched.
pub fn apply_field_edit(
    transaction: &mut Transaction,
    field: TransactionField,
    input: &str,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    match field {
        TransactionField::Description => {
            transaction.description = validate_description(input)?;
        }
        TransactionField::Amount => {
            transaction.amount = validate_amount(input)?;
        }
        TransactionField::Date => {
            transaction.date = validate_date(input, today)?;
        }
        TransactionField::Category => {
            transaction.category = validate_category(transaction.kind, input)?;
        }
    }
    Ok(())
}

/// `"<Category> (€ <Amount:2dp>), <Description> on <DD-MM-YYYY>"`
pub fn record_summary(transaction: &Transaction) -> String {
    format!(
        "{} ({} {}), {} on {}",
        transaction.category,
        transaction.currency.symbol(),
        format_amount(transaction.amount),
        transaction.description,
        transaction.date.format("%d-%m-%Y")
    )
}

/// The value of `field` as shown next to an edit prompt
pub fn current_value(transaction: &Transaction, field: TransactionField) -> String {
    match field {
        TransactionField::Description => transaction.description.clone(),
        TransactionField::Amount => format_amount(transaction.amount),
        TransactionField::Date => transaction.date.format("%d-%m-%Y").to_string(),
        TransactionField::Category => transaction.category.to_string(),
    }
}

/// The card shown while a draft waits for confirmation
pub fn confirmation_card(transaction: &Transaction) -> String {
    format!("{}. Confirm?", record_summary(transaction))
}

pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

/// Turn a raw extraction result into a draft of `kind` owned by `owner_id`.
///
/// A zero amount means the service found nothing usable in the text and is
/// reported as [`ExtractionError::NothingExtracted`]. An amount the store
/// cannot hold is [`ExtractionError::AmountOutOfRange`].
pub fn normalize_extracted(
    extracted: Transaction,
    kind: TransactionType,
    owner_id: i64,
    today: NaiveDate,
) -> Result<Transaction, ExtractionError> {
    let amount = extracted.amount.abs().round_dp(2);
    if amount.is_zero() {
        return Err(ExtractionError::NothingExtracted);
    }
    if amount > MAX_AMOUNT {
        return Err(ExtractionError::AmountOutOfRange(amount));
    }

    let category = if extracted.category.belongs_to(kind) {
        extracted.category
    } else {
        kind.fallback_category()
    };

    let description = match extracted.description.trim() {
        "" => category.to_string(),
        text => capitalize_first(text),
    };

    let date = if extracted.date > today {
        today
    } else {
        extracted.date
    };

    Ok(Transaction {
        id: None,
        owner_id,
        kind,
        category,
        amount,
        description,
        date,
        currency: DEFAULT_CURRENCY,
    })
}
