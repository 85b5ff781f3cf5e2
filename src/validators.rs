//! # Field Validators
//!
//! Pure functions that validate and normalize the text a user types while
//! correcting one field of a transaction. Each returns the normalized value or a
//! [`ValidationError`] describing why the input was rejected.
//!
//! ## Accepted date formats
//!
//! - `dd mm`, `dd-mm`, `dd/mm`, `dd.mm` (current year)
//! - `dd-mm-yy`, `dd-mm-yyyy` and the same with `/`, `.` or spaces
//! - `yyyy-mm-dd`

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::ValidationError;
use crate::transaction_model::{Category, TransactionType, MAX_AMOUNT};

lazy_static! {
    static ref DAY_MONTH_YEAR: Regex =
        Regex::new(r"^(\d{1,2})[\s\-/.]+(\d{1,2})(?:[\s\-/.]+(\d{4}|\d{2}))?$")
            .expect("Day-month pattern should be valid");
    static ref ISO_DATE: Regex =
        Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("ISO date pattern should be valid");
}

/// Trim and capitalize a description. Empty input is rejected.
pub fn validate_description(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyDescription);
    }

    Ok(capitalize_first(trimmed))
}

/// Parse a strictly positive amount, accepting `,` as decimal separator.
/// The result is rounded to two fractional digits and must fit [`MAX_AMOUNT`].
pub fn validate_amount(input: &str) -> Result<Decimal, ValidationError> {
    let normalized = input.trim().replace(',', ".");

    let amount = Decimal::from_str(&normalized)
        .map_err(|_| ValidationError::InvalidAmount(input.trim().to_string()))?
        .round_dp(2);

    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount);
    }

    if amount > MAX_AMOUNT {
        return Err(ValidationError::AmountTooLarge(amount));
    }

    Ok(amount)
}

/// Parse a date and reject anything after `today`
pub fn validate_date(input: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    let date = parse_date(input, today)?;

    if date > today {
        return Err(ValidationError::FutureDate(date));
    }

    Ok(date)
}

/// Exact, case-sensitive category match within the set of `kind`
pub fn validate_category(kind: TransactionType, input: &str) -> Result<Category, ValidationError> {
    Category::parse_for(kind, input).ok_or_else(|| ValidationError::InvalidCategory {
        label: input.to_string(),
        kind,
    })
}

/// Parse day/month[/year] text. A missing year means the year of `today`,
/// a two-digit year is read as 20yy.
pub fn parse_date(input: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    let trimmed = input.trim();
    let invalid = || ValidationError::InvalidDate(trimmed.to_string());

    let (year, month, day) = if let Some(captures) = ISO_DATE.captures(trimmed) {
        (
            parse_number(&captures[1]).ok_or_else(invalid)?,
            parse_number(&captures[2]).ok_or_else(invalid)?,
            parse_number(&captures[3]).ok_or_else(invalid)?,
        )
    } else if let Some(captures) = DAY_MONTH_YEAR.captures(trimmed) {
        let year = match captures.get(3) {
            Some(year) if year.as_str().len() == 2 => {
                2000 + parse_number(year.as_str()).ok_or_else(invalid)?
            }
            Some(year) => parse_number(year.as_str()).ok_or_else(invalid)?,
            None => today.year() as u32,
        };
        (
            year,
            parse_number(&captures[2]).ok_or_else(invalid)?,
            parse_number(&captures[1]).ok_or_else(invalid)?,
        )
    } else {
        return Err(invalid());
    };

    NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(invalid)
}

/// Uppercase the first character, leave the rest untouched
pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn parse_number(digits: &str) -> Option<u32> {
    digits.parse::<u32>().ok()
}
