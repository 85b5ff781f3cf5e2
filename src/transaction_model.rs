//! # Transaction Data Model
//!
//! This module defines the financial record the bot collects from users:
//! its kind (income or expense), the closed category sets bound to each kind,
//! and the editable fields a user can correct before or after saving.
//!
//! ## Usage
//!
//! ```rust
//! use cashout::transaction_model::{Category, TransactionType};
//!
//! assert_eq!(Category::parse_for(TransactionType::Expense, "Grocery"), Some(Category::Grocery));
//! assert_eq!(Category::parse_for(TransactionType::Income, "Grocery"), None);
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether money came in or went out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    /// The category used when nothing more specific applies
    pub fn fallback_category(&self) -> Category {
        match self {
            TransactionType::Income => Category::OtherIncomes,
            TransactionType::Expense => Category::OtherExpenses,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// Transaction category. Each category belongs to exactly one [`TransactionType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    // Income
    Salary,
    OtherIncomes,
    // Expense
    Car,
    Clothes,
    Grocery,
    House,
    Bills,
    Entertainment,
    Sport,
    EatingOut,
    Transport,
    Learning,
    Toiletry,
    Health,
    Tech,
    Gifts,
    Travel,
    Pets,
    OtherExpenses,
}

const INCOME_CATEGORIES: &[Category] = &[Category::Salary, Category::OtherIncomes];

const EXPENSE_CATEGORIES: &[Category] = &[
    Category::Car,
    Category::Clothes,
    Category::Grocery,
    Category::House,
    Category::Bills,
    Category::Entertainment,
    Category::Sport,
    Category::EatingOut,
    Category::Transport,
    Category::Learning,
    Category::Toiletry,
    Category::Health,
    Category::Tech,
    Category::Gifts,
    Category::Travel,
    Category::Pets,
    Category::OtherExpenses,
];

impl Category {
    /// The closed category set for a transaction type, in display order
    pub fn for_type(kind: TransactionType) -> &'static [Category] {
        match kind {
            TransactionType::Income => INCOME_CATEGORIES,
            TransactionType::Expense => EXPENSE_CATEGORIES,
        }
    }

    pub fn transaction_type(&self) -> TransactionType {
        if INCOME_CATEGORIES.contains(self) {
            TransactionType::Income
        } else {
            TransactionType::Expense
        }
    }

    pub fn belongs_to(&self, kind: TransactionType) -> bool {
        self.transaction_type() == kind
    }

    /// Exact, case-sensitive match against the set of `kind`.
    /// Labels from the other kind's set are rejected.
    pub fn parse_for(kind: TransactionType, label: &str) -> Option<Category> {
        Category::for_type(kind)
            .iter()
            .copied()
            .find(|category| category.as_str() == label)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Salary => "Salary",
            Category::OtherIncomes => "OtherIncomes",
            Category::Car => "Car",
            Category::Clothes => "Clothes",
            Category::Grocery => "Grocery",
            Category::House => "House",
            Category::Bills => "Bills",
            Category::Entertainment => "Entertainment",
            Category::Sport => "Sport",
            Category::EatingOut => "EatingOut",
            Category::Transport => "Transport",
            Category::Learning => "Learning",
            Category::Toiletry => "Toiletry",
            Category::Health => "Health",
            Category::Tech => "Tech",
            Category::Gifts => "Gifts",
            Category::Travel => "Travel",
            Category::Pets => "Pets",
            Category::OtherExpenses => "OtherExpenses",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::parse_for(TransactionType::Income, s)
            .or_else(|| Category::parse_for(TransactionType::Expense, s))
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// Currency of every record. Only one is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "EUR")]
    Eur,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Eur => "€",
        }
    }
}

/// The fixed currency stamped on every saved transaction
pub const DEFAULT_CURRENCY: Currency = Currency::Eur;

/// Largest amount the `NUMERIC(12, 2)` amount column can hold: 9 999 999 999.99
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// A user-editable field of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionField {
    Description,
    Amount,
    Date,
    Category,
}

impl TransactionField {
    pub const ALL: [TransactionField; 4] = [
        TransactionField::Description,
        TransactionField::Category,
        TransactionField::Date,
        TransactionField::Amount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionField::Description => "description",
            TransactionField::Amount => "amount",
            TransactionField::Date => "date",
            TransactionField::Category => "category",
        }
    }
}

impl fmt::Display for TransactionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "description" => Ok(TransactionField::Description),
            "amount" => Ok(TransactionField::Amount),
            "date" => Ok(TransactionField::Date),
            "category" => Ok(TransactionField::Category),
            other => Err(format!("unknown field: {other}")),
        }
    }
}

/// A financial record, either an unsaved draft or a persisted row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Database id, `None` until the record is persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Telegram id of the owner
    pub owner_id: i64,

    #[serde(rename = "type")]
    pub kind: TransactionType,

    pub category: Category,

    /// Always carried with two fractional digits
    pub amount: Decimal,

    pub description: String,

    pub date: NaiveDate,

    #[serde(default)]
    pub currency: Currency,
}
