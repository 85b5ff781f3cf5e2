//! Inline button payloads.
//!
//! Payloads are dot-delimited `namespace.action[.field][.id]` strings. They are
//! decoded once at the boundary into [`CallbackAction`]; any combination not
//! listed here is rejected with a [`CallbackParseError`].

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::transaction_model::{TransactionField, TransactionType};

const ADD_NAMESPACE: &str = "addtransaction";
const DRAFT_NAMESPACE: &str = "transactions";
const EDIT_NAMESPACE: &str = "edittransactions";
const DELETE_NAMESPACE: &str = "deletetransactions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// `addtransaction.intent.<income|expense>`
    AddIntent(TransactionType),
    /// `transactions.edit.<field>`
    EditDraft(TransactionField),
    /// `transactions.confirm`
    Confirm,
    /// `transactions.cancel`
    Cancel,
    /// `edittransactions.select.<id>`
    SelectRecord(i64),
    /// `edittransactions.edit.<field>.<id>`
    EditRecord { field: TransactionField, id: i64 },
    /// `deletetransactions.select.<id>`
    SelectDelete(i64),
    /// `deletetransactions.confirm.<id>`
    ConfirmDelete(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackParseError {
    #[error("unknown callback payload: {0}")]
    Unknown(String),

    #[error("invalid argument in callback payload: {0}")]
    InvalidArgument(String),
}

impl FromStr for CallbackAction {
    type Err = CallbackParseError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = data.split('.').collect();
        let invalid = || CallbackParseError::InvalidArgument(data.to_string());

        let action = match parts.as_slice() {
            [ADD_NAMESPACE, "intent", kind] => {
                CallbackAction::AddIntent(kind.parse().map_err(|_| invalid())?)
            }
            [DRAFT_NAMESPACE, "edit", field] => {
                CallbackAction::EditDraft(field.parse().map_err(|_| invalid())?)
            }
            [DRAFT_NAMESPACE, "confirm"] => CallbackAction::Confirm,
            [DRAFT_NAMESPACE, "cancel"] => CallbackAction::Cancel,
            [EDIT_NAMESPACE, "select", id] => {
                CallbackAction::SelectRecord(id.parse().map_err(|_| invalid())?)
            }
            [EDIT_NAMESPACE, "edit", field, id] => CallbackAction::EditRecord {
                field: field.parse().map_err(|_| invalid())?,
                id: id.parse().map_err(|_| invalid())?,
            },
            [DELETE_NAMESPACE, "select", id] => {
                CallbackAction::SelectDelete(id.parse().map_err(|_| invalid())?)
            }
            [DELETE_NAMESPACE, "confirm", id] => {
                CallbackAction::ConfirmDelete(id.parse().map_err(|_| invalid())?)
            }
            _ => return Err(CallbackParseError::Unknown(data.to_string())),
        };

        Ok(action)
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::AddIntent(kind) => write!(f, "{ADD_NAMESPACE}.intent.{kind}"),
            CallbackAction::EditDraft(field) => write!(f, "{DRAFT_NAMESPACE}.edit.{field}"),
            CallbackAction::Confirm => write!(f, "{DRAFT_NAMESPACE}.confirm"),
            CallbackAction::Cancel => write!(f, "{DRAFT_NAMESPACE}.cancel"),
            CallbackAction::SelectRecord(id) => write!(f, "{EDIT_NAMESPACE}.select.{id}"),
            CallbackAction::EditRecord { field, id } => {
                write!(f, "{EDIT_NAMESPACE}.edit.{field}.{id}")
            }
            CallbackAction::SelectDelete(id) => write!(f, "{DELETE_NAMESPACE}.select.{id}"),
            CallbackAction::ConfirmDelete(id) => write!(f, "{DELETE_NAMESPACE}.confirm.{id}"),
        }
    }
}
