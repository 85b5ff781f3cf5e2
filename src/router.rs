//! Message routing.
//!
//! Resolves an inbound text message against the user's current session state to
//! exactly one route. The resolution order is fixed:
//!
//! 1. the `cancel` keyword (trimmed, case-insensitive), from any state
//! 2. slash commands
//! 3. the handler bound to the current state
//! 4. in `Idle`, any text containing a digit is an implicit expense entry
//! 5. otherwise nothing matched

use crate::dialogue::SessionState;
use crate::transaction_model::{TransactionField, TransactionType};

/// Bot commands users can type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Cancel,
    List,
    Edit,
    Delete,
}

impl Command {
    /// Parse `/name` or `/name@botname`, ignoring any arguments
    pub fn parse(text: &str) -> Option<Command> {
        let token = text.split_whitespace().next()?;
        let name = token.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);

        match name.to_lowercase().as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "cancel" => Some(Command::Cancel),
            "list" => Some(Command::List),
            "edit" => Some(Command::Edit),
            "delete" => Some(Command::Delete),
            _ => None,
        }
    }
}

/// The single handler selected for a text message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRoute {
    Cancel,
    Command(Command),
    CaptureEntry(TransactionType),
    EditDraftField(TransactionField),
    EditRecordField(TransactionField),
    /// Switch to expense entry and extract from the same text
    ImplicitExpense,
    /// No top-level state matched; the caller shows help and logs the miss
    Unmatched,
}

pub fn is_cancel_keyword(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("cancel")
}

/// Crude implicit-entry heuristic: at least one decimal digit
pub fn contains_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}

pub fn route_text(state: &SessionState, text: &str) -> TextRoute {
    if is_cancel_keyword(text) {
        return TextRoute::Cancel;
    }

    if let Some(command) = Command::parse(text) {
        return TextRoute::Command(command);
    }

    match state {
        SessionState::AwaitingEntry { kind } => return TextRoute::CaptureEntry(*kind),
        SessionState::EditingDraftField { field } => return TextRoute::EditDraftField(*field),
        SessionState::EditingRecordField { field } => return TextRoute::EditRecordField(*field),
        SessionState::Idle | SessionState::AwaitingConfirmation => {}
    }

    if state.is_idle() && contains_digit(text) {
        return TextRoute::ImplicitExpense;
    }

    TextRoute::Unmatched
}
