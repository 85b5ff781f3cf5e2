//! Per-user conversation state.
//!
//! A [`Session`] is loaded from the user repository on every update, mutated in
//! memory by exactly one handler and written back. There is no locking and no
//! version token: two updates from the same user racing each other resolve as
//! last-writer-wins.

use serde::{Deserialize, Serialize};

use crate::transaction_model::{Transaction, TransactionField, TransactionType};

/// Represents the conversation state of one user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum SessionState {
    /// No pending dialogue
    #[default]
    Idle,
    /// The next free text is parsed as a transaction of `kind`
    AwaitingEntry { kind: TransactionType },
    /// A draft exists and waits for confirm, cancel or a field to edit
    AwaitingConfirmation,
    /// Waiting for the replacement value of one field of the unsaved draft
    EditingDraftField { field: TransactionField },
    /// Waiting for the replacement value of one field of a persisted record
    EditingRecordField { field: TransactionField },
}

impl SessionState {
    /// States in which the session must carry a draft
    pub fn requires_draft(&self) -> bool {
        matches!(
            self,
            SessionState::AwaitingConfirmation
                | SessionState::EditingDraftField { .. }
                | SessionState::EditingRecordField { .. }
        )
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }
}

/// The persisted dialogue of one user
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub state: SessionState,

    /// The unsaved draft, or a copy of the persisted record being edited
    #[serde(default)]
    pub draft: Option<Transaction>,

    /// Last text received, kept for diagnostics only
    #[serde(default)]
    pub last_message: String,
}

impl Session {
    /// Back to `Idle`, destroying any draft
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.draft = None;
    }

    /// Wait for a new free-text entry of `kind`. A draft is kept only when it is
    /// retained for a retry of the same kind.
    pub fn begin_entry(&mut self, kind: TransactionType) {
        self.state = SessionState::AwaitingEntry { kind };
        if self.draft.as_ref().is_some_and(|draft| draft.kind != kind) {
            self.draft = None;
        }
    }

    /// Store a fresh or edited draft and wait for confirmation
    pub fn await_confirmation(&mut self, draft: Transaction) {
        self.state = SessionState::AwaitingConfirmation;
        self.draft = Some(draft);
    }

    /// Persisting the draft failed: go back to entry for the draft's kind and
    /// keep the draft so the same confirm can be retried
    pub fn roll_back_to_entry(&mut self) {
        if let Some(draft) = &self.draft {
            self.state = SessionState::AwaitingEntry { kind: draft.kind };
        }
    }

    pub fn edit_draft_field(&mut self, field: TransactionField) {
        self.state = SessionState::EditingDraftField { field };
    }

    /// Start editing a persisted record; the record is copied into the draft slot.
    /// Only valid when [`Session::confirmable_draft`] is `None`.
    pub fn edit_record_field(&mut self, field: TransactionField, record: Transaction) {
        self.state = SessionState::EditingRecordField { field };
        self.draft = Some(record);
    }

    /// A draft that can be confirmed: the regular confirmation state, a draft
    /// being edited, or a draft retained after a failed save
    pub fn confirmable_draft(&self) -> Option<&Transaction> {
        match self.state {
            SessionState::AwaitingConfirmation
            | SessionState::EditingDraftField { .. }
            | SessionState::AwaitingEntry { .. } => self.draft.as_ref(),
            SessionState::Idle | SessionState::EditingRecordField { .. } => None,
        }
    }

    /// Draft present iff the state requires one. The only tolerated exception
    /// is a draft retained in `AwaitingEntry` after a failed save.
    pub fn is_consistent(&self) -> bool {
        match (&self.state, &self.draft) {
            (SessionState::AwaitingEntry { kind }, Some(draft)) => draft.kind == *kind,
            (state, draft) => state.requires_draft() == draft.is_some(),
        }
    }
}

/// A bot user and the session they own
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Telegram user id
    pub id: i64,
    pub name: String,
    pub session: Session,
}

impl User {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            session: Session::default(),
        }
    }
}

/// Display name from Telegram profile fields: first name, else username
pub fn display_name(first_name: &str, username: Option<&str>) -> String {
    let trimmed = first_name.trim();
    if trimmed.is_empty() {
        username.unwrap_or_default().to_string()
    } else {
        trimmed.to_string()
    }
}
