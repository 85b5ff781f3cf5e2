//! Dialogue Manager module for handling dialogue state transitions
//!
//! Every update runs one load-mutate-save cycle on the sender's session:
//! the session is loaded, exactly one handler mutates it in memory, and it is
//! written back. Handlers return an [`Outcome`] describing the replies; they
//! never talk to Telegram directly.

use chrono::{Local, NaiveDate};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::callback_data::CallbackAction;
use crate::config::AccessPolicy;
use crate::dialogue::User;
use crate::draft_editor::{
    apply_field_edit, confirmation_card, current_value, normalize_extracted, record_summary,
    EditTarget,
};
use crate::errors::{DialogueError, StoreError};
use crate::extraction::ExtractionService;
use crate::localization::{t_args_lang, t_lang};
use crate::repository::{TransactionRepository, UserRepository};
use crate::router::{route_text, Command, TextRoute};
use crate::transaction_model::{Transaction, TransactionField, TransactionType, DEFAULT_CURRENCY};

use super::ui_builder::{
    edit_prompt_key, edit_prompt_keyboard, format_transactions_list, Keyboard, RecordAction, Reply,
};

/// How many records `/list`, `/edit` and `/delete` show
pub const RECENT_LIMIT: i64 = 10;

/// Source of "today" for date validation
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// The Telegram user behind an update
#[derive(Debug, Clone)]
pub struct Sender {
    pub id: i64,
    pub name: String,
    pub language_code: Option<String>,
}

impl Sender {
    pub fn lang(&self) -> Option<&str> {
        self.language_code.as_deref()
    }
}

/// What the transport layer has to deliver for one update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub replies: Vec<Reply>,
    /// Remove the inline keyboard of the message whose button was pressed
    pub strip_source_keyboard: bool,
    /// No handler matched the input
    pub unmatched: bool,
}

impl Outcome {
    fn reply(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            ..Self::default()
        }
    }

    fn replies(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            ..Self::default()
        }
    }

    fn stripping_source(mut self) -> Self {
        self.strip_source_keyboard = true;
        self
    }
}

/// The reply for an error that escaped the handlers
pub fn error_reply(err: &DialogueError, language_code: Option<&str>) -> Reply {
    match err {
        DialogueError::Unauthorized { user_id } => Reply::text(t_args_lang(
            "not-allowed",
            &[("user_id", &user_id.to_string())],
            language_code,
        )),
        DialogueError::SessionDecode { .. } => {
            Reply::with_keyboard(t_lang("session-corrupted", language_code), Keyboard::Home)
        }
        DialogueError::Store(_) => Reply::text(t_lang("error-processing-failed", language_code)),
    }
}

pub struct DialogueManager {
    users: Arc<dyn UserRepository>,
    transactions: Arc<dyn TransactionRepository>,
    extractor: Arc<dyn ExtractionService>,
    access: AccessPolicy,
    clock: Clock,
}

impl DialogueManager {
    pub fn new(
        users: Arc<dyn UserRepository>,
        transactions: Arc<dyn TransactionRepository>,
        extractor: Arc<dyn ExtractionService>,
        access: AccessPolicy,
    ) -> Self {
        Self {
            users,
            transactions,
            extractor,
            access,
            clock: Arc::new(|| Local::now().date_naive()),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    fn authorize(&self, sender: &Sender) -> Result<(), DialogueError> {
        if self.access.is_allowed(sender.id) {
            Ok(())
        } else {
            warn!(user_id = sender.id, "Unauthorized access attempt");
            Err(DialogueError::Unauthorized { user_id: sender.id })
        }
    }

    /// Load the sender's user, creating it on first contact. A session that
    /// cannot be decoded, or whose draft does not match its state, is reported
    /// as [`DialogueError::SessionDecode`].
    async fn load_user(&self, sender: &Sender) -> Result<User, DialogueError> {
        let user = match self.users.load(sender.id).await {
            Ok(Some(mut user)) => {
                if !sender.name.is_empty() && user.name != sender.name {
                    user.name = sender.name.clone();
                }
                user
            }
            Ok(None) => {
                info!(user_id = sender.id, "Creating new user");
                User::new(sender.id, sender.name.clone())
            }
            Err(StoreError::SessionDecode(reason)) => {
                return Err(DialogueError::SessionDecode {
                    user_id: sender.id,
                    reason,
                })
            }
            Err(e) => return Err(e.into()),
        };

        if !user.session.is_consistent() {
            return Err(DialogueError::SessionDecode {
                user_id: sender.id,
                reason: format!(
                    "state {:?} does not match draft presence",
                    user.session.state
                ),
            });
        }

        Ok(user)
    }

    /// Replace a corrupted session with a fresh one so the user is not stuck
    async fn reset_corrupted_session(
        &self,
        sender: &Sender,
        reason: &str,
    ) -> Result<Outcome, DialogueError> {
        error!(user_id = sender.id, reason = %reason, "Session cannot be decoded, resetting it");

        let user = User::new(sender.id, sender.name.clone());
        self.users.save(&user).await?;

        Ok(Outcome::replies(vec![
            Reply::text(t_lang("session-corrupted", sender.lang())),
            Reply::with_keyboard(t_lang("home-menu", sender.lang()), Keyboard::Home),
        ]))
    }

    /// Run `handler` inside one load-mutate-save cycle
    async fn with_session<F, Fut>(&self, sender: &Sender, handler: F) -> Result<Outcome, DialogueError>
    where
        F: FnOnce(User) -> Fut,
        Fut: Future<Output = Result<(User, Outcome), DialogueError>>,
    {
        let user = match self.load_user(sender).await {
            Ok(user) => user,
            Err(DialogueError::SessionDecode { reason, .. }) => {
                return self.reset_corrupted_session(sender, &reason).await
            }
            Err(e) => return Err(e),
        };

        match handler(user).await {
            Ok((user, outcome)) => {
                self.users.save(&user).await?;
                Ok(outcome)
            }
            Err(DialogueError::SessionDecode { reason, .. }) => {
                self.reset_corrupted_session(sender, &reason).await
            }
            Err(e) => Err(e),
        }
    }

    /// Handle one inbound text message
    pub async fn handle_text(&self, sender: &Sender, text: &str) -> Result<Outcome, DialogueError> {
        self.authorize(sender)?;

        self.with_session(sender, |mut user| async move {
            user.session.last_message = text.to_string();
            let route = route_text(&user.session.state, text);
            debug!(user_id = sender.id, route = ?route, "Routing text message");

            let outcome = match route {
                TextRoute::Cancel | TextRoute::Command(Command::Cancel) => {
                    self.cancel(&mut user, sender)
                }
                TextRoute::Command(Command::Start) => self.start(&mut user, sender),
                TextRoute::Command(Command::Help) => self.help(sender),
                TextRoute::Command(Command::List) => self.list(sender).await?,
                TextRoute::Command(Command::Edit) => {
                    self.pick_record(sender, RecordAction::Edit).await?
                }
                TextRoute::Command(Command::Delete) => {
                    self.pick_record(sender, RecordAction::Delete).await?
                }
                TextRoute::CaptureEntry(kind) => {
                    self.capture_entry(&mut user, sender, kind, text).await
                }
                TextRoute::EditDraftField(field) => {
                    self.field_input(&mut user, sender, EditTarget::Draft, field, text)
                        .await?
                }
                TextRoute::EditRecordField(field) => {
                    self.field_input(&mut user, sender, EditTarget::Record, field, text)
                        .await?
                }
                TextRoute::ImplicitExpense => {
                    debug!(user_id = sender.id, "Treating message as an implicit expense");
                    user.session.begin_entry(TransactionType::Expense);
                    self.capture_entry(&mut user, sender, TransactionType::Expense, text)
                        .await
                }
                TextRoute::Unmatched => {
                    warn!(
                        user_id = sender.id,
                        state = ?user.session.state,
                        "No matching top-level state for text message"
                    );
                    let mut outcome = Outcome::reply(Reply::with_keyboard(
                        format!(
                            "{}\n\n{}",
                            t_lang("unknown-input", sender.lang()),
                            t_lang("help", sender.lang())
                        ),
                        Keyboard::Home,
                    ));
                    outcome.unmatched = true;
                    outcome
                }
            };

            Ok((user, outcome))
        })
        .await
    }

    /// Handle one inline button press
    pub async fn handle_callback(
        &self,
        sender: &Sender,
        data: &str,
    ) -> Result<Outcome, DialogueError> {
        self.authorize(sender)?;

        let action: CallbackAction = match data.parse() {
            Ok(action) => action,
            Err(e) => {
                warn!(user_id = sender.id, error = %e, "Rejected callback payload");
                let mut outcome = Outcome::reply(Reply::text(t_lang("invalid-action", sender.lang())))
                    .stripping_source();
                outcome.unmatched = true;
                return Ok(outcome);
            }
        };
        debug!(user_id = sender.id, action = ?action, "Handling callback");

        self.with_session(sender, |mut user| async move {
            let outcome = match action {
                CallbackAction::AddIntent(kind) => self.add_intent(&mut user, sender, kind),
                CallbackAction::EditDraft(field) => self.edit_draft_intent(&mut user, sender, field),
                CallbackAction::Confirm => self.confirm(&mut user, sender).await,
                CallbackAction::Cancel => self.cancel(&mut user, sender),
                CallbackAction::SelectRecord(id) => self.select_record(sender, id).await?,
                CallbackAction::EditRecord { field, id } => {
                    self.edit_record_intent(&mut user, sender, field, id).await?
                }
                CallbackAction::SelectDelete(id) => self.select_delete(sender, id).await?,
                CallbackAction::ConfirmDelete(id) => self.confirm_delete(sender, id).await,
            };
            Ok((user, outcome))
        })
        .await
    }

    fn start(&self, user: &mut User, sender: &Sender) -> Outcome {
        user.session.reset();
        Outcome::reply(Reply::with_keyboard(
            t_args_lang("welcome", &[("name", &user.name)], sender.lang()),
            Keyboard::Home,
        ))
    }

    fn help(&self, sender: &Sender) -> Outcome {
        Outcome::replies(vec![
            Reply::text(t_lang("help", sender.lang())),
            Reply::with_keyboard(t_lang("home-menu", sender.lang()), Keyboard::Home),
        ])
    }

    /// Back to `Idle` from any state; the home menu is always re-sent
    fn cancel(&self, user: &mut User, sender: &Sender) -> Outcome {
        debug!(user_id = sender.id, state = ?user.session.state, "Cancelling dialogue");
        user.session.reset();

        Outcome::replies(vec![
            Reply::with_keyboard(t_lang("cancelled", sender.lang()), Keyboard::Remove),
            Reply::with_keyboard(t_lang("home-menu", sender.lang()), Keyboard::Home),
        ])
        .stripping_source()
    }

    fn add_intent(&self, user: &mut User, sender: &Sender, kind: TransactionType) -> Outcome {
        user.session.reset();
        user.session.begin_entry(kind);

        let key = match kind {
            TransactionType::Income => "intent-prompt-income",
            TransactionType::Expense => "intent-prompt-expense",
        };
        Outcome::reply(Reply::with_keyboard(
            t_lang(key, sender.lang()),
            Keyboard::CancelOnly,
        ))
        .stripping_source()
    }

    /// Turn free text into a draft. Any failure leaves the state unchanged so
    /// the user can simply retype.
    async fn capture_entry(
        &self,
        user: &mut User,
        sender: &Sender,
        kind: TransactionType,
        text: &str,
    ) -> Outcome {
        let today = self.today();
        let draft = match self.extractor.extract(text, kind).await {
            Ok(raw) => normalize_extracted(raw, kind, sender.id, today),
            Err(e) => Err(e),
        };

        match draft {
            Ok(draft) => {
                info!(user_id = sender.id, kind = %kind, "Draft extracted");
                let card = confirmation_card(&draft);
                user.session.await_confirmation(draft);
                Outcome::reply(Reply::with_keyboard(card, Keyboard::ConfirmCard))
            }
            Err(e) => {
                warn!(user_id = sender.id, error = %e, "Extraction failed");
                Outcome::reply(Reply::with_keyboard(
                    t_lang("extraction-failed", sender.lang()),
                    Keyboard::CancelOnly,
                ))
            }
        }
    }

    /// Persist the pending draft. On failure the draft is kept and the session
    /// rolls back to entry of the draft's kind so Confirm can be retried.
    async fn confirm(&self, user: &mut User, sender: &Sender) -> Outcome {
        let Some(draft) = user.session.confirmable_draft().cloned() else {
            debug!(user_id = sender.id, "Confirm pressed without a pending draft");
            return Outcome::replies(vec![
                Reply::text(t_lang("nothing-pending", sender.lang())),
                Reply::with_keyboard(t_lang("home-menu", sender.lang()), Keyboard::Home),
            ])
            .stripping_source();
        };

        let mut record = draft;
        record.id = None;
        record.owner_id = sender.id;
        record.currency = DEFAULT_CURRENCY;

        match self.transactions.add(&record).await {
            Ok(id) => {
                info!(user_id = sender.id, transaction_id = id, "Transaction saved");
                user.session.reset();

                let key = match record.kind {
                    TransactionType::Income => "saved-income",
                    TransactionType::Expense => "saved-expense",
                };
                let summary = record_summary(&record);
                Outcome::replies(vec![
                    Reply::text(t_args_lang(key, &[("summary", &summary)], sender.lang())),
                    Reply::with_keyboard(t_lang("home-menu", sender.lang()), Keyboard::Home),
                ])
                .stripping_source()
            }
            Err(e) => {
                error!(user_id = sender.id, error = %e, "Failed to save transaction");
                user.session.roll_back_to_entry();

                Outcome::replies(vec![
                    Reply::text(t_lang("confirm-failed", sender.lang())),
                    Reply::with_keyboard(confirmation_card(&record), Keyboard::ConfirmCard),
                ])
                .stripping_source()
            }
        }
    }

    /// Ask for a new value of `field`, showing the value it has now
    fn field_prompt(&self, sender: &Sender, field: TransactionField, current: &Transaction) -> Reply {
        Reply::with_keyboard(
            t_args_lang(
                edit_prompt_key(field),
                &[("current", &current_value(current, field))],
                sender.lang(),
            ),
            edit_prompt_keyboard(field, current.kind),
        )
    }

    fn edit_draft_intent(&self, user: &mut User, sender: &Sender, field: TransactionField) -> Outcome {
        let Some(draft) = user.session.confirmable_draft().cloned() else {
            return Outcome::replies(vec![
                Reply::text(t_lang("nothing-pending", sender.lang())),
                Reply::with_keyboard(t_lang("home-menu", sender.lang()), Keyboard::Home),
            ])
            .stripping_source();
        };

        user.session.edit_draft_field(field);
        Outcome::reply(self.field_prompt(sender, field, &draft))
    }

    /// Apply typed text to the field being edited, on the draft or on a
    /// persisted record. A rejected value reprompts and keeps the state.
    async fn field_input(
        &self,
        user: &mut User,
        sender: &Sender,
        target: EditTarget,
        field: TransactionField,
        text: &str,
    ) -> Result<Outcome, DialogueError> {
        let Some(mut edited) = user.session.draft.clone() else {
            return Err(DialogueError::SessionDecode {
                user_id: sender.id,
                reason: format!("editing {field} without a draft"),
            });
        };

        if let Err(e) = apply_field_edit(&mut edited, field, text, self.today()) {
            debug!(user_id = sender.id, field = %field, error = %e, "Field value rejected");
            return Ok(Outcome::reply(Reply::with_keyboard(
                t_lang(e.message_key(), sender.lang()),
                edit_prompt_keyboard(field, edited.kind),
            )));
        }

        let outcome = match target {
            EditTarget::Draft => {
                let card = confirmation_card(&edited);
                user.session.await_confirmation(edited);
                Outcome::reply(Reply::with_keyboard(card, Keyboard::ConfirmCard))
            }
            EditTarget::Record => match self.transactions.update(&edited).await {
                Ok(true) => {
                    info!(user_id = sender.id, transaction_id = ?edited.id, field = %field, "Transaction updated");
                    user.session.reset();
                    let summary = record_summary(&edited);
                    Outcome::replies(vec![
                        Reply::with_keyboard(
                            t_args_lang("record-updated", &[("summary", &summary)], sender.lang()),
                            Keyboard::Remove,
                        ),
                        Reply::with_keyboard(t_lang("home-menu", sender.lang()), Keyboard::Home),
                    ])
                }
                Ok(false) => {
                    user.session.reset();
                    Outcome::replies(vec![
                        Reply::with_keyboard(
                            t_lang("record-not-found", sender.lang()),
                            Keyboard::Remove,
                        ),
                        Reply::with_keyboard(t_lang("home-menu", sender.lang()), Keyboard::Home),
                    ])
                }
                Err(e) => {
                    error!(user_id = sender.id, error = %e, "Failed to update transaction");
                    Outcome::reply(Reply::with_keyboard(
                        t_lang("record-update-failed", sender.lang()),
                        edit_prompt_keyboard(field, edited.kind),
                    ))
                }
            },
        };

        Ok(outcome)
    }

    async fn list(&self, sender: &Sender) -> Result<Outcome, DialogueError> {
        let records = self
            .transactions
            .list_recent(sender.id, 0, RECENT_LIMIT)
            .await?;

        if records.is_empty() {
            return Ok(Outcome::reply(Reply::with_keyboard(
                t_lang("no-records", sender.lang()),
                Keyboard::Home,
            )));
        }

        Ok(Outcome::reply(Reply::text(format!(
            "{}\n{}",
            t_lang("list-title", sender.lang()),
            format_transactions_list(&records)
        ))))
    }

    async fn pick_record(
        &self,
        sender: &Sender,
        action: RecordAction,
    ) -> Result<Outcome, DialogueError> {
        let records = self
            .transactions
            .list_recent(sender.id, 0, RECENT_LIMIT)
            .await?;

        if records.is_empty() {
            return Ok(Outcome::reply(Reply::with_keyboard(
                t_lang("no-records", sender.lang()),
                Keyboard::Home,
            )));
        }

        let key = match action {
            RecordAction::Edit => "select-record-edit",
            RecordAction::Delete => "select-record-delete",
        };
        Ok(Outcome::reply(Reply::with_keyboard(
            t_lang(key, sender.lang()),
            Keyboard::RecordPicker { action, records },
        )))
    }

    fn record_not_found(&self, sender: &Sender) -> Outcome {
        Outcome::replies(vec![
            Reply::text(t_lang("record-not-found", sender.lang())),
            Reply::with_keyboard(t_lang("home-menu", sender.lang()), Keyboard::Home),
        ])
        .stripping_source()
    }

    async fn select_record(&self, sender: &Sender, id: i64) -> Result<Outcome, DialogueError> {
        let Some(record) = self.transactions.get(id, sender.id).await? else {
            return Ok(self.record_not_found(sender));
        };

        Ok(Outcome::reply(Reply::with_keyboard(
            t_args_lang(
                "record-fields",
                &[("summary", &record_summary(&record))],
                sender.lang(),
            ),
            Keyboard::RecordFields(id),
        ))
        .stripping_source())
    }

    /// Enter `EditingRecordField` with a copy of the persisted record. An
    /// unsaved draft must be confirmed or cancelled first.
    async fn edit_record_intent(
        &self,
        user: &mut User,
        sender: &Sender,
        field: TransactionField,
        id: i64,
    ) -> Result<Outcome, DialogueError> {
        if let Some(draft) = user.session.confirmable_draft() {
            debug!(user_id = sender.id, transaction_id = id, "Record edit refused, a draft is pending");
            return Ok(Outcome::replies(vec![
                Reply::text(t_lang("finish-pending-entry", sender.lang())),
                Reply::with_keyboard(confirmation_card(draft), Keyboard::ConfirmCard),
            ]));
        }

        let Some(record) = self.transactions.get(id, sender.id).await? else {
            return Ok(self.record_not_found(sender));
        };

        let outcome = Outcome::reply(self.field_prompt(sender, field, &record));
        user.session.edit_record_field(field, record);

        Ok(outcome)
    }

    async fn select_delete(&self, sender: &Sender, id: i64) -> Result<Outcome, DialogueError> {
        let Some(record) = self.transactions.get(id, sender.id).await? else {
            return Ok(self.record_not_found(sender));
        };

        Ok(Outcome::reply(Reply::with_keyboard(
            t_args_lang(
                "delete-confirm-prompt",
                &[("summary", &record_summary(&record))],
                sender.lang(),
            ),
            Keyboard::DeleteConfirm(id),
        ))
        .stripping_source())
    }

    async fn confirm_delete(&self, sender: &Sender, id: i64) -> Outcome {
        let record = match self.transactions.get(id, sender.id).await {
            Ok(Some(record)) => record,
            Ok(None) => return self.record_not_found(sender),
            Err(e) => {
                error!(user_id = sender.id, error = %e, "Failed to load transaction for deletion");
                return Outcome::reply(Reply::text(t_lang("record-delete-failed", sender.lang())))
                    .stripping_source();
            }
        };

        match self.transactions.delete(id, sender.id).await {
            Ok(true) => {
                info!(user_id = sender.id, transaction_id = id, "Transaction deleted");
                let summary = record_summary(&record);
                Outcome::replies(vec![
                    Reply::text(t_args_lang("record-deleted", &[("summary", &summary)], sender.lang())),
                    Reply::with_keyboard(t_lang("home-menu", sender.lang()), Keyboard::Home),
                ])
                .stripping_source()
            }
            Ok(false) => self.record_not_found(sender),
            Err(e) => {
                error!(user_id = sender.id, error = %e, "Failed to delete transaction");
                Outcome::reply(Reply::text(t_lang("record-delete-failed", sender.lang())))
                    .stripping_source()
            }
        }
    }
}
