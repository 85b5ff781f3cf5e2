//! End-to-end dialogue tests against in-memory storage and a stub extractor.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cashout::bot::{DialogueManager, Keyboard, Sender};
use cashout::config::AccessPolicy;
use cashout::dialogue::{Session, SessionState, User};
use cashout::errors::{DialogueError, ExtractionError, StoreError};
use cashout::extraction::ExtractionService;
use cashout::repository::{
    InMemTransactionRepository, InMemUserRepository, TransactionRepository, UserRepository,
};
use cashout::transaction_model::{Category, Currency, Transaction, TransactionField, TransactionType};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn anna() -> Sender {
    Sender {
        id: 42,
        name: "Anna".to_string(),
        language_code: Some("en".to_string()),
    }
}

/// Answers every extraction with the same fields and records the calls
struct StubExtractor {
    response: Option<(Category, Decimal, &'static str)>,
    calls: Mutex<Vec<(String, TransactionType)>>,
}

impl StubExtractor {
    fn returning(category: Category, amount: Decimal, description: &'static str) -> Self {
        Self {
            response: Some((category, amount, description)),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            response: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, TransactionType)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionService for StubExtractor {
    async fn extract(
        &self,
        text: &str,
        kind: TransactionType,
    ) -> Result<Transaction, ExtractionError> {
        self.calls.lock().unwrap().push((text.to_string(), kind));

        let (category, amount, description) = self
            .response
            .ok_or_else(|| ExtractionError::UnexpectedResponse("service unavailable".into()))?;

        Ok(Transaction {
            id: None,
            owner_id: 0,
            kind,
            category,
            amount,
            description: description.to_string(),
            date: today(),
            currency: Currency::Eur,
        })
    }
}

/// In-memory transactions whose next insert or update can be made to fail
#[derive(Default)]
struct FlakyTransactions {
    inner: InMemTransactionRepository,
    fail_next_add: AtomicBool,
    fail_next_update: AtomicBool,
}

#[async_trait]
impl TransactionRepository for FlakyTransactions {
    async fn add(&self, transaction: &Transaction) -> Result<i64, StoreError> {
        if self.fail_next_add.swap(false, Ordering::SeqCst) {
            return Err(StoreError::InvalidRow("simulated outage".to_string()));
        }
        self.inner.add(transaction).await
    }

    async fn get(&self, id: i64, owner_id: i64) -> Result<Option<Transaction>, StoreError> {
        self.inner.get(id, owner_id).await
    }

    async fn update(&self, transaction: &Transaction) -> Result<bool, StoreError> {
        if self.fail_next_update.swap(false, Ordering::SeqCst) {
            return Err(StoreError::InvalidRow("simulated outage".to_string()));
        }
        self.inner.update(transaction).await
    }

    async fn delete(&self, id: i64, owner_id: i64) -> Result<bool, StoreError> {
        self.inner.delete(id, owner_id).await
    }

    async fn list_recent(
        &self,
        owner_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.inner.list_recent(owner_id, offset, limit).await
    }
}

struct Harness {
    manager: DialogueManager,
    users: Arc<InMemUserRepository>,
    transactions: Arc<FlakyTransactions>,
    extractor: Arc<StubExtractor>,
}

impl Harness {
    fn new(extractor: StubExtractor) -> Self {
        Self::with_access(extractor, AccessPolicy::allow_all())
    }

    fn with_access(extractor: StubExtractor, access: AccessPolicy) -> Self {
        let users = Arc::new(InMemUserRepository::new());
        let transactions = Arc::new(FlakyTransactions::default());
        let extractor = Arc::new(extractor);

        let manager = DialogueManager::new(
            users.clone(),
            transactions.clone(),
            extractor.clone(),
            access,
        )
        .with_clock(today);

        Self {
            manager,
            users,
            transactions,
            extractor,
        }
    }

    fn bread() -> Self {
        Self::new(StubExtractor::returning(
            Category::Grocery,
            Decimal::new(5, 0),
            "Bread",
        ))
    }

    async fn session(&self) -> Session {
        self.users
            .load(anna().id)
            .await
            .unwrap()
            .expect("user should exist")
            .session
    }

    /// Expense intent followed by the bread entry
    async fn draft_bread(&self) -> Result<()> {
        self.manager
            .handle_callback(&anna(), "addtransaction.intent.expense")
            .await?;
        self.manager
            .handle_text(&anna(), "bread 5 euro grocery")
            .await?;
        Ok(())
    }

    /// Draft and confirm the bread entry, returning the saved id
    async fn saved_bread(&self) -> Result<i64> {
        self.draft_bread().await?;
        self.manager
            .handle_callback(&anna(), "transactions.confirm")
            .await?;
        let saved = self.transactions.list_recent(anna().id, 0, 1).await?;
        Ok(saved[0].id.expect("saved transaction should have an id"))
    }
}

#[tokio::test]
async fn test_expense_entry_renders_confirmation_card() -> Result<()> {
    let harness = Harness::bread();

    let outcome = harness
        .manager
        .handle_callback(&anna(), "addtransaction.intent.expense")
        .await?;
    assert_eq!(outcome.replies[0].keyboard, Keyboard::CancelOnly);
    assert_eq!(
        harness.session().await.state,
        SessionState::AwaitingEntry {
            kind: TransactionType::Expense
        }
    );

    let outcome = harness
        .manager
        .handle_text(&anna(), "bread 5 euro grocery")
        .await?;

    assert_eq!(outcome.replies.len(), 1);
    assert_eq!(
        outcome.replies[0].text,
        "Grocery (€ 5.00), Bread on 15-06-2024. Confirm?"
    );
    assert_eq!(outcome.replies[0].keyboard, Keyboard::ConfirmCard);

    let session = harness.session().await;
    assert_eq!(session.state, SessionState::AwaitingConfirmation);
    let draft = session.draft.expect("draft should be stored");
    assert_eq!(draft.owner_id, 42);
    assert_eq!(draft.kind, TransactionType::Expense);
    assert_eq!(
        harness.extractor.calls(),
        vec![("bread 5 euro grocery".to_string(), TransactionType::Expense)]
    );

    Ok(())
}

#[tokio::test]
async fn test_amount_edit_rerenders_card() -> Result<()> {
    let harness = Harness::bread();
    harness.draft_bread().await?;

    let outcome = harness
        .manager
        .handle_callback(&anna(), "transactions.edit.amount")
        .await?;
    assert_eq!(outcome.replies[0].keyboard, Keyboard::CancelOnly);
    assert_eq!(
        outcome.replies[0].text,
        "Send the new amount, for example 12,50.\nCurrent: 5.00 €"
    );
    assert_eq!(
        harness.session().await.state,
        SessionState::EditingDraftField {
            field: TransactionField::Amount
        }
    );

    let outcome = harness.manager.handle_text(&anna(), "7,5").await?;
    assert_eq!(
        outcome.replies[0].text,
        "Grocery (€ 7.50), Bread on 15-06-2024. Confirm?"
    );

    let session = harness.session().await;
    assert_eq!(session.state, SessionState::AwaitingConfirmation);
    assert_eq!(session.draft.unwrap().amount, Decimal::new(750, 2));

    Ok(())
}

#[tokio::test]
async fn test_rejected_edit_keeps_state() -> Result<()> {
    let harness = Harness::bread();
    harness.draft_bread().await?;

    harness
        .manager
        .handle_callback(&anna(), "transactions.edit.amount")
        .await?;
    for bad in ["0", "-3", "abc", "99999999999"] {
        let outcome = harness.manager.handle_text(&anna(), bad).await?;
        assert_eq!(outcome.replies[0].keyboard, Keyboard::CancelOnly);
        let session = harness.session().await;
        assert_eq!(
            session.state,
            SessionState::EditingDraftField {
                field: TransactionField::Amount
            }
        );
        assert_eq!(session.draft.unwrap().amount, Decimal::new(5, 0));
    }

    let outcome = harness.manager.handle_text(&anna(), "12345678901,5").await?;
    assert!(outcome.replies[0].text.starts_with("That amount is too large"));

    Ok(())
}

#[tokio::test]
async fn test_category_edit_offers_type_scoped_picker() -> Result<()> {
    let harness = Harness::bread();
    harness.draft_bread().await?;

    let outcome = harness
        .manager
        .handle_callback(&anna(), "transactions.edit.category")
        .await?;
    assert_eq!(
        outcome.replies[0].keyboard,
        Keyboard::CategoryPicker(TransactionType::Expense)
    );

    // Income category on an expense draft
    let outcome = harness.manager.handle_text(&anna(), "Salary").await?;
    assert_eq!(
        outcome.replies[0].keyboard,
        Keyboard::CategoryPicker(TransactionType::Expense)
    );
    assert_eq!(
        harness.session().await.state,
        SessionState::EditingDraftField {
            field: TransactionField::Category
        }
    );

    let outcome = harness.manager.handle_text(&anna(), "EatingOut").await?;
    assert_eq!(
        outcome.replies[0].text,
        "EatingOut (€ 5.00), Bread on 15-06-2024. Confirm?"
    );

    Ok(())
}

#[tokio::test]
async fn test_failed_save_keeps_draft_for_retry() -> Result<()> {
    let harness = Harness::bread();
    harness.draft_bread().await?;

    harness.transactions.fail_next_add.store(true, Ordering::SeqCst);
    let outcome = harness
        .manager
        .handle_callback(&anna(), "transactions.confirm")
        .await?;

    assert!(outcome.replies[0].text.contains("could not be saved"));
    assert_eq!(outcome.replies[1].keyboard, Keyboard::ConfirmCard);

    let session = harness.session().await;
    assert_eq!(
        session.state,
        SessionState::AwaitingEntry {
            kind: TransactionType::Expense
        }
    );
    assert!(session.draft.is_some());
    assert!(harness.transactions.list_recent(42, 0, 10).await?.is_empty());

    // Storage has recovered, the same confirm now succeeds
    let outcome = harness
        .manager
        .handle_callback(&anna(), "transactions.confirm")
        .await?;

    assert!(outcome.strip_source_keyboard);
    assert_eq!(
        outcome.replies[0].text,
        "💸 Expense saved: Grocery (€ 5.00), Bread on 15-06-2024"
    );
    assert_eq!(outcome.replies[1].keyboard, Keyboard::Home);

    let session = harness.session().await;
    assert_eq!(session.state, SessionState::Idle);
    assert!(session.draft.is_none());

    let saved = harness.transactions.list_recent(42, 0, 10).await?;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].owner_id, 42);
    assert_eq!(saved[0].currency, Currency::Eur);

    Ok(())
}

#[tokio::test]
async fn test_digits_from_idle_start_an_implicit_expense() -> Result<()> {
    let harness = Harness::new(StubExtractor::returning(
        Category::Transport,
        Decimal::new(23, 0),
        "Taxi",
    ));

    let outcome = harness.manager.handle_text(&anna(), "23 taxi").await?;

    assert!(!outcome.unmatched);
    assert_eq!(
        outcome.replies[0].text,
        "Transport (€ 23.00), Taxi on 15-06-2024. Confirm?"
    );
    assert_eq!(
        harness.extractor.calls(),
        vec![("23 taxi".to_string(), TransactionType::Expense)]
    );
    assert_eq!(
        harness.session().await.state,
        SessionState::AwaitingConfirmation
    );

    Ok(())
}

#[tokio::test]
async fn test_extraction_failure_keeps_awaiting_entry() -> Result<()> {
    let harness = Harness::new(StubExtractor::failing());
    harness
        .manager
        .handle_callback(&anna(), "addtransaction.intent.income")
        .await?;

    let outcome = harness.manager.handle_text(&anna(), "salary").await?;
    assert!(outcome.replies[0].text.contains("could not find an amount"));
    assert_eq!(
        harness.session().await.state,
        SessionState::AwaitingEntry {
            kind: TransactionType::Income
        }
    );

    Ok(())
}

#[tokio::test]
async fn test_zero_amount_is_treated_as_failure() -> Result<()> {
    let harness = Harness::new(StubExtractor::returning(
        Category::Grocery,
        Decimal::ZERO,
        "Bread",
    ));
    harness.draft_bread().await?;

    let session = harness.session().await;
    assert_eq!(
        session.state,
        SessionState::AwaitingEntry {
            kind: TransactionType::Expense
        }
    );
    assert!(session.draft.is_none());

    Ok(())
}

#[tokio::test]
async fn test_cancel_from_every_state_is_idempotent() -> Result<()> {
    let harness = Harness::bread();
    let id = harness.saved_bread().await?;

    let states = [
        SessionState::AwaitingEntry {
            kind: TransactionType::Expense,
        },
        SessionState::AwaitingConfirmation,
        SessionState::EditingDraftField {
            field: TransactionField::Date,
        },
        SessionState::EditingRecordField {
            field: TransactionField::Amount,
        },
    ];

    for expected in states {
        match expected {
            SessionState::AwaitingEntry { .. } => {
                harness
                    .manager
                    .handle_callback(&anna(), "addtransaction.intent.expense")
                    .await?;
            }
            SessionState::AwaitingConfirmation => harness.draft_bread().await?,
            SessionState::EditingDraftField { .. } => {
                harness.draft_bread().await?;
                harness
                    .manager
                    .handle_callback(&anna(), "transactions.edit.date")
                    .await?;
            }
            SessionState::EditingRecordField { .. } => {
                harness
                    .manager
                    .handle_callback(&anna(), &format!("edittransactions.edit.amount.{id}"))
                    .await?;
            }
            SessionState::Idle => unreachable!(),
        }
        assert_eq!(harness.session().await.state, expected);

        for _ in 0..2 {
            let outcome = harness.manager.handle_text(&anna(), "  CANCEL ").await?;
            assert_eq!(outcome.replies[0].keyboard, Keyboard::Remove);
            assert_eq!(outcome.replies[1].keyboard, Keyboard::Home);

            let session = harness.session().await;
            assert_eq!(session.state, SessionState::Idle);
            assert!(session.draft.is_none());
        }
    }

    // The saved record is untouched by cancelling its edit
    let stored = harness.transactions.get(id, 42).await?.unwrap();
    assert_eq!(stored.amount, Decimal::new(5, 0));

    Ok(())
}

#[tokio::test]
async fn test_unmatched_text_shows_home_menu() -> Result<()> {
    let harness = Harness::bread();

    let outcome = harness.manager.handle_text(&anna(), "hello there").await?;
    assert!(outcome.unmatched);
    assert_eq!(outcome.replies[0].keyboard, Keyboard::Home);
    assert!(outcome.replies[0].text.contains("Commands:"));
    assert!(outcome.replies[0].text.contains("/list"));
    assert!(harness.extractor.calls().is_empty());

    let outcome = harness
        .manager
        .handle_callback(&anna(), "transactions.explode")
        .await?;
    assert!(outcome.unmatched);

    Ok(())
}

#[tokio::test]
async fn test_stale_confirm_without_draft() -> Result<()> {
    let harness = Harness::bread();

    let outcome = harness
        .manager
        .handle_callback(&anna(), "transactions.confirm")
        .await?;
    assert_eq!(outcome.replies[0].text, "There is nothing to confirm.");
    assert!(harness.transactions.list_recent(42, 0, 10).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_corrupted_session_is_reset() -> Result<()> {
    let harness = Harness::bread();
    let mut user = User::new(42, "Anna");
    user.session.state = SessionState::AwaitingConfirmation;
    harness.users.save(&user).await?;

    let outcome = harness
        .manager
        .handle_callback(&anna(), "transactions.confirm")
        .await?;
    assert!(outcome.replies[0].text.contains("has been reset"));

    let session = harness.session().await;
    assert_eq!(session.state, SessionState::Idle);
    assert!(session.draft.is_none());

    Ok(())
}

#[tokio::test]
async fn test_unauthorized_user_is_rejected_before_loading() -> Result<()> {
    let harness = Harness::with_access(
        StubExtractor::failing(),
        AccessPolicy::only([7]),
    );

    let result = harness.manager.handle_text(&anna(), "23 taxi").await;
    assert!(matches!(
        result,
        Err(DialogueError::Unauthorized { user_id: 42 })
    ));
    assert!(harness.users.load(42).await?.is_none());
    assert!(harness.extractor.calls().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_record_edit_writes_through() -> Result<()> {
    let harness = Harness::bread();
    harness.draft_bread().await?;
    harness
        .manager
        .handle_callback(&anna(), "transactions.confirm")
        .await?;
    let id = harness.transactions.list_recent(42, 0, 1).await?[0]
        .id
        .unwrap();

    let outcome = harness.manager.handle_text(&anna(), "/edit").await?;
    assert!(matches!(
        outcome.replies[0].keyboard,
        Keyboard::RecordPicker { .. }
    ));

    let outcome = harness
        .manager
        .handle_callback(&anna(), &format!("edittransactions.select.{id}"))
        .await?;
    assert_eq!(outcome.replies[0].keyboard, Keyboard::RecordFields(id));

    harness
        .manager
        .handle_callback(&anna(), &format!("edittransactions.edit.date.{id}"))
        .await?;
    assert_eq!(
        harness.session().await.state,
        SessionState::EditingRecordField {
            field: TransactionField::Date
        }
    );

    // Future dates are rejected for records too
    harness.manager.handle_text(&anna(), "01-01-2030").await?;
    assert_eq!(
        harness.session().await.state,
        SessionState::EditingRecordField {
            field: TransactionField::Date
        }
    );

    let outcome = harness.manager.handle_text(&anna(), "10-06-2024").await?;
    assert_eq!(
        outcome.replies[0].text,
        "✅ Updated: Grocery (€ 5.00), Bread on 10-06-2024"
    );

    let stored = harness.transactions.get(id, 42).await?.unwrap();
    assert_eq!(stored.date, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());

    let session = harness.session().await;
    assert_eq!(session.state, SessionState::Idle);
    assert!(session.draft.is_none());

    Ok(())
}

#[tokio::test]
async fn test_delete_flow() -> Result<()> {
    let harness = Harness::bread();
    harness.draft_bread().await?;
    harness
        .manager
        .handle_callback(&anna(), "transactions.confirm")
        .await?;
    let id = harness.transactions.list_recent(42, 0, 1).await?[0]
        .id
        .unwrap();

    let outcome = harness
        .manager
        .handle_callback(&anna(), &format!("deletetransactions.select.{id}"))
        .await?;
    assert_eq!(outcome.replies[0].keyboard, Keyboard::DeleteConfirm(id));

    let outcome = harness
        .manager
        .handle_callback(&anna(), &format!("deletetransactions.confirm.{id}"))
        .await?;
    assert!(outcome.replies[0].text.starts_with("🗑️ Deleted"));
    assert!(harness.transactions.get(id, 42).await?.is_none());

    let outcome = harness.manager.handle_text(&anna(), "/list").await?;
    assert_eq!(outcome.replies[0].text, "You have no transactions yet.");

    Ok(())
}

#[tokio::test]
async fn test_other_users_records_are_invisible() -> Result<()> {
    let harness = Harness::bread();
    let foreign = Transaction {
        id: None,
        owner_id: 7,
        kind: TransactionType::Expense,
        category: Category::Car,
        amount: Decimal::new(4000, 2),
        description: "Fuel".to_string(),
        date: today(),
        currency: Currency::Eur,
    };
    let id = harness.transactions.add(&foreign).await?;

    let outcome = harness
        .manager
        .handle_callback(&anna(), &format!("edittransactions.edit.amount.{id}"))
        .await?;
    assert_eq!(outcome.replies[0].text, "That transaction no longer exists.");
    assert_eq!(harness.session().await.state, SessionState::Idle);

    Ok(())
}

#[tokio::test]
async fn test_record_edit_waits_for_pending_draft() -> Result<()> {
    let harness = Harness::bread();
    let id = harness.saved_bread().await?;
    harness.draft_bread().await?;

    let outcome = harness
        .manager
        .handle_callback(&anna(), &format!("edittransactions.edit.amount.{id}"))
        .await?;
    assert!(outcome.replies[0].text.contains("unsaved entry"));
    assert_eq!(
        outcome.replies[1].text,
        "Grocery (€ 5.00), Bread on 15-06-2024. Confirm?"
    );
    assert_eq!(outcome.replies[1].keyboard, Keyboard::ConfirmCard);

    let session = harness.session().await;
    assert_eq!(session.state, SessionState::AwaitingConfirmation);
    assert_eq!(session.draft.as_ref().unwrap().id, None);
    assert_eq!(session.draft.unwrap().description, "Bread");

    // The pending draft still saves as a second transaction
    let outcome = harness
        .manager
        .handle_callback(&anna(), "transactions.confirm")
        .await?;
    assert!(outcome.replies[0].text.starts_with("💸 Expense saved"));
    assert_eq!(harness.transactions.list_recent(42, 0, 10).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_record_edit_prompt_shows_current_value() -> Result<()> {
    let harness = Harness::bread();
    let id = harness.saved_bread().await?;

    let outcome = harness
        .manager
        .handle_callback(&anna(), &format!("edittransactions.edit.description.{id}"))
        .await?;
    assert_eq!(
        outcome.replies[0].text,
        "Send the new description.\nCurrent: Bread"
    );

    Ok(())
}

#[tokio::test]
async fn test_failed_record_update_keeps_editing() -> Result<()> {
    let harness = Harness::bread();
    let id = harness.saved_bread().await?;
    harness
        .manager
        .handle_callback(&anna(), &format!("edittransactions.edit.amount.{id}"))
        .await?;

    harness.transactions.fail_next_update.store(true, Ordering::SeqCst);
    let outcome = harness.manager.handle_text(&anna(), "41").await?;
    assert!(outcome.replies[0].text.contains("could not be updated"));
    assert_eq!(outcome.replies[0].keyboard, Keyboard::CancelOnly);

    let session = harness.session().await;
    assert_eq!(
        session.state,
        SessionState::EditingRecordField {
            field: TransactionField::Amount
        }
    );
    assert_eq!(session.draft.unwrap().amount, Decimal::new(5, 0));
    let stored = harness.transactions.get(id, 42).await?.unwrap();
    assert_eq!(stored.amount, Decimal::new(5, 0));

    // Retyping once storage is back goes through
    let outcome = harness.manager.handle_text(&anna(), "41").await?;
    assert_eq!(
        outcome.replies[0].text,
        "✅ Updated: Grocery (€ 41.00), Bread on 15-06-2024"
    );
    let stored = harness.transactions.get(id, 42).await?.unwrap();
    assert_eq!(stored.amount, Decimal::new(41, 0));

    Ok(())
}

#[tokio::test]
async fn test_record_deleted_during_edit() -> Result<()> {
    let harness = Harness::bread();
    let id = harness.saved_bread().await?;
    harness
        .manager
        .handle_callback(&anna(), &format!("edittransactions.edit.amount.{id}"))
        .await?;

    assert!(harness.transactions.delete(id, 42).await?);

    let outcome = harness.manager.handle_text(&anna(), "41").await?;
    assert_eq!(outcome.replies[0].text, "That transaction no longer exists.");
    assert_eq!(outcome.replies[1].keyboard, Keyboard::Home);

    let session = harness.session().await;
    assert_eq!(session.state, SessionState::Idle);
    assert!(session.draft.is_none());
    assert!(harness.transactions.list_recent(42, 0, 10).await?.is_empty());

    Ok(())
}
