//! Storage collaborators.
//!
//! The dialogue layer only talks to these traits. PostgreSQL implementations
//! live in [`crate::db`]; the in-memory ones below back the bot when no
//! database is configured and back the integration tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use crate::dialogue::User;
use crate::errors::StoreError;
use crate::transaction_model::Transaction;

/// Per-user session storage. `save` overwrites unconditionally.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn load(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn save(&self, user: &User) -> Result<(), StoreError>;
}

/// Persisted transactions, always scoped by owner
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Insert and return the new id
    async fn add(&self, transaction: &Transaction) -> Result<i64, StoreError>;

    async fn get(&self, id: i64, owner_id: i64) -> Result<Option<Transaction>, StoreError>;

    /// Overwrite every editable field of a persisted record. Returns `false`
    /// when no record of that owner has the id.
    async fn update(&self, transaction: &Transaction) -> Result<bool, StoreError>;

    async fn delete(&self, id: i64, owner_id: i64) -> Result<bool, StoreError>;

    /// Newest first, by date then id
    async fn list_recent(
        &self,
        owner_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Transaction>, StoreError>;
}

#[derive(Default)]
pub struct InMemUserRepository {
    users: Mutex<HashMap<i64, User>>,
}

impl InMemUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemUserRepository {
    async fn load(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        self.users.lock().await.insert(user.id, user.clone());
        Ok(())
    }
}

#[derive(Default)]
struct TransactionTable {
    next_id: i64,
    rows: BTreeMap<i64, Transaction>,
}

#[derive(Default)]
pub struct InMemTransactionRepository {
    table: Mutex<TransactionTable>,
}

impl InMemTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionRepository for InMemTransactionRepository {
    async fn add(&self, transaction: &Transaction) -> Result<i64, StoreError> {
        let mut table = self.table.lock().await;
        table.next_id += 1;
        let id = table.next_id;

        let mut row = transaction.clone();
        row.id = Some(id);
        table.rows.insert(id, row);

        Ok(id)
    }

    async fn get(&self, id: i64, owner_id: i64) -> Result<Option<Transaction>, StoreError> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .get(&id)
            .filter(|row| row.owner_id == owner_id)
            .cloned())
    }

    async fn update(&self, transaction: &Transaction) -> Result<bool, StoreError> {
        let id = transaction
            .id
            .ok_or_else(|| StoreError::InvalidRow("cannot update a transaction without id".into()))?;

        let mut table = self.table.lock().await;
        match table.rows.get_mut(&id) {
            Some(row) if row.owner_id == transaction.owner_id => {
                *row = transaction.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: i64, owner_id: i64) -> Result<bool, StoreError> {
        let mut table = self.table.lock().await;
        let owned = table
            .rows
            .get(&id)
            .is_some_and(|row| row.owner_id == owner_id);

        if owned {
            table.rows.remove(&id);
        }
        Ok(owned)
    }

    async fn list_recent(
        &self,
        owner_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Transaction>, StoreError> {
        let table = self.table.lock().await;

        let mut rows: Vec<Transaction> = table
            .rows
            .values()
            .filter(|row| row.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));

        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}
