//! PostgreSQL storage for users and transactions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::dialogue::{Session, User};
use crate::errors::StoreError;
use crate::repository::{TransactionRepository, UserRepository};
use crate::transaction_model::{Category, Currency, Transaction, TransactionType};

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    // Users own one serialized session each
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            telegram_id BIGINT PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            session TEXT NOT NULL DEFAULT '{}',
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS transactions (
            id BIGSERIAL PRIMARY KEY,
            owner_id BIGINT NOT NULL,
            type TEXT NOT NULL,
            category TEXT NOT NULL,
            amount NUMERIC(12, 2) NOT NULL CHECK (amount > 0),
            description TEXT NOT NULL,
            date DATE NOT NULL,
            currency TEXT NOT NULL DEFAULT 'EUR',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create transactions table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS transactions_owner_date_idx
         ON transactions (owner_id, date DESC, id DESC)",
    )
    .execute(pool)
    .await
    .context("Failed to create transactions index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn load(&self, id: i64) -> Result<Option<User>, StoreError> {
        debug!("Loading user with telegram_id: {}", id);

        let row = sqlx::query("SELECT telegram_id, name, session FROM users WHERE telegram_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            debug!("No user found with telegram_id: {}", id);
            return Ok(None);
        };

        let raw: String = row.try_get("session")?;
        let session: Session = serde_json::from_str(&raw).map_err(|e| {
            warn!("Session of user {} cannot be decoded: {}", id, e);
            StoreError::SessionDecode(e.to_string())
        })?;

        Ok(Some(User {
            id: row.try_get("telegram_id")?,
            name: row.try_get("name")?,
            session,
        }))
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let session = serde_json::to_string(&user.session)
            .map_err(|e| StoreError::SessionDecode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO users (telegram_id, name, session, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (telegram_id) DO UPDATE
                SET name = EXCLUDED.name,
                    session = EXCLUDED.session,
                    updated_at = NOW()",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(session)
        .execute(&self.pool)
        .await?;

        debug!("Saved session of user {}", user.id);
        Ok(())
    }
}

pub struct PgTransactionRepository {
    pool: PgPool,
}

impl PgTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TRANSACTION_COLUMNS: &str =
    "id, owner_id, type, category, amount, description, date, currency";

fn transaction_from_row(row: &PgRow) -> Result<Transaction, StoreError> {
    let kind: String = row.try_get("type")?;
    let category: String = row.try_get("category")?;
    let currency: String = row.try_get("currency")?;

    let kind: TransactionType = kind.parse().map_err(StoreError::InvalidRow)?;
    let category: Category = category.parse().map_err(StoreError::InvalidRow)?;
    if !category.belongs_to(kind) {
        return Err(StoreError::InvalidRow(format!(
            "category {category} does not belong to {kind}"
        )));
    }
    if currency != Currency::Eur.code() {
        return Err(StoreError::InvalidRow(format!(
            "unsupported currency {currency}"
        )));
    }

    Ok(Transaction {
        id: Some(row.try_get("id")?),
        owner_id: row.try_get("owner_id")?,
        kind,
        category,
        amount: row.try_get::<Decimal, _>("amount")?,
        description: row.try_get("description")?,
        date: row.try_get::<NaiveDate, _>("date")?,
        currency: Currency::Eur,
    })
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    async fn add(&self, transaction: &Transaction) -> Result<i64, StoreError> {
        info!(
            "Creating {} transaction for owner {}",
            transaction.kind, transaction.owner_id
        );

        let row = sqlx::query(
            "INSERT INTO transactions (owner_id, type, category, amount, description, date, currency)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id",
        )
        .bind(transaction.owner_id)
        .bind(transaction.kind.as_str())
        .bind(transaction.category.as_str())
        .bind(transaction.amount)
        .bind(&transaction.description)
        .bind(transaction.date)
        .bind(transaction.currency.code())
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.try_get("id")?;
        info!("Transaction created with ID: {}", id);
        Ok(id)
    }

    async fn get(&self, id: i64, owner_id: i64) -> Result<Option<Transaction>, StoreError> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 AND owner_id = $2"
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn update(&self, transaction: &Transaction) -> Result<bool, StoreError> {
        let id = transaction
            .id
            .ok_or_else(|| StoreError::InvalidRow("cannot update a transaction without id".into()))?;

        info!("Updating transaction with ID: {}", id);

        let rows_affected = sqlx::query(
            "UPDATE transactions
             SET category = $1, amount = $2, description = $3, date = $4
             WHERE id = $5 AND owner_id = $6",
        )
        .bind(transaction.category.as_str())
        .bind(transaction.amount)
        .bind(&transaction.description)
        .bind(transaction.date)
        .bind(id)
        .bind(transaction.owner_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            info!("No transaction found with ID: {}", id);
        }
        Ok(rows_affected > 0)
    }

    async fn delete(&self, id: i64, owner_id: i64) -> Result<bool, StoreError> {
        info!("Deleting transaction with ID: {}", id);

        let rows_affected = sqlx::query("DELETE FROM transactions WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn list_recent(
        &self,
        owner_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Transaction>, StoreError> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE owner_id = $1
             ORDER BY date DESC, id DESC
             OFFSET $2 LIMIT $3"
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(transaction_from_row).collect()
    }
}
