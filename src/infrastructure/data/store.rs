// SPDX-License-Identifier: MIT

use crate::domain::error::AppError;
use crate::domain::order::{NewOrder, Order, OrderStatus};
use crate::infrastructure::data::schema::OrderRow;
use alloy::primitives::Address;
use chrono::Utc;
use sqlx::{
    Pool, Row, Sqlite,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;

fn address_text(addr: Address) -> String {
    format!("{addr:#x}")
}

/// Durable order collection. `compare_and_transition` is the sole write
/// path for status changes; terminal records are never deleted.
#[derive(Clone)]
pub struct OrderStore {
    pool: Pool<Sqlite>,
}

impl OrderStore {
    pub async fn new(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::Initialization(format!("DB Connect failed: {e}")))?
            .create_if_missing(true);

        // In-memory SQLite gives each connection its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::Initialization(format!("DB Connect failed: {e}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Initialization(format!("DB Migration failed: {e}")))?;

        Ok(Self { pool })
    }

    pub async fn create(&self, new: NewOrder) -> Result<Order, AppError> {
        new.validate()?;
        let now = Utc::now().timestamp();

        let row = sqlx::query(
            r#"
            INSERT INTO orders (
                owner, wallet_address, encrypted_secret, direction,
                token_in, token_out, amount, trigger_price, slippage_bps,
                status, expiry_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'ACTIVE', ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(new.owner)
        .bind(address_text(new.wallet.address))
        .bind(&new.wallet.encrypted_secret)
        .bind(new.direction.as_str())
        .bind(address_text(new.token_in))
        .bind(address_text(new.token_out))
        .bind(new.amount.to_string())
        .bind(new.trigger_price)
        .bind(new.slippage_bps as i64)
        .bind(new.expiry_at.map(|t| t.timestamp()))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Initialization(format!("Order insert failed: {e}")))?;
        let id: i64 = row.get("id");

        self.get(id).await?.ok_or_else(|| {
            AppError::Initialization(format!("Order {id} vanished after insert"))
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<Order>, AppError> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Initialization(format!("Order load failed: {e}")))?;

        row.map(OrderRow::into_order).transpose()
    }

    pub async fn find_active(&self) -> Result<Vec<Order>, AppError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE status = 'ACTIVE' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Initialization(format!("Active order scan failed: {e}")))?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    pub async fn find_active_by_owner(&self, owner: i64) -> Result<Vec<Order>, AppError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE owner = ? AND status = 'ACTIVE' ORDER BY id",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Initialization(format!("Owner order scan failed: {e}")))?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    /// Atomic conditional status update. Succeeds only if the order's
    /// current status still equals `expected`; a stale caller gets `false`
    /// and the row is untouched. This is what makes fills at-most-once
    /// even when sweeps race a cancel.
    pub async fn compare_and_transition(
        &self,
        id: i64,
        expected: OrderStatus,
        next: OrderStatus,
        tx_hash: Option<&str>,
    ) -> Result<bool, AppError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?,
                tx_hash = COALESCE(?, tx_hash),
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(next.as_str())
        .bind(tx_hash)
        .bind(now)
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Initialization(format!("Status transition failed: {e}")))?;

        Ok(result.rows_affected() == 1)
    }
}
