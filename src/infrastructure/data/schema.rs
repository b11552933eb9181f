// SPDX-License-Identifier: MIT

use crate::domain::error::AppError;
use crate::domain::order::{Direction, Order, OrderStatus, Wallet};
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;

/// Raw `orders` row. Addresses and amounts are stored as text; timestamps
/// as unix seconds.
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub owner: i64,
    pub wallet_address: String,
    pub encrypted_secret: String,
    pub direction: String,
    pub token_in: String,
    pub token_out: String,
    pub amount: String,
    pub trigger_price: f64,
    pub slippage_bps: i64,
    pub status: String,
    pub expiry_at: Option<i64>,
    pub tx_hash: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

fn parse_address(field: &str, value: &str) -> Result<Address, AppError> {
    Address::from_str(value)
        .map_err(|_| AppError::InvalidAddress(format!("{field}: {value}")))
}

fn parse_timestamp(field: &str, secs: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| AppError::Validation {
        field: field.into(),
        message: format!("timestamp {secs} out of range"),
    })
}

impl OrderRow {
    pub fn into_order(self) -> Result<Order, AppError> {
        let expiry_at = self
            .expiry_at
            .map(|secs| parse_timestamp("expiry_at", secs))
            .transpose()?;

        Ok(Order {
            id: self.id,
            owner: self.owner,
            wallet: Wallet {
                address: parse_address("wallet_address", &self.wallet_address)?,
                encrypted_secret: self.encrypted_secret,
            },
            direction: Direction::parse(&self.direction)?,
            token_in: parse_address("token_in", &self.token_in)?,
            token_out: parse_address("token_out", &self.token_out)?,
            amount: U256::from_str(&self.amount).map_err(|e| AppError::Validation {
                field: "amount".into(),
                message: format!("'{}' is not a valid amount: {e}", self.amount),
            })?,
            trigger_price: self.trigger_price,
            slippage_bps: self.slippage_bps.max(0) as u64,
            status: OrderStatus::parse(&self.status)?,
            expiry_at,
            tx_hash: self.tx_hash,
            created_at: parse_timestamp("created_at", self.created_at)?,
            updated_at: parse_timestamp("updated_at", self.updated_at)?,
        })
    }
}
