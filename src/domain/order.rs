// SPDX-License-Identifier: MIT

use crate::domain::error::AppError;
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Basis points per whole (100% == 10_000 bps).
pub const BPS_DENOMINATOR: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "BUY" => Ok(Direction::Buy),
            "SELL" => Ok(Direction::Sell),
            other => Err(AppError::Validation {
                field: "direction".into(),
                message: format!("unknown direction '{other}'"),
            }),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ACTIVE is the only non-terminal state. FILLED and CANCELLED are
/// immutable once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Active,
    Filled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Active => "ACTIVE",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "ACTIVE" => Ok(OrderStatus::Active),
            "FILLED" => Ok(OrderStatus::Filled),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(AppError::Validation {
                field: "status".into(),
                message: format!("unknown status '{other}'"),
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Active)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One wallet bound per order at creation. The secret is AES-GCM
/// ciphertext and is decrypted only inside a signing scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    pub address: Address,
    pub encrypted_secret: String,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub id: i64,
    pub owner: i64,
    pub wallet: Wallet,
    pub direction: Direction,
    pub token_in: Address,
    pub token_out: Address,
    pub amount: U256,
    pub trigger_price: f64,
    pub slippage_bps: u64,
    pub status: OrderStatus,
    pub expiry_at: Option<DateTime<Utc>>,
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The token whose market price decides eligibility: the token being
    /// acquired for BUY orders, the token being sold for SELL orders.
    pub fn watched_token(&self) -> Address {
        match self.direction {
            Direction::Buy => self.token_out,
            Direction::Sell => self.token_in,
        }
    }

    /// Asymmetric trigger band. BUY tolerates paying up to `slippage_bps`
    /// above target; SELL tolerates receiving down to `slippage_bps`
    /// below target.
    pub fn is_eligible_at(&self, current_price: f64) -> bool {
        let tolerance = self.slippage_bps as f64 / BPS_DENOMINATOR;
        match self.direction {
            Direction::Buy => current_price <= self.trigger_price * (1.0 + tolerance),
            Direction::Sell => current_price >= self.trigger_price * (1.0 - tolerance),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry_at {
            Some(expiry) => now > expiry,
            None => false,
        }
    }
}

/// Creation-time fields, validated before persistence. `id`, `status`
/// and the audit timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub owner: i64,
    pub wallet: Wallet,
    pub direction: Direction,
    pub token_in: Address,
    pub token_out: Address,
    pub amount: U256,
    pub trigger_price: f64,
    pub slippage_bps: u64,
    pub expiry_at: Option<DateTime<Utc>>,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.amount.is_zero() {
            return Err(AppError::Validation {
                field: "amount".into(),
                message: "amount must be greater than zero".into(),
            });
        }
        if !self.trigger_price.is_finite() || self.trigger_price <= 0.0 {
            return Err(AppError::Validation {
                field: "trigger_price".into(),
                message: "trigger price must be positive".into(),
            });
        }
        if self.slippage_bps > BPS_DENOMINATOR as u64 {
            return Err(AppError::Validation {
                field: "slippage_bps".into(),
                message: format!(
                    "slippage {} bps exceeds {} bps",
                    self.slippage_bps, BPS_DENOMINATOR as u64
                ),
            });
        }
        if self.token_in == self.token_out {
            return Err(AppError::Validation {
                field: "token_out".into(),
                message: "tokenIn and tokenOut must differ".into(),
            });
        }
        Ok(())
    }
}
