// SPDX-License-Identifier: MIT

use crate::domain::error::AppError;
use crate::domain::order::{Direction, NewOrder, Order, OrderStatus, Wallet};
use crate::infrastructure::data::store::OrderStore;
use crate::infrastructure::data::vault::SecretVault;
use crate::services::orders::notify::{Notifier, OrderEvent};
use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;

/// Creation input from the front-end collaborator. The private key
/// arrives in plaintext and is encrypted before anything is persisted.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub owner: i64,
    pub private_key: String,
    pub direction: Direction,
    pub token_in: Address,
    pub token_out: Address,
    pub amount: U256,
    pub trigger_price: f64,
    pub slippage_bps: u64,
    pub expiry_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyFinalized,
    NotFound,
}

/// Collaborator-facing order API: create, cancel, list. The monitor
/// owns every other mutation.
#[derive(Clone)]
pub struct OrderService {
    store: OrderStore,
    vault: SecretVault,
    notifier: Arc<dyn Notifier>,
}

impl OrderService {
    pub fn new(store: OrderStore, vault: SecretVault, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            vault,
            notifier,
        }
    }

    pub async fn create_order(&self, req: CreateOrderRequest) -> Result<Order, AppError> {
        let key = req.private_key.trim();
        let signer = PrivateKeySigner::from_str(key).map_err(|_| AppError::Validation {
            field: "wallet".into(),
            message: "not a valid private key".into(),
        })?;
        let wallet = Wallet {
            address: signer.address(),
            encrypted_secret: self.vault.encrypt(key.as_bytes())?,
        };
        drop(signer);

        let new = NewOrder {
            owner: req.owner,
            wallet,
            direction: req.direction,
            token_in: req.token_in,
            token_out: req.token_out,
            amount: req.amount,
            trigger_price: req.trigger_price,
            slippage_bps: req.slippage_bps,
            expiry_at: req.expiry_at,
        };
        new.validate()?;

        let order = self.store.create(new).await?;
        tracing::info!(
            target: "api",
            order_id = order.id,
            owner = order.owner,
            direction = %order.direction,
            trigger = order.trigger_price,
            "Order created"
        );
        Ok(order)
    }

    /// Cancel through the same atomic guard the executor uses, so a
    /// cancel can never clobber a concurrent fill.
    pub async fn cancel_order(&self, order_id: i64) -> Result<CancelOutcome, AppError> {
        let Some(order) = self.store.get(order_id).await? else {
            return Ok(CancelOutcome::NotFound);
        };

        let cancelled = self
            .store
            .compare_and_transition(order_id, OrderStatus::Active, OrderStatus::Cancelled, None)
            .await?;
        if !cancelled {
            return Ok(CancelOutcome::AlreadyFinalized);
        }

        tracing::info!(target: "api", order_id, "Order cancelled by owner");
        self.notifier
            .notify(order.owner, OrderEvent::Cancelled { order_id })
            .await;
        Ok(CancelOutcome::Cancelled)
    }

    pub async fn list_active_orders(&self, owner: i64) -> Result<Vec<Order>, AppError> {
        self.store.find_active_by_owner(owner).await
    }
}
