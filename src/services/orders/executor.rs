// SPDX-License-Identifier: MIT

use crate::domain::error::AppError;
use crate::domain::order::{Order, OrderStatus};
use crate::infrastructure::data::store::OrderStore;
use crate::infrastructure::data::vault::SecretVault;
use crate::infrastructure::network::chain::ChainClient;
use crate::infrastructure::network::swap_plan::SwapPlanner;
use crate::services::orders::notify::{Notifier, OrderEvent};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Execution {
    pub tx_hash: String,
    pub executed_price: f64,
}

/// Drives one order's swap plan through the chain, step by step, then
/// reconciles the outcome into the store.
pub struct OrderExecutor {
    store: OrderStore,
    vault: SecretVault,
    chain: Arc<dyn ChainClient>,
    planner: Arc<dyn SwapPlanner>,
    notifier: Arc<dyn Notifier>,
}

impl OrderExecutor {
    pub fn new(
        store: OrderStore,
        vault: SecretVault,
        chain: Arc<dyn ChainClient>,
        planner: Arc<dyn SwapPlanner>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            vault,
            chain,
            planner,
            notifier,
        }
    }

    /// Execute an eligible order. Any failure before the first confirmed
    /// transaction leaves the order untouched; a failure after one
    /// surfaces as `PartialExecution`. Either way the order stays ACTIVE
    /// and a later tick retries from a fresh plan.
    pub async fn execute(&self, order: &Order, current_price: f64) -> Result<Execution, AppError> {
        let balance = self
            .chain
            .balance_of(order.wallet.address, order.token_in)
            .await?;
        if balance < order.amount {
            return Err(AppError::InsufficientFunds {
                required: order.amount.to_string(),
                available: balance.to_string(),
            });
        }

        let plan = self
            .planner
            .plan_swap(
                order.wallet.address,
                order.token_in,
                order.token_out,
                order.amount,
            )
            .await?;
        tracing::debug!(
            target: "executor",
            order_id = order.id,
            steps = plan.steps.len(),
            "Swap plan received"
        );

        let mut confirmed_items = 0usize;
        let mut completed_steps = 0usize;
        let mut swap_hash: Option<String> = None;
        let mut last_hash: Option<String> = None;

        for step in &plan.steps {
            for item in &step.items {
                // Decrypt for the duration of this one signing call.
                let signer = self.vault.decrypt_signer(&order.wallet.encrypted_secret)?;
                let sent = self.chain.sign_and_send(&signer, item).await;
                drop(signer);

                let receipt = match sent {
                    Ok(r) => r,
                    Err(e) if confirmed_items > 0 => {
                        return Err(AppError::PartialExecution {
                            order_id: order.id,
                            completed_steps,
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                };

                confirmed_items += 1;
                if step.kind.is_swap() {
                    swap_hash = Some(receipt.tx_hash.clone());
                }
                last_hash = Some(receipt.tx_hash);
            }
            completed_steps += 1;
        }

        let receipt_hash = swap_hash.or(last_hash).ok_or_else(|| AppError::ApiCall {
            provider: "swap-planner".into(),
            status: 0,
        })?;

        let transitioned = self
            .store
            .compare_and_transition(
                order.id,
                OrderStatus::Active,
                OrderStatus::Filled,
                Some(&receipt_hash),
            )
            .await?;
        if !transitioned {
            // A racing tick or cancel reached the terminal state first.
            tracing::warn!(
                target: "executor",
                order_id = order.id,
                tx = %receipt_hash,
                "Fill transition rejected; order already terminal"
            );
            return Err(AppError::TerminalConflict { order_id: order.id });
        }

        tracing::info!(
            target: "executor",
            order_id = order.id,
            direction = %order.direction,
            price = current_price,
            tx = %receipt_hash,
            "Order filled"
        );
        self.notifier
            .notify(
                order.owner,
                OrderEvent::Filled {
                    order_id: order.id,
                    direction: order.direction,
                    amount: order.amount,
                    watched_token: order.watched_token(),
                    executed_price: current_price,
                    slippage_bps: order.slippage_bps,
                    tx_hash: receipt_hash.clone(),
                },
            )
            .await;

        Ok(Execution {
            tx_hash: receipt_hash,
            executed_price: current_price,
        })
    }
}
