// SPDX-License-Identifier: MIT

use crate::domain::error::AppError;
use crate::domain::order::{Order, OrderStatus};
use crate::infrastructure::data::store::OrderStore;
use crate::infrastructure::network::price_feed::PriceOracle;
use crate::services::orders::executor::OrderExecutor;
use crate::services::orders::notify::{Notifier, OrderEvent};
use chrono::Utc;
use dashmap::DashSet;
use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Background monitor loop. Passes are serialized: a sweep completes,
/// including all per-order work, before the fixed delay and the next
/// sweep begin.
pub struct OrderMonitor {
    store: OrderStore,
    oracle: Arc<dyn PriceOracle>,
    executor: Arc<OrderExecutor>,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
    sweep_concurrency: usize,
    in_flight: DashSet<i64>,
}

impl OrderMonitor {
    pub fn new(
        store: OrderStore,
        oracle: Arc<dyn PriceOracle>,
        executor: Arc<OrderExecutor>,
        notifier: Arc<dyn Notifier>,
        poll_interval: Duration,
        sweep_concurrency: usize,
    ) -> Self {
        Self {
            store,
            oracle,
            executor,
            notifier,
            poll_interval,
            sweep_concurrency: sweep_concurrency.max(1),
            in_flight: DashSet::new(),
        }
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(
            target: "monitor",
            interval_secs = self.poll_interval.as_secs(),
            concurrency = self.sweep_concurrency,
            "Order monitor started"
        );
        loop {
            if let Err(e) = self.sweep().await {
                tracing::error!(target: "monitor", error = %e, "Sweep failed");
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(self.poll_interval) => {}
            }
        }
        tracing::info!(target: "monitor", "Order monitor stopped");
    }

    /// One monitoring pass over all ACTIVE orders. Per-order failures are
    /// contained; they never abort the sweep for other orders.
    pub async fn sweep(&self) -> Result<(), AppError> {
        let orders = self.store.find_active().await?;
        if orders.is_empty() {
            return Ok(());
        }
        tracing::debug!(target: "monitor", active = orders.len(), "Sweep start");

        stream::iter(orders)
            .for_each_concurrent(self.sweep_concurrency, |order| async move {
                self.process(order).await;
            })
            .await;

        Ok(())
    }

    async fn process(&self, order: Order) {
        // At most one execution attempt in flight per order id.
        if !self.in_flight.insert(order.id) {
            tracing::debug!(target: "monitor", order_id = order.id, "Order already in flight; skipped");
            return;
        }
        let outcome = self.evaluate(&order).await;
        self.in_flight.remove(&order.id);

        if let Err(e) = outcome {
            tracing::warn!(target: "monitor", order_id = order.id, error = %e, "Order evaluation failed");
        }
    }

    async fn evaluate(&self, order: &Order) -> Result<(), AppError> {
        let watched = order.watched_token();
        let price = match self.oracle.price_of(watched).await {
            Ok(p) => p,
            Err(e) => {
                // Stale oracle: no state change, retried next tick.
                tracing::warn!(
                    target: "monitor",
                    order_id = order.id,
                    token = %format!("{watched:#x}"),
                    error = %e,
                    "Price unavailable; skipping order this tick"
                );
                return Ok(());
            }
        };

        if order.is_eligible_at(price) {
            tracing::info!(
                target: "monitor",
                order_id = order.id,
                direction = %order.direction,
                price,
                trigger = order.trigger_price,
                "Order eligible; dispatching execution"
            );
            match self.executor.execute(order, price).await {
                Ok(_) => {}
                Err(AppError::TerminalConflict { .. }) => {
                    tracing::debug!(target: "monitor", order_id = order.id, "Stale fill attempt skipped");
                }
                Err(e @ AppError::PartialExecution { .. }) => {
                    tracing::warn!(target: "monitor", order_id = order.id, error = %e, "Partial execution; order stays active");
                }
                Err(e) => {
                    tracing::warn!(target: "monitor", order_id = order.id, error = %e, "Execution failed; order stays active");
                }
            }
            // Execution takes precedence: expiry is not re-checked on a
            // tick that dispatched.
            return Ok(());
        }

        if order.is_expired_at(Utc::now()) {
            let cancelled = self
                .store
                .compare_and_transition(order.id, OrderStatus::Active, OrderStatus::Cancelled, None)
                .await?;
            if cancelled {
                tracing::info!(target: "monitor", order_id = order.id, "Order expired; cancelled");
                self.notifier
                    .notify(order.owner, OrderEvent::Expired { order_id: order.id })
                    .await;
            }
        }

        Ok(())
    }
}
