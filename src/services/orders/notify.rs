// SPDX-License-Identifier: MIT

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::domain::order::Direction;

/// Outcome events delivered to the front-end collaborator, keyed by
/// owner. Payloads never contain wallet secrets.
#[derive(Debug, Clone)]
pub enum OrderEvent {
    Filled {
        order_id: i64,
        direction: Direction,
        amount: U256,
        watched_token: Address,
        executed_price: f64,
        slippage_bps: u64,
        tx_hash: String,
    },
    Expired {
        order_id: i64,
    },
    Cancelled {
        order_id: i64,
    },
}

#[derive(Debug, Clone)]
pub struct OwnerNotification {
    pub owner: i64,
    pub event: OrderEvent,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, owner: i64, event: OrderEvent);
}

/// Default notifier: forwards events over an unbounded channel that the
/// front-end drains.
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<OwnerNotification>,
}

impl ChannelNotifier {
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<OwnerNotification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, owner: i64, event: OrderEvent) {
        if self.sender.send(OwnerNotification { owner, event }).is_err() {
            tracing::warn!(target: "notify", owner, "Notification receiver dropped");
        }
    }
}
