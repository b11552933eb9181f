// SPDX-License-Identifier: MIT

pub mod api;
pub mod executor;
pub mod notify;
pub mod scheduler;

pub use api::{CancelOutcome, CreateOrderRequest, OrderService};
pub use executor::OrderExecutor;
pub use notify::{ChannelNotifier, Notifier, OrderEvent, OwnerNotification};
pub use scheduler::OrderMonitor;
