// SPDX-License-Identifier: MIT

pub mod chain;
pub mod price_feed;
pub mod provider;
pub mod swap_plan;
