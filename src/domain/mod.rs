// SPDX-License-Identifier: MIT

pub mod error;
pub mod order;
