// SPDX-License-Identifier: MIT

pub mod schema;
pub mod store;
pub mod vault;
