// SPDX-License-Identifier: MIT

pub mod retry;

// Shared aliases for frequently used modules.
pub use crate::app::logging as logger;
pub use crate::domain::error;
