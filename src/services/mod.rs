// SPDX-License-Identifier: MIT

pub mod orders;
