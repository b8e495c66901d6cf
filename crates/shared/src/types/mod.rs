//! Common types used across the application.

pub mod money;
pub mod pagination;

pub use money::{MONEY_SCALE, format_money, is_whole_cents, round_money};
pub use pagination::{PageRequest, PageResponse};
