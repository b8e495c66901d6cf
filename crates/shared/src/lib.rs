//! Shared types, errors, and configuration for Coopbank.
//!
//! This crate provides common pieces used across all other crates:
//! - Money rounding and display helpers (2dp, half-up)
//! - Pagination types for statement queries
//! - Application-wide error types and categories
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, JobsConfig, PolicyConfig};
pub use error::{AppError, AppResult, ErrorCategory};
