//! # Innkeeper API
//!
//! Administrator HTTP surface and process entry point.
//!
//! This crate contains:
//! - Application context (dependency injection and background loops)
//! - Admin command handlers (axum routes under `/admin`)
//! - HTTP error mapping
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires the port traits in `core` to the adapters in `infra`
//! - Handlers share one `Arc<AppContext>` as router state

pub mod commands;
pub mod context;
pub mod error;

pub use commands::router;
pub use context::AppContext;
pub use error::{ApiError, ApiResult};
