//! # Innkeeper Domain
//!
//! Data types shared by the Innkeeper resilience core.
//!
//! This crate contains:
//! - Degradation levels and events
//! - Dead-letter messages, failure reasons and recovery strategies
//! - Health check results and dependency priorities
//! - Fallback responses
//! - Configuration structures
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other Innkeeper crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use constants::*;
pub use errors::*;
pub use types::*;
