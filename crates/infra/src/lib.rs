//! # Innkeeper Infrastructure
//!
//! Infrastructure implementations of core ports and process plumbing.
//!
//! This crate contains:
//! - Key-value stores for the dead-letter queue (in-memory, JSON file)
//! - TCP and HTTP health probes
//! - System memory gauge
//! - Configuration loading and tracing initialisation
//! - Interval schedulers for the background loops
//!
//! ## Architecture
//! - Implements traits defined in `innkeeper-core`
//! - Depends on `innkeeper-common`, `innkeeper-domain` and `innkeeper-core`
//! - Contains all "impure" code (I/O, clocks, sockets, the host)

pub mod config;
pub mod errors;
pub mod kv;
pub mod observability;
pub mod platform;
pub mod probes;
pub mod scheduling;

// Re-export commonly used items
pub use errors::{InfraError, StoreError};
pub use kv::{FileKeyValueStore, MemoryKeyValueStore};
pub use platform::SysinfoMemoryGauge;
pub use probes::{HttpProbe, TcpProbe};
pub use scheduling::{IntervalScheduler, MonitoringScheduler, SchedulerError};
