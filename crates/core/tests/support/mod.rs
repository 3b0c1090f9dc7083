//! Shared test helpers for `innkeeper-core` integration tests.
//!
//! Lightweight in-memory implementations of the core ports so scenarios can
//! focus on behaviour instead of storage.

pub mod ports;
