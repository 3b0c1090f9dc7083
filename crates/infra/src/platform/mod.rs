//! Host metrics backing the degradation rules

pub mod memory;

pub use memory::SysinfoMemoryGauge;
