//! Service Layer
//!
//! Orchestrates the domain logic against the shared store through the
//! outbound ports.

pub mod config_store;
pub mod counting_filter_service;

pub use config_store::ConfigStore;
pub use counting_filter_service::CountingBloomFilterService;
