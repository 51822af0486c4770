//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driving Ports (inbound) - API for filter callers
//! - Driven Ports (outbound) - Shared bit store and element encoding

pub mod inbound;
pub mod outbound;

pub use inbound::CountingBloomFilterApi;
pub use outbound::{BitUpdate, CardinalitySnapshot, ElementCodec, FilterStore, Guarded};
