//! Adapters Layer
//!
//! Implementations of the outbound ports:
//! - `InMemoryFilterStore`: shared in-process bit store
//! - `BincodeElementCodec` / `RawBytesCodec`: element encoders

pub mod element_codec;
pub mod memory_store;

pub use element_codec::{BincodeElementCodec, RawBytesCodec};
pub use memory_store::InMemoryFilterStore;
