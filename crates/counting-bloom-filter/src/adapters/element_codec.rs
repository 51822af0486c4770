//! Element codecs
//!
//! Turn filter elements into the bytes that get fingerprinted. Every handle
//! of one shared filter must use the same codec, or the same element lands on
//! different slots.

use serde::Serialize;

use crate::error::CodecError;
use crate::ports::ElementCodec;

/// Default element codec using bincode
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeElementCodec;

impl<T: Serialize + ?Sized> ElementCodec<T> for BincodeElementCodec {
    fn encode(&self, element: &T) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(element).map_err(|e| CodecError::Serialization(e.to_string()))
    }
}

/// Codec for elements that already are bytes; hashes them unchanged
#[derive(Clone, Copy, Debug, Default)]
pub struct RawBytesCodec;

impl<T: AsRef<[u8]> + ?Sized> ElementCodec<T> for RawBytesCodec {
    fn encode(&self, element: &T) -> Result<Vec<u8>, CodecError> {
        Ok(element.as_ref().to_vec())
    }
}
