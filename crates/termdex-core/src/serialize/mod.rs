mod cbor;

use crate::error::{ErrorClass, ErrorOrigin, InternalError};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error as ThisError;

/// Largest options blob accepted by [`deserialize`].
pub const MAX_OPTIONS_BYTES: usize = 64 * 1024;

///
/// SerializeError
///

#[derive(Debug, ThisError)]
pub enum SerializeError {
    #[error("serialize error: {0}")]
    Serialize(String),

    #[error("deserialize error: {0}")]
    Deserialize(String),

    #[error("deserialize size limit exceeded: {len} bytes (limit {max_bytes})")]
    DeserializeSizeLimitExceeded { len: usize, max_bytes: usize },
}

impl From<SerializeError> for InternalError {
    fn from(err: SerializeError) -> Self {
        match err {
            SerializeError::Serialize(_) => {
                Self::new(ErrorClass::Internal, ErrorOrigin::Serialize, err.to_string())
            }
            SerializeError::Deserialize(_) | SerializeError::DeserializeSizeLimitExceeded { .. } => {
                Self::corruption(ErrorOrigin::Serialize, err.to_string())
            }
        }
    }
}

/// Serialize a value into the persisted blob format.
pub fn serialize<T>(ty: &T) -> Result<Vec<u8>, SerializeError>
where
    T: Serialize,
{
    cbor::serialize(ty)
}

/// Deserialize a value produced by [`serialize`].
pub fn deserialize<T>(bytes: &[u8]) -> Result<T, SerializeError>
where
    T: DeserializeOwned,
{
    cbor::deserialize_bounded(bytes, MAX_OPTIONS_BYTES)
}
