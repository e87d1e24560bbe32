use crate::serialize::SerializeError;
use serde::{Serialize, de::DeserializeOwned};
use serde_cbor::{from_slice, to_vec};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Serialize a value into CBOR bytes.
pub(super) fn serialize<T>(t: &T) -> Result<Vec<u8>, SerializeError>
where
    T: Serialize,
{
    to_vec(t).map_err(|e| SerializeError::Serialize(e.to_string()))
}

/// Deserialize CBOR bytes into a value.
///
/// - Input size is bounded before decode.
/// - Any panic during decode is caught and reported as a deserialize error.
pub(super) fn deserialize_bounded<T>(bytes: &[u8], max_bytes: usize) -> Result<T, SerializeError>
where
    T: DeserializeOwned,
{
    if bytes.len() > max_bytes {
        return Err(SerializeError::DeserializeSizeLimitExceeded {
            len: bytes.len(),
            max_bytes,
        });
    }

    match catch_unwind(AssertUnwindSafe(|| from_slice(bytes))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(SerializeError::Deserialize(err.to_string())),
        Err(_) => Err(SerializeError::Deserialize(
            "panic during CBOR deserialization".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_payload_is_rejected_before_decode() {
        let bytes = vec![0u8; 32];
        let err = deserialize_bounded::<u32>(&bytes, 8).unwrap_err();

        assert!(matches!(
            err,
            SerializeError::DeserializeSizeLimitExceeded {
                len: 32,
                max_bytes: 8
            }
        ));
    }

    #[test]
    fn garbage_payload_reports_deserialize_error() {
        let err = deserialize_bounded::<Vec<String>>(&[0xff, 0x00, 0x13], 64).unwrap_err();

        assert!(matches!(err, SerializeError::Deserialize(_)));
    }

    #[test]
    fn serialize_then_deserialize_preserves_value() {
        let bytes = serialize(&vec![1u32, 2, 3]).unwrap();
        let back: Vec<u32> = deserialize_bounded(&bytes, 64).unwrap();

        assert_eq!(back, vec![1, 2, 3]);
    }
}
