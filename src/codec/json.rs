//! JSON codec using `serde_json`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Codec;
use crate::error::{PipeError, Result};

/// JSON codec for text-friendly structured data.
pub struct JsonCodec;

impl Codec for JsonCodec {
    #[inline]
    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| PipeError::Encode(e.to_string()))
    }

    #[inline]
    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| PipeError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Status {
        node: String,
        up: bool,
    }

    #[test]
    fn test_encode_decode_struct() {
        let status = Status {
            node: "relay-1".to_string(),
            up: true,
        };
        let encoded = JsonCodec::encode(&status).unwrap();
        assert_eq!(encoded, br#"{"node":"relay-1","up":true}"#);

        let decoded: Status = JsonCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, status);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result: Result<Status> = JsonCodec::decode(b"{not json");
        assert!(matches!(result, Err(PipeError::Decode(_))));
    }
}
