/*
    wire.rs - Encoding of requests for the transport

    Two formats:
    - JSON: self-describing, readers ignore unknown fields
    - Binary (bincode): compact, positional, both ends must run the same version

    Binary decoding is capped at MAX_BINARY_MESSAGE bytes; split nesting is
    capped by the Operation deserializer in both formats.

    WireMessage wraps everything one end of a pair can send to the other.
*/

use super::errors::JupiterResult;
use super::request::{Acknowledgement, Request};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Largest binary message accepted or produced
pub const MAX_BINARY_MESSAGE: u64 = 16 * 1024 * 1024;

/// Same layout as `bincode::serialize`, with a size limit
fn binary_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(MAX_BINARY_MESSAGE)
}

/// Encoding used on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Json,
    Binary,
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(WireFormat::Json),
            "binary" | "bincode" => Ok(WireFormat::Binary),
            other => Err(format!("unknown wire format: {}", other)),
        }
    }
}

/// Anything one end of a pair sends to the other
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireMessage {
    Request(Request),
    Acknowledgement(Acknowledgement),
}

pub fn encode_json(request: &Request) -> JupiterResult<Vec<u8>> {
    Ok(serde_json::to_vec(request)?)
}

pub fn decode_json(bytes: &[u8]) -> JupiterResult<Request> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn encode_binary(request: &Request) -> JupiterResult<Vec<u8>> {
    Ok(binary_options().serialize(request)?)
}

pub fn decode_binary(bytes: &[u8]) -> JupiterResult<Request> {
    Ok(binary_options().deserialize(bytes)?)
}

/// Encode a request in the given format
pub fn encode(request: &Request, format: WireFormat) -> JupiterResult<Vec<u8>> {
    match format {
        WireFormat::Json => encode_json(request),
        WireFormat::Binary => encode_binary(request),
    }
}

/// Decode a request in the given format
pub fn decode(bytes: &[u8], format: WireFormat) -> JupiterResult<Request> {
    match format {
        WireFormat::Json => decode_json(bytes),
        WireFormat::Binary => decode_binary(bytes),
    }
}

pub fn encode_message(message: &WireMessage, format: WireFormat) -> JupiterResult<Vec<u8>> {
    match format {
        WireFormat::Json => Ok(serde_json::to_vec(message)?),
        WireFormat::Binary => Ok(binary_options().serialize(message)?),
    }
}

pub fn decode_message(bytes: &[u8], format: WireFormat) -> JupiterResult<WireMessage> {
    match format {
        WireFormat::Json => Ok(serde_json::from_slice(bytes)?),
        WireFormat::Binary => Ok(binary_options().deserialize(bytes)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jupiter::errors::JupiterError;
    use crate::jupiter::operation::{Operation, MAX_SPLIT_DEPTH};
    use crate::jupiter::request::{EditorPath, SiteId};
    use crate::jupiter::vector_time::VectorTime;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn request_with(op: Operation) -> Request {
        Request::new(
            SiteId(1),
            VectorTime::new(1, 3),
            EditorPath::new("hello"),
            "ori79@jabber.cc",
            op,
        )
    }

    fn hash_of(req: &Request) -> u64 {
        let mut hasher = DefaultHasher::new();
        req.hash(&mut hasher);
        hasher.finish()
    }

    fn assert_round_trip(req: &Request) {
        for format in [WireFormat::Json, WireFormat::Binary] {
            let bytes = encode(req, format).unwrap();
            let back = decode(&bytes, format).unwrap();
            assert_eq!(&back, req, "{:?}", format);
            assert_eq!(hash_of(&back), hash_of(req));
        }
    }

    #[test]
    fn test_insert_request() {
        assert_round_trip(&request_with(Operation::insert(34, "insert text")));
    }

    #[test]
    fn test_delete_request() {
        assert_round_trip(&request_with(Operation::delete(34, "insert text")));
    }

    #[test]
    fn test_noop_request() {
        assert_round_trip(&request_with(Operation::NoOperation));
    }

    #[test]
    fn test_split_request() {
        assert_round_trip(&request_with(Operation::Split {
            left: Box::new(Operation::insert(34, "insert text")),
            right: Box::new(Operation::delete(34, "insert text")),
        }));
    }

    #[test]
    fn test_split_of_deletes() {
        assert_round_trip(&request_with(Operation::Split {
            left: Box::new(Operation::delete(34, "insert text")),
            right: Box::new(Operation::delete(37, "insert text")),
        }));
    }

    #[test]
    fn test_split_with_noop_side() {
        assert_round_trip(&request_with(Operation::Split {
            left: Box::new(Operation::delete(34, "insert text")),
            right: Box::new(Operation::NoOperation),
        }));
    }

    #[test]
    fn test_split_of_split() {
        assert_round_trip(&request_with(Operation::Split {
            left: Box::new(Operation::Split {
                left: Box::new(Operation::insert(0, "a")),
                right: Box::new(Operation::NoOperation),
            }),
            right: Box::new(Operation::Split {
                left: Box::new(Operation::delete(1, "ü")),
                right: Box::new(Operation::insert(2, "")),
            }),
        }));
    }

    #[test]
    fn test_json_ignores_unknown_fields() {
        let json = r#"{
            "site": 1,
            "vector": [1, 3],
            "editor": "hello",
            "originator": "ori79@jabber.cc",
            "op": {"Insert": {"pos": 34, "text": "insert text", "color": "red"}},
            "priority": "high"
        }"#;
        let req = decode_json(json.as_bytes()).unwrap();
        assert_eq!(req, request_with(Operation::insert(34, "insert text")));
    }

    #[test]
    fn test_malformed_payload() {
        let err = decode_json(b"{\"site\": \"one\"}").unwrap_err();
        assert!(matches!(err, JupiterError::Serialization(_)));
        assert!(err.is_recoverable());

        assert!(decode_binary(&[0xff, 0x01]).is_err());
    }

    fn nested_splits(depth: usize) -> Operation {
        let mut op = Operation::insert(0, "a");
        for i in 0..depth {
            op = Operation::Split { left: Box::new(op), right: Box::new(Operation::delete(i, "b")) };
        }
        op
    }

    #[test]
    fn test_binary_layout_matches_plain_bincode() {
        let req = request_with(nested_splits(3));
        assert_eq!(encode_binary(&req).unwrap(), bincode::serialize(&req).unwrap());
    }

    #[test]
    fn test_deep_split_chain_rejected() {
        // a valid header followed by a long run of Split tags
        let mut bytes = encode_binary(&request_with(Operation::NoOperation)).unwrap();
        bytes.truncate(bytes.len() - 4);
        for _ in 0..1_000_000 {
            bytes.extend_from_slice(&3u32.to_le_bytes());
        }
        let err = decode_binary(&bytes).unwrap_err();
        assert!(matches!(err, JupiterError::Serialization(_)));

        let msg = WireMessage::Request(request_with(nested_splits(MAX_SPLIT_DEPTH + 1)));
        for format in [WireFormat::Json, WireFormat::Binary] {
            let bytes = encode_message(&msg, format).unwrap();
            assert!(matches!(
                decode_message(&bytes, format),
                Err(JupiterError::Serialization(_))
            ));
        }
    }

    #[test]
    fn test_split_chain_within_limit_decodes() {
        let req = request_with(nested_splits(MAX_SPLIT_DEPTH));
        let bytes = encode_binary(&req).unwrap();
        assert_eq!(decode_binary(&bytes).unwrap(), req);

        // serde_json's own nesting limit is lower than ours
        let shallow = request_with(nested_splits(40));
        assert_eq!(decode_json(&encode_json(&shallow).unwrap()).unwrap(), shallow);
    }

    #[test]
    fn test_oversized_length_prefix_rejected() {
        let mut bytes = encode_binary(&request_with(Operation::NoOperation)).unwrap();
        // editor length prefix follows the site (4 bytes) and the vector (16 bytes)
        bytes[20..28].copy_from_slice(&(1u64 << 40).to_le_bytes());
        assert!(matches!(decode_binary(&bytes), Err(JupiterError::Serialization(_))));
    }

    #[test]
    fn test_message_round_trip() {
        let ack = Acknowledgement {
            site: SiteId(2),
            vector: VectorTime::new(4, 5),
            editor: EditorPath::new("hello"),
        };
        for format in [WireFormat::Json, WireFormat::Binary] {
            let msg = WireMessage::Acknowledgement(ack.clone());
            let bytes = encode_message(&msg, format).unwrap();
            assert_eq!(decode_message(&bytes, format).unwrap(), msg);
        }
    }

    #[test]
    fn test_wire_format_from_str() {
        assert_eq!("JSON".parse::<WireFormat>().unwrap(), WireFormat::Json);
        assert_eq!("bincode".parse::<WireFormat>().unwrap(), WireFormat::Binary);
        assert!("xml".parse::<WireFormat>().is_err());
    }
}
