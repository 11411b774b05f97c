//! Wire format of the realtime socket.
//!
//! Every frame is one UTF-8 JSON object with an optional `cid` and exactly
//! one key naming the operation. The data-bearing kinds carry `op_code` as a
//! decimal string and `data` as standard base64.

use crate::core::errors::NakamaError;
use crate::core::kernel::WsCodec;
use crate::nakama::types::{
    DataMessage, Envelope, EnvelopeMessage, OpCode, Payload, MATCH_DATA, MATCH_DATA_SEND,
    PARTY_DATA, PARTY_DATA_SEND,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Value};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

const CID: &str = "cid";
const OP_CODE: &str = "op_code";
const DATA: &str = "data";

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCodec;

impl WsCodec for EnvelopeCodec {
    type Message = Envelope;

    fn encode_message(&self, message: &Envelope) -> Result<Message, NakamaError> {
        encode_envelope(message).map(Message::Text)
    }

    fn decode_message(&self, message: Message) -> Result<Option<Envelope>, NakamaError> {
        let text = match message {
            Message::Text(text) => text,
            Message::Binary(data) => String::from_utf8(data).map_err(|e| {
                NakamaError::DeserializationError(format!("Invalid UTF-8 in binary frame: {}", e))
            })?,
            _ => return Ok(None),
        };
        decode_envelope(&text).map(Some)
    }
}

pub fn encode_envelope(envelope: &Envelope) -> Result<String, NakamaError> {
    let mut object = Map::new();
    if let Some(cid) = &envelope.cid {
        object.insert(CID.to_string(), Value::String(cid.clone()));
    }

    let body = match &envelope.message {
        EnvelopeMessage::MatchDataSend(m)
        | EnvelopeMessage::PartyDataSend(m)
        | EnvelopeMessage::MatchData(m)
        | EnvelopeMessage::PartyData(m) => Value::Object(encode_data_message(m)?),
        EnvelopeMessage::Other { kind, body } => {
            if kind.is_empty() || kind == CID {
                return Err(NakamaError::SerializationError(format!(
                    "invalid envelope kind {:?}",
                    kind
                )));
            }
            body.clone()
        }
    };
    object.insert(envelope.kind().to_string(), body);

    serde_json::to_string(&object).map_err(|e| {
        NakamaError::SerializationError(format!("Failed to serialize envelope: {}", e))
    })
}

pub fn decode_envelope(text: &str) -> Result<Envelope, NakamaError> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        NakamaError::DeserializationError(format!("Failed to parse envelope JSON: {}", e))
    })?;
    let Value::Object(mut object) = value else {
        return Err(NakamaError::DeserializationError(
            "envelope is not a JSON object".to_string(),
        ));
    };

    let cid = match object.remove(CID) {
        None | Some(Value::Null) => None,
        Some(Value::String(cid)) => Some(cid),
        Some(other) => Some(other.to_string()),
    };

    let keys: Vec<String> = object.keys().cloned().collect();
    let mut entries = object.into_iter();
    let (kind, body) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => {
            return Err(NakamaError::DeserializationError(format!(
                "envelope must name exactly one operation, found {:?}",
                keys
            )))
        }
    };

    let message = match kind.as_str() {
        MATCH_DATA => EnvelopeMessage::MatchData(decode_data_message(&kind, body)?),
        PARTY_DATA => EnvelopeMessage::PartyData(decode_data_message(&kind, body)?),
        MATCH_DATA_SEND => EnvelopeMessage::MatchDataSend(decode_data_message(&kind, body)?),
        PARTY_DATA_SEND => EnvelopeMessage::PartyDataSend(decode_data_message(&kind, body)?),
        _ => EnvelopeMessage::Other { kind, body },
    };

    Ok(Envelope { cid, message })
}

/// Wire object for a data message: `op_code` as string, `data` as base64
///
/// The typed fields win. Otherwise `op_code` and `data` entries placed in
/// `fields` directly are normalized the same way before they hit the wire.
pub fn encode_data_message(message: &DataMessage) -> Result<Map<String, Value>, NakamaError> {
    let mut object = message.fields.clone();

    let op_code = match message.op_code {
        Some(op_code) => Some(op_code),
        None => match object.remove(OP_CODE) {
            None | Some(Value::Null) => None,
            Some(raw) => Some(serde_json::from_value::<OpCode>(raw).map_err(|e| {
                NakamaError::SerializationError(format!("op_code must be an integer: {}", e))
            })?),
        },
    };
    if let Some(op_code) = op_code {
        object.insert(OP_CODE.to_string(), Value::String(op_code.to_string()));
    }

    let data = match &message.data {
        Some(data) => Some(STANDARD.encode(data.as_bytes())),
        None => match object.remove(DATA) {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(STANDARD.encode(text.as_bytes())),
            Some(Value::Array(items)) => Some(STANDARD.encode(byte_array(&items)?)),
            Some(other) => {
                return Err(NakamaError::SerializationError(format!(
                    "data must be bytes or text, got {}",
                    other
                )))
            }
        },
    };
    if let Some(data) = data {
        object.insert(DATA.to_string(), Value::String(data));
    }

    Ok(object)
}

fn byte_array(items: &[Value]) -> Result<Vec<u8>, NakamaError> {
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|b| u8::try_from(b).ok())
                .ok_or_else(|| {
                    NakamaError::SerializationError(format!("data array holds a non-byte value {}", item))
                })
        })
        .collect()
}

/// In-process data message from its wire object; `data` is decoded to bytes
pub fn decode_data_message(kind: &str, body: Value) -> Result<DataMessage, NakamaError> {
    let Value::Object(mut fields) = body else {
        return Err(NakamaError::DeserializationError(format!(
            "{} body is not a JSON object",
            kind
        )));
    };

    let op_code = match fields.remove(OP_CODE) {
        None | Some(Value::Null) => None,
        Some(raw) => Some(serde_json::from_value::<OpCode>(raw).map_err(|e| {
            NakamaError::DeserializationError(format!("{} has an invalid op_code: {}", kind, e))
        })?),
    };

    let data = match fields.remove(DATA) {
        Some(Value::String(encoded)) => match STANDARD.decode(encoded.as_bytes()) {
            Ok(bytes) => Some(Payload::Bytes(bytes)),
            Err(e) => {
                debug!(kind, "data is not base64, keeping it as text: {}", e);
                Some(Payload::Text(encoded))
            }
        },
        None | Some(Value::Null) => None,
        Some(other) => {
            // Not a string, so not ours to decode.
            fields.insert(DATA.to_string(), other);
            None
        }
    };

    Ok(DataMessage {
        op_code,
        data,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(envelope: &Envelope) -> Value {
        serde_json::from_str(&encode_envelope(envelope).unwrap()).unwrap()
    }

    #[test]
    fn test_encode_match_data_send() {
        let envelope = Envelope::match_data_send("abc.node", 7, vec![0xDEu8, 0xAD, 0xBE, 0xEF]);
        assert_eq!(
            wire(&envelope),
            json!({"match_data_send": {"match_id": "abc.node", "op_code": "7", "data": "3q2+7w=="}})
        );
    }

    #[test]
    fn test_encode_normalizes_raw_fields() {
        let message = DataMessage::new()
            .with_field("match_id", "m")
            .with_field("op_code", 7)
            .with_field("data", "hello");
        let envelope = Envelope::new(EnvelopeMessage::MatchDataSend(message));
        assert_eq!(
            wire(&envelope),
            json!({"match_data_send": {"match_id": "m", "op_code": "7", "data": "aGVsbG8="}})
        );
    }

    #[test]
    fn test_encode_raw_byte_array_and_string_op_code() {
        let message = DataMessage::new()
            .with_field("op_code", " 12")
            .with_field("data", json!([0xDE, 0xAD, 0xBE, 0xEF]));
        let envelope = Envelope::new(EnvelopeMessage::PartyDataSend(message));
        let body = &wire(&envelope)["party_data_send"];
        assert_eq!(body["op_code"], json!("12"));
        assert_eq!(body["data"], json!("3q2+7w=="));
    }

    #[test]
    fn test_encode_typed_fields_override_raw_ones() {
        let message = DataMessage::new()
            .with_field("op_code", 1)
            .with_field("data", "raw")
            .with_op_code(2)
            .with_data(vec![0xFFu8]);
        let envelope = Envelope::new(EnvelopeMessage::MatchDataSend(message));
        let body = &wire(&envelope)["match_data_send"];
        assert_eq!(body["op_code"], json!("2"));
        assert_eq!(body["data"], json!("/w=="));
    }

    #[test]
    fn test_encode_rejects_non_integer_raw_op_code() {
        for bad in [json!(1.5), json!("seven"), json!({"n": 1})] {
            let message = DataMessage::new().with_field("op_code", bad);
            let envelope = Envelope::new(EnvelopeMessage::MatchDataSend(message));
            assert!(matches!(
                encode_envelope(&envelope),
                Err(NakamaError::SerializationError(_))
            ));
        }
    }

    #[test]
    fn test_encode_rejects_non_byte_raw_data() {
        for bad in [json!(42), json!([1, 256]), json!({"b": 1})] {
            let message = DataMessage::new().with_field("data", bad);
            let envelope = Envelope::new(EnvelopeMessage::PartyDataSend(message));
            assert!(matches!(
                encode_envelope(&envelope),
                Err(NakamaError::SerializationError(_))
            ));
        }
    }

    #[test]
    fn test_encode_text_data_as_base64_of_utf8() {
        let envelope = Envelope::party_data_send("p1", 1, "hi");
        assert_eq!(wire(&envelope)["party_data_send"]["data"], json!("aGk="));
    }

    #[test]
    fn test_encode_empty_payload() {
        let envelope = Envelope::match_data_send("m", 0, Vec::<u8>::new());
        let body = &wire(&envelope)["match_data_send"];
        assert_eq!(body["data"], json!(""));
        assert_eq!(body["op_code"], json!("0"));
    }

    #[test]
    fn test_encode_other_kind_passes_body_through() {
        let envelope = Envelope::other("match_join", json!({"match_id": "m1"})).with_cid("2");
        assert_eq!(wire(&envelope), json!({"cid": "2", "match_join": {"match_id": "m1"}}));
    }

    #[test]
    fn test_encode_rejects_cid_as_kind() {
        let envelope = Envelope::other("cid", json!({}));
        assert!(matches!(
            encode_envelope(&envelope),
            Err(NakamaError::SerializationError(_))
        ));
    }

    #[test]
    fn test_decode_match_data_from_server() {
        let text = r#"{"match_data":{"match_id":"m1","presence":{"user_id":"u"},"op_code":"7","data":"3q2+7w==","reliable":true}}"#;
        let envelope = decode_envelope(text).unwrap();
        let EnvelopeMessage::MatchData(message) = envelope.message else {
            panic!("expected match_data");
        };
        assert_eq!(message.op_code, Some(OpCode(7)));
        assert_eq!(message.data, Some(Payload::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF])));
        assert_eq!(message.field_str("match_id"), Some("m1"));
        assert_eq!(message.fields["reliable"], json!(true));
    }

    #[test]
    fn test_decode_numeric_op_code() {
        let envelope = decode_envelope(r#"{"party_data":{"party_id":"p","op_code":12}}"#).unwrap();
        let message = envelope.message.data_message().unwrap();
        assert_eq!(message.op_code, Some(OpCode(12)));
        assert!(message.data.is_none());
    }

    #[test]
    fn test_decode_keeps_non_base64_as_text() {
        let envelope = decode_envelope(r#"{"match_data":{"data":"not base64!"}}"#).unwrap();
        let message = envelope.message.data_message().unwrap();
        assert_eq!(message.data, Some(Payload::Text("not base64!".to_string())));
    }

    #[test]
    fn test_decode_other_kind_with_cid() {
        let envelope =
            decode_envelope(r#"{"cid":"9","error":{"code":3,"message":"bad"}}"#).unwrap();
        assert_eq!(envelope.cid.as_deref(), Some("9"));
        assert_eq!(envelope.kind(), "error");
        let EnvelopeMessage::Other { body, .. } = envelope.message else {
            panic!("expected pass-through kind");
        };
        assert_eq!(body["message"], json!("bad"));
    }

    #[test]
    fn test_decode_rejects_zero_or_many_kinds() {
        assert!(decode_envelope(r#"{"cid":"1"}"#).is_err());
        assert!(decode_envelope(r#"{"match_data":{},"party_data":{}}"#).is_err());
        assert!(decode_envelope("[1,2]").is_err());
        assert!(decode_envelope("{not json").is_err());
    }

    #[test]
    fn test_decode_rejects_bad_op_code() {
        let err = decode_envelope(r#"{"match_data":{"op_code":"seven"}}"#).unwrap_err();
        assert!(matches!(err, NakamaError::DeserializationError(_)));
    }

    #[test]
    fn test_round_trip_non_utf8_payload() {
        let payload: Vec<u8> = vec![0x00, 0xFF, 0xC3, 0x28, 0x80];
        let sent = Envelope::party_data_send("p", 65_535, payload.clone());
        let received = decode_envelope(&encode_envelope(&sent).unwrap()).unwrap();
        let message = received.message.data_message().unwrap();
        assert_eq!(message.data_bytes(), Some(payload.as_slice()));
        assert_eq!(message.op_code, Some(OpCode(65_535)));
    }

    #[test]
    fn test_codec_decodes_binary_frames_and_ignores_control() {
        let codec = EnvelopeCodec;
        let frame = Message::Binary(br#"{"status_presence_event":{}}"#.to_vec());
        let decoded = codec.decode_message(frame).unwrap().unwrap();
        assert_eq!(decoded.kind(), "status_presence_event");
        assert!(codec.decode_message(Message::Ping(vec![1])).unwrap().is_none());
    }

    #[test]
    fn test_codec_encodes_text_frame() {
        let codec = EnvelopeCodec;
        let frame = codec
            .encode_message(&Envelope::match_data_send("m", 7, vec![1u8]))
            .unwrap();
        assert!(matches!(frame, Message::Text(ref text) if text.contains(r#""op_code":"7""#)));
    }
}
