use crate::core::errors::NakamaError;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const MATCH_DATA_SEND: &str = "match_data_send";
pub const PARTY_DATA_SEND: &str = "party_data_send";
pub const MATCH_DATA: &str = "match_data";
pub const PARTY_DATA: &str = "party_data";

/// Application-defined message code carried by match and party data
///
/// Always written to the wire as a decimal string; read back from either a
/// string or a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpCode(pub i64);

impl OpCode {
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OpCode {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<i32> for OpCode {
    fn from(value: i32) -> Self {
        Self(i64::from(value))
    }
}

impl From<u32> for OpCode {
    fn from(value: u32) -> Self {
        Self(i64::from(value))
    }
}

impl FromStr for OpCode {
    type Err = NakamaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| NakamaError::InvalidArgument(format!("op code is not an integer: {:?}", s)))
    }
}

impl TryFrom<&str> for OpCode {
    type Error = NakamaError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Serialize for OpCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OpCodeVisitor;

        impl Visitor<'_> for OpCodeVisitor {
            type Value = OpCode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer or a decimal string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<OpCode, E> {
                Ok(OpCode(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<OpCode, E> {
                i64::try_from(v)
                    .map(OpCode)
                    .map_err(|_| E::custom(format!("op code out of range: {}", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<OpCode, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(OpCodeVisitor)
    }
}

/// Binary payload of a data message
///
/// Text is accepted for convenience and sent as its UTF-8 bytes. Inbound
/// data that is not valid base64 stays as `Text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bytes(Vec<u8>),
    Text(String),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Text(text) => text.as_bytes(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Text(text) => text.into_bytes(),
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Payload {
    fn from(bytes: [u8; N]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Body of the four data-bearing envelope kinds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataMessage {
    pub op_code: Option<OpCode>,
    pub data: Option<Payload>,
    /// Remaining fields (`match_id`, `presences`, `reliable`, ...), passed through untouched
    pub fields: Map<String, Value>,
}

impl DataMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_op_code(mut self, op_code: impl Into<OpCode>) -> Self {
        self.op_code = Some(op_code.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<Payload>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn data_bytes(&self) -> Option<&[u8]> {
        self.data.as_ref().map(Payload::as_bytes)
    }
}

/// The operation carried by an envelope
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeMessage {
    MatchDataSend(DataMessage),
    PartyDataSend(DataMessage),
    MatchData(DataMessage),
    PartyData(DataMessage),
    /// Any other kind, carried as raw JSON
    Other { kind: String, body: Value },
}

impl EnvelopeMessage {
    pub fn kind(&self) -> &str {
        match self {
            Self::MatchDataSend(_) => MATCH_DATA_SEND,
            Self::PartyDataSend(_) => PARTY_DATA_SEND,
            Self::MatchData(_) => MATCH_DATA,
            Self::PartyData(_) => PARTY_DATA,
            Self::Other { kind, .. } => kind,
        }
    }

    pub fn data_message(&self) -> Option<&DataMessage> {
        match self {
            Self::MatchDataSend(m) | Self::PartyDataSend(m) | Self::MatchData(m) | Self::PartyData(m) => {
                Some(m)
            }
            Self::Other { .. } => None,
        }
    }
}

/// One message exchanged over the realtime socket
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Correlation id linking a request to its response
    pub cid: Option<String>,
    pub message: EnvelopeMessage,
}

impl Envelope {
    pub fn new(message: EnvelopeMessage) -> Self {
        Self { cid: None, message }
    }

    pub fn with_cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }

    /// Envelope of any kind not modelled explicitly, e.g. `match_join`
    pub fn other(kind: impl Into<String>, body: Value) -> Self {
        Self::new(EnvelopeMessage::Other {
            kind: kind.into(),
            body,
        })
    }

    pub fn match_data_send(
        match_id: impl Into<String>,
        op_code: impl Into<OpCode>,
        data: impl Into<Payload>,
    ) -> Self {
        Self::new(EnvelopeMessage::MatchDataSend(
            DataMessage::new()
                .with_field("match_id", match_id.into())
                .with_op_code(op_code)
                .with_data(data),
        ))
    }

    pub fn party_data_send(
        party_id: impl Into<String>,
        op_code: impl Into<OpCode>,
        data: impl Into<Payload>,
    ) -> Self {
        Self::new(EnvelopeMessage::PartyDataSend(
            DataMessage::new()
                .with_field("party_id", party_id.into())
                .with_op_code(op_code)
                .with_data(data),
        ))
    }

    pub fn kind(&self) -> &str {
        self.message.kind()
    }
}

/// Session tokens as returned by the authenticate and refresh endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSession {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionRefreshRequest {
    pub token: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub vars: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionLogoutRequest {
    pub token: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub refresh_token: String,
}

/// Body of the device and custom-id authenticate calls
#[derive(Debug, Clone, Serialize)]
pub struct AccountId {
    pub id: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub vars: HashMap<String, String>,
}
