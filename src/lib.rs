pub mod core;
pub mod nakama;

pub use crate::core::{
    config::{ClientConfig, SocketConfig},
    errors::NakamaError,
    kernel::SocketAdapter,
    traits::{AccountApi, Authenticator, NakamaApi},
};
pub use crate::nakama::{
    build_client, Client, DataMessage, Envelope, EnvelopeCodec, EnvelopeMessage, OpCode, Payload,
    Session,
};
