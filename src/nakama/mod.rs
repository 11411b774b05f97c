pub mod builder;
pub mod client;
pub mod codec;
pub mod rest;
pub mod session;
pub mod types;

pub use builder::{build_client, build_client_from_env};
pub use client::Client;
pub use codec::EnvelopeCodec;
pub use session::Session;
pub use types::{DataMessage, Envelope, EnvelopeMessage, OpCode, Payload};
