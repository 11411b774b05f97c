/// Transport kernel shared by the REST surface and the realtime socket
///
/// The kernel knows nothing about sessions or envelope kinds. It moves
/// bytes and JSON, and leaves meaning to the `nakama` layer.
///
/// # Architecture
///
/// ## Transport Layer
/// - `RestClient`: HTTP client interface, `ReqwestRest` is the default implementation
/// - `SocketAdapter`: one WebSocket connection at a time with a background receive loop
///
/// ## Message Handling
/// - `WsCodec`: encoding and decoding of socket frames
///
/// # Usage
///
/// ```rust,no_run
/// use nakama_client::core::config::WsScheme;
/// use nakama_client::core::kernel::SocketAdapter;
/// use nakama_client::nakama::{Envelope, EnvelopeCodec};
///
/// # async fn example(token: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let mut socket = SocketAdapter::new(EnvelopeCodec);
/// socket
///     .on_message(|envelope| println!("received {}", envelope.kind()))
///     .on_close(|| println!("server went away"));
///
/// socket.connect(WsScheme::Ws, "127.0.0.1", 7350, true, token).await?;
/// socket
///     .send(&Envelope::match_data_send("match.node", 1, vec![1u8, 2, 3]))
///     .await?;
/// socket.close().await;
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod rest;
pub mod ws;

// Re-export key types for convenience
pub use codec::WsCodec;
pub use rest::{Credentials, ReqwestRest, RestClient, RestClientConfig};
pub use ws::{SocketAdapter, SocketCallbacks};
