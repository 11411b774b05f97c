use crate::core::errors::NakamaError;
use tokio_tungstenite::tungstenite::Message;

/// Codec trait for converting between in-process messages and WebSocket frames
///
/// The socket adapter owns the connection discipline; a codec owns the
/// payload format. One `encode_message` call produces exactly one frame.
pub trait WsCodec: Send + Sync + 'static {
    /// The structured message exchanged in both directions
    type Message: Send + Sync + 'static;

    /// Encode a message into a single WebSocket frame
    fn encode_message(&self, message: &Self::Message) -> Result<Message, NakamaError>;

    /// Decode a raw WebSocket data frame into a typed message
    ///
    /// Control frames (ping, pong, close) are handled by the transport and
    /// never reach the codec.
    ///
    /// # Returns
    /// - `Ok(Some(message))` - Successfully decoded message
    /// - `Ok(None)` - Frame carried nothing for the application
    /// - `Err(error)` - The frame could not be decoded
    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, NakamaError>;
}
