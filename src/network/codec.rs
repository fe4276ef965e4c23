use tokio_tungstenite::tungstenite::Message;

use crate::error::CodecError;
use crate::protocol::{ClientMessage, ServerMessage};

/// Encoding used on one connection, fixed by the frame type of its `join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Text frames carrying JSON.
    Json,
    /// Binary frames carrying MessagePack with named fields.
    MessagePack,
}

pub fn decode_client(format: WireFormat, bytes: &[u8]) -> Result<ClientMessage, CodecError> {
    Ok(match format {
        WireFormat::Json => serde_json::from_slice(bytes)?,
        WireFormat::MessagePack => rmp_serde::from_slice(bytes)?,
    })
}

pub fn encode_server(format: WireFormat, message: &ServerMessage) -> Result<Message, CodecError> {
    Ok(match format {
        WireFormat::Json => Message::Text(serde_json::to_string(message)?.into()),
        WireFormat::MessagePack => Message::Binary(rmp_serde::to_vec_named(message)?.into()),
    })
}

/// Decode a data frame. Control frames yield `None`.
pub fn decode_frame(frame: &Message) -> Option<(WireFormat, Result<ClientMessage, CodecError>)> {
    match frame {
        Message::Text(text) => Some((
            WireFormat::Json,
            decode_client(WireFormat::Json, text.as_bytes()),
        )),
        Message::Binary(data) => Some((
            WireFormat::MessagePack,
            decode_client(WireFormat::MessagePack, &data[..]),
        )),
        _ => None,
    }
}
