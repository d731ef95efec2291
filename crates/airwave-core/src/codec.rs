//! Wire codec
//!
//! Messages travel as JSON text frames over the transport. JSON keeps
//! parity with the browser clients the protocol grew up with; framing
//! is delegated to the WebSocket layer.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::types::Message;

/// Encode a message into a JSON frame
pub fn encode(message: &Message) -> Result<Bytes> {
    let text = serde_json::to_string(message).map_err(|e| Error::EncodeError(e.to_string()))?;
    Ok(Bytes::from(text))
}

/// Decode a JSON frame into a message
pub fn decode(data: &[u8]) -> Result<Message> {
    serde_json::from_slice(data).map_err(|e| Error::DecodeError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JoinStationMessage, PlayerAction, PlayerActionMessage};

    #[test]
    fn round_trip_join() {
        let msg = Message::JoinStation(JoinStationMessage {
            request_id: 7,
            station_id: "abc".into(),
        });
        let bytes = encode(&msg).unwrap();
        match decode(&bytes).unwrap() {
            Message::JoinStation(join) => {
                assert_eq!(join.request_id, 7);
                assert_eq!(join.station_id, "abc");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn action_tag_is_flattened() {
        let msg = Message::PlayerAction(PlayerActionMessage {
            station_id: "abc".into(),
            action: PlayerAction::Seek { time: 12.5 },
        });
        let text = String::from_utf8(encode(&msg).unwrap().to_vec()).unwrap();
        assert!(text.contains("\"type\":\"player_action\""));
        assert!(text.contains("\"action\":\"seek\""));
        assert!(text.contains("\"time\":12.5"));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(decode(b"not json").is_err());
        assert!(decode(b"{\"type\":\"warp_drive\"}").is_err());
    }
}
