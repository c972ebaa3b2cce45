//! JSON message codec
//!
//! serde_json rendition of the message schema. The production wire format
//! is owned by an external serializer; anything implementing
//! `MessageCodec` can be swapped in at the session boundary.

use super::error::{ClientError, Result};
use super::traits::MessageCodec;
use super::types::{ClientMsg, ServerMsg};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Decode a client message. Used by tests and loopback tooling to
    /// inspect what the session sent.
    pub fn decode_client(&self, payload: &[u8]) -> Result<ClientMsg> {
        serde_json::from_slice(payload).map_err(|e| ClientError::Codec(e.to_string()))
    }

    /// Encode a server message, the mirror of `decode`.
    pub fn encode_server(&self, msg: &ServerMsg) -> Result<Vec<u8>> {
        serde_json::to_vec(msg).map_err(|e| ClientError::Codec(e.to_string()))
    }
}

impl MessageCodec for JsonCodec {
    fn encode(&self, msg: &ClientMsg) -> Result<Vec<u8>> {
        serde_json::to_vec(msg).map_err(|e| ClientError::Codec(e.to_string()))
    }

    fn decode(&self, payload: &[u8]) -> Result<ServerMsg> {
        serde_json::from_slice(payload).map_err(|e| ClientError::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webapi::types::{Ping, Pong};

    #[test]
    fn test_empty_batch_decodes() {
        let msg = JsonCodec.decode(b"{}").unwrap();
        assert_eq!(msg, ServerMsg::default());
    }

    #[test]
    fn test_ping_batch_decodes() {
        let msg = JsonCodec
            .decode(br#"{"ping":{"token":"t1","ping_utc_time":42}}"#)
            .unwrap();
        assert_eq!(msg.ping, Some(Ping { token: "t1".into(), ping_utc_time: 42 }));
    }

    #[test]
    fn test_client_msg_omits_empty_fields() {
        let msg = ClientMsg {
            pong: Some(Pong { token: "t".into(), ping_utc_time: 1, pong_utc_time: 2 }),
            ..Default::default()
        };
        let text = String::from_utf8(JsonCodec.encode(&msg).unwrap()).unwrap();
        assert!(!text.contains("information_request"));
        assert!(text.contains("\"pong\""));
    }

    #[test]
    fn test_garbage_is_codec_error() {
        assert!(matches!(JsonCodec.decode(b"\x00\x01"), Err(ClientError::Codec(_))));
    }
}
