/*
[INPUT]:  Text frames of the Engine.IO v4 / socket.io v5 wire protocol
[OUTPUT]: Parsed Packet values and their text encoding
[POS]:    WebSocket layer - event channel framing
[UPDATE]: When supporting new packet kinds or protocol revisions
*/

use crate::http::{Result, TaskerError};
use serde_json::Value;

/// Engine.IO packet (one WebSocket text frame)
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Session handshake sent by the server once the socket opens
    Open(Value),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

/// socket.io packet kinds carried inside an Engine.IO message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
    BinaryEvent,
    BinaryAck,
}

impl SocketKind {
    fn from_digit(digit: char) -> Option<Self> {
        Some(match digit {
            '0' => SocketKind::Connect,
            '1' => SocketKind::Disconnect,
            '2' => SocketKind::Event,
            '3' => SocketKind::Ack,
            '4' => SocketKind::ConnectError,
            '5' => SocketKind::BinaryEvent,
            '6' => SocketKind::BinaryAck,
            _ => return None,
        })
    }

    fn digit(self) -> char {
        match self {
            SocketKind::Connect => '0',
            SocketKind::Disconnect => '1',
            SocketKind::Event => '2',
            SocketKind::Ack => '3',
            SocketKind::ConnectError => '4',
            SocketKind::BinaryEvent => '5',
            SocketKind::BinaryAck => '6',
        }
    }

    fn is_binary(self) -> bool {
        matches!(self, SocketKind::BinaryEvent | SocketKind::BinaryAck)
    }
}

/// socket.io packet addressed to a namespace
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    pub kind: SocketKind,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    pub fn connect(namespace: &str) -> Self {
        Self {
            kind: SocketKind::Connect,
            namespace: namespace.to_string(),
            ack_id: None,
            data: None,
        }
    }

    pub fn disconnect(namespace: &str) -> Self {
        Self {
            kind: SocketKind::Disconnect,
            namespace: namespace.to_string(),
            ack_id: None,
            data: None,
        }
    }

    pub fn event(namespace: &str, name: &str, payload: Value) -> Self {
        Self {
            kind: SocketKind::Event,
            namespace: namespace.to_string(),
            ack_id: None,
            data: Some(Value::Array(vec![Value::String(name.to_string()), payload])),
        }
    }

    /// Event name and first argument of an EVENT packet
    pub fn as_event(&self) -> Option<(&str, Value)> {
        if self.kind != SocketKind::Event {
            return None;
        }
        let args = self.data.as_ref()?.as_array()?;
        let name = args.first()?.as_str()?;
        let payload = args.get(1).cloned().unwrap_or(Value::Null);
        Some((name, payload))
    }
}

impl Packet {
    /// Parse one text frame
    pub fn parse(frame: &str) -> Result<Self> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| TaskerError::InvalidResponse("empty packet".to_string()))?;
        let rest = chars.as_str();

        match kind {
            '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping(rest.to_string())),
            '3' => Ok(Packet::Pong(rest.to_string())),
            '4' => Ok(Packet::Message(parse_socket_packet(rest)?)),
            '5' => Ok(Packet::Upgrade),
            '6' => Ok(Packet::Noop),
            other => Err(TaskerError::InvalidResponse(format!(
                "unknown packet type {other:?}"
            ))),
        }
    }

    /// Encode as one text frame
    pub fn encode(&self) -> String {
        match self {
            Packet::Open(handshake) => format!("0{handshake}"),
            Packet::Close => "1".to_string(),
            Packet::Ping(data) => format!("2{data}"),
            Packet::Pong(data) => format!("3{data}"),
            Packet::Message(packet) => {
                let mut out = String::from("4");
                out.push(packet.kind.digit());
                if packet.namespace != "/" {
                    out.push_str(&packet.namespace);
                    out.push(',');
                }
                if let Some(ack_id) = packet.ack_id {
                    out.push_str(&ack_id.to_string());
                }
                if let Some(data) = &packet.data {
                    out.push_str(&data.to_string());
                }
                out
            }
            Packet::Upgrade => "5".to_string(),
            Packet::Noop => "6".to_string(),
        }
    }
}

fn parse_socket_packet(input: &str) -> Result<SocketPacket> {
    let mut chars = input.chars();
    let kind = chars
        .next()
        .and_then(SocketKind::from_digit)
        .ok_or_else(|| TaskerError::InvalidResponse(format!("bad socket packet: {input}")))?;
    let mut rest = chars.as_str();

    // Binary packets carry "<attachments>-" before the namespace.
    if kind.is_binary() {
        let dash = rest.find('-').ok_or_else(|| {
            TaskerError::InvalidResponse("binary packet without attachment count".to_string())
        })?;
        rest = &rest[dash + 1..];
    }

    let namespace = if rest.starts_with('/') {
        match rest.find(',') {
            Some(comma) => {
                let namespace = &rest[..comma];
                rest = &rest[comma + 1..];
                namespace.to_string()
            }
            None => {
                let namespace = rest.to_string();
                rest = "";
                namespace
            }
        }
    } else {
        "/".to_string()
    };

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let ack_id = if digits > 0 {
        let id = rest[..digits]
            .parse()
            .map_err(|_| TaskerError::InvalidResponse(format!("bad ack id in {input}")))?;
        rest = &rest[digits..];
        Some(id)
    } else {
        None
    };

    let data = if rest.is_empty() {
        None
    } else {
        Some(serde_json::from_str(rest)?)
    };

    Ok(SocketPacket {
        kind,
        namespace,
        ack_id,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_parse_open_handshake() {
        let packet = Packet::parse(r#"0{"sid":"abc","pingInterval":25000,"pingTimeout":20000}"#)
            .expect("open packet");
        match packet {
            Packet::Open(handshake) => assert_eq!(handshake["sid"], "abc"),
            other => panic!("Expected Open, got {other:?}"),
        }
    }

    #[rstest]
    #[case("1", Packet::Close)]
    #[case("2", Packet::Ping(String::new()))]
    #[case("2probe", Packet::Ping("probe".to_string()))]
    #[case("3", Packet::Pong(String::new()))]
    #[case("6", Packet::Noop)]
    fn test_parse_engine_packets(#[case] frame: &str, #[case] expected: Packet) {
        assert_eq!(Packet::parse(frame).expect("engine packet"), expected);
    }

    #[test]
    fn test_parse_namespaced_event() {
        let packet = Packet::parse(r#"42/status,["progress",{"task_id":"A1","data":50}]"#)
            .expect("event packet");
        let Packet::Message(socket) = packet else {
            panic!("Expected Message");
        };
        assert_eq!(socket.namespace, "/status");
        assert_eq!(socket.ack_id, None);
        let (name, payload) = socket.as_event().expect("event");
        assert_eq!(name, "progress");
        assert_eq!(payload, json!({"task_id": "A1", "data": 50}));
    }

    #[test]
    fn test_parse_event_with_ack_id_on_root_namespace() {
        let Packet::Message(socket) = Packet::parse(r#"4212["success",{"task_id":"A1"}]"#)
            .expect("event packet")
        else {
            panic!("Expected Message");
        };
        assert_eq!(socket.namespace, "/");
        assert_eq!(socket.ack_id, Some(12));
        assert_eq!(socket.as_event().map(|(name, _)| name), Some("success"));
    }

    #[test]
    fn test_parse_event_without_payload() {
        let Packet::Message(socket) = Packet::parse(r#"42/status,["terminate"]"#).expect("event")
        else {
            panic!("Expected Message");
        };
        assert_eq!(socket.as_event(), Some(("terminate", Value::Null)));
    }

    #[test]
    fn test_parse_connect_ack_and_error() {
        let Packet::Message(ack) = Packet::parse(r#"40/status,{"sid":"xyz"}"#).expect("ack") else {
            panic!("Expected Message");
        };
        assert_eq!(ack.kind, SocketKind::Connect);
        assert_eq!(ack.data, Some(json!({"sid": "xyz"})));

        let Packet::Message(err) =
            Packet::parse(r#"44/status,{"message":"not authorized"}"#).expect("error")
        else {
            panic!("Expected Message");
        };
        assert_eq!(err.kind, SocketKind::ConnectError);
    }

    #[test]
    fn test_parse_binary_event_skips_attachment_count() {
        let Packet::Message(socket) =
            Packet::parse(r#"451-/status,["blob",{"_placeholder":true,"num":0}]"#).expect("binary")
        else {
            panic!("Expected Message");
        };
        assert_eq!(socket.kind, SocketKind::BinaryEvent);
        assert_eq!(socket.namespace, "/status");
    }

    #[test]
    fn test_encode_client_packets() {
        assert_eq!(
            Packet::Message(SocketPacket::connect("/status")).encode(),
            "40/status,"
        );
        assert_eq!(Packet::Message(SocketPacket::connect("/")).encode(), "40");
        assert_eq!(
            Packet::Message(SocketPacket::disconnect("/status")).encode(),
            "41/status,"
        );
        assert_eq!(Packet::Pong(String::new()).encode(), "3");
        assert_eq!(
            Packet::Message(SocketPacket::event("/status", "activate", json!({"task_id": "A1"})))
                .encode(),
            r#"42/status,["activate",{"task_id":"A1"}]"#
        );
    }

    #[rstest]
    #[case("")]
    #[case("9")]
    #[case("4x")]
    #[case("42/status,[broken")]
    fn test_parse_rejects_malformed(#[case] frame: &str) {
        assert!(Packet::parse(frame).is_err());
    }
}
