use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The kind of an envelope, carried as a plain string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Join,
    Update,
    Chat,
    Notification,
    GameOver,
    Leave,
    Shot,
    /// Any event name this client does not know about.
    Unknown(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Join => "join",
            EventKind::Update => "update",
            EventKind::Chat => "chat",
            EventKind::Notification => "notification",
            EventKind::GameOver => "gameover",
            EventKind::Leave => "leave",
            EventKind::Shot => "shot",
            EventKind::Unknown(name) => name,
        }
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        match name {
            "join" => EventKind::Join,
            "update" => EventKind::Update,
            "chat" => EventKind::Chat,
            "notification" => EventKind::Notification,
            "gameover" => EventKind::GameOver,
            "leave" => EventKind::Leave,
            "shot" => EventKind::Shot,
            other => EventKind::Unknown(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        EventKind::from(name.as_str())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit exchanged over the connection in both directions.
///
/// `message` is itself a JSON document for every structured payload, so a
/// chat frame looks like `{"event":"chat","message":"{\"name\":..}"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: EventKind,
    /// empty when the event carries no payload
    #[serde(default)]
    pub message: String,
}

impl Envelope {
    pub fn new(event: EventKind, message: impl Into<String>) -> Self {
        Envelope {
            event,
            message: message.into(),
        }
    }

    /// Parses a raw text frame into an envelope.
    ///
    /// # Arguments
    /// * `frame` - The text frame as received from the server.
    ///
    /// # Returns
    /// * `Ok(envelope)` - The parsed envelope.
    /// * `Err(ProtocolError::Envelope)` - The frame is not an envelope.
    ///
    pub fn from_frame(frame: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(frame).map_err(ProtocolError::Envelope)
    }

    /// Serializes the envelope into a text frame.
    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("malformed `{event}` payload: {source}")]
    Payload {
        event: EventKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Decodes the JSON document nested inside an envelope's `message`.
///
/// # Arguments
/// * `event` - The kind of the envelope, used for diagnostics.
/// * `raw` - The `message` field of the envelope.
///
/// # Returns
/// * `Ok(payload)` - The typed payload.
/// * `Err(ProtocolError::Payload)` - `raw` is not a valid `T`.
///
pub fn decode_payload<T: DeserializeOwned>(event: &EventKind, raw: &str) -> Result<T, ProtocolError> {
    serde_json::from_str(raw).map_err(|source| ProtocolError::Payload {
        event: event.clone(),
        source,
    })
}

/// Builds an envelope whose `message` is the JSON encoding of `payload`.
pub fn encode_payload<T: Serialize + ?Sized>(event: EventKind, payload: &T) -> Result<Envelope, ProtocolError> {
    let message = serde_json::to_string(payload).map_err(ProtocolError::Encode)?;
    Ok(Envelope::new(event, message))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// display name of the sender, the server uses "Me" and "Opponent"
    pub name: String,
    /// the message the player has sent
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverResult {
    pub is_winner: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_kind_round_trips_known_names() {
        for name in ["join", "update", "chat", "notification", "gameover", "leave", "shot"] {
            let kind = EventKind::from(name);
            assert!(!matches!(kind, EventKind::Unknown(_)), "{} parsed as unknown", name);
            assert_eq!(kind.as_str(), name);
        }
    }

    #[test]
    fn unknown_event_keeps_its_name() {
        let envelope = Envelope::from_frame(r#"{"event":"spectate","message":""}"#).unwrap();
        assert_eq!(envelope.event, EventKind::Unknown("spectate".to_string()));
        assert_eq!(envelope.to_frame().unwrap(), r#"{"event":"spectate","message":""}"#);
    }

    #[test]
    fn empty_message_is_serialized() {
        let frame = Envelope::new(EventKind::Leave, "").to_frame().unwrap();
        assert_eq!(frame, r#"{"event":"leave","message":""}"#);
    }

    #[test]
    fn missing_message_reads_as_empty() {
        let envelope = Envelope::from_frame(r#"{"event":"leave"}"#).unwrap();
        assert_eq!(envelope, Envelope::new(EventKind::Leave, ""));
    }

    #[test]
    fn envelope_without_event_is_rejected() {
        let err = Envelope::from_frame(r#"{"message":"7"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Envelope(_)));
        assert!(Envelope::from_frame("not json").is_err());
    }

    #[test]
    fn chat_payload_is_double_encoded() {
        let chat = ChatMessage {
            name: "Me".to_string(),
            message: "hello".to_string(),
        };
        let frame = encode_payload(EventKind::Chat, &chat).unwrap().to_frame().unwrap();
        let outer: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(outer["event"], "chat");
        assert_eq!(outer["message"], r#"{"name":"Me","message":"hello"}"#);
    }

    #[test]
    fn decodes_server_payloads() {
        let over: GameOverResult = decode_payload(&EventKind::GameOver, r#"{"isWinner":true}"#).unwrap();
        assert!(over.is_winner);

        let note: Notification =
            decode_payload(&EventKind::Notification, r#"{"message":"Opponent has left the game"}"#).unwrap();
        assert_eq!(note.message, "Opponent has left the game");
    }

    #[test]
    fn payload_error_names_the_event() {
        let err = decode_payload::<ChatMessage>(&EventKind::Chat, "{").unwrap_err();
        match &err {
            ProtocolError::Payload { event, .. } => assert_eq!(*event, EventKind::Chat),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().starts_with("malformed `chat` payload"));
    }

    #[test]
    fn opaque_payload_survives_encoding() {
        let square = json!({"x": 3, "y": 4});
        let envelope = encode_payload(EventKind::Shot, &square).unwrap();
        let decoded: serde_json::Value = decode_payload(&envelope.event, &envelope.message).unwrap();
        assert_eq!(decoded, square);
    }
}
