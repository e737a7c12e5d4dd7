//! Wire messages exchanged between the detector and the relay server.

use serde::{Deserialize, Serialize};

/// Text sent by the detector when the color appears.
pub const DETECTED_TEXT: &str = "Color azul detectado";

/// Text sent by the detector when the color disappears.
pub const NOT_DETECTED_TEXT: &str = "Color azul no detectado";

/// Text broadcast to viewers when the color disappears.
pub const NOT_DETECTED_BROADCAST_TEXT: &str = "No se ha detectado el color azul";

/// Name of the real-time event pushed to viewers.
pub const COLOR_DETECTED_EVENT: &str = "color_detected";

/// Relay reply when a notification was accepted.
pub const RECEIVED_REPLY: &str = "Mensaje recibido";

/// Relay reply when the request carried no message.
pub const MISSING_MESSAGE_REPLY: &str = "No se recibió ningún mensaje";

/// A presence transition reported by the detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Notification {
    Detected,
    NotDetected,
}

impl Notification {
    /// Literal text carried in the `message` field.
    pub fn text(self) -> &'static str {
        match self {
            Self::Detected => DETECTED_TEXT,
            Self::NotDetected => NOT_DETECTED_TEXT,
        }
    }

    /// Match one of the two known literals. Anything else is unknown.
    pub fn from_text(text: &str) -> Option<Self> {
        match text {
            DETECTED_TEXT => Some(Self::Detected),
            NOT_DETECTED_TEXT => Some(Self::NotDetected),
            _ => None,
        }
    }

    /// Request body posted to the relay.
    pub fn payload(self) -> NotificationMessage {
        NotificationMessage {
            message: self.text().to_string(),
        }
    }

    /// Normalized event the relay fans out for this notification.
    pub fn broadcast_event(self) -> BroadcastEvent {
        let message = match self {
            Self::Detected => DETECTED_TEXT,
            Self::NotDetected => NOT_DETECTED_BROADCAST_TEXT,
        };
        BroadcastEvent::ColorDetected {
            message: message.to_string(),
        }
    }
}

/// `{"message": "..."}` body of `POST /upload`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct NotificationMessage {
    pub message: String,
}

/// Events pushed to real-time viewers.
///
/// Serialized as `{"event": "color_detected", "data": {"message": "..."}}`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum BroadcastEvent {
    ColorDetected { message: String },
}

impl BroadcastEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ColorDetected { .. } => COLOR_DETECTED_EVENT,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::ColorDetected { message } => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_texts_parse() {
        assert_eq!(Notification::from_text("Color azul detectado"), Some(Notification::Detected));
        assert_eq!(
            Notification::from_text("Color azul no detectado"),
            Some(Notification::NotDetected)
        );
        assert_eq!(Notification::from_text("unexpected"), None);
        assert_eq!(Notification::from_text(""), None);
    }

    #[test]
    fn test_not_detected_is_normalized() {
        let event = Notification::NotDetected.broadcast_event();
        assert_eq!(event.message(), "No se ha detectado el color azul");
        assert_eq!(event.name(), "color_detected");

        let event = Notification::Detected.broadcast_event();
        assert_eq!(event.message(), "Color azul detectado");
    }

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(Notification::Detected.broadcast_event()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "color_detected", "data": {"message": "Color azul detectado"}})
        );
    }

    #[test]
    fn test_payload_shape() {
        let json = serde_json::to_value(Notification::NotDetected.payload()).unwrap();
        assert_eq!(json, serde_json::json!({"message": "Color azul no detectado"}));
    }
}
