//! Detector notification endpoint.

use axum::{body::Bytes, extract::State, http::StatusCode};
use colorwatch_core::message::{Notification, MISSING_MESSAGE_REPLY, RECEIVED_REPLY};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// POST /upload - Receive a presence notification and fan it out.
///
/// The body is parsed leniently: anything that is not a JSON object with a
/// `message` key is a 400. Unknown messages are acknowledged without a
/// broadcast.
pub async fn upload(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    let parsed: Option<Value> = serde_json::from_slice(&body).ok();
    let Some(message) = parsed.as_ref().and_then(|v| v.get("message")) else {
        warn!(bytes = body.len(), "Notification without a message");
        return (StatusCode::BAD_REQUEST, MISSING_MESSAGE_REPLY);
    };

    match message.as_str().and_then(Notification::from_text) {
        Some(notification) => {
            let event = notification.broadcast_event();
            let receivers = state.broadcast(event.clone());
            info!(
                event = event.name(),
                message = event.message(),
                receivers,
                "Broadcasting presence event"
            );
        }
        None => {
            debug!(%message, "Unrecognized notification, nothing to broadcast");
        }
    }

    (StatusCode::OK, RECEIVED_REPLY)
}

#[cfg(test)]
mod tests {
    use crate::{create_router, state::AppState};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use colorwatch_core::message::BroadcastEvent;
    use tokio::sync::broadcast::error::TryRecvError;
    use tower::ServiceExt;

    async fn post(state: &AppState, body: &'static str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn event(message: &str) -> BroadcastEvent {
        BroadcastEvent::ColorDetected {
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_detected_is_broadcast() {
        let state = AppState::new();
        let mut rx = state.subscribe();

        let (status, body) = post(&state, r#"{"message": "Color azul detectado"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Mensaje recibido");
        assert_eq!(rx.try_recv().unwrap(), event("Color azul detectado"));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_not_detected_is_normalized() {
        let state = AppState::new();
        let mut rx = state.subscribe();

        let (status, body) = post(&state, r#"{"message": "Color azul no detectado"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Mensaje recibido");
        assert_eq!(rx.try_recv().unwrap(), event("No se ha detectado el color azul"));
    }

    #[tokio::test]
    async fn test_missing_message_is_rejected() {
        let state = AppState::new();
        let mut rx = state.subscribe();

        for body in ["{}", "", "not json", "[1, 2]", r#"{"msg": "Color azul detectado"}"#] {
            let (status, reply) = post(&state, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {:?}", body);
            assert_eq!(reply, "No se recibió ningún mensaje");
        }
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_unknown_message_is_acknowledged_silently() {
        let state = AppState::new();
        let mut rx = state.subscribe();

        for body in [r#"{"message": "unexpected"}"#, r#"{"message": 42}"#, r#"{"message": null}"#] {
            let (status, reply) = post(&state, body).await;
            assert_eq!(status, StatusCode::OK, "body {:?}", body);
            assert_eq!(reply, "Mensaje recibido");
        }
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_no_viewers_still_succeeds() {
        let state = AppState::new();
        let (status, _) = post(&state, r#"{"message": "Color azul detectado"}"#).await;
        assert_eq!(status, StatusCode::OK);
    }
}
