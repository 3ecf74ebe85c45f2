//! HTTP front end for the relay.
//!
//! Mounts a single webhook route that accepts every method and hands the
//! request to [`Relay::handle`]. Each request runs in its own tracing span
//! tagged with a generated request ID, which is echoed back in `x-request-id`.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{
        header::{ALLOW, CONTENT_TYPE},
        HeaderMap, HeaderValue, Method,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::relay::{Relay, RelayRequest, RelayResponse};

const REQUEST_ID_HEADER: &str = "x-request-id";

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        if let Some(allow) = self.allow {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static(allow));
        }
        response
    }
}

pub fn build_router(relay: Arc<Relay>, server: &ServerConfig) -> Router {
    Router::new()
        .route(&server.path, any(webhook))
        .layer(DefaultBodyLimit::max(server.max_body_bytes))
        .with_state(relay)
}

async fn webhook(
    State(relay): State<Arc<Relay>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("webhook", %request_id, %method);

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut response = relay
        .handle(RelayRequest::new(method, content_type, body))
        .instrument(span)
        .await
        .into_response();

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Bind and serve until Ctrl-C or SIGTERM, letting in-flight requests finish.
pub async fn serve(relay: Arc<Relay>, server: &ServerConfig) -> Result<()> {
    let app = build_router(relay, server);

    let listener = tokio::net::TcpListener::bind(&server.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", server.bind_address))?;

    let addr = listener
        .local_addr()
        .context("Failed to read listener address")?;
    info!("Webhook listening on http://{}{}", addr, server.path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ParseMode, TelegramConfig};
    use crate::relay::tests::{credentials, Outcome, RecordingNotifier};
    use crate::telegram::TelegramClient;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::util::ServiceExt;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    fn app(notifier: &Arc<RecordingNotifier>) -> Router {
        let relay = Relay::new(notifier.clone(), Some(credentials()), false);
        build_router(Arc::new(relay), &ServerConfig::default())
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_check_returns_ok_with_request_id() {
        let notifier = RecordingNotifier::new(Outcome::Deliver);

        let response = app(&notifier)
            .oneshot(
                Request::builder()
                    .uri("/api/webhook")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert!(body_string(response).await.starts_with("Webhook is active."));
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn json_post_is_forwarded() {
        let notifier = RecordingNotifier::new(Outcome::Deliver);

        let response = app(&notifier)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"symbol":"BTCUSD","action":"buy"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            notifier.sent(),
            vec!["{\n  \"symbol\": \"BTCUSD\",\n  \"action\": \"buy\"\n}".to_string()]
        );
    }

    #[tokio::test]
    async fn delete_is_method_not_allowed() {
        let notifier = RecordingNotifier::new(Outcome::Deliver);

        let response = app(&notifier)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/webhook")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), "GET, HEAD, POST");
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let notifier = RecordingNotifier::new(Outcome::Deliver);

        let response = app(&notifier)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/other")
                    .body(Body::from("BTCUSD buy"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let notifier = RecordingNotifier::new(Outcome::Deliver);
        let relay = Relay::new(notifier.clone(), Some(credentials()), false);
        let server = ServerConfig {
            max_body_bytes: 16,
            ..ServerConfig::default()
        };

        let response = build_router(Arc::new(relay), &server)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/webhook")
                    .body(Body::from("x".repeat(64)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn provider_rejection_surfaces_as_bad_gateway() {
        let telegram = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path("/bot123:abc/sendMessage"))
            .and(matchers::body_json(json!({
                "chat_id": "42",
                "text": "Price crossed 50000",
                "parse_mode": "Markdown"
            })))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "chat not found"
            })))
            .expect(1)
            .mount(&telegram)
            .await;

        let client = TelegramClient::new(&TelegramConfig {
            api_base_url: telegram.uri(),
            parse_mode: ParseMode::Markdown,
            ..TelegramConfig::default()
        })
        .unwrap();
        let relay = Relay::new(Arc::new(client), Some(credentials()), false);

        let response = build_router(Arc::new(relay), &ServerConfig::default())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(r#""Price crossed 50000""#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_string(response).await,
            "Failed to send message. Telegram API Error: chat not found"
        );
    }
}
