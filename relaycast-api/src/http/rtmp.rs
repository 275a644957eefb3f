//! Relay engine webhooks
//!
//! The engine calls these on publish start and stop. It only accepts a
//! publish when the reply is HTTP 200 with the plain-text body `0`, so these
//! handlers answer in that format rather than through `AppError`.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use tracing::{info, warn};

use relaycast_core::redact;

use crate::http::AppState;

/// Callback payload sent by the relay engine.
#[derive(Debug, Deserialize)]
pub struct PublishHook {
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub stream: String,
    #[serde(default, rename = "tcUrl")]
    pub tc_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub vhost: String,
    #[serde(default)]
    pub param: String,
}

pub fn create_rtmp_router() -> Router<AppState> {
    Router::new()
        .route("/api/rtmp/auth", post(on_publish))
        .route("/api/rtmp/publish-done", post(on_unpublish))
}

fn plain(status: StatusCode, body: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}

fn accepted() -> Response {
    plain(StatusCode::OK, "0")
}

fn parse(body: &[u8]) -> Result<PublishHook, Response> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Malformed relay engine callback");
        plain(StatusCode::BAD_REQUEST, "Invalid JSON payload")
    })
}

/// POST /api/rtmp/auth
pub async fn on_publish(State(state): State<AppState>, body: Bytes) -> Response {
    let hook = match parse(&body) {
        Ok(hook) => hook,
        Err(response) => return response,
    };

    if hook.stream.is_empty() {
        return plain(StatusCode::BAD_REQUEST, "Missing stream key");
    }

    if !state.simulcast.keys().validate(&hook.stream) {
        warn!(
            stream_key = %redact(&hook.stream),
            client_ip = %hook.ip,
            "Publish rejected: invalid stream key"
        );
        return plain(StatusCode::UNAUTHORIZED, "Invalid stream key");
    }

    info!(
        stream_key = %redact(&hook.stream),
        app = %hook.app,
        client_id = %hook.client_id,
        client_ip = %hook.ip,
        "Publish accepted"
    );
    accepted()
}

/// POST /api/rtmp/publish-done
pub async fn on_unpublish(body: Bytes) -> Response {
    let hook = match parse(&body) {
        Ok(hook) => hook,
        Err(response) => return response,
    };

    info!(
        stream_key = %redact(&hook.stream),
        app = %hook.app,
        client_id = %hook.client_id,
        "Publish finished"
    );
    accepted()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::json;

    use crate::http::test_util::{app, json_request, send};

    fn hook(stream: &str) -> serde_json::Value {
        json!({
            "app": "live",
            "stream": stream,
            "tcUrl": "rtmp://localhost/live",
            "client_id": "c1",
            "ip": "127.0.0.1",
            "vhost": "__defaultVhost__",
            "param": ""
        })
    }

    #[tokio::test]
    async fn test_valid_key_is_accepted_with_plain_zero() {
        let app = app();
        let key = app.simulcast.generate_stream_key("u1").unwrap();

        let (status, headers, body) = send(&app.router, json_request("POST", "/api/rtmp/auth", &hook(&key))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(&body[..], b"0");
    }

    #[tokio::test]
    async fn test_unknown_and_revoked_keys_are_rejected() {
        let app = app();
        let (status, _, _) = send(&app.router, json_request("POST", "/api/rtmp/auth", &hook("bogus"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let key = app.simulcast.generate_stream_key("u1").unwrap();
        app.simulcast.keys().revoke(&key);
        let (status, _, _) = send(&app.router, json_request("POST", "/api/rtmp/auth", &hook(&key))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_stream_is_bad_request() {
        let app = app();
        let (status, _, _) = send(&app.router, json_request("POST", "/api/rtmp/auth", &json!({"app": "live"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_callbacks_are_bad_request() {
        let app = app();
        for uri in ["/api/rtmp/auth", "/api/rtmp/publish-done"] {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::from("{not json"))
                .unwrap();
            let (status, _, _) = send(&app.router, request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_publish_done_acknowledges() {
        let app = app();
        let (status, headers, body) =
            send(&app.router, json_request("POST", "/api/rtmp/publish-done", &hook("any"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(&body[..], b"0");
    }
}
