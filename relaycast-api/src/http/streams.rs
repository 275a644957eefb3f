//! Stream key and simulcast endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relaycast_core::{redact, Privacy, StreamOptions};
use relaycast_livestream::livestream::WorkerInfo;
use relaycast_livestream::{CreateStreamReport, CreateStreamRequest, DeleteStreamReport};

use crate::http::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct GenerateStreamKeyRequest {
    #[serde(default, rename = "userID")]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateStreamKeyResponse {
    pub stream_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStreamBody {
    #[serde(default, rename = "userID")]
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub privacy: Privacy,
    #[serde(default)]
    pub scheduled_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub destinations: Vec<String>,
}

/// Per-platform line of a create response. Platform credentials are never
/// echoed back.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationStatus {
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitFailure {
    pub unit: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStreamResponse {
    pub stream_key: String,
    pub ingest_url: String,
    pub hls_play_url: String,
    pub title: String,
    pub description: String,
    pub destinations: Vec<DestinationStatus>,
    /// Set when the stream was recorded but the relay engine refused it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile_error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub worker_errors: Vec<UnitFailure>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteStreamResponse {
    pub key_revoked: bool,
    pub was_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile_error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_failures: Vec<UnitFailure>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayTargetView {
    pub platform: String,
    pub url: String,
    pub stream_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamView {
    pub stream_key: String,
    pub ingest_url: String,
    pub hls_play_url: String,
    pub created_at: DateTime<Utc>,
    pub destinations: Vec<RelayTargetView>,
    pub workers: Vec<WorkerInfo>,
}

pub fn create_stream_router() -> Router<AppState> {
    Router::new()
        .route("/api/generate-stream-key", post(generate_stream_key))
        .route("/api/streams", post(create_stream))
        .route("/api/streams/{key}", get(get_stream).delete(delete_stream))
}

/// POST /api/generate-stream-key
pub async fn generate_stream_key(
    State(state): State<AppState>,
    payload: Result<Json<GenerateStreamKeyRequest>, JsonRejection>,
) -> AppResult<Json<GenerateStreamKeyResponse>> {
    let Json(req) = payload?;
    let stream_key = state.simulcast.generate_stream_key(&req.user_id)?;
    Ok(Json(GenerateStreamKeyResponse { stream_key }))
}

/// POST /api/streams
///
/// Partial success still answers 200; the body says which platforms failed
/// and whether the relay engine accepted the change.
pub async fn create_stream(
    State(state): State<AppState>,
    payload: Result<Json<CreateStreamBody>, JsonRejection>,
) -> AppResult<Json<CreateStreamResponse>> {
    let Json(body) = payload?;
    let options = StreamOptions {
        title: body.title,
        description: body.description,
        privacy: body.privacy,
        scheduled_start: body.scheduled_start,
    };
    let request = CreateStreamRequest {
        owner_id: body.user_id,
        options: options.clone(),
        destinations: body.destinations,
    };

    let report = state.simulcast.create_stream(request).await?;
    Ok(Json(create_response(report, options)))
}

fn create_response(report: CreateStreamReport, options: StreamOptions) -> CreateStreamResponse {
    let destinations = report
        .platforms
        .into_iter()
        .map(|result| match result.outcome {
            Ok(provisioned) => DestinationStatus {
                platform: result.platform,
                url: Some(provisioned.destination.url),
                broadcast_id: Some(provisioned.broadcast_id),
                watch_url: Some(provisioned.watch_url),
                error: None,
            },
            Err(e) => DestinationStatus {
                platform: result.platform,
                url: None,
                broadcast_id: None,
                watch_url: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    CreateStreamResponse {
        stream_key: report.stream_key,
        ingest_url: report.ingest_url,
        hls_play_url: report.hls_url,
        title: options.title,
        description: options.description,
        destinations,
        reconcile_error: report.reconcile_error.map(|e| e.to_string()),
        worker_errors: unit_failures(report.worker_errors),
    }
}

fn unit_failures(failures: Vec<(String, relaycast_livestream::StreamError)>) -> Vec<UnitFailure> {
    failures
        .into_iter()
        .map(|(unit, e)| UnitFailure {
            unit,
            error: e.to_string(),
        })
        .collect()
}

/// DELETE /api/streams/{key}
///
/// Answers 200 for unknown keys too; the body says what was torn down.
/// A key that could never have been issued is a 400.
pub async fn delete_stream(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<DeleteStreamResponse>> {
    let DeleteStreamReport {
        key_revoked,
        was_active,
        reconcile_error,
        stop_failures,
        ..
    } = state.simulcast.delete_stream(&key).await?;

    Ok(Json(DeleteStreamResponse {
        key_revoked,
        was_active,
        reconcile_error: reconcile_error.map(|e| e.to_string()),
        stop_failures: unit_failures(stop_failures),
    }))
}

/// GET /api/streams/{key}
pub async fn get_stream(State(state): State<AppState>, Path(key): Path<String>) -> AppResult<Json<StreamView>> {
    let record = state
        .simulcast
        .stream(&key)
        .ok_or_else(|| AppError::not_found("Stream not active"))?;

    let relay = state.simulcast.relay();
    let supervisor = state.simulcast.supervisor();
    let workers = supervisor
        .list()
        .into_iter()
        .filter(|w| relaycast_livestream::livestream::stream_key_of(&w.unit_id) == key)
        .collect();

    Ok(Json(StreamView {
        ingest_url: relay.ingest_url(&key),
        hls_play_url: relay.hls_url(&key),
        created_at: record.created_at,
        destinations: record
            .destinations
            .iter()
            .map(|d| RelayTargetView {
                platform: d.platform.clone(),
                url: d.url.clone(),
                stream_key: redact(&d.stream_key),
            })
            .collect(),
        workers,
        stream_key: key,
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    use crate::http::test_util::{app, json_request, send_json};

    #[tokio::test]
    async fn test_generate_stream_key() {
        let app = app();
        let (status, body) = send_json(
            &app.router,
            json_request("POST", "/api/generate-stream-key", &json!({"userID": "u1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let key = body["streamKey"].as_str().unwrap();
        assert!(app.simulcast.keys().validate(key));
        assert_eq!(app.simulcast.keys().lookup_owner(key).as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_generate_stream_key_requires_user() {
        let app = app();
        let (status, body) =
            send_json(&app.router, json_request("POST", "/api/generate-stream-key", &json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn test_create_stream_flow() {
        let app = app();
        let key = app.simulcast.generate_stream_key("u1").unwrap();

        let (status, body) = send_json(
            &app.router,
            json_request(
                "POST",
                "/api/streams",
                &json!({
                    "userID": "u1",
                    "title": "Demo",
                    "description": "first run",
                    "destinations": ["YouTube", "facebook"]
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["streamKey"], key.as_str());
        assert_eq!(body["ingestUrl"], format!("rtmp://localhost:1935/live/{key}"));
        assert_eq!(body["hlsPlayUrl"], format!("http://localhost:8081/hls/{key}.m3u8"));
        assert_eq!(body["title"], "Demo");

        let destinations = body["destinations"].as_array().unwrap();
        assert_eq!(destinations[0]["platform"], "youtube");
        assert_eq!(destinations[0]["url"], "rtmp://a.rtmp.youtube.com/live2/");
        assert!(destinations[0].get("error").is_none());
        assert_eq!(destinations[1]["platform"], "facebook");
        assert!(destinations[1]["error"].as_str().unwrap().contains("not initialized"));
        assert!(body.get("reconcileError").is_none());
        assert!(!body.to_string().contains("abc-secret-key"));

        assert_eq!(app.engine.add_calls().await.len(), 1);

        let request = Request::builder().uri(format!("/api/streams/{key}")).body(Body::empty()).unwrap();
        let (status, view) = send_json(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["destinations"][0]["streamKey"], "abc-…");
    }

    #[tokio::test]
    async fn test_create_stream_errors() {
        let app = app();

        let (status, _) = send_json(
            &app.router,
            json_request("POST", "/api/streams", &json!({"destinations": ["youtube"]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_json(
            &app.router,
            json_request("POST", "/api/streams", &json!({"userID": "nobody", "destinations": ["youtube"]})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        app.simulcast.generate_stream_key("u1").unwrap();
        let (status, body) = send_json(
            &app.router,
            json_request(
                "POST",
                "/api/streams",
                &json!({"userID": "u1", "title": "fail", "destinations": ["youtube"]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("quota exceeded"));
        assert!(app.engine.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_stream_reports_engine_rejection() {
        let app = app();
        app.simulcast.generate_stream_key("u1").unwrap();
        app.engine.set_failing(true);

        let (status, body) = send_json(
            &app.router,
            json_request("POST", "/api/streams", &json!({"userID": "u1", "destinations": ["youtube"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["reconcileError"].as_str().unwrap().contains("mock engine failure"));
    }

    #[tokio::test]
    async fn test_delete_and_get_stream() {
        let app = app();
        let key = app.simulcast.generate_stream_key("u1").unwrap();
        send_json(
            &app.router,
            json_request("POST", "/api/streams", &json!({"userID": "u1", "destinations": ["youtube"]})),
        )
        .await;

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/streams/{key}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send_json(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["keyRevoked"], true);
        assert_eq!(body["wasActive"], true);

        let request = Request::builder().uri(format!("/api/streams/{key}")).body(Body::empty()).unwrap();
        let (status, _) = send_json(&app.router, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // unknown keys still answer 200
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/streams/AAAAAAAAAAAAAAAAAAAAAA")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send_json(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["keyRevoked"], false);
    }

    #[tokio::test]
    async fn test_delete_with_malformed_key_is_bad_request() {
        let app = app();
        let calls_before = app.engine.calls().await.len();

        for uri in ["/api/streams/never-issued", "/api/streams/..%2F..%2Fadmin%2Fshutdown"] {
            let request = Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap();
            let (status, body) = send_json(&app.router, request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["status"], 400);
        }
        assert_eq!(app.engine.calls().await.len(), calls_before);
    }
}
