//! In-process HTTP Geometry Backend
//!
//! Serves the subset of the Geometry Backend API used by `GeometryClient`
//! on an ephemeral local port and records what it receives.

use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use sdcli::sdtf::{make_example_sdtf, ExampleChunk};

pub const TOKEN: &str = "jwt";

#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedUpload {
    pub asset_id: String,
    pub content_type: String,
    pub length: usize,
}

#[derive(Default)]
pub struct ServerState {
    pub base_url: String,
    pub uploads: Mutex<Vec<ReceivedUpload>>,
    pub slot_requests: Mutex<Vec<Value>>,
    pub customizations: Mutex<Vec<Value>>,
    pub closed_sessions: Mutex<Vec<String>>,
}

pub struct MockServer {
    pub base_url: String,
    pub state: Arc<ServerState>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

async fn get_model(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "missing token").into_response();
    }
    if id == "missing" {
        return (StatusCode::NOT_FOUND, "model not found").into_response();
    }
    Json(json!({
        "model": {"id": id, "stat": "confirmed", "msg": null},
        "setting": {"compute": {"max_comp_time": 30000, "ftype": "gh"}},
        "file": {}
    }))
    .into_response()
}

async fn open_session(Path(ticket): Path<String>) -> Response {
    if ticket != "ticket-1" {
        return (StatusCode::BAD_REQUEST, "invalid ticket").into_response();
    }
    Json(json!({
        "sessionId": "session-1",
        "parameters": {
            "p-text": {"id": "p-text", "name": "Labels", "type": "sString"},
            "p-curve": {"id": "p-curve", "name": "Outline", "type": "sCurve"},
            "p-size": {"id": "p-size", "name": "Size", "type": "Number", "max": 10.0}
        },
        "outputs": {
            "o1": {"id": "o1", "name": "Result", "content": []}
        },
        "exports": {}
    }))
    .into_response()
}

async fn close_session(State(state): State<Arc<ServerState>>, Path(session): Path<String>) -> StatusCode {
    state.closed_sessions.lock().unwrap().push(session);
    StatusCode::OK
}

async fn request_upload(State(state): State<Arc<ServerState>>, Json(specs): Json<Vec<Value>>) -> Json<Value> {
    let slots: Vec<Value> = (0..specs.len())
        .map(|i| {
            json!({
                "id": format!("asset-{}", i),
                "href": format!("{}/upload/asset-{}", state.base_url, i),
            })
        })
        .collect();
    state.slot_requests.lock().unwrap().push(Value::from(specs));
    Json(json!({ "asset": { "sdtf": slots } }))
}

async fn receive_upload(
    State(state): State<Arc<ServerState>>,
    Path(asset_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    state.uploads.lock().unwrap().push(ReceivedUpload {
        asset_id,
        content_type,
        length: body.len(),
    });
    StatusCode::OK
}

/// The first submission reports a delay, later ones the result
async fn customize(State(state): State<Arc<ServerState>>, Json(body): Json<Value>) -> Json<Value> {
    let mut customizations = state.customizations.lock().unwrap();
    customizations.push(body);
    if customizations.len() == 1 {
        Json(json!({ "outputs": { "o1": {"id": "o1", "name": "Result", "delay": 20, "content": []} } }))
    } else {
        Json(json!({
            "outputs": { "o1": {"id": "o1", "name": "Result", "content": [{"format": "glb"}]} }
        }))
    }
}

async fn example_container() -> Response {
    match make_example_sdtf(&ExampleChunk::ALL) {
        Ok(bytes) => ([(header::CONTENT_TYPE, "model/vnd.sdtf")], bytes).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let state = Arc::new(ServerState {
            base_url: base_url.clone(),
            ..Default::default()
        });

        let app = Router::new()
            .route("/api/v2/model/:id", get(get_model))
            .route("/api/v2/ticket/:ticket", post(open_session))
            .route("/api/v2/session/:id/close", post(close_session))
            .route("/api/v2/session/:id/sdtf/upload", post(request_upload))
            .route("/api/v2/session/:id/output", post(customize))
            .route("/upload/:asset_id", put(receive_upload))
            .route("/files/example.sdtf", get(example_container))
            .with_state(Arc::clone(&state));

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockServer { base_url, state }
    }
}
