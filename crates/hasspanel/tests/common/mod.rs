// Mock Home Assistant server shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use axum::Json;
use axum::Router;
use hasspanel::secret::SecretError;
use hasspanel::secret::TokenStore;
use serde_json::Value;
use tokio::net::TcpListener;

pub const TOKEN: &str = "test-token";

/// A service call the mock server received
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub body: Value,
}

#[derive(Default)]
pub struct ServerState {
    pub states: Mutex<Value>,
    pub calls: Mutex<Vec<ServiceCall>>,
    pub user_agents: Mutex<Vec<String>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

fn record_user_agent(state: &ServerState, headers: &HeaderMap) {
    if let Some(ua) = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        state.user_agents.lock().unwrap().push(ua.to_string());
    }
}

async fn list_states(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> impl IntoResponse {
    record_user_agent(&state, &headers);
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(Value::Null)).into_response();
    }
    let states = state.states.lock().unwrap().clone();
    (StatusCode::OK, Json(states)).into_response()
}

async fn entity_state(
    State(state): State<Arc<ServerState>>,
    Path(entity_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(Value::Null)).into_response();
    }
    let states = state.states.lock().unwrap().clone();
    let found = states
        .as_array()
        .and_then(|all| all.iter().find(|s| s["entity_id"] == entity_id.as_str()))
        .cloned();
    match found {
        Some(entity) => (StatusCode::OK, Json(entity)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"message": "Entity not found."})),
        )
            .into_response(),
    }
}

async fn call_service(
    State(state): State<Arc<ServerState>>,
    Path((domain, service)): Path<(String, String)>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(Value::Null)).into_response();
    }
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .is_some_and(|v| v == "application/json");
    let body: Value = match serde_json::from_str(&body) {
        Ok(body) if is_json => body,
        _ => return (StatusCode::BAD_REQUEST, Json(Value::Null)).into_response(),
    };
    state.calls.lock().unwrap().push(ServiceCall {
        domain,
        service,
        body,
    });
    (StatusCode::OK, Json(Value::Array(Vec::new()))).into_response()
}

async fn raw_json() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"version": "2024.1.0", "components": ["light", "switch"], "ratio": 0.5, "nested": {"ok": true, "none": null}}"#,
    )
}

async fn not_json() -> impl IntoResponse {
    (StatusCode::OK, "<html>definitely not json</html>")
}

async fn created() -> impl IntoResponse {
    (StatusCode::CREATED, Json(serde_json::json!({"created": true})))
}

async fn server_error() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({"message": "boom"})))
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(Value::Null)
}

pub struct MockServer {
    pub base_url: String,
    pub state: Arc<ServerState>,
}

impl MockServer {
    /// Start a mock Home Assistant server on an ephemeral port
    pub async fn start(states: Value) -> Self {
        let state = Arc::new(ServerState {
            states: Mutex::new(states),
            ..Default::default()
        });

        let app = Router::new()
            .route("/api/states", get(list_states))
            .route("/api/states/:entity_id", get(entity_state))
            .route("/api/services/:domain/:service", post(call_service))
            .route("/raw", get(raw_json))
            .route("/not-json", get(not_json))
            .route("/created", get(created))
            .route("/error", get(server_error))
            .route("/slow", get(slow))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/", addr),
            state,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.state.calls.lock().unwrap().clone()
    }
}

/// Token store holding a fixed token, or none
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    pub fn valid() -> Arc<Self> {
        Arc::new(Self(Some(TOKEN.to_string())))
    }

    pub fn missing() -> Arc<Self> {
        Arc::new(Self(None))
    }
}

impl TokenStore for StaticToken {
    fn lookup(&self) -> Result<Option<String>, SecretError> {
        Ok(self.0.clone())
    }

    fn store(&self, _token: &str) -> Result<(), SecretError> {
        Err(SecretError::Unavailable("read-only".to_string()))
    }

    fn clear(&self) -> Result<(), SecretError> {
        Err(SecretError::Unavailable("read-only".to_string()))
    }
}
