//! Home Assistant REST client.
//!
//! `HassClient::send` is the single path every request takes: look up the
//! token, attach headers, make one attempt with a deadline, and accept only
//! `200 OK` with a JSON body.

mod error;
mod request;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

pub use error::SendError;
pub use request::Method;
pub use request::Request;

use crate::config::ServerConfig;
use crate::entity::EntityState;
use crate::secret::TokenStore;

/// Join an API path onto a base URL, adding the separating slash if needed
pub fn endpoint(base_url: &str, path: &str) -> String {
    if base_url.ends_with('/') {
        format!("{}{}", base_url, path)
    } else {
        format!("{}/{}", base_url, path)
    }
}

/// Split the domain off an entity id (`switch.lamp` -> `switch`)
fn entity_domain(entity_id: &str) -> Result<&str, SendError> {
    match entity_id.split_once('.') {
        Some((domain, object)) if !domain.is_empty() && !object.is_empty() => Ok(domain),
        _ => Err(SendError::InvalidEntity(entity_id.to_string())),
    }
}

/// Trait for the Home Assistant operations the panel needs
///
/// This trait allows for mocking the server for testing purposes
#[async_trait]
pub trait HassApi: Send + Sync {
    /// Fetch every entity state (`GET api/states`)
    async fn states(&self, base_url: &str) -> Result<Vec<EntityState>, SendError>;

    /// Fetch one entity state (`GET api/states/<entity_id>`)
    async fn state(&self, base_url: &str, entity_id: &str) -> Result<EntityState, SendError>;

    /// Toggle an entity (`POST api/services/<domain>/toggle`)
    async fn toggle(&self, base_url: &str, entity_id: &str) -> Result<Value, SendError>;
}

/// Real client implementation using reqwest
pub struct HassClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenStore>,
}

impl HassClient {
    /// Create a client from the server settings
    ///
    /// The timeout and user agent apply to every request made through it.
    pub fn new(settings: &ServerConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, SendError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(SendError::Client)?;

        Ok(Self { http, tokens })
    }

    /// Look up the bearer token on a blocking thread.
    ///
    /// Any failure is logged and treated as "no token"; the request then goes
    /// out unauthenticated and the server rejects it.
    async fn token(&self) -> Option<String> {
        let tokens = self.tokens.clone();
        match tokio::task::spawn_blocking(move || tokens.lookup()).await {
            Ok(Ok(Some(token))) => Some(token),
            Ok(Ok(None)) => {
                warn!("No token in secret store, sending unauthenticated request");
                None
            }
            Ok(Err(e)) => {
                warn!("Token lookup failed, sending unauthenticated request: {}", e);
                None
            }
            Err(e) => {
                warn!("Token lookup task failed: {}", e);
                None
            }
        }
    }

    /// Send one request and parse the JSON response
    pub async fn send(
        &self,
        url: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<Value, SendError> {
        let request = Request {
            method,
            url: url.to_string(),
            body,
        };

        let result = self.execute(&request).await;
        if let Err(e) = &result {
            warn!("Could not send {} request to {}: {}", method, url, e);
        }
        result
    }

    async fn execute(&self, request: &Request) -> Result<Value, SendError> {
        let token = self.token().await;

        debug!("{} {}", request.method, request.url);
        let response = request
            .build(&self.http, token.as_deref())
            .send()
            .await
            .map_err(SendError::from_reqwest)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SendError::from_status(status));
        }

        let bytes = response.bytes().await.map_err(SendError::from_reqwest)?;
        serde_json::from_slice(&bytes).map_err(SendError::Json)
    }
}

#[async_trait]
impl HassApi for HassClient {
    async fn states(&self, base_url: &str) -> Result<Vec<EntityState>, SendError> {
        let value = self
            .send(&endpoint(base_url, "api/states"), Method::Get, None)
            .await?;
        serde_json::from_value(value).map_err(SendError::Shape)
    }

    async fn state(&self, base_url: &str, entity_id: &str) -> Result<EntityState, SendError> {
        entity_domain(entity_id)?;
        let url = endpoint(base_url, &format!("api/states/{}", entity_id));
        let value = self.send(&url, Method::Get, None).await?;
        serde_json::from_value(value).map_err(SendError::Shape)
    }

    async fn toggle(&self, base_url: &str, entity_id: &str) -> Result<Value, SendError> {
        let domain = entity_domain(entity_id)?;
        let url = endpoint(base_url, &format!("api/services/{}/toggle", domain));
        let body = serde_json::json!({ "entity_id": entity_id });
        self.send(&url, Method::Post, Some(body)).await
    }
}

/// Mock Home Assistant API for testing
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockHassApi {
    pub states: std::sync::Mutex<Vec<EntityState>>,
    pub toggled: std::sync::Mutex<Vec<String>>,
    pub fail: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MockHassApi {
    pub fn new(states: Vec<EntityState>) -> Self {
        Self {
            states: std::sync::Mutex::new(states),
            ..Default::default()
        }
    }

    /// Replace the states the mock reports
    pub fn set_states(&self, states: Vec<EntityState>) {
        *self.states.lock().unwrap() = states;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SendError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SendError::Status(StatusCode::INTERNAL_SERVER_ERROR));
        }
        Ok(())
    }
}

#[cfg(test)]
#[async_trait]
impl HassApi for MockHassApi {
    async fn states(&self, _base_url: &str) -> Result<Vec<EntityState>, SendError> {
        self.check()?;
        Ok(self.states.lock().unwrap().clone())
    }

    async fn state(&self, _base_url: &str, entity_id: &str) -> Result<EntityState, SendError> {
        self.check()?;
        self.states
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.entity_id == entity_id)
            .cloned()
            .ok_or(SendError::Status(StatusCode::NOT_FOUND))
    }

    async fn toggle(&self, _base_url: &str, entity_id: &str) -> Result<Value, SendError> {
        self.check()?;
        entity_domain(entity_id)?;
        self.toggled.lock().unwrap().push(entity_id.to_string());
        Ok(Value::Array(Vec::new()))
    }
}
