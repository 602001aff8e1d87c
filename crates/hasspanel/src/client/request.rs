use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use strum::Display;

/// HTTP methods used against the Home Assistant REST API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

/// A request before authentication headers are attached
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    /// JSON body, e.g. `{"entity_id": "switch.some_relay"}`
    pub body: Option<Value>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: Some(body),
        }
    }

    /// Turn this request into a reqwest builder.
    ///
    /// Every request carries `Content-Type: application/json`. The bearer
    /// header is only attached when a token is available.
    pub fn build(&self, client: &reqwest::Client, token: Option<&str>) -> reqwest::RequestBuilder {
        let mut builder = client
            .request(self.method.into(), &self.url)
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        if let Some(body) = &self.body {
            builder = builder.body(body.to_string());
        }

        builder
    }
}
