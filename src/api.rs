// API transport module: describes a single CMS REST request/response and
// the `Transport` seam every component goes through. `HttpTransport` is
// the real implementation on top of an async reqwest client; tests plug
// in a recording transport instead.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::multipart;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::CmsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One multipart form field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        path: PathBuf,
        file_name: String,
        mime: String,
        size: u64,
    },
}

impl FormField {
    pub fn text(name: &str, value: impl Into<String>) -> Self {
        FormField::Text {
            name: name.to_string(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormField::Text { name, .. } | FormField::File { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Json(Value),
    Multipart(Vec<FormField>),
}

/// A request relative to the CMS host.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub cookie: Option<String>,
    pub payload: Payload,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, payload: Payload) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            query: Vec::new(),
            cookie: None,
            payload,
        }
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response as seen by the session layer.
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    /// `name=value` pairs from every `Set-Cookie` header, joined by `; `.
    pub set_cookie: Option<String>,
}

impl ApiResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        ApiResponse {
            status: 200,
            body: body.into(),
            set_cookie: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, CmsError>;
}

/// Transport backed by a reqwest async client, talking to `base_url`.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, CmsError> {
        let client = Client::builder()
            .build()
            .map_err(|e| CmsError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(HttpTransport {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn build_form(fields: Vec<FormField>, path: &str) -> Result<multipart::Form, CmsError> {
        let mut form = multipart::Form::new();
        for field in fields {
            form = match field {
                FormField::Text { name, value } => form.text(name, value),
                FormField::File {
                    name,
                    path: file_path,
                    file_name,
                    mime,
                    size,
                } => {
                    let data = tokio::fs::read(&file_path)
                        .await
                        .map_err(|e| CmsError::io(&file_path, e))?;
                    debug!("[Http] attaching {} ({} bytes, {})", file_name, size, mime);
                    let part = multipart::Part::bytes(data)
                        .file_name(file_name)
                        .mime_str(&mime)
                        .map_err(|e| CmsError::Transport {
                            path: path.to_string(),
                            reason: format!("invalid mime type '{}': {}", mime, e),
                        })?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, CmsError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!("[Http] {:?} {}", request.method, url);

        let mut req = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(cookie) = &request.cookie {
            req = req.header(COOKIE, cookie);
        }
        req = match request.payload {
            Payload::Empty => req,
            Payload::Json(body) => req.json(&body),
            Payload::Multipart(fields) => req.multipart(Self::build_form(fields, &request.path).await?),
        };

        let res = req.send().await.map_err(|e| CmsError::Transport {
            path: request.path.clone(),
            reason: e.to_string(),
        })?;

        let status = res.status().as_u16();
        let set_cookie = collect_cookies(
            res.headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );
        let body = res.text().await.map_err(|e| CmsError::Transport {
            path: request.path.clone(),
            reason: format!("Failed to read response body: {}", e),
        })?;

        Ok(ApiResponse {
            status,
            body,
            set_cookie,
        })
    }
}

/// Reduce `Set-Cookie` header values to a `Cookie` header value.
fn collect_cookies<'a>(headers: impl Iterator<Item = &'a str>) -> Option<String> {
    let pairs: Vec<&str> = headers
        .filter_map(|h| h.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}
