// Test-only in-memory transport: answers by request path and records every
// request it receives.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::{ApiRequest, ApiResponse, Transport};
use crate::error::CmsError;
use crate::response_log::ResponseLog;
use crate::session::SessionManager;

pub const REST_ROOT: &str = "/CNPortletapp/rest";

enum Route {
    Reply(ApiResponse),
    Fail(String),
}

#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &str, body: &str) {
        self.respond_raw(path, ApiResponse::ok(body));
    }

    pub fn respond_with_cookie(&self, path: &str, body: &str, cookie: &str) {
        let mut response = ApiResponse::ok(body);
        response.set_cookie = Some(cookie.to_string());
        self.respond_raw(path, response);
    }

    pub fn respond_raw(&self, path: &str, response: ApiResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), Route::Reply(response));
    }

    /// Make requests to `path` fail before reaching the server.
    pub fn fail(&self, path: &str, reason: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), Route::Fail(reason.to_string()));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, CmsError> {
        self.requests.lock().unwrap().push(request.clone());
        // yield so concurrent callers interleave like real network calls
        tokio::task::yield_now().await;
        match self.routes.lock().unwrap().get(&request.path) {
            Some(Route::Reply(response)) => Ok(response.clone()),
            Some(Route::Fail(reason)) => Err(CmsError::Transport {
                path: request.path.clone(),
                reason: reason.clone(),
            }),
            None => Ok(ApiResponse {
                status: 404,
                body: format!("no route for {}", request.path),
                set_cookie: None,
            }),
        }
    }
}

/// A session manager already logged in against `transport` (sid `1000`).
pub async fn logged_in(transport: &Arc<MockTransport>) -> Arc<SessionManager> {
    transport.respond_with_cookie(
        &format!("{}/auth/login", REST_ROOT),
        r#"{"sid": 1000, "user": {"id": 3, "login": "editor"}}"#,
        "JSESSIONID=test",
    );
    let sessions = SessionManager::new(transport.clone(), REST_ROOT, ResponseLog::disabled());
    sessions.login("editor", "secret").await.unwrap();
    Arc::new(sessions)
}

pub fn path(rest: &str) -> String {
    format!("{}/{}", REST_ROOT, rest)
}
