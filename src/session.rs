// Session manager: owns the CMS session (session id + cookie) and is the
// only way the other components talk to the server. The session id goes
// out as the `sid` query parameter, the cookie as a `Cookie` header.

use std::sync::{Arc, OnceLock};

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::api::{ApiRequest, Method, Payload, Transport};
use crate::error::CmsError;
use crate::response_log::ResponseLog;
use crate::serialization::id_from_value;

/// Server-issued session identifiers. Each field is set at most once: the
/// first response carrying it wins, later values are ignored.
#[derive(Debug, Default)]
pub struct Session {
    sid: OnceLock<String>,
    cookie: OnceLock<String>,
}

impl Session {
    pub fn sid(&self) -> Option<&str> {
        self.sid.get().map(String::as_str)
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.get().map(String::as_str)
    }

    pub fn is_established(&self) -> bool {
        self.sid.get().is_some()
    }

    /// Record whatever the response offered for fields that are still unset.
    pub fn capture(&self, sid: Option<String>, cookie: Option<String>) {
        if let Some(sid) = sid {
            if self.sid.set(sid).is_ok() {
                debug!("[Session] session id captured");
            }
        }
        if let Some(cookie) = cookie {
            if self.cookie.set(cookie).is_ok() {
                debug!("[Session] cookie captured");
            }
        }
    }
}

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    session: Session,
    rest_root: String,
    response_log: ResponseLog,
}

impl SessionManager {
    /// `rest_root` is the path prefix of every endpoint, e.g. `/CNPortletapp/rest`.
    pub fn new(transport: Arc<dyn Transport>, rest_root: &str, response_log: ResponseLog) -> Self {
        SessionManager {
            transport,
            session: Session::default(),
            rest_root: rest_root.trim_end_matches('/').to_string(),
            response_log,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.rest_root, path.trim_start_matches('/'))
    }

    /// Log in and return the raw authentication payload.
    pub async fn login(&self, username: &str, password: &str) -> Result<Value, CmsError> {
        info!("[Session] logging in as {}", username);
        let body = json!({ "login": username, "password": password });
        let data = match self
            .dispatch(Method::Post, "auth/login", Payload::Json(body), false)
            .await
        {
            Ok(data) => data,
            Err(CmsError::Server { message, .. }) => return Err(CmsError::Auth(message)),
            Err(e) => return Err(e),
        };

        if data.get("user").map_or(true, Value::is_null) {
            return Err(CmsError::Auth("Can't authenticate! No user in login response".into()));
        }
        if !self.session.is_established() {
            return Err(CmsError::Auth("login response did not issue a session id".into()));
        }
        info!("[Session] successfully logged in");
        Ok(data)
    }

    /// Call `path` (relative to the REST root) with the current session attached.
    pub async fn call(&self, method: Method, path: &str, payload: Payload) -> Result<Value, CmsError> {
        self.dispatch(method, path, payload, true).await
    }

    /// Best-effort session teardown. Failures are logged, never returned.
    pub async fn logout(&self) {
        let Some(sid) = self.session.sid() else {
            return;
        };
        let path = format!("auth/logout/{}", sid);
        match self.call(Method::Post, &path, Payload::Empty).await {
            Ok(_) => info!("[Session] logged out"),
            Err(e) => warn!("[Session] logout failed: {}", e),
        }
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
        authenticated: bool,
    ) -> Result<Value, CmsError> {
        let endpoint = self.endpoint(path);
        let mut request = ApiRequest::new(method, endpoint.clone(), payload);
        if authenticated {
            let sid = self.session.sid().ok_or(CmsError::NotAuthenticated)?;
            request.query.push(("sid".to_string(), sid.to_string()));
            request.cookie = self.session.cookie().map(str::to_string);
        }

        let response = self.transport.execute(request).await?;
        self.response_log.record(&response.body).await;

        if !response.is_success() {
            return Err(CmsError::Http {
                path: endpoint,
                status: response.status,
                body: response.body,
            });
        }

        let data: Value = if response.body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&response.body).map_err(|e| CmsError::Transport {
                path: endpoint.clone(),
                reason: format!("invalid JSON response: {}", e),
            })?
        };

        self.session
            .capture(data.get("sid").and_then(id_from_value), response.set_cookie);

        if let Some(info) = data.get("responseInfo") {
            let code = info.get("responseCode").and_then(Value::as_str).unwrap_or("OK");
            if code != "OK" {
                let message = info
                    .get("responseMessage")
                    .and_then(Value::as_str)
                    .unwrap_or(code)
                    .to_string();
                return Err(CmsError::Server { path: endpoint, message });
            }
        }

        Ok(data)
    }
}
