//! Session-authenticated remote control.
//!
//! ```text
//! POST <endpoint>/auth      {username, password}
//!   <- Set-Cookie: <session>; {"csrfToken": "..."}
//! POST <endpoint>/commands  {action, parameter}
//!   Cookie: <session>, <csrf_header>: <token>
//!   <- {"type": "success" | "warning" | "error", "msg": "..."}
//! ```
//!
//! Sessions are reused for `session_ttl_secs`. A command answered with 401 or
//! 403 logs in again and is retried once.

use async_trait::async_trait;
use reqwest::{
    StatusCode,
    header::{COOKIE, HeaderMap, SET_COOKIE},
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{ReloadError, ReloadStrategy};
use crate::{
    config::{Credentials, RemoteConfig},
    debug, log,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const REFRESH_ACTION: &str = "refresh_res";
const RESTART_ACTION: &str = "restart_res";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Session {
    /// `name=value` pair exactly as the server sent it.
    cookie: String,
    csrf: String,
    created: Instant,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginReply {
    csrf_token: Option<String>,
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    action: &'a str,
    parameter: &'a str,
}

#[derive(Deserialize, Default)]
struct CommandReply {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

pub struct SessionNotifier {
    client: reqwest::Client,
    credentials: Credentials,
    csrf_header: String,
    /// Cookie name prefix; `None` takes the first cookie.
    cookie_name: Option<String>,
    ttl: Duration,
    session: Mutex<Option<Session>>,
}

impl SessionNotifier {
    pub fn new(credentials: Credentials, remote: &RemoteConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            credentials,
            csrf_header: remote.csrf_header.clone(),
            cookie_name: remote.cookie.clone(),
            ttl: remote.session_ttl(),
            session: Mutex::new(None),
        }
    }

    /// Run one command, logging in first if needed.
    pub async fn command(&self, action: &str, parameter: &str) -> Result<(), ReloadError> {
        let session = self.session().await?;
        match self.send(&session, action, parameter).await {
            Err(ReloadError::Unauthorized(status)) => {
                debug!("reload"; "session rejected ({}), logging in again", status);
                *self.session.lock().await = None;
                let session = self.session().await?;
                self.send(&session, action, parameter).await
            }
            other => other,
        }
    }

    async fn session(&self) -> Result<Session, ReloadError> {
        let mut current = self.session.lock().await;
        if let Some(session) = current.as_ref()
            && session.created.elapsed() < self.ttl
        {
            return Ok(session.clone());
        }
        let session = self.login().await?;
        *current = Some(session.clone());
        Ok(session)
    }

    async fn login(&self) -> Result<Session, ReloadError> {
        let credentials = &self.credentials;
        let response = self
            .client
            .post(format!("{}/auth", credentials.endpoint))
            .json(&LoginRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await?;

        let status = response.status();
        if is_auth_failure(status) {
            return Err(ReloadError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(ReloadError::Rejected(format!("login failed with status {status}")));
        }

        let cookie = capture_cookie(response.headers(), self.cookie_name.as_deref())
            .ok_or_else(|| ReloadError::Protocol("login set no session cookie".into()))?;
        let reply: LoginReply = response
            .json()
            .await
            .map_err(|e| ReloadError::Protocol(format!("login reply: {e}")))?;
        let csrf = reply
            .csrf_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ReloadError::Protocol("login reply has no csrfToken".into()))?;

        debug!("reload"; "logged in to {}", credentials.endpoint);
        Ok(Session {
            cookie,
            csrf,
            created: Instant::now(),
        })
    }

    async fn send(
        &self,
        session: &Session,
        action: &str,
        parameter: &str,
    ) -> Result<(), ReloadError> {
        let response = self
            .client
            .post(format!("{}/commands", self.credentials.endpoint))
            .header(self.csrf_header.as_str(), session.csrf.as_str())
            .header(COOKIE, session.cookie.as_str())
            .json(&CommandRequest { action, parameter })
            .send()
            .await?;

        let status = response.status();
        if is_auth_failure(status) {
            return Err(ReloadError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(ReloadError::Rejected(format!("{action} returned status {status}")));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(());
        }
        let reply: CommandReply = serde_json::from_str(&body)
            .map_err(|e| ReloadError::Protocol(format!("{action} reply: {e}")))?;

        match reply.kind.as_deref() {
            Some("error") => Err(ReloadError::Rejected(
                reply.msg.unwrap_or_else(|| format!("{action} failed")),
            )),
            Some("warning") => {
                if let Some(msg) = reply.msg {
                    log!("warning"; "{}: {}", action, msg);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ReloadStrategy for SessionNotifier {
    fn name(&self) -> &'static str {
        "session"
    }

    fn supports_core(&self) -> bool {
        true
    }

    async fn reload(&self, identity: &str) -> Result<(), ReloadError> {
        self.command(REFRESH_ACTION, "").await?;
        self.command(RESTART_ACTION, identity).await
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// First `name=value` pair among the `Set-Cookie` headers whose name
/// starts with `prefix` (any cookie without a prefix).
pub(super) fn capture_cookie(headers: &HeaderMap, prefix: Option<&str>) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or(value).trim())
        .filter(|pair| pair.contains('='))
        .find(|pair| prefix.is_none_or(|p| pair.starts_with(p)))
        .map(str::to_string)
}
