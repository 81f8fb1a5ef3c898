//! Local fallback: an unauthenticated restart endpoint on localhost.

use async_trait::async_trait;
use std::time::Duration;

use super::{ReloadError, ReloadStrategy};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// `POST http://localhost:<port>/restart?resource=<identity>`.
///
/// Nothing listening yields [`ReloadError::NotReachable`], which the
/// notifier only reports in verbose mode.
pub struct LocalNotifier {
    client: reqwest::Client,
    base: String,
}

impl LocalNotifier {
    pub fn new(port: u16) -> Self {
        Self::with_base(format!("http://localhost:{port}"))
    }

    /// Endpoint at an explicit base URL.
    pub fn with_base(base: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ReloadStrategy for LocalNotifier {
    fn name(&self) -> &'static str {
        "local"
    }

    fn supports_core(&self) -> bool {
        false
    }

    async fn reload(&self, identity: &str) -> Result<(), ReloadError> {
        let url = format!("{}/restart", self.base);
        let response = match self
            .client
            .post(&url)
            .query(&[("resource", identity)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                return Err(ReloadError::NotReachable(self.base.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ReloadError::Rejected(format!("status {status}")));
        }
        Ok(())
    }
}
