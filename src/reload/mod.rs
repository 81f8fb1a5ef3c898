//! Hot reload of rebuilt resources in a running instance.
//!
//! One [`ReloadStrategy`] is chosen at startup:
//!
//! | Strategy  | When                          | Core reload |
//! |-----------|-------------------------------|-------------|
//! | `session` | `[dev.remote]` is complete    | yes         |
//! | `local`   | otherwise                     | no          |
//!
//! Failures are reported as warnings and never stop the dev loop.

mod error;
mod local;
mod session;

#[cfg(test)]
mod tests;

pub use error::ReloadError;
pub use local::LocalNotifier;
pub use session::SessionNotifier;

use async_trait::async_trait;
use std::sync::Arc;

use crate::{config::ProjectConfig, debug, graph::BuildTask, log};

/// Restarts one resource in the running instance.
#[async_trait]
pub trait ReloadStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the core unit can be restarted through this strategy.
    fn supports_core(&self) -> bool;

    async fn reload(&self, identity: &str) -> Result<(), ReloadError>;
}

/// Pick the strategy for `config`: session when remote credentials are
/// complete, local otherwise.
pub fn select(config: &ProjectConfig) -> Arc<dyn ReloadStrategy> {
    match config.dev.remote.credentials() {
        Some(credentials) => Arc::new(SessionNotifier::new(credentials, &config.dev.remote)),
        None => Arc::new(LocalNotifier::new(config.dev.port)),
    }
}

/// What happened to the reload of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadStatus {
    Restarted,
    /// The strategy cannot restart this identity.
    Skipped,
    /// No running instance answered.
    NotReachable,
    Failed,
}

/// Turns successful rebuilds into reload requests.
pub struct Notifier {
    strategy: Arc<dyn ReloadStrategy>,
    /// Identity of the core unit.
    core: String,
}

impl Notifier {
    pub fn new(strategy: Arc<dyn ReloadStrategy>, core: impl Into<String>) -> Self {
        Self {
            strategy,
            core: core.into(),
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        let notifier = Self::new(select(config), config.core.display_name());
        debug!("reload"; "using {} strategy", notifier.strategy.name());
        notifier
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Reload every resource identity among `tasks`, once each.
    pub async fn rebuilt(&self, tasks: &[Arc<BuildTask>]) -> Vec<(String, ReloadStatus)> {
        let mut statuses: Vec<(String, ReloadStatus)> = Vec::new();
        for task in tasks {
            let identity = task.identity();
            if statuses.iter().any(|(done, _)| done == identity) {
                continue;
            }
            let status = self.reload(identity).await;
            statuses.push((identity.to_string(), status));
        }
        statuses
    }

    async fn reload(&self, identity: &str) -> ReloadStatus {
        if identity == self.core && !self.strategy.supports_core() {
            log!(
                "warning";
                "{} rebuilt; restart it manually or configure [dev.remote] to reload it",
                identity
            );
            return ReloadStatus::Skipped;
        }

        match self.strategy.reload(identity).await {
            Ok(()) => {
                log!("reload"; "restarted {}", identity);
                ReloadStatus::Restarted
            }
            Err(ReloadError::NotReachable(base)) => {
                debug!("reload"; "{} not reloaded: nothing listening at {}", identity, base);
                ReloadStatus::NotReachable
            }
            Err(e) => {
                log!("warning"; "hot reload of {} failed: {}", identity, e);
                ReloadStatus::Failed
            }
        }
    }
}
