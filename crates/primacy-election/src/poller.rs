//! Election poller — one round of oldest-member self-election.
//!
//! The primary of a group is the member with the earliest launch time:
//! it has been running longest and survives scale-in, which removes newer
//! instances first. Each node computes this independently from the group
//! directory and instance registry and compares the winner to its own id.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use primacy_core::Instance;

use crate::directory::{GroupDirectory, InstanceRegistry, SelfIdentity};
use crate::error::{ElectionError, ElectionResult, RemoteError};

/// Default upper bound on each remote query within a round.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Computes "am I primary" for one round.
#[derive(Clone)]
pub struct ElectionPoller {
    directory: Arc<dyn GroupDirectory>,
    registry: Arc<dyn InstanceRegistry>,
    identity: Arc<dyn SelfIdentity>,
    query_timeout: Duration,
}

impl ElectionPoller {
    pub fn new(
        directory: Arc<dyn GroupDirectory>,
        registry: Arc<dyn InstanceRegistry>,
        identity: Arc<dyn SelfIdentity>,
    ) -> Self {
        Self {
            directory,
            registry,
            identity,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Set the per-query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// This process's instance id, as the poller compares it.
    pub fn own_id(&self) -> String {
        self.identity.current_id()
    }

    /// Decide primacy for `group`. Failures are logged and read as
    /// "not primary".
    pub async fn evaluate(&self, group: &str) -> bool {
        match self.poll(group).await {
            Ok(is_primary) => is_primary,
            Err(e) => {
                error!(%group, error = %e, "exception with primary check");
                false
            }
        }
    }

    /// Decide primacy for `group`, reporting failed rounds as errors.
    ///
    /// - Blank `group` (standalone deployment): `Ok(true)`.
    /// - No matching group: `Ok(false)`.
    /// - Directory or registry failure or timeout: `Err`.
    pub async fn poll(&self, group: &str) -> ElectionResult<bool> {
        let group = group.trim();
        if group.is_empty() {
            return Ok(true);
        }

        let members = self
            .bounded("group directory", self.directory.list_members(group))
            .await?;
        if members.is_empty() {
            warn!(%group, "not the primary instance, no matching group found");
            return Ok(false);
        }

        let instances = self
            .bounded("instance registry", self.registry.describe(&members))
            .await?;
        let own_id = self.identity.current_id();

        match oldest_instance(&instances) {
            Some(oldest) if oldest.id == own_id => {
                debug!(%group, instance_id = %own_id, "this is the primary instance");
                Ok(true)
            }
            oldest => {
                debug!(
                    %group,
                    oldest_id = oldest.map(|i| i.id.as_str()).unwrap_or("<none>"),
                    instance_id = %own_id,
                    members = members.len(),
                    "this is not the primary instance"
                );
                Ok(false)
            }
        }
    }

    async fn bounded<T>(
        &self,
        query: &'static str,
        fut: impl Future<Output = Result<T, RemoteError>>,
    ) -> ElectionResult<T> {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(|source| ElectionError::Transient { query, source }),
            Err(_) => Err(ElectionError::Timeout {
                query,
                after: self.query_timeout,
            }),
        }
    }
}

/// The instance with the strictly earliest launch time. Ties keep the
/// first one encountered.
pub fn oldest_instance(instances: &[Instance]) -> Option<&Instance> {
    instances.iter().fold(None, |oldest: Option<&Instance>, inst| match oldest {
        Some(o) if o.launched_at <= inst.launched_at => Some(o),
        _ => Some(inst),
    })
}
