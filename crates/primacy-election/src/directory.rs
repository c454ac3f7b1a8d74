//! Collaborator contracts consumed by the election poller.

use async_trait::async_trait;

use primacy_core::Instance;

use crate::error::RemoteError;

/// Resolves a group name prefix to the group's current member ids.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Member ids of the first group whose name starts with
    /// `group_prefix`, in group order. Empty if no group matches.
    async fn list_members(&self, group_prefix: &str) -> Result<Vec<String>, RemoteError>;
}

/// Looks up launch metadata for group members.
#[async_trait]
pub trait InstanceRegistry: Send + Sync {
    /// Launch metadata for `ids`. Unknown ids are omitted, not errors.
    async fn describe(&self, ids: &[String]) -> Result<Vec<Instance>, RemoteError>;
}

/// Identity of the instance this process runs on. Resolved locally.
pub trait SelfIdentity: Send + Sync {
    fn current_id(&self) -> String;
}
