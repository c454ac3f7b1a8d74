//! Concrete collaborators backed by an inventory.
//!
//! - [`StaticInventory`] holds groups and instances in memory and can be
//!   swapped atomically between rounds.
//! - [`FileInventory`] re-reads a TOML inventory file on every query, so
//!   an external process can keep membership current.
//! - [`FixedIdentity`] answers "who am I" from configuration or the
//!   environment.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use primacy_core::{select_group, Instance, InventoryFile};

use crate::directory::{GroupDirectory, InstanceRegistry, SelfIdentity};
use crate::error::RemoteError;

/// Member ids of the first group matching `prefix`.
fn members_of(inventory: &InventoryFile, prefix: &str) -> Vec<String> {
    select_group(&inventory.groups, prefix)
        .map(|g| g.members.clone())
        .unwrap_or_default()
}

/// Launch metadata for `ids`, in request order, skipping unknown ids.
fn describe_from(inventory: &InventoryFile, ids: &[String]) -> Vec<Instance> {
    ids.iter()
        .filter_map(|id| inventory.instances.iter().find(|i| &i.id == id))
        .cloned()
        .collect()
}

/// In-memory inventory implementing both directory and registry.
#[derive(Debug, Default)]
pub struct StaticInventory {
    inventory: RwLock<InventoryFile>,
}

impl StaticInventory {
    pub fn new(inventory: InventoryFile) -> Self {
        Self {
            inventory: RwLock::new(inventory),
        }
    }

    /// Swap in a new inventory. Rounds already in flight keep the old view.
    pub async fn replace(&self, inventory: InventoryFile) {
        *self.inventory.write().await = inventory;
    }
}

#[async_trait]
impl GroupDirectory for StaticInventory {
    async fn list_members(&self, group_prefix: &str) -> Result<Vec<String>, RemoteError> {
        Ok(members_of(&*self.inventory.read().await, group_prefix))
    }
}

#[async_trait]
impl InstanceRegistry for StaticInventory {
    async fn describe(&self, ids: &[String]) -> Result<Vec<Instance>, RemoteError> {
        Ok(describe_from(&*self.inventory.read().await, ids))
    }
}

/// Inventory read from a TOML file on every query.
///
/// ```toml
/// [[groups]]
/// name = "fleet-a-prod"
/// members = ["i-a", "i-b"]
///
/// [[instances]]
/// id = "i-a"
/// launched_at = 1700000000
/// ```
#[derive(Debug, Clone)]
pub struct FileInventory {
    path: PathBuf,
}

impl FileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<InventoryFile, RemoteError> {
        let shown = self.path.display().to_string();
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| RemoteError::Unavailable(format!("{shown}: {e}")))?;
        let inventory = InventoryFile::from_toml(&shown, &content)
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;
        debug!(
            path = %shown,
            groups = inventory.groups.len(),
            instances = inventory.instances.len(),
            "inventory loaded"
        );
        Ok(inventory)
    }
}

#[async_trait]
impl GroupDirectory for FileInventory {
    async fn list_members(&self, group_prefix: &str) -> Result<Vec<String>, RemoteError> {
        Ok(members_of(&self.load().await?, group_prefix))
    }
}

#[async_trait]
impl InstanceRegistry for FileInventory {
    async fn describe(&self, ids: &[String]) -> Result<Vec<Instance>, RemoteError> {
        Ok(describe_from(&self.load().await?, ids))
    }
}

/// An identity fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedIdentity {
    id: String,
}

impl FixedIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Use `configured` if set, else `PRIMACY_INSTANCE_ID`, else `HOSTNAME`.
    pub fn resolve(configured: Option<&str>) -> Self {
        let non_blank = |id: &String| !id.trim().is_empty();
        let id = configured
            .map(str::to_string)
            .filter(non_blank)
            .or_else(|| std::env::var(primacy_core::config::INSTANCE_ID_ENV).ok().filter(non_blank))
            .or_else(|| std::env::var("HOSTNAME").ok().filter(non_blank))
            .unwrap_or_else(|| "localhost".to_string());
        Self { id }
    }
}

impl SelfIdentity for FixedIdentity {
    fn current_id(&self) -> String {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primacy_core::Group;

    fn fleet() -> InventoryFile {
        InventoryFile {
            groups: vec![
                Group::new("api-blue", vec!["i-x".into()]),
                Group::new("fleet-a-prod", vec!["i-a".into(), "i-b".into(), "i-c".into()]),
            ],
            instances: vec![
                Instance::new("i-a", 100),
                Instance::new("i-b", 50),
                Instance::new("i-x", 10),
            ],
        }
    }

    #[tokio::test]
    async fn static_inventory_lists_first_matching_group() {
        let inv = StaticInventory::new(fleet());
        let members = inv.list_members("fleet-a").await.unwrap();
        assert_eq!(members, vec!["i-a", "i-b", "i-c"]);
        assert!(inv.list_members("worker").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn describe_omits_unknown_ids_and_keeps_order() {
        let inv = StaticInventory::new(fleet());
        let ids: Vec<String> = vec!["i-b".into(), "i-c".into(), "i-a".into()];
        let instances = inv.describe(&ids).await.unwrap();
        assert_eq!(
            instances,
            vec![Instance::new("i-b", 50), Instance::new("i-a", 100)]
        );
    }

    #[tokio::test]
    async fn static_inventory_replace() {
        let inv = StaticInventory::new(fleet());
        inv.replace(InventoryFile::default()).await;
        assert!(inv.list_members("fleet-a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_inventory_reads_each_query() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.toml");
        std::fs::write(
            &path,
            r#"
[[groups]]
name = "fleet-a-prod"
members = ["i-a"]

[[instances]]
id = "i-a"
launched_at = 100
"#,
        )
        .unwrap();

        let inv = FileInventory::new(&path);
        assert_eq!(inv.list_members("fleet-a").await.unwrap(), vec!["i-a"]);

        std::fs::write(
            &path,
            "[[groups]]\nname = \"fleet-a-prod\"\nmembers = [\"i-a\", \"i-b\"]\n",
        )
        .unwrap();
        assert_eq!(inv.list_members("fleet-a").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn file_inventory_errors_are_remote_errors() {
        let inv = FileInventory::new("/nonexistent/inventory.toml");
        let err = inv.list_members("fleet-a").await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.toml");
        std::fs::write(&path, "[[groups]\nname = ").unwrap();
        let err = FileInventory::new(&path)
            .describe(&["i-a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Malformed(_)));
    }

    #[test]
    fn fixed_identity_prefers_configured_id() {
        let identity = FixedIdentity::resolve(Some("i-configured"));
        assert_eq!(identity.current_id(), "i-configured");
    }
}
