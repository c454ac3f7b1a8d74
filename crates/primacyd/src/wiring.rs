//! Wiring — turns a parsed `PrimacyConfig` into a running election and
//! the services that answer through it.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use primacy_core::{ElectionState, PrimacyConfig, ServicesBackend};
use primacy_election::{
    ElectionPoller, FileInventory, FixedIdentity, GroupDirectory, InstanceRegistry,
    LeadershipElectionScheduler, SelfIdentity, StaticInventory,
};
use primacy_services::{build_services, local_clients, ExternalServices, ManagedServices};

/// An election and services built from configuration.
pub struct Election {
    pub services: Arc<dyn ExternalServices>,
    pub scheduler: Arc<LeadershipElectionScheduler>,
    pub backend: ServicesBackend,
    /// Group to elect within; `None` means standalone.
    pub group: Option<String>,
    pub instance_id: String,
}

impl Election {
    /// Ask the configured services whether this instance is primary.
    pub async fn is_primary(&self) -> bool {
        self.services.is_instance_primary().await
    }

    pub fn report(&self, is_primary: bool) -> Report {
        Report {
            backend: self.backend,
            group: self.group.clone(),
            instance_id: self.instance_id.clone(),
            is_primary,
            state: self.scheduler.state(),
        }
    }
}

/// Verdict as printed by `primacyd check`.
#[derive(Debug, Serialize)]
pub struct Report {
    pub backend: ServicesBackend,
    pub group: Option<String>,
    pub instance_id: String,
    pub is_primary: bool,
    pub state: ElectionState,
}

/// Build the inventory, identity, poller, scheduler, and services for
/// `config`.
pub fn build_election(config: &PrimacyConfig) -> anyhow::Result<Election> {
    let interval = config.election.interval()?;
    let query_timeout = config.election.query_timeout()?;

    let (directory, registry): (Arc<dyn GroupDirectory>, Arc<dyn InstanceRegistry>) =
        match &config.inventory.path {
            Some(path) => {
                info!(path = %path.display(), "using inventory file");
                let inventory = Arc::new(FileInventory::new(path));
                (inventory.clone(), inventory)
            }
            None => {
                info!(
                    groups = config.inventory.inline.groups.len(),
                    instances = config.inventory.inline.instances.len(),
                    "using inline inventory"
                );
                let inventory = Arc::new(StaticInventory::new(config.inventory.inline.clone()));
                (inventory.clone(), inventory)
            }
        };

    let identity = FixedIdentity::resolve(config.identity.instance_id.as_deref());
    let instance_id = identity.current_id();

    let poller = ElectionPoller::new(directory, registry, Arc::new(identity))
        .with_query_timeout(query_timeout);
    let scheduler = Arc::new(LeadershipElectionScheduler::new(poller).with_interval(interval));

    let group = config.election.group_name().map(str::to_string);
    info!(
        group = group.as_deref().unwrap_or("<standalone>"),
        %instance_id,
        ?interval,
        "election configured"
    );

    let backend = config.services.backend;
    let managed = match backend {
        ServicesBackend::Managed => {
            let root = object_root(config);
            info!(root = %root.display(), "managed services use local clients");
            Some(ManagedServices::new(
                local_clients(root),
                scheduler.clone(),
                group.clone(),
            ))
        }
        ServicesBackend::Noop => None,
    };
    let services = build_services(backend, managed);

    Ok(Election {
        services,
        scheduler,
        backend,
        group,
        instance_id,
    })
}

fn object_root(config: &PrimacyConfig) -> PathBuf {
    config
        .services
        .object_root
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("primacy-objects"))
}
