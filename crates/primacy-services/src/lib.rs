//! primacy-services — external integrations built around the election.
//!
//! # Architecture
//!
//! ```text
//! build_services(backend) → Arc<dyn ExternalServices>
//!   ├── NoopServices (log only, always primary)
//!   └── ManagedServices
//!       ├── CredentialScopedClientCache<dyn MetricClient>
//!       │   └── publish_metric / publish_metrics (≤ 20 datums per request)
//!       ├── CredentialScopedClientCache<dyn MessagePublisher>
//!       │   └── publish_message (default credential)
//!       ├── CredentialScopedClientCache<dyn ObjectStore>
//!       │   └── get_file_as_stream / put_file (profile + region, or default)
//!       └── LeadershipElectionScheduler
//!           └── is_instance_primary
//! ```
//!
//! Argument validation for metric calls happens before any client is
//! looked up; credential validation happens before any client is built.
//! The [`local`] module provides clients that stay on this host.

pub mod client_cache;
pub mod error;
pub mod local;
pub mod metrics;
pub mod services;

pub use client_cache::{ClientFactory, CredentialScopedClientCache};
pub use error::{ClientError, ClientResult, ServiceError, ServiceResult};
pub use metrics::{Dimension, MetricDatum, MetricUnit, MAX_DATUM_BATCH};
pub use local::{local_clients, DirectoryObjectStore};
pub use services::{
    build_services, ExternalResult, ExternalServices, ManagedClients, ManagedServices,
    MessagePublisher, MetricClient, MetricClientFactory, NoopServices, ObjectReader, ObjectStore,
    ObjectStoreFactory, PublisherFactory,
};
