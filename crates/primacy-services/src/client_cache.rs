//! Credential-scoped client cache.
//!
//! Remote-service clients are expensive to build (profile resolution,
//! handshakes), so each distinct [`Credential`] gets exactly one, shared
//! by every later lookup with an equal credential.
//!
//! # Concurrency model
//!
//! The map lock is held only long enough to find or insert the per-key
//! cell. Construction runs inside that cell's `OnceCell`, so concurrent
//! first lookups for one credential wait for a single build, and lookups
//! for other credentials are not held up by it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use primacy_core::Credential;

use crate::error::{ClientError, ClientResult};

/// Builds a client for a credential.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    type Client: Send + Sync + ?Sized;

    async fn build(&self, credential: &Credential) -> anyhow::Result<Arc<Self::Client>>;
}

type Slot<C> = Arc<OnceCell<Arc<C>>>;

/// One client per distinct credential, built on first use.
pub struct CredentialScopedClientCache<F: ClientFactory + ?Sized> {
    factory: Arc<F>,
    clients: Mutex<HashMap<Credential, Slot<F::Client>>>,
}

impl<F: ClientFactory + ?Sized> CredentialScopedClientCache<F> {
    pub fn new(factory: Arc<F>) -> Self {
        Self {
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The client for `credential`, building it on first use.
    ///
    /// Fails with [`ClientError::Configuration`] before touching the
    /// factory if the credential lacks a required field.
    pub async fn get_client(&self, credential: &Credential) -> ClientResult<Arc<F::Client>> {
        if let Some(field) = credential.missing_field() {
            return Err(ClientError::Configuration {
                credential: credential.to_string(),
                field,
            });
        }

        let slot = {
            let mut clients = self.clients.lock().await;
            Arc::clone(clients.entry(credential.clone()).or_default())
        };

        let client = slot
            .get_or_try_init(|| async {
                debug!(%credential, "constructing client");
                let client = self.factory.build(credential).await.map_err(|source| {
                    ClientError::Construction {
                        credential: credential.to_string(),
                        source,
                    }
                })?;
                info!(%credential, "client cached");
                Ok::<_, ClientError>(client)
            })
            .await?;

        Ok(Arc::clone(client))
    }

    /// Number of clients built so far.
    pub async fn len(&self) -> usize {
        let clients = self.clients.lock().await;
        clients.values().filter(|slot| slot.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether a client for `credential` has been built.
    pub async fn contains(&self, credential: &Credential) -> bool {
        let clients = self.clients.lock().await;
        clients
            .get(credential)
            .is_some_and(|slot| slot.initialized())
    }
}
