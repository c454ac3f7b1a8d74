//! External services facade — what the host application calls.
//!
//! Two implementations, chosen once at startup by [`build_services`]:
//!
//! - [`NoopServices`]: validates and logs every call, publishes nothing,
//!   and reports this instance as primary. For development and
//!   single-instance deployments.
//! - [`ManagedServices`]: publishes and transfers objects through clients
//!   from a [`CredentialScopedClientCache`] and answers primacy through a
//!   [`LeadershipElectionScheduler`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, warn};

use primacy_core::{Credential, ServicesBackend};
use primacy_election::LeadershipElectionScheduler;

use crate::client_cache::{ClientFactory, CredentialScopedClientCache};
use crate::error::ServiceResult;
use crate::metrics::{
    batch_datums, multi_dimensional_datum, single_datum, MetricDatum, MAX_DATUM_BATCH,
};

/// Outcome of a publish call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub response_message: Option<String>,
}

impl ExternalResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn ok_with(response: impl Into<String>) -> Self {
        Self {
            success: true,
            error_message: None,
            response_message: Some(response.into()),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(error.into()),
            response_message: None,
        }
    }
}

/// Client for a metrics backend.
#[async_trait]
pub trait MetricClient: Send + Sync {
    /// Send up to [`MAX_DATUM_BATCH`] datums. Returns the backend's response.
    async fn put_metric_data(&self, namespace: &str, data: &[MetricDatum])
        -> anyhow::Result<String>;
}

/// Client for a message topic backend.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish `message` to `topic`. Returns the message id, if assigned.
    async fn publish(&self, topic: &str, message: &str) -> anyhow::Result<Option<String>>;
}

/// Readable body of a fetched object.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Client for an object store addressed by URL (`scheme://bucket/key`).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open the object at `url` for reading.
    async fn get(&self, url: &str) -> anyhow::Result<ObjectReader>;

    /// Upload the local file `file` to `url`.
    async fn put(&self, url: &str, file: &Path) -> anyhow::Result<()>;
}

pub type MetricClientFactory = dyn ClientFactory<Client = dyn MetricClient>;
pub type PublisherFactory = dyn ClientFactory<Client = dyn MessagePublisher>;
pub type ObjectStoreFactory = dyn ClientFactory<Client = dyn ObjectStore>;

/// Messaging, metrics, object transfer, and primacy for the host application.
#[async_trait]
pub trait ExternalServices: Send + Sync {
    async fn publish_message(&self, topic: &str, contents: &str) -> ExternalResult;

    async fn publish_metric(
        &self,
        credential: &Credential,
        namespace: &str,
        metric_name: &str,
        dimension: Option<(&str, &str)>,
        value: f64,
    ) -> ServiceResult<ExternalResult>;

    async fn publish_multi_dimensional_metric(
        &self,
        credential: &Credential,
        namespace: &str,
        metric_name: &str,
        dimension_names: Option<&[Option<String>]>,
        dimension_values: Option<&[Option<String>]>,
        value: f64,
    ) -> ServiceResult<ExternalResult>;

    /// Publish one datum per metric name. Large batches are split into
    /// requests of at most [`MAX_DATUM_BATCH`]; the last request's result
    /// is returned.
    async fn publish_metrics(
        &self,
        credential: &Credential,
        namespace: &str,
        metric_names: &[String],
        dimension_names: Option<&[String]>,
        dimension_values: Option<&[String]>,
        values: &[f64],
    ) -> ServiceResult<ExternalResult>;

    /// [`publish_metric`](Self::publish_metric) with the default credential.
    async fn publish_metric_default(
        &self,
        namespace: &str,
        metric_name: &str,
        dimension: Option<(&str, &str)>,
        value: f64,
    ) -> ServiceResult<ExternalResult> {
        let credential = Credential::default_profile();
        self.publish_metric(&credential, namespace, metric_name, dimension, value)
            .await
    }

    async fn publish_multi_dimensional_metric_default(
        &self,
        namespace: &str,
        metric_name: &str,
        dimension_names: Option<&[Option<String>]>,
        dimension_values: Option<&[Option<String>]>,
        value: f64,
    ) -> ServiceResult<ExternalResult> {
        let credential = Credential::default_profile();
        self.publish_multi_dimensional_metric(
            &credential,
            namespace,
            metric_name,
            dimension_names,
            dimension_values,
            value,
        )
        .await
    }

    async fn publish_metrics_default(
        &self,
        namespace: &str,
        metric_names: &[String],
        dimension_names: Option<&[String]>,
        dimension_values: Option<&[String]>,
        values: &[f64],
    ) -> ServiceResult<ExternalResult> {
        let credential = Credential::default_profile();
        self.publish_metrics(
            &credential,
            namespace,
            metric_names,
            dimension_names,
            dimension_values,
            values,
        )
        .await
    }

    /// Stream the object at `url` into `sink`.
    ///
    /// A missing or `default` profile uses the default credential; a
    /// missing region uses the default region.
    async fn get_file_as_stream(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        profile: Option<&str>,
        region: Option<&str>,
    ) -> ExternalResult;

    /// Upload the local file `file` to `url`. Profile and region resolve
    /// as in [`get_file_as_stream`](Self::get_file_as_stream).
    async fn put_file(
        &self,
        url: &str,
        file: &Path,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> ExternalResult;

    /// Whether this instance should perform singleton duties.
    async fn is_instance_primary(&self) -> bool;
}

/// Logs calls instead of publishing.
#[derive(Debug, Default)]
pub struct NoopServices;

#[async_trait]
impl ExternalServices for NoopServices {
    async fn publish_message(&self, topic: &str, contents: &str) -> ExternalResult {
        info!(%topic, %contents, "publish_message");
        ExternalResult::ok()
    }

    async fn publish_metric(
        &self,
        credential: &Credential,
        namespace: &str,
        metric_name: &str,
        dimension: Option<(&str, &str)>,
        value: f64,
    ) -> ServiceResult<ExternalResult> {
        let datum = single_datum(metric_name, dimension, value);
        info!(%credential, %namespace, %datum, "publish_metric");
        Ok(ExternalResult::ok())
    }

    async fn publish_multi_dimensional_metric(
        &self,
        credential: &Credential,
        namespace: &str,
        metric_name: &str,
        dimension_names: Option<&[Option<String>]>,
        dimension_values: Option<&[Option<String>]>,
        value: f64,
    ) -> ServiceResult<ExternalResult> {
        let datum =
            multi_dimensional_datum(metric_name, dimension_names, dimension_values, value)?;
        info!(%credential, %namespace, %datum, "publish_multi_dimensional_metric");
        Ok(ExternalResult::ok())
    }

    async fn publish_metrics(
        &self,
        credential: &Credential,
        namespace: &str,
        metric_names: &[String],
        dimension_names: Option<&[String]>,
        dimension_values: Option<&[String]>,
        values: &[f64],
    ) -> ServiceResult<ExternalResult> {
        let datums = batch_datums(metric_names, dimension_names, dimension_values, values)?;
        for datum in &datums {
            info!(%credential, %namespace, %datum, "publish_metrics");
        }
        Ok(ExternalResult::ok())
    }

    async fn get_file_as_stream(
        &self,
        url: &str,
        _sink: &mut (dyn AsyncWrite + Send + Unpin),
        profile: Option<&str>,
        region: Option<&str>,
    ) -> ExternalResult {
        info!(%url, ?profile, ?region, "get_file_as_stream");
        ExternalResult::ok()
    }

    async fn put_file(
        &self,
        url: &str,
        file: &Path,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> ExternalResult {
        info!(%url, file = %file.display(), ?profile, ?region, "put_file");
        ExternalResult::ok()
    }

    async fn is_instance_primary(&self) -> bool {
        true
    }
}

/// Client factories for [`ManagedServices`].
pub struct ManagedClients {
    pub metrics: Arc<MetricClientFactory>,
    pub publishers: Arc<PublisherFactory>,
    pub object_stores: Arc<ObjectStoreFactory>,
}

/// Publishes through cached remote clients and runs the election.
pub struct ManagedServices {
    metric_clients: CredentialScopedClientCache<MetricClientFactory>,
    publishers: CredentialScopedClientCache<PublisherFactory>,
    object_stores: CredentialScopedClientCache<ObjectStoreFactory>,
    election: Arc<LeadershipElectionScheduler>,
    /// Group to elect within; `None` for standalone deployments.
    group: Option<String>,
}

impl ManagedServices {
    pub fn new(
        clients: ManagedClients,
        election: Arc<LeadershipElectionScheduler>,
        group: Option<String>,
    ) -> Self {
        Self {
            metric_clients: CredentialScopedClientCache::new(clients.metrics),
            publishers: CredentialScopedClientCache::new(clients.publishers),
            object_stores: CredentialScopedClientCache::new(clients.object_stores),
            election,
            group,
        }
    }

    /// The election scheduler backing `is_instance_primary`.
    pub fn election(&self) -> &LeadershipElectionScheduler {
        &self.election
    }

    async fn send(
        &self,
        credential: &Credential,
        namespace: &str,
        datums: &[MetricDatum],
    ) -> ServiceResult<ExternalResult> {
        let client = self.metric_clients.get_client(credential).await?;

        let mut last = ExternalResult::ok();
        for chunk in datums.chunks(MAX_DATUM_BATCH) {
            for datum in chunk {
                debug!(%namespace, %datum, "publishing metric");
            }
            last = match client.put_metric_data(namespace, chunk).await {
                Ok(response) => ExternalResult::ok_with(response),
                Err(e) => {
                    error!(%credential, %namespace, error = %e, "failed to publish metrics");
                    ExternalResult::failure(e.to_string())
                }
            };
        }
        Ok(last)
    }

    /// Object store client for a caller-named profile and region.
    async fn object_store(
        &self,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Result<Arc<dyn ObjectStore>, ExternalResult> {
        let credential = Credential::for_profile(profile, region);
        self.object_stores
            .get_client(&credential)
            .await
            .map_err(|e| {
                warn!(%credential, error = %e, "object store unavailable");
                ExternalResult::failure(e.to_string())
            })
    }
}

#[async_trait]
impl ExternalServices for ManagedServices {
    async fn publish_message(&self, topic: &str, contents: &str) -> ExternalResult {
        let publisher = match self.publishers.get_client(&Credential::default_profile()).await {
            Ok(p) => p,
            Err(e) => {
                warn!(%topic, error = %e, "message publisher unavailable");
                return ExternalResult::failure(e.to_string());
            }
        };

        match publisher.publish(topic, contents).await {
            Ok(Some(message_id)) => ExternalResult::ok_with(message_id),
            Ok(None) => ExternalResult::failure("no message id returned"),
            Err(e) => {
                error!(%topic, error = %e, "failed to publish message");
                ExternalResult::failure(e.to_string())
            }
        }
    }

    async fn publish_metric(
        &self,
        credential: &Credential,
        namespace: &str,
        metric_name: &str,
        dimension: Option<(&str, &str)>,
        value: f64,
    ) -> ServiceResult<ExternalResult> {
        let datum = single_datum(metric_name, dimension, value);
        self.send(credential, namespace, &[datum]).await
    }

    async fn publish_multi_dimensional_metric(
        &self,
        credential: &Credential,
        namespace: &str,
        metric_name: &str,
        dimension_names: Option<&[Option<String>]>,
        dimension_values: Option<&[Option<String>]>,
        value: f64,
    ) -> ServiceResult<ExternalResult> {
        let datum =
            multi_dimensional_datum(metric_name, dimension_names, dimension_values, value)?;
        self.send(credential, namespace, &[datum]).await
    }

    async fn publish_metrics(
        &self,
        credential: &Credential,
        namespace: &str,
        metric_names: &[String],
        dimension_names: Option<&[String]>,
        dimension_values: Option<&[String]>,
        values: &[f64],
    ) -> ServiceResult<ExternalResult> {
        let datums = batch_datums(metric_names, dimension_names, dimension_values, values)?;
        self.send(credential, namespace, &datums).await
    }

    async fn get_file_as_stream(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        profile: Option<&str>,
        region: Option<&str>,
    ) -> ExternalResult {
        let store = match self.object_store(profile, region).await {
            Ok(store) => store,
            Err(failure) => return failure,
        };

        info!(%url, ?profile, "fetching object");
        let mut reader = match store.get(url).await {
            Ok(reader) => reader,
            Err(e) => {
                error!(%url, error = %e, "failed to fetch object");
                return ExternalResult::failure(e.to_string());
            }
        };

        match tokio::io::copy(&mut reader, &mut *sink).await {
            Ok(bytes) => {
                debug!(%url, bytes, "object streamed");
                ExternalResult::ok()
            }
            Err(e) => {
                error!(%url, error = %e, "failed to read object");
                ExternalResult::failure(e.to_string())
            }
        }
    }

    async fn put_file(
        &self,
        url: &str,
        file: &Path,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> ExternalResult {
        let store = match self.object_store(profile, region).await {
            Ok(store) => store,
            Err(failure) => return failure,
        };

        info!(%url, file = %file.display(), "uploading object");
        match store.put(url, file).await {
            Ok(()) => ExternalResult::ok(),
            Err(e) => {
                error!(%url, file = %file.display(), error = %e, "failed to upload object");
                ExternalResult::failure(e.to_string())
            }
        }
    }

    async fn is_instance_primary(&self) -> bool {
        match &self.group {
            Some(group) => self.election.is_primary(group).await,
            None => true,
        }
    }
}

/// Build the services implementation selected by configuration.
///
/// Selecting [`ServicesBackend::Managed`] without the managed parts falls
/// back to [`NoopServices`].
pub fn build_services(
    backend: ServicesBackend,
    managed: Option<ManagedServices>,
) -> Arc<dyn ExternalServices> {
    match (backend, managed) {
        (ServicesBackend::Managed, Some(services)) => {
            info!("using managed external services");
            Arc::new(services)
        }
        (ServicesBackend::Managed, None) => {
            warn!("managed external services requested but not available; using noop");
            Arc::new(NoopServices)
        }
        (ServicesBackend::Noop, _) => {
            info!("using noop external services");
            Arc::new(NoopServices)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;

    use primacy_core::DEFAULT_REGION;

    use primacy_core::{Group, Instance, InventoryFile};
    use primacy_election::{ElectionPoller, FixedIdentity, StaticInventory};

    use crate::error::{ClientError, ServiceError};

    /// Records the size of every request it receives.
    #[derive(Default)]
    struct RecordingClient {
        requests: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl MetricClient for RecordingClient {
        async fn put_metric_data(
            &self,
            namespace: &str,
            data: &[MetricDatum],
        ) -> anyhow::Result<String> {
            self.requests.lock().unwrap().push(data.len());
            Ok(format!("{namespace}:{}", data.len()))
        }
    }

    struct RecordingFactory {
        client: Arc<RecordingClient>,
        builds: AtomicU64,
    }

    #[async_trait]
    impl ClientFactory for RecordingFactory {
        type Client = dyn MetricClient;

        async fn build(&self, _credential: &Credential) -> anyhow::Result<Arc<dyn MetricClient>> {
            self.builds.fetch_add(1, Ordering::Relaxed);
            Ok(self.client.clone())
        }
    }

    struct TopicPublisher;

    #[async_trait]
    impl MessagePublisher for TopicPublisher {
        async fn publish(&self, topic: &str, _message: &str) -> anyhow::Result<Option<String>> {
            Ok(Some(format!("{topic}-msg-1")))
        }
    }

    struct PublisherFactoryStub {
        fail: AtomicBool,
    }

    #[async_trait]
    impl ClientFactory for PublisherFactoryStub {
        type Client = dyn MessagePublisher;

        async fn build(
            &self,
            _credential: &Credential,
        ) -> anyhow::Result<Arc<dyn MessagePublisher>> {
            if self.fail.load(Ordering::Relaxed) {
                anyhow::bail!("no default credentials");
            }
            Ok(Arc::new(TopicPublisher))
        }
    }

    /// Objects kept in memory, keyed by URL.
    #[derive(Default)]
    struct MemoryStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn get(&self, url: &str) -> anyhow::Result<ObjectReader> {
            let body = self.objects.lock().unwrap().get(url).cloned();
            match body {
                Some(body) => Ok(Box::new(std::io::Cursor::new(body))),
                None => anyhow::bail!("no such object: {url}"),
            }
        }

        async fn put(&self, url: &str, file: &Path) -> anyhow::Result<()> {
            let body = tokio::fs::read(file).await?;
            self.objects.lock().unwrap().insert(url.to_string(), body);
            Ok(())
        }
    }

    /// Hands out one shared store and records every credential it built for.
    #[derive(Default)]
    struct StoreFactory {
        store: Arc<MemoryStore>,
        built_for: Mutex<Vec<Credential>>,
    }

    #[async_trait]
    impl ClientFactory for StoreFactory {
        type Client = dyn ObjectStore;

        async fn build(&self, credential: &Credential) -> anyhow::Result<Arc<dyn ObjectStore>> {
            self.built_for.lock().unwrap().push(credential.clone());
            Ok(self.store.clone())
        }
    }

    fn election(own_id: &str) -> Arc<LeadershipElectionScheduler> {
        let inventory = Arc::new(StaticInventory::new(InventoryFile {
            groups: vec![Group::new("fleet-a", vec!["A".into(), "B".into()])],
            instances: vec![Instance::new("A", 100), Instance::new("B", 50)],
        }));
        Arc::new(LeadershipElectionScheduler::new(ElectionPoller::new(
            inventory.clone(),
            inventory,
            Arc::new(FixedIdentity::new(own_id)),
        )))
    }

    struct Harness {
        services: ManagedServices,
        client: Arc<RecordingClient>,
        factory: Arc<RecordingFactory>,
        publishers: Arc<PublisherFactoryStub>,
        stores: Arc<StoreFactory>,
    }

    fn managed(own_id: &str, group: Option<&str>) -> Harness {
        let client = Arc::new(RecordingClient::default());
        let factory = Arc::new(RecordingFactory {
            client: client.clone(),
            builds: AtomicU64::new(0),
        });
        let publishers = Arc::new(PublisherFactoryStub {
            fail: AtomicBool::new(false),
        });
        let stores = Arc::new(StoreFactory::default());
        let clients = ManagedClients {
            metrics: factory.clone(),
            publishers: publishers.clone(),
            object_stores: stores.clone(),
        };
        let services = ManagedServices::new(clients, election(own_id), group.map(str::to_string));
        Harness {
            services,
            client,
            factory,
            publishers,
            stores,
        }
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("metric-{i}")).collect()
    }

    #[tokio::test]
    async fn publish_metrics_splits_into_batches() {
        let h = managed("A", None);
        let values = vec![1.0; 45];

        let result = h
            .services
            .publish_metrics_default("oba", &names(45), None, None, &values)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.response_message.as_deref(), Some("oba:5"));
        assert_eq!(*h.client.requests.lock().unwrap(), vec![20, 20, 5]);
    }

    #[tokio::test]
    async fn invalid_batch_never_reaches_client() {
        let h = managed("A", None);

        let credential = Credential::default_profile();
        let err = h
            .services
            .publish_metrics(&credential, "oba", &names(3), None, None, &[1.0])
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(h.factory.builds.load(Ordering::Relaxed), 0);
        assert!(h.client.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn metric_clients_are_cached_per_credential() {
        let h = managed("A", None);
        let ops = Credential::external_profile("ops", "us-west-2");

        let default = Credential::default_profile();

        for cred in [&default, &ops, &default] {
            h.services
                .publish_metric(cred, "oba", "requests", Some(("route", "1")), 1.0)
                .await
                .unwrap();
        }

        assert_eq!(h.factory.builds.load(Ordering::Relaxed), 2);
        assert_eq!(h.client.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn default_metric_forms_share_the_default_client() {
        let h = managed("A", None);
        let dim_names = vec![Some("agency".to_string())];
        let dim_values = vec![Some("1".to_string())];

        h.services
            .publish_metric_default("oba", "requests", None, 1.0)
            .await
            .unwrap();
        h.services
            .publish_multi_dimensional_metric_default(
                "oba",
                "lag",
                Some(dim_names.as_slice()),
                Some(dim_values.as_slice()),
                2.0,
            )
            .await
            .unwrap();
        h.services
            .publish_metric(&Credential::default_profile(), "oba", "requests", None, 3.0)
            .await
            .unwrap();

        assert_eq!(h.factory.builds.load(Ordering::Relaxed), 1);
        assert_eq!(*h.client.requests.lock().unwrap(), vec![1, 1, 1]);
    }

    #[tokio::test]
    async fn incomplete_credential_is_configuration_error() {
        let h = managed("A", None);

        let err = h
            .services
            .publish_metric(&Credential::api_key_param(""), "oba", "requests", None, 1.0)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Client(ClientError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn multi_dimensional_metric_validates_before_publishing() {
        let h = managed("A", None);
        let names = vec![Some("agency".to_string())];

        let err = h
            .services
            .publish_multi_dimensional_metric(
                &Credential::default_profile(),
                "oba",
                "lag",
                Some(names.as_slice()),
                None,
                1.0,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(h.client.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_message_returns_message_id() {
        let h = managed("A", None);
        let result = h.services.publish_message("alerts", "hello").await;
        assert_eq!(result, ExternalResult::ok_with("alerts-msg-1"));
    }

    #[tokio::test]
    async fn publish_message_reports_publisher_failure_and_retries() {
        let h = managed("A", None);
        h.publishers.fail.store(true, Ordering::Relaxed);

        let result = h.services.publish_message("alerts", "hello").await;
        assert!(!result.success);
        assert!(result.error_message.is_some());

        h.publishers.fail.store(false, Ordering::Relaxed);
        assert!(h.services.publish_message("alerts", "hello").await.success);
    }

    #[tokio::test]
    async fn put_then_get_streams_file_contents() {
        let h = managed("A", None);
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bundle.zip");
        std::fs::write(&file, b"gtfs bundle").unwrap();

        let put = h.services.put_file("s3://bundles/latest.zip", &file, None, None).await;
        assert!(put.success);

        let mut sink = Vec::new();
        let got = h
            .services
            .get_file_as_stream("s3://bundles/latest.zip", &mut sink, None, None)
            .await;
        assert!(got.success);
        assert_eq!(sink, b"gtfs bundle");
    }

    #[tokio::test]
    async fn default_profile_names_share_one_object_store() {
        let h = managed("A", None);
        let mut sink = Vec::new();

        for profile in [None, Some("default"), Some("ops"), Some("default")] {
            h.services
                .get_file_as_stream("s3://bundles/missing", &mut sink, profile, None)
                .await;
        }

        let built = h.stores.built_for.lock().unwrap().clone();
        assert_eq!(
            built,
            vec![
                Credential::default_profile(),
                Credential::external_profile("ops", DEFAULT_REGION),
            ]
        );
    }

    #[tokio::test]
    async fn missing_object_is_failure_result() {
        let h = managed("A", None);
        let mut sink = Vec::new();

        let result = h
            .services
            .get_file_as_stream("s3://bundles/missing", &mut sink, Some("ops"), Some("us-west-2"))
            .await;

        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("no such object"));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn put_of_missing_local_file_is_failure_result() {
        let h = managed("A", None);
        let result = h
            .services
            .put_file("s3://bundles/x", Path::new("/nonexistent/bundle.zip"), None, None)
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn managed_primacy_follows_election() {
        assert!(managed("B", Some("fleet-a")).services.is_instance_primary().await);
        assert!(!managed("A", Some("fleet-a")).services.is_instance_primary().await);
        assert!(managed("A", None).services.is_instance_primary().await);
    }

    #[tokio::test]
    async fn noop_validates_and_is_primary() {
        let noop = NoopServices;
        assert!(noop.is_instance_primary().await);
        assert!(noop.publish_message("alerts", "hi").await.success);

        let err = noop
            .publish_metrics(&Credential::no_op(), "oba", &names(2), None, None, &[1.0])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let mut sink = Vec::new();
        let got = noop.get_file_as_stream("s3://b/k", &mut sink, None, None).await;
        assert!(got.success);
        assert!(sink.is_empty());
        assert!(noop.put_file("s3://b/k", Path::new("/nonexistent"), None, None).await.success);
    }

    #[tokio::test]
    async fn build_services_selects_backend() {
        let parts = managed("A", Some("fleet-a")).services;
        let services = build_services(ServicesBackend::Managed, Some(parts));
        assert!(!services.is_instance_primary().await);

        let fallback = build_services(ServicesBackend::Managed, None);
        assert!(fallback.is_instance_primary().await);

        let parts = managed("A", Some("fleet-a")).services;
        let noop = build_services(ServicesBackend::Noop, Some(parts));
        assert!(noop.is_instance_primary().await);
    }
}
