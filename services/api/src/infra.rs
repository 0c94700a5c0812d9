use case_fusion::config::IngestConfig;
use case_fusion::sources::SourceFetcher;
use case_fusion::timeseries::Datasource;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Holds the datasource currently served. Each ingestion run replaces it
/// wholesale; readers keep whichever `Arc` they cloned.
#[derive(Clone, Default)]
pub(crate) struct DatasourceStore {
    current: Arc<RwLock<Option<Arc<Datasource>>>>,
    ready: Arc<AtomicBool>,
}

impl DatasourceStore {
    pub(crate) fn current(&self) -> Option<Arc<Datasource>> {
        self.current
            .read()
            .expect("datasource lock poisoned")
            .clone()
    }

    pub(crate) fn replace(&self, datasource: Datasource) -> Arc<Datasource> {
        let datasource = Arc::new(datasource);
        *self.current.write().expect("datasource lock poisoned") = Some(datasource.clone());
        self.ready.store(true, Ordering::Release);
        datasource
    }

    pub(crate) fn readiness(&self) -> Arc<AtomicBool> {
        self.ready.clone()
    }
}

#[derive(Clone)]
pub(crate) struct DatasourceState {
    pub(crate) store: DatasourceStore,
    pub(crate) ingest: Arc<IngestConfig>,
    pub(crate) fetcher: SourceFetcher,
}

impl DatasourceState {
    pub(crate) fn new(ingest: IngestConfig) -> Self {
        Self {
            store: DatasourceStore::default(),
            ingest: Arc::new(ingest),
            fetcher: SourceFetcher::new(),
        }
    }
}
