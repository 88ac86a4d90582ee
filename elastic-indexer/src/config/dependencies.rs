//! Dependency initialization and wiring for the elastic indexer.

use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use elastic_indexer_repository::{
    build_client, BulkTransport, ClientParams, CredentialContext, OpenSearchBulkTransport,
    RuntimeEnvironment, SearchClient, SearchResultsAdapter,
};
use elastic_indexer_shared::TypeRegistry;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::bookkeeping::{BookkeepingExecutor, ReferenceQueue};
use crate::bulk::BulkIndexer;
use crate::config::{ConnectionMode, IndexerSettings};
use crate::errors::IndexerError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    pub client: SearchClient,
    pub transport: Arc<dyn BulkTransport>,
    pub registry: Arc<TypeRegistry>,
    pub results: SearchResultsAdapter,
    pub settings: IndexerSettings,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// Reads `.env` when present, then [`IndexerSettings::from_env`],
    /// [`ClientParams::from_env`] and `APP_ENV`.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No search engine is configured (`ELASTICSEARCH_URL` unset)
    /// * `Ok(Some(Dependencies))` - Initialized dependencies
    /// * `Err(IndexerError)` - If initialization fails (only in fail-fast mode)
    pub async fn from_env(registry: TypeRegistry) -> Result<Option<Self>, IndexerError> {
        dotenv().ok();

        let settings = IndexerSettings::from_env();
        let Some(params) = ClientParams::from_env() else {
            info!("ELASTICSEARCH_URL not set, search indexing disabled");
            return Ok(None);
        };

        let credentials = CredentialContext::new();
        Self::new(
            &params,
            registry,
            settings,
            RuntimeEnvironment::from_env(),
            &credentials,
        )
        .await
        .map(Some)
    }

    /// Initialize dependencies from explicit configuration.
    pub async fn new(
        params: &ClientParams,
        registry: TypeRegistry,
        settings: IndexerSettings,
        environment: RuntimeEnvironment,
        credentials: &CredentialContext,
    ) -> Result<Self, IndexerError> {
        info!(
            url = %params.url,
            aws = params.aws,
            connection_mode = ?settings.connection_mode,
            retry_interval_secs = settings.retry_interval.as_secs(),
            bulk_limit_bytes = settings.bulk_limit_bytes,
            "Initializing dependencies"
        );

        let client = Self::connect(
            params,
            credentials,
            environment,
            settings.connection_mode,
            settings.retry_interval,
        )
        .await?;

        info!("Search engine connection established");

        let registry = Arc::new(registry);
        let transport: Arc<dyn BulkTransport> =
            Arc::new(OpenSearchBulkTransport::new(client.clone()));
        let results = SearchResultsAdapter::new(client.clone(), registry.clone());

        Ok(Self {
            client,
            transport,
            registry,
            results,
            settings,
        })
    }

    /// A fresh bulk indexer using the configured byte budget.
    pub fn bulk_indexer(&self) -> BulkIndexer {
        BulkIndexer::new(self.transport.clone(), self.registry.clone())
            .with_bulk_limit_bytes(self.settings.bulk_limit_bytes)
    }

    /// An executor draining the given queue.
    pub fn executor(&self, queue: Arc<dyn ReferenceQueue>) -> BookkeepingExecutor {
        BookkeepingExecutor::new(queue, self.transport.clone(), self.registry.clone())
            .with_bulk_limit_bytes(self.settings.bulk_limit_bytes)
    }

    /// Connect to the search engine with retry logic based on connection mode.
    async fn connect(
        params: &ClientParams,
        credentials: &CredentialContext,
        environment: RuntimeEnvironment,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<SearchClient, IndexerError> {
        loop {
            match Self::try_connect(params, credentials, environment).await {
                Ok(client) => return Ok(client),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(IndexerError::config(format!(
                            "Failed to connect to search engine: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            url = %params.url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to search engine, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    /// Attempt to build a client and reach the engine.
    async fn try_connect(
        params: &ClientParams,
        credentials: &CredentialContext,
        environment: RuntimeEnvironment,
    ) -> Result<SearchClient, IndexerError> {
        let client = build_client(Some(params), credentials, environment)
            .await?
            .ok_or_else(|| IndexerError::config("No client parameters"))?;

        client.ping().await?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_fast_on_unreachable_engine() {
        let params = ClientParams::new("http://127.0.0.1:1");
        let settings = IndexerSettings {
            connection_mode: ConnectionMode::FailFast,
            ..IndexerSettings::default()
        };

        let result = Dependencies::new(
            &params,
            TypeRegistry::new(),
            settings,
            RuntimeEnvironment::Test,
            &CredentialContext::new(),
        )
        .await;

        assert!(matches!(result, Err(IndexerError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_fail_fast_on_invalid_url() {
        let params = ClientParams::new("::not a url::");
        let settings = IndexerSettings {
            connection_mode: ConnectionMode::FailFast,
            ..IndexerSettings::default()
        };

        let result = Dependencies::new(
            &params,
            TypeRegistry::new(),
            settings,
            RuntimeEnvironment::Test,
            &CredentialContext::new(),
        )
        .await;

        assert!(result.is_err());
    }
}
