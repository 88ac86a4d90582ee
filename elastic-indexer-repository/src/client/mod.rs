//! Search client construction.
//!
//! [`build_client`] turns [`ClientParams`] into a [`SearchClient`]: an OpenSearch
//! transport bound to the configured endpoint, optionally signed with AWS
//! credentials, carrying the retry policy and debug flag the bulk transport
//! applies.

mod credentials;

pub use credentials::{
    resolution_plan, CredentialContext, CredentialSource, ASSUME_ROLE_SESSION_NAME,
};

use aws_types::region::Region;
use opensearch::auth::Credentials;
use opensearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use opensearch::OpenSearch;
use tracing::{info, warn};
use url::Url;

use crate::config::{ClientParams, RuntimeEnvironment, AWS_SERVICE_NAME, OPEN_TIMEOUT};
use crate::errors::SearchIndexError;

/// A configured connection to the search engine.
#[derive(Clone)]
pub struct SearchClient {
    inner: OpenSearch,
    url: Url,
    max_retries: u32,
    debug: bool,
    signed: bool,
}

impl SearchClient {
    /// The underlying OpenSearch client.
    pub fn inner(&self) -> &OpenSearch {
        &self.inner
    }

    /// The endpoint the client is bound to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Retries applied to transport-level failures.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether request payload details are logged.
    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    /// Whether requests are signed with AWS credentials.
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Check the engine is reachable within the open-connection timeout.
    pub async fn ping(&self) -> Result<(), SearchIndexError> {
        let response = tokio::time::timeout(OPEN_TIMEOUT, self.inner.ping().send())
            .await
            .map_err(|_| {
                SearchIndexError::connection(format!(
                    "No response from {} within {:?}",
                    self.url, OPEN_TIMEOUT
                ))
            })?
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(SearchIndexError::connection(format!(
                "Ping to {} failed with status {}",
                self.url, status
            )));
        }

        Ok(())
    }
}

impl std::fmt::Debug for SearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchClient")
            .field("url", &self.url.as_str())
            .field("max_retries", &self.max_retries)
            .field("debug", &self.debug)
            .field("signed", &self.signed)
            .finish_non_exhaustive()
    }
}

/// Build a client from optional parameters.
///
/// # Returns
///
/// * `Ok(None)` - No parameters were given; search is unavailable, not broken
/// * `Ok(Some(SearchClient))` - The client
/// * `Err(SearchIndexError)` - If the URL is invalid or the transport cannot be built
///
/// When signing is enabled but no credentials resolve, the client is built
/// unsigned and a warning is logged.
pub async fn build_client(
    params: Option<&ClientParams>,
    credentials: &CredentialContext,
    environment: RuntimeEnvironment,
) -> Result<Option<SearchClient>, SearchIndexError> {
    let Some(params) = params else {
        return Ok(None);
    };

    let url = Url::parse(&params.url).map_err(|e| {
        SearchIndexError::configuration(format!("Invalid URL '{}': {}", params.url, e))
    })?;

    let mut builder =
        TransportBuilder::new(SingleNodeConnectionPool::new(url.clone())).disable_proxy();

    if let Some(timeout) = params.request_timeout() {
        builder = builder.timeout(timeout);
    }

    let mut signed = false;
    if params.aws {
        match credentials.resolve(params).await {
            Some(provider) => {
                builder = builder
                    .auth(Credentials::AwsSigV4(
                        provider,
                        Region::new(params.region().to_string()),
                    ))
                    .service_name(AWS_SERVICE_NAME);
                signed = true;
            }
            None => {
                warn!(
                    url = %url,
                    "AWS signing enabled but no credentials resolved; requests will be unsigned"
                );
            }
        }
    }

    let transport = builder
        .build()
        .map_err(|e| SearchIndexError::connection(e.to_string()))?;

    let client = SearchClient {
        inner: OpenSearch::new(transport),
        url,
        max_retries: params.retry_on_failure.max_retries(),
        debug: params.debug && environment.allows_debug(),
        signed,
    };

    info!(
        url = %client.url,
        signed = client.signed,
        max_retries = client.max_retries,
        debug = client.debug,
        "Created search client"
    );

    Ok(Some(client))
}
