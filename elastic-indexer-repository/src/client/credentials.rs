//! AWS credential resolution for request signing.
//!
//! Credentials are resolved in a fixed priority order: an assumed role when a
//! role ARN is configured, then a static key pair when both halves are present,
//! then the ambient provider chain (environment, shared config, instance
//! metadata). Each candidate is validated by fetching credentials once; the
//! first that yields credentials wins. Resolved providers are cached per set of
//! resolution inputs in a [`CredentialContext`] owned by the caller.

use std::collections::HashMap;
use std::fmt;

use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::sts::AssumeRoleProvider;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_types::region::Region;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ClientParams;

/// Session name used when assuming a role.
pub const ASSUME_ROLE_SESSION_NAME: &str = "elastic-indexer";

const STATIC_PROVIDER_NAME: &str = "elastic-indexer-static";

/// One candidate source of credentials.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Exchange ambient credentials for a role through STS.
    AssumeRole { role_arn: String },
    /// A configured access key and secret.
    Static {
        access_key_id: String,
        secret_access_key: String,
    },
    /// The default provider chain.
    Ambient,
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::AssumeRole { role_arn } => f
                .debug_struct("AssumeRole")
                .field("role_arn", role_arn)
                .finish(),
            CredentialSource::Static { access_key_id, .. } => f
                .debug_struct("Static")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"** redacted **")
                .finish(),
            CredentialSource::Ambient => f.write_str("Ambient"),
        }
    }
}

impl CredentialSource {
    fn name(&self) -> &'static str {
        match self {
            CredentialSource::AssumeRole { .. } => "assume_role",
            CredentialSource::Static { .. } => "static",
            CredentialSource::Ambient => "ambient",
        }
    }
}

/// The ordered candidates credential resolution tries for the given parameters.
///
/// A role takes priority over static keys; the ambient chain is always last.
pub fn resolution_plan(params: &ClientParams) -> Vec<CredentialSource> {
    let mut plan = Vec::with_capacity(3);

    if let Some(role_arn) = params.role_arn() {
        plan.push(CredentialSource::AssumeRole {
            role_arn: role_arn.to_string(),
        });
    }

    if let Some((access_key_id, secret_access_key)) = params.static_credentials() {
        plan.push(CredentialSource::Static {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
        });
    }

    plan.push(CredentialSource::Ambient);
    plan
}

/// Cache key for a resolution plan. Static secrets are stored as a SHA-256
/// fingerprint, never in plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CredentialKey {
    region: String,
    plan: Vec<String>,
}

impl CredentialKey {
    fn new(region: &str, plan: &[CredentialSource]) -> Self {
        Self {
            region: region.to_string(),
            plan: plan
                .iter()
                .map(|source| match source {
                    CredentialSource::AssumeRole { role_arn } => format!("role:{}", role_arn),
                    CredentialSource::Static {
                        access_key_id,
                        secret_access_key,
                    } => format!(
                        "static:{}:{:x}",
                        access_key_id,
                        Sha256::digest(secret_access_key.as_bytes())
                    ),
                    CredentialSource::Ambient => "ambient".to_string(),
                })
                .collect(),
        }
    }
}

/// Explicit credential-resolution context.
///
/// Holds resolved providers keyed by the inputs they were resolved from, so
/// clients built repeatedly from the same parameters share one provider. Call
/// [`invalidate`](Self::invalidate) after rotating credentials or roles.
#[derive(Default)]
pub struct CredentialContext {
    cache: Mutex<HashMap<CredentialKey, SharedCredentialsProvider>>,
}

impl CredentialContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a credentials provider for the given parameters.
    ///
    /// Returns `None` when no candidate yields credentials; the caller then builds
    /// an unsigned client.
    pub async fn resolve(&self, params: &ClientParams) -> Option<SharedCredentialsProvider> {
        let region = params.region();
        let plan = resolution_plan(params);
        let key = CredentialKey::new(region, &plan);

        let mut cache = self.cache.lock().await;
        if let Some(provider) = cache.get(&key) {
            debug!(region = %region, "Reusing cached credentials provider");
            return Some(provider.clone());
        }

        for source in &plan {
            if let Some(provider) = provider_for(source, region).await {
                info!(region = %region, source = source.name(), "Resolved AWS credentials");
                cache.insert(key, provider.clone());
                return Some(provider);
            }
        }

        warn!(region = %region, "No AWS credentials could be resolved");
        None
    }

    /// Drop every cached provider.
    pub async fn invalidate(&self) {
        self.cache.lock().await.clear();
    }

    /// Number of cached providers.
    pub async fn cached_providers(&self) -> usize {
        self.cache.lock().await.len()
    }
}

impl fmt::Debug for CredentialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialContext").finish_non_exhaustive()
    }
}

async fn provider_for(
    source: &CredentialSource,
    region: &str,
) -> Option<SharedCredentialsProvider> {
    let region = Region::new(region.to_string());

    let provider = match source {
        CredentialSource::AssumeRole { role_arn } => {
            let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                .region(region.clone())
                .load()
                .await;
            let provider = AssumeRoleProvider::builder(role_arn.clone())
                .session_name(ASSUME_ROLE_SESSION_NAME)
                .region(region)
                .configure(&sdk_config)
                .build()
                .await;
            SharedCredentialsProvider::new(provider)
        }
        CredentialSource::Static {
            access_key_id,
            secret_access_key,
        } => SharedCredentialsProvider::new(static_credentials(access_key_id, secret_access_key)),
        CredentialSource::Ambient => {
            let chain = DefaultCredentialsChain::builder()
                .region(region)
                .build()
                .await;
            SharedCredentialsProvider::new(chain)
        }
    };

    match provider.provide_credentials().await {
        Ok(_) => Some(provider),
        Err(e) => {
            warn!(source = source.name(), error = %e, "Credential source yielded no credentials");
            None
        }
    }
}

fn static_credentials(access_key_id: &str, secret_access_key: &str) -> Credentials {
    Credentials::new(
        access_key_id,
        secret_access_key,
        None,
        None,
        STATIC_PROVIDER_NAME,
    )
}
