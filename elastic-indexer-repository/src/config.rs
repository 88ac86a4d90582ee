//! Client configuration.
//!
//! [`ClientParams`] is the configuration surface consumed when building a search
//! client. It is deserializable so hosts can embed it in their own settings, and
//! can be read from `ELASTICSEARCH_*` environment variables.

use std::env;
use std::time::Duration;

use serde::Deserialize;

/// Fixed timeout for the connection check in `SearchClient::ping`.
///
/// Bulk and search calls are not covered by it; they are bounded by the
/// client's request timeout.
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Retries used when the retry policy is enabled without an explicit count.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Service name requests are signed for.
pub const AWS_SERVICE_NAME: &str = "es";

/// Region used when signing is enabled but no region is configured.
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Retry policy for transport-level failures: disabled, enabled with the default
/// count, or an explicit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RetryOnFailure {
    Enabled(bool),
    Count(u32),
}

impl Default for RetryOnFailure {
    fn default() -> Self {
        RetryOnFailure::Count(0)
    }
}

impl RetryOnFailure {
    /// Number of retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        match self {
            RetryOnFailure::Enabled(false) => 0,
            RetryOnFailure::Enabled(true) => DEFAULT_MAX_RETRIES,
            RetryOnFailure::Count(count) => *count,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" => Some(RetryOnFailure::Enabled(true)),
            "false" => Some(RetryOnFailure::Enabled(false)),
            other => other.parse().ok().map(RetryOnFailure::Count),
        }
    }
}

/// The environment the host runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeEnvironment {
    #[default]
    Production,
    Development,
    Test,
}

impl RuntimeEnvironment {
    /// Read the environment from `APP_ENV`, defaulting to production.
    pub fn from_env() -> Self {
        env::var("APP_ENV")
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => RuntimeEnvironment::Development,
            "test" => RuntimeEnvironment::Test,
            _ => RuntimeEnvironment::Production,
        }
    }

    /// Request and response logging is only ever enabled outside production.
    pub fn allows_debug(&self) -> bool {
        !matches!(self, RuntimeEnvironment::Production)
    }
}

/// Parameters a search client is built from.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientParams {
    /// Endpoint URL of the search engine.
    pub url: String,

    /// Sign requests with AWS credentials.
    #[serde(default)]
    pub aws: bool,

    #[serde(default)]
    pub aws_region: Option<String>,

    #[serde(default)]
    pub aws_role_arn: Option<String>,

    #[serde(default)]
    pub aws_access_key: Option<String>,

    #[serde(default)]
    pub aws_secret_access_key: Option<String>,

    /// Request timeout in seconds. `None` or `0` leaves the client default.
    #[serde(default)]
    pub client_request_timeout: Option<u64>,

    #[serde(default)]
    pub retry_on_failure: RetryOnFailure,

    /// Log request payload details, honoured outside production only.
    #[serde(default)]
    pub debug: bool,
}

impl ClientParams {
    /// Create parameters for an unsigned client at the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Load parameters from `ELASTICSEARCH_*` environment variables.
    ///
    /// Returns `None` when `ELASTICSEARCH_URL` is unset, meaning no search engine
    /// is configured.
    pub fn from_env() -> Option<Self> {
        let url = non_empty_var("ELASTICSEARCH_URL")?;

        Some(Self {
            url,
            aws: non_empty_var("ELASTICSEARCH_AWS")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            aws_region: non_empty_var("ELASTICSEARCH_AWS_REGION"),
            aws_role_arn: non_empty_var("ELASTICSEARCH_AWS_ROLE_ARN"),
            aws_access_key: non_empty_var("ELASTICSEARCH_AWS_ACCESS_KEY"),
            aws_secret_access_key: non_empty_var("ELASTICSEARCH_AWS_SECRET_ACCESS_KEY"),
            client_request_timeout: non_empty_var("ELASTICSEARCH_CLIENT_REQUEST_TIMEOUT")
                .and_then(|v| v.parse().ok()),
            retry_on_failure: non_empty_var("ELASTICSEARCH_RETRY_ON_FAILURE")
                .and_then(|v| RetryOnFailure::parse(&v))
                .unwrap_or_default(),
            debug: non_empty_var("ELASTICSEARCH_DEBUG")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        })
    }

    /// The configured request timeout, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.client_request_timeout
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// The region requests are signed for.
    pub fn region(&self) -> &str {
        self.aws_region
            .as_deref()
            .filter(|region| !region.is_empty())
            .unwrap_or(DEFAULT_AWS_REGION)
    }

    /// Static keys, only when both halves are present.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (
            self.aws_access_key.as_deref(),
            self.aws_secret_access_key.as_deref(),
        ) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some((key, secret))
            }
            _ => None,
        }
    }

    /// The role to assume, if configured.
    pub fn role_arn(&self) -> Option<&str> {
        self.aws_role_arn.as_deref().filter(|arn| !arn.is_empty())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retry_on_failure_counts() {
        assert_eq!(RetryOnFailure::Enabled(false).max_retries(), 0);
        assert_eq!(RetryOnFailure::Enabled(true).max_retries(), 3);
        assert_eq!(RetryOnFailure::Count(5).max_retries(), 5);
        assert_eq!(RetryOnFailure::default().max_retries(), 0);
    }

    #[test]
    fn test_retry_on_failure_parse() {
        assert_eq!(RetryOnFailure::parse("true"), Some(RetryOnFailure::Enabled(true)));
        assert_eq!(RetryOnFailure::parse("FALSE"), Some(RetryOnFailure::Enabled(false)));
        assert_eq!(RetryOnFailure::parse("7"), Some(RetryOnFailure::Count(7)));
        assert_eq!(RetryOnFailure::parse("often"), None);
    }

    #[test]
    fn test_deserialize_params() {
        let params: ClientParams = serde_json::from_value(json!({
            "url": "https://search.internal:9200",
            "aws": true,
            "aws_role_arn": "arn:aws:iam::123456789012:role/indexer",
            "client_request_timeout": 0,
            "retry_on_failure": true
        }))
        .unwrap();

        assert!(params.aws);
        assert_eq!(params.region(), "us-east-1");
        assert_eq!(params.role_arn(), Some("arn:aws:iam::123456789012:role/indexer"));
        assert_eq!(params.request_timeout(), None);
        assert_eq!(params.retry_on_failure.max_retries(), 3);
        assert!(!params.debug);

        let params: ClientParams = serde_json::from_value(json!({
            "url": "http://localhost:9200",
            "retry_on_failure": 2,
            "client_request_timeout": 30
        }))
        .unwrap();
        assert_eq!(params.retry_on_failure.max_retries(), 2);
        assert_eq!(params.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_static_credentials_need_both_halves() {
        let mut params = ClientParams::new("http://localhost:9200");
        params.aws_access_key = Some("AKIA123".to_string());
        assert_eq!(params.static_credentials(), None);

        params.aws_secret_access_key = Some(String::new());
        assert_eq!(params.static_credentials(), None);

        params.aws_secret_access_key = Some("secret".to_string());
        assert_eq!(params.static_credentials(), Some(("AKIA123", "secret")));
    }

    #[test]
    fn test_runtime_environment() {
        assert_eq!(RuntimeEnvironment::parse("development"), RuntimeEnvironment::Development);
        assert_eq!(RuntimeEnvironment::parse("test"), RuntimeEnvironment::Test);
        assert_eq!(RuntimeEnvironment::parse("staging"), RuntimeEnvironment::Production);
        assert!(!RuntimeEnvironment::Production.allows_debug());
        assert!(RuntimeEnvironment::Test.allows_debug());
    }
}
