use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::sign::SigningVersion;
use crate::{Error, Result};

/// Static configuration of one executor.
///
/// Built once, shared read-only by every call. Endpoint and bucket combine
/// into the virtual-hosted authority `{bucket}.{endpoint}`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Service endpoint host, e.g. `oss-cn-hangzhou.aliyuncs.com`. A scheme
    /// prefix is accepted and split off; https is assumed otherwise.
    pub endpoint: String,
    /// Bucket the executor operates on.
    pub bucket: String,
    /// Region for the date-scoped signature.
    pub region: String,
    /// Which signature algorithm to place on requests.
    pub signing_version: SigningVersion,
    /// Retry classification and backoff.
    pub retry: RetryPolicy,
    /// Whether to compare the response checksum header against the locally
    /// computed value.
    pub verify_checksum: bool,
    /// Timeout applied to each individual attempt.
    pub attempt_timeout: Duration,
    /// Deadline over the whole call, all attempts and backoffs included.
    pub call_timeout: Option<Duration>,
}

impl Config {
    /// Create a config with default retry, checksum, and timeout settings.
    pub fn new(endpoint: &str, bucket: &str, region: &str, version: SigningVersion) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            bucket: bucket.to_string(),
            region: region.to_string(),
            signing_version: version,
            retry: RetryPolicy::default(),
            verify_checksum: true,
            attempt_timeout: Duration::from_secs(60),
            call_timeout: None,
        }
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Enable or disable response checksum verification.
    pub fn with_verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set the overall call deadline.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Reject configs that cannot possibly sign or address a request.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(Error::config_invalid("endpoint is not set"));
        }
        if self.bucket.is_empty() {
            return Err(Error::config_invalid("bucket is not set"));
        }
        if self.region.is_empty() {
            return Err(Error::config_invalid("region is not set"));
        }
        Ok(())
    }

    /// Split the endpoint into `(scheme, host)`, defaulting to https.
    pub(crate) fn scheme_and_host(&self) -> (&str, &str) {
        match self.endpoint.split_once("://") {
            Some((scheme, host)) => (scheme, host),
            None => ("https", self.endpoint.as_str()),
        }
    }

    /// The virtual-hosted authority requests are addressed to.
    pub(crate) fn authority(&self) -> String {
        let (_, host) = self.scheme_and_host();
        format!("{}.{}", self.bucket, host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new(
            "oss-cn-hangzhou.aliyuncs.com",
            "bucket",
            "cn-hangzhou",
            SigningVersion::V4,
        );
        assert!(config.verify_checksum);
        assert!(config.call_timeout.is_none());
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scheme_split() {
        let config = Config::new(
            "http://localhost:9000",
            "bucket",
            "cn-hangzhou",
            SigningVersion::V1,
        );
        assert_eq!(config.scheme_and_host(), ("http", "localhost:9000"));
        assert_eq!(config.authority(), "bucket.localhost:9000");

        let config = Config::new(
            "oss-cn-hangzhou.aliyuncs.com",
            "bucket",
            "cn-hangzhou",
            SigningVersion::V4,
        );
        assert_eq!(
            config.scheme_and_host(),
            ("https", "oss-cn-hangzhou.aliyuncs.com")
        );
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let config = Config::new("", "bucket", "cn-hangzhou", SigningVersion::V4);
        assert!(config.validate().is_err());

        let config = Config::new("endpoint", "", "cn-hangzhou", SigningVersion::V4);
        assert!(config.validate().is_err());
    }
}
