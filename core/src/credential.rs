use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::constants::*;
use crate::time::{now, DateTime};
use crate::{Context, Result};

/// Credential that holds the access key and secret.
///
/// An immutable snapshot; providers may return a fresh one per call.
#[derive(Default, Clone)]
pub struct Credential {
    /// Access key id for the storage service.
    pub access_key_id: String,
    /// Access key secret for the storage service.
    pub access_key_secret: String,
    /// Security token issued for temporary credentials.
    pub security_token: Option<String>,
    /// Expiration time for this credential.
    pub expires_in: Option<DateTime>,
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &Redact(&self.access_key_id))
            .field("access_key_secret", &Redact(&self.access_key_secret))
            .field(
                "security_token",
                &Redact(self.security_token.as_deref().unwrap_or_default()),
            )
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl Credential {
    /// Check whether this credential can still be used for signing.
    pub fn is_valid(&self) -> bool {
        if self.access_key_id.is_empty() || self.access_key_secret.is_empty() {
            return false;
        }
        // Take 120s as buffer to avoid edge cases.
        if let Some(valid) = self
            .expires_in
            .map(|v| v > now() + chrono::TimeDelta::try_minutes(2).expect("in bounds"))
        {
            return valid;
        }

        true
    }
}

/// Redacts all but the first and last three characters of a secret so that
/// different values stay distinguishable in logs without leaking.
struct Redact<'a>(&'a str);

impl Debug for Redact<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let length = self.0.len();
        if length == 0 {
            f.write_str("EMPTY")
        } else if length < 12 {
            f.write_str("***")
        } else {
            f.write_str(&self.0[..3])?;
            f.write_str("***")?;
            f.write_str(&self.0[length - 3..])
        }
    }
}

/// ProvideCredential is the source of credentials for the executor.
///
/// Implementations may be asynchronous, for example an STS exchange over the
/// context's transport.
#[async_trait]
pub trait ProvideCredential: Debug + Send + Sync + 'static {
    /// Load a credential from this source.
    ///
    /// Returns `Ok(None)` when the source has nothing to offer, allowing the
    /// executor to surface a configuration error.
    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Credential>>;
}

/// StaticCredentialProvider provides a fixed credential.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    access_key_id: String,
    access_key_secret: String,
    security_token: Option<String>,
}

impl StaticCredentialProvider {
    /// Create a new StaticCredentialProvider with access key id and secret.
    pub fn new(access_key_id: &str, access_key_secret: &str) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            access_key_secret: access_key_secret.to_string(),
            security_token: None,
        }
    }

    /// Set the security token.
    pub fn with_security_token(mut self, token: &str) -> Self {
        self.security_token = Some(token.to_string());
        self
    }
}

#[async_trait]
impl ProvideCredential for StaticCredentialProvider {
    async fn provide_credential(&self, _: &Context) -> Result<Option<Credential>> {
        Ok(Some(Credential {
            access_key_id: self.access_key_id.clone(),
            access_key_secret: self.access_key_secret.clone(),
            security_token: self.security_token.clone(),
            expires_in: None,
        }))
    }
}

/// EnvCredentialProvider loads credentials from environment variables.
///
/// This provider looks for the following environment variables:
/// - `ALIBABA_CLOUD_ACCESS_KEY_ID`
/// - `ALIBABA_CLOUD_ACCESS_KEY_SECRET`
/// - `ALIBABA_CLOUD_SECURITY_TOKEN` (optional)
#[derive(Debug, Default)]
pub struct EnvCredentialProvider;

impl EnvCredentialProvider {
    /// Create a new EnvCredentialProvider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProvideCredential for EnvCredentialProvider {
    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Credential>> {
        let envs = ctx.env_vars();

        let access_key_id = envs.get(ALIBABA_CLOUD_ACCESS_KEY_ID);
        let access_key_secret = envs.get(ALIBABA_CLOUD_ACCESS_KEY_SECRET);

        match (access_key_id, access_key_secret) {
            (Some(ak), Some(sk)) => Ok(Some(Credential {
                access_key_id: ak.clone(),
                access_key_secret: sk.clone(),
                security_token: envs.get(ALIBABA_CLOUD_SECURITY_TOKEN).cloned(),
                expires_in: None,
            })),
            _ => Ok(None),
        }
    }
}

/// CredentialCache shares one resolved credential between concurrent calls.
///
/// Reads go through the shared lock without refreshing; a refresh takes the
/// write half and re-checks after acquiring it, so a burst of concurrent
/// calls triggers at most one load from the underlying provider.
#[derive(Debug, Clone)]
pub struct CredentialCache {
    provider: Arc<dyn ProvideCredential>,
    cached: Arc<RwLock<Option<Credential>>>,
}

impl CredentialCache {
    /// Wrap a provider with a shared cache.
    pub fn new(provider: impl ProvideCredential) -> Self {
        Self {
            provider: Arc::new(provider),
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// Return a valid credential, loading from the provider when the cached
    /// one is missing or no longer valid.
    pub async fn get(&self, ctx: &Context) -> Result<Option<Credential>> {
        {
            let guard = self.cached.read().await;
            if let Some(cred) = guard.as_ref() {
                if cred.is_valid() {
                    return Ok(Some(cred.clone()));
                }
            }
        }

        let mut guard = self.cached.write().await;
        // Another call may have refreshed while we waited for the write half.
        if let Some(cred) = guard.as_ref() {
            if cred.is_valid() {
                return Ok(Some(cred.clone()));
            }
        }

        let fresh = self.provider.provide_credential(ctx).await?;
        guard.clone_from(&fresh);
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::StaticEnv;

    #[tokio::test]
    async fn test_static_credential_provider() -> anyhow::Result<()> {
        let ctx = Context::new();

        let provider = StaticCredentialProvider::new("test_access_key", "test_secret_key")
            .with_security_token("test_security_token");
        let cred = provider.provide_credential(&ctx).await?.unwrap();
        assert_eq!(cred.access_key_id, "test_access_key");
        assert_eq!(cred.access_key_secret, "test_secret_key");
        assert_eq!(cred.security_token.as_deref(), Some("test_security_token"));
        assert!(cred.is_valid());

        Ok(())
    }

    #[tokio::test]
    async fn test_env_credential_provider() -> anyhow::Result<()> {
        let ctx = Context::new().with_env(StaticEnv {
            envs: HashMap::from_iter([
                (
                    ALIBABA_CLOUD_ACCESS_KEY_ID.to_string(),
                    "access_key_id".to_string(),
                ),
                (
                    ALIBABA_CLOUD_ACCESS_KEY_SECRET.to_string(),
                    "secret_access_key".to_string(),
                ),
            ]),
        });

        let cred = EnvCredentialProvider::new()
            .provide_credential(&ctx)
            .await?
            .unwrap();
        assert_eq!(cred.access_key_id, "access_key_id");
        assert_eq!(cred.access_key_secret, "secret_access_key");
        assert!(cred.security_token.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_env_credential_provider_missing() -> anyhow::Result<()> {
        let ctx = Context::new();

        let cred = EnvCredentialProvider::new().provide_credential(&ctx).await?;
        assert!(cred.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_expired_credential_is_invalid() {
        let cred = Credential {
            access_key_id: "ak".to_string(),
            access_key_secret: "sk".to_string(),
            security_token: None,
            expires_in: Some(now() - chrono::TimeDelta::try_minutes(1).unwrap()),
        };
        assert!(!cred.is_valid());
    }

    #[derive(Debug)]
    struct CountingProvider {
        loads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProvideCredential for CountingProvider {
        async fn provide_credential(&self, _: &Context) -> Result<Option<Credential>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Credential {
                access_key_id: "ak".to_string(),
                access_key_secret: "sk".to_string(),
                security_token: None,
                expires_in: None,
            }))
        }
    }

    #[tokio::test]
    async fn test_cache_loads_once() -> anyhow::Result<()> {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = CredentialCache::new(CountingProvider {
            loads: loads.clone(),
        });
        let ctx = Context::new();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let ctx = ctx.clone();
            tasks.push(tokio::spawn(async move { cache.get(&ctx).await }));
        }
        for task in tasks {
            assert!(task.await.unwrap()?.is_some());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cred = Credential {
            access_key_id: "AKIDEXAMPLEDONOTUSE".to_string(),
            access_key_secret: "super-secret-value".to_string(),
            security_token: None,
            expires_in: None,
        };
        let repr = format!("{cred:?}");
        assert!(!repr.contains("super-secret-value"));
        assert!(repr.contains("AKI***USE"));
    }
}
