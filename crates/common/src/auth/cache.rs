//! File-backed assertion and token cache
//!
//! Each credential fingerprint owns two JSON documents in the cache
//! directory: `assertion-<fp>.json` and `token-<fp>.json`. Documents carry
//! the fingerprint-defining identity fields so a foreign or tampered file is
//! detected on load.
//!
//! The cache is an optimisation. Every failure degrades to a miss on load
//! and to a logged warning on save; the in-memory value held by the token
//! manager stays authoritative.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fleetlink_domain::constants::{ASSERTION_CACHE_PREFIX, TOKEN_CACHE_PREFIX};
use fleetlink_domain::{Fingerprint, Identity};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::traits::CredentialCacheTrait;
use super::types::{AccessToken, SignedAssertion};
use crate::observability::TransportLog;

/// Internal cache failures. Logged, never propagated past this module.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache entry could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A value that can live in the credential cache.
pub trait CachedCredential: Serialize + DeserializeOwned + Send + Sync {
    /// File name prefix.
    const KIND: &'static str;

    fn fingerprint(&self) -> &Fingerprint;

    /// Whether the value may still be reused at `now`.
    fn is_usable_at(&self, now: DateTime<Utc>, refresh_buffer: Duration) -> bool;
}

impl CachedCredential for SignedAssertion {
    const KIND: &'static str = ASSERTION_CACHE_PREFIX;

    fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    fn is_usable_at(&self, now: DateTime<Utc>, refresh_buffer: Duration) -> bool {
        self.is_fresh_at(now, refresh_buffer)
    }
}

impl CachedCredential for AccessToken {
    const KIND: &'static str = TOKEN_CACHE_PREFIX;

    fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    // Token expiry is stored buffer-adjusted.
    fn is_usable_at(&self, now: DateTime<Utc>, _refresh_buffer: Duration) -> bool {
        self.is_fresh_at(now)
    }
}

/// On-disk document.
#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument<T> {
    fingerprint: Fingerprint,
    issuer: String,
    subject: String,
    key_id: String,
    saved_at: DateTime<Utc>,
    value: T,
}

impl<T: CachedCredential> CacheDocument<T> {
    fn belongs_to(&self, identity: &Identity) -> bool {
        &self.fingerprint == identity.fingerprint()
            && self.value.fingerprint() == identity.fingerprint()
            && self.issuer == identity.issuer()
            && self.subject == identity.subject()
            && self.key_id == identity.key_id()
    }
}

/// Cache rooted at a per-user directory.
#[derive(Debug, Clone)]
pub struct FileCredentialCache {
    dir: PathBuf,
    refresh_buffer: Duration,
    log: TransportLog,
}

impl FileCredentialCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, refresh_buffer: Duration) -> Self {
        Self { dir: dir.into(), refresh_buffer, log: TransportLog::disabled() }
    }

    #[must_use]
    pub fn with_logger(mut self, log: TransportLog) -> Self {
        self.log = log;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the document for `kind` under `fingerprint`.
    #[must_use]
    pub fn entry_path(&self, kind: &str, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{kind}-{fingerprint}.json"))
    }

    /// Load a value, returning `None` for anything that should not be
    /// trusted.
    pub async fn load<T: CachedCredential>(&self, identity: &Identity) -> Option<T> {
        let path = self.entry_path(T::KIND, identity.fingerprint());

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(kind = T::KIND, path = %path.display(), "credential_cache.miss");
                return None;
            }
            Err(err) => {
                warn!(kind = T::KIND, path = %path.display(), error = %err, "credential_cache.read_failed");
                return None;
            }
        };

        let document: CacheDocument<T> = match serde_json::from_slice(&bytes) {
            Ok(document) => document,
            Err(err) => {
                warn!(kind = T::KIND, path = %path.display(), error = %err, "credential_cache.corrupt");
                return None;
            }
        };

        if !document.belongs_to(identity) {
            warn!(
                kind = T::KIND,
                path = %path.display(),
                expected = %identity.fingerprint(),
                found = %document.fingerprint,
                "credential_cache.fingerprint_mismatch"
            );
            self.remove_file(&path).await;
            return None;
        }

        if !document.value.is_usable_at(Utc::now(), self.refresh_buffer) {
            debug!(kind = T::KIND, path = %path.display(), "credential_cache.expired");
            self.remove_file(&path).await;
            return None;
        }

        debug!(kind = T::KIND, fingerprint = %identity.fingerprint(), "credential_cache.hit");
        Some(document.value)
    }

    /// Persist a value with owner-only permissions.
    ///
    /// # Errors
    /// Returns [`CacheError`] when the directory or file cannot be written.
    /// Callers on the hot path go through [`CredentialCacheTrait`], which
    /// logs and swallows these.
    pub async fn store<T: CachedCredential>(
        &self,
        identity: &Identity,
        value: &T,
    ) -> Result<PathBuf, CacheError> {
        let document = CacheDocument {
            fingerprint: identity.fingerprint().clone(),
            issuer: identity.issuer().to_string(),
            subject: identity.subject().to_string(),
            key_id: identity.key_id().to_string(),
            saved_at: Utc::now(),
            value,
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        self.ensure_dir().await?;

        let path = self.entry_path(T::KIND, identity.fingerprint());
        let tmp = self.dir.join(format!(
            ".{}-{}.{}.tmp",
            T::KIND,
            identity.fingerprint(),
            uuid::Uuid::new_v4().simple()
        ));

        if let Err(err) = write_private(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err);
        }

        // rename is atomic on the same filesystem, so readers never observe
        // a half-written document.
        if let Err(source) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::Io { path, source });
        }

        Ok(path)
    }

    async fn save<T: CachedCredential>(&self, identity: &Identity, value: &T) {
        match self.store(identity, value).await {
            Ok(path) => {
                debug!(kind = T::KIND, path = %path.display(), "credential_cache.saved");
            }
            Err(err) => {
                warn!(kind = T::KIND, error = %err, "credential_cache.save_failed");
                self.log.auth_event(
                    "credential cache write failed",
                    &[("kind", T::KIND.to_string()), ("error", err.to_string())],
                );
            }
        }
    }

    async fn ensure_dir(&self) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CacheError::Io { path: self.dir.clone(), source })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            // Best effort: the directory may be shared or owned by someone else.
            if let Err(err) =
                tokio::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(0o700)).await
            {
                debug!(path = %self.dir.display(), error = %err, "credential_cache.chmod_dir_failed");
            }
        }

        Ok(())
    }

    async fn remove_file(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "credential_cache.removed"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "credential_cache.remove_failed");
            }
        }
    }
}

async fn write_private(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let io_err = |source| CacheError::Io { path: path.to_path_buf(), source };

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await.map_err(io_err)?;
    file.write_all(bytes).await.map_err(io_err)?;
    file.flush().await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    Ok(())
}

#[async_trait]
impl CredentialCacheTrait for FileCredentialCache {
    async fn load_assertion(&self, identity: &Identity) -> Option<SignedAssertion> {
        self.load(identity).await
    }

    async fn save_assertion(&self, identity: &Identity, assertion: &SignedAssertion) {
        self.save(identity, assertion).await;
    }

    async fn load_token(&self, identity: &Identity) -> Option<AccessToken> {
        self.load(identity).await
    }

    async fn save_token(&self, identity: &Identity, token: &AccessToken) {
        self.save(identity, token).await;
    }

    async fn remove_token(&self, identity: &Identity) {
        let path = self.entry_path(TOKEN_CACHE_PREFIX, identity.fingerprint());
        self.remove_file(&path).await;
    }
}

/// Cache that never stores anything, for `cache_enabled = false`.
#[derive(Debug, Clone, Default)]
pub struct DisabledCredentialCache;

#[async_trait]
impl CredentialCacheTrait for DisabledCredentialCache {
    async fn load_assertion(&self, _identity: &Identity) -> Option<SignedAssertion> {
        None
    }

    async fn save_assertion(&self, _identity: &Identity, _assertion: &SignedAssertion) {}

    async fn load_token(&self, _identity: &Identity) -> Option<AccessToken> {
        None
    }

    async fn save_token(&self, _identity: &Identity, _token: &AccessToken) {}

    async fn remove_token(&self, _identity: &Identity) {}
}
