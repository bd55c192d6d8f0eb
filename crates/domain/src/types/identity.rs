//! Long-lived credential identity
//!
//! An [`Identity`] is supplied once at startup and never mutated. Its
//! [`Fingerprint`] scopes on-disk cache entries so distinct credentials
//! sharing a cache directory never see each other's values.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::FINGERPRINT_HEX_LEN;
use crate::errors::{FleetLinkError, Result};

/// Short, non-secret identifier derived from issuer, subject and key id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive the fingerprint for a credential triple.
    ///
    /// Fields are NUL-separated before hashing so `("ab", "c")` and
    /// `("a", "bc")` never collide.
    #[must_use]
    pub fn derive(issuer: &str, subject: &str, key_id: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(issuer.as_bytes());
        hasher.update([0u8]);
        hasher.update(subject.as_bytes());
        hasher.update([0u8]);
        hasher.update(key_id.as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(digest[..FINGERPRINT_HEX_LEN].to_string())
    }

    /// Hex string form, safe for file names.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable identity material used to mint client assertions.
#[derive(Clone)]
pub struct Identity {
    issuer: String,
    subject: String,
    key_id: String,
    private_key_pem: String,
    scope: String,
    fingerprint: Fingerprint,
}

impl Identity {
    /// Build a validated identity.
    ///
    /// # Errors
    /// Returns `FleetLinkError::Config` when any field is blank. The private
    /// key is only checked for presence here; parsing happens when the first
    /// assertion is signed.
    pub fn new(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        key_id: impl Into<String>,
        private_key_pem: impl Into<String>,
        scope: impl Into<String>,
    ) -> Result<Self> {
        let issuer = issuer.into();
        let subject = subject.into();
        let key_id = key_id.into();
        let private_key_pem = private_key_pem.into();
        let scope = scope.into();

        for (name, value) in [
            ("issuer", &issuer),
            ("subject", &subject),
            ("key_id", &key_id),
            ("private_key", &private_key_pem),
            ("scope", &scope),
        ] {
            if value.trim().is_empty() {
                return Err(FleetLinkError::Config(format!("identity field '{name}' is empty")));
            }
        }

        let fingerprint = Fingerprint::derive(&issuer, &subject, &key_id);

        Ok(Self { issuer, subject, key_id, private_key_pem, scope, fingerprint })
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Subject claim; also sent as `client_id` to the token endpoint.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    #[must_use]
    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("issuer", &self.issuer)
            .field("subject", &self.subject)
            .field("key_id", &self.key_id)
            .field("private_key_pem", &"<redacted>")
            .field("scope", &self.scope)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}
