//! Client assertion signing
//!
//! Builds the ES256 JWT exchanged at the token endpoint. Signing failures
//! are configuration problems and are never retried.

use chrono::{DateTime, Duration, Utc};
use fleetlink_domain::constants::{ASSERTION_LIFETIME_SECS, DEFAULT_ASSERTION_AUDIENCE};
use fleetlink_domain::Identity;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::types::SignedAssertion;

/// Claim set of a client assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Errors raised while producing a client assertion.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invalid private key for key id '{key_id}': {source}")]
    InvalidKey {
        key_id: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    #[error("failed to sign assertion for key id '{key_id}': {source}")]
    Sign {
        key_id: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
}

/// Mints client assertions for an [`Identity`].
#[derive(Debug, Clone)]
pub struct AssertionSigner {
    audience: String,
    lifetime: Duration,
}

impl Default for AssertionSigner {
    fn default() -> Self {
        Self::new(DEFAULT_ASSERTION_AUDIENCE, Duration::seconds(ASSERTION_LIFETIME_SECS))
    }
}

impl AssertionSigner {
    #[must_use]
    pub fn new(audience: impl Into<String>, lifetime: Duration) -> Self {
        Self { audience: audience.into(), lifetime }
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign a fresh assertion valid from now for the configured lifetime.
    ///
    /// # Errors
    /// Returns [`SigningError::InvalidKey`] when the PEM cannot be parsed as
    /// a P-256 PKCS#8 key, [`SigningError::Sign`] for any other failure.
    pub fn sign(&self, identity: &Identity) -> Result<SignedAssertion, SigningError> {
        self.sign_at(identity, Utc::now())
    }

    /// Sign with an explicit issue time (whole seconds).
    ///
    /// # Errors
    /// See [`AssertionSigner::sign`].
    pub fn sign_at(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<SignedAssertion, SigningError> {
        let key_id = identity.key_id().to_string();

        let key = EncodingKey::from_ec_pem(identity.private_key_pem().as_bytes())
            .map_err(|source| SigningError::InvalidKey { key_id: key_id.clone(), source })?;

        let iat = now.timestamp();
        let exp = iat + self.lifetime.num_seconds();
        let claims = AssertionClaims {
            iss: identity.issuer().to_string(),
            sub: identity.subject().to_string(),
            aud: self.audience.clone(),
            iat,
            exp,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(key_id.clone());

        let token = encode(&header, &claims, &key).map_err(|source| {
            if matches!(source.kind(), ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat) {
                SigningError::InvalidKey { key_id: key_id.clone(), source }
            } else {
                SigningError::Sign { key_id: key_id.clone(), source }
            }
        })?;

        let issued_at = DateTime::from_timestamp(iat, 0).unwrap_or(now);
        let expires_at = DateTime::from_timestamp(exp, 0).unwrap_or(now + self.lifetime);

        debug!(
            fingerprint = %identity.fingerprint(),
            key_id = %key_id,
            expires_at = %expires_at,
            "assertion_signer.signed"
        );

        Ok(SignedAssertion {
            token,
            issued_at,
            expires_at,
            fingerprint: identity.fingerprint().clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};

    use super::*;
    use crate::testing::fixtures::{test_identity, TEST_EC_PUBLIC_KEY_PEM};

    fn decode_claims(token: &str, audience: &str) -> AssertionClaims {
        let key = DecodingKey::from_ec_pem(TEST_EC_PUBLIC_KEY_PEM.as_bytes()).unwrap();
        let mut validation = Validation::new(Algorithm::ES256);
        validation.set_audience(&[audience]);
        decode::<AssertionClaims>(token, &key, &validation).unwrap().claims
    }

    #[test]
    fn signed_assertion_decodes_to_identity_claims() {
        let identity = test_identity();
        let signer = AssertionSigner::default();

        let assertion = signer.sign(&identity).expect("signing should succeed");
        let claims = decode_claims(&assertion.token, DEFAULT_ASSERTION_AUDIENCE);
        let header = decode_header(&assertion.token).unwrap();

        assert_eq!(header.alg, Algorithm::ES256);
        assert_eq!(header.kid.as_deref(), Some(identity.key_id()));
        assert_eq!(claims.iss, identity.issuer());
        assert_eq!(claims.sub, identity.subject());
        assert_eq!(claims.exp, claims.iat + ASSERTION_LIFETIME_SECS);
        assert_eq!(assertion.expires_at.timestamp(), claims.exp);
        assert_eq!(&assertion.fingerprint, identity.fingerprint());
    }

    #[test]
    fn every_assertion_gets_a_fresh_v4_jti() {
        let identity = test_identity();
        let signer = AssertionSigner::new("https://idp.test/token", Duration::hours(1));

        let a = decode_claims(&signer.sign(&identity).unwrap().token, "https://idp.test/token");
        let b = decode_claims(&signer.sign(&identity).unwrap().token, "https://idp.test/token");

        assert_ne!(a.jti, b.jti);
        let parsed = uuid::Uuid::parse_str(&a.jti).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(a.exp - a.iat, 3600);
    }

    #[test]
    fn malformed_key_is_invalid_key_error() {
        let identity = Identity::new("team", "client", "kid-9", "not a pem", "business.api")
            .expect("identity fields are present");

        let err = AssertionSigner::default().sign(&identity).unwrap_err();

        assert!(matches!(err, SigningError::InvalidKey { ref key_id, .. } if key_id == "kid-9"));
        assert!(err.to_string().contains("kid-9"));
    }
}
