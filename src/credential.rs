//! Provider token generation for token-based authentication.
//!
//! The gateway accepts a JWT signed with ES256 (P-256 ECDSA over SHA-256)
//! whose header names the key id and whose claims carry the team id and the
//! issue time:
//!
//! ```text
//! base64url({"alg":"ES256","kid":KEY_ID}) . base64url({"iss":TEAM_ID,"iat":NOW}) . base64url(r || s)
//! ```
//!
//! Tokens are cached and reused until they age past
//! [`PROVIDER_TOKEN_LIFETIME`] or are explicitly marked expired (the gateway
//! answered `ExpiredProviderToken`). The cache sits behind a mutex so
//! concurrent callers never regenerate the same token twice.

// Rust guideline compliant 2026-02

use std::sync::{Mutex, MutexGuard};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use serde::Serialize;

use crate::constants::PROVIDER_TOKEN_LIFETIME;
use crate::error::CredentialError;

/// A signed provider token and the time it was issued.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Compact JWT.
    pub token: String,
    /// Issue time (seconds since the Unix epoch), as carried in `iat`.
    pub issued_at: i64,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("issued_at", &self.issued_at)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct JwtHeader<'a> {
    alg: &'static str,
    kid: &'a str,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    iat: i64,
}

#[derive(Default)]
struct CacheState {
    current: Option<Credential>,
    expired: bool,
}

/// Produces and caches provider tokens for one signing key.
pub struct CredentialProvider {
    team_id: String,
    key_id: String,
    signing_key: SigningKey,
    cache: Mutex<CacheState>,
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("team_id", &self.team_id)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl CredentialProvider {
    /// Create a provider from an already-parsed signing key.
    pub fn new(
        team_id: impl Into<String>,
        key_id: impl Into<String>,
        signing_key: SigningKey,
    ) -> Self {
        Self {
            team_id: team_id.into(),
            key_id: key_id.into(),
            signing_key,
            cache: Mutex::new(CacheState::default()),
        }
    }

    /// Create a provider from the PKCS#8 PEM contents of a `.p8` key.
    pub fn from_pkcs8_pem(
        team_id: impl Into<String>,
        key_id: impl Into<String>,
        pem: &str,
    ) -> Result<Self, CredentialError> {
        let signing_key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
        Ok(Self::new(team_id, key_id, signing_key))
    }

    /// Key identifier placed in the token header.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Team identifier placed in the `iss` claim.
    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    /// Current credential, regenerating it if missing or expired.
    pub fn get_credential(&self) -> Result<Credential, CredentialError> {
        self.get_credential_at(chrono::Utc::now().timestamp())
    }

    /// Current credential as of `now` (seconds since the Unix epoch).
    pub fn get_credential_at(&self, now: i64) -> Result<Credential, CredentialError> {
        let mut cache = self.lock_cache();

        if let Some(current) = &cache.current {
            let lifetime = i64::try_from(PROVIDER_TOKEN_LIFETIME.as_secs()).unwrap_or(i64::MAX);
            if !cache.expired && now.saturating_sub(current.issued_at) < lifetime {
                return Ok(current.clone());
            }
        }

        let credential = self.sign(now)?;
        log::info!(
            "[Credential] Issued provider token for key {} (iat={})",
            self.key_id,
            now
        );
        cache.current = Some(credential.clone());
        cache.expired = false;
        Ok(credential)
    }

    /// Force regeneration on the next [`get_credential`](Self::get_credential).
    pub fn mark_expired(&self) {
        self.lock_cache().expired = true;
    }

    /// Whether the cached credential has been marked expired.
    pub fn is_expired(&self) -> bool {
        self.lock_cache().expired
    }

    fn sign(&self, now: i64) -> Result<Credential, CredentialError> {
        let header = serde_json::to_vec(&JwtHeader {
            alg: "ES256",
            kid: &self.key_id,
        })
        .map_err(|e| CredentialError::Signing(e.to_string()))?;
        let claims = serde_json::to_vec(&JwtClaims {
            iss: &self.team_id,
            iat: now,
        })
        .map_err(|e| CredentialError::Signing(e.to_string()))?;

        let signing_input = format!("{}.{}", BASE64URL.encode(header), BASE64URL.encode(claims));
        let signature: Signature = self
            .signing_key
            .try_sign(signing_input.as_bytes())
            .map_err(|e| CredentialError::Signing(e.to_string()))?;

        Ok(Credential {
            token: format!(
                "{signing_input}.{}",
                BASE64URL.encode(signature.to_bytes().as_slice())
            ),
            issued_at: now,
        })
    }

    fn lock_cache(&self) -> MutexGuard<'_, CacheState> {
        // The cache holds plain data; a panic mid-update leaves it usable.
        self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
