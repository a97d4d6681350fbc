//! API Key generation and validation

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use hmac::{Hmac, Mac};
use messmarkt_shared::types::Scope;
use messmarkt_shared::MarketplaceStore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

type HmacSha256 = Hmac<Sha256>;

const API_KEY_PREFIX: &str = "mm_";
const API_KEY_VERSION: &str = "01";

/// version(2) + uuid(32) + random(32)
const PAYLOAD_LEN: usize = 66;
/// payload + truncated signature(16)
const KEY_BODY_LEN: usize = PAYLOAD_LEN + 16;

/// API Key manager for generation and validation
#[derive(Clone)]
pub struct ApiKeyManager {
    hmac_secret: Vec<u8>,
}

impl ApiKeyManager {
    /// Create a new API key manager
    pub fn new(secret: &str) -> Self {
        Self {
            hmac_secret: secret.as_bytes().to_vec(),
        }
    }

    /// Generate a new API key
    /// Returns (full_key, key_hash, key_prefix)
    pub fn generate_key(&self) -> Result<(String, String, String), ApiKeyError> {
        let key_id = Uuid::new_v4();
        let random_bytes: [u8; 16] = rand::random();
        let random_hex = hex::encode(random_bytes);

        // Key payload: version + uuid + random
        let payload = format!("{}{}{}", API_KEY_VERSION, key_id.simple(), random_hex);
        let sig_hex = self.signature(&payload)?;

        let full_key = format!("{}{}{}", API_KEY_PREFIX, payload, sig_hex);
        let key_hash = self.hash_key(&full_key);

        // Prefix for display (first 12 chars after prefix)
        let key_prefix = format!("{}{}...", API_KEY_PREFIX, &payload[..12]);

        Ok((full_key, key_hash, key_prefix))
    }

    /// Validate an API key format and signature
    pub fn validate_key(&self, key: &str) -> Result<bool, ApiKeyError> {
        let Some(key_body) = key.strip_prefix(API_KEY_PREFIX) else {
            return Ok(false);
        };
        if key_body.len() != KEY_BODY_LEN || !key_body.is_ascii() {
            return Ok(false);
        }

        let (payload, provided_sig) = key_body.split_at(PAYLOAD_LEN);
        let expected_sig = self.signature(payload)?;

        Ok(constant_time_compare(provided_sig, &expected_sig))
    }

    /// Hash an API key for storage
    pub fn hash_key(&self, key: &str) -> String {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// First 8 bytes of the HMAC, hex encoded
    fn signature(&self, payload: &str) -> Result<String, ApiKeyError> {
        let mut mac = HmacSha256::new_from_slice(&self.hmac_secret)
            .map_err(|_| ApiKeyError::HmacInitFailed)?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();
        Ok(hex::encode(&signature[..8]))
    }
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        let dummy = vec![0u8; a.len()];
        let _ = a.as_bytes().ct_eq(&dummy);
        return false;
    }

    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[derive(Debug, thiserror::Error)]
pub enum ApiKeyError {
    #[error("HMAC initialization failed")]
    HmacInitFailed,
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Caller identified by a valid API key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPrincipal {
    pub key_id: Uuid,
    pub account_id: Uuid,
    pub scopes: Vec<Scope>,
    pub created_by: Option<Uuid>,
}

impl ApiPrincipal {
    pub fn has_scope(&self, required: Scope) -> bool {
        has_scope(&self.scopes, required)
    }
}

pub fn has_scope(scopes: &[Scope], required: Scope) -> bool {
    scopes.contains(&required)
}

/// Resolves bearer tokens to stored keys. Validity is checked on every call.
#[derive(Clone)]
pub struct ApiKeyAuthenticator {
    manager: ApiKeyManager,
    store: Arc<dyn MarketplaceStore>,
}

impl ApiKeyAuthenticator {
    pub fn new(manager: ApiKeyManager, store: Arc<dyn MarketplaceStore>) -> Self {
        Self { manager, store }
    }

    pub async fn verify_api_key(&self, headers: &HeaderMap) -> ApiResult<ApiPrincipal> {
        let token = bearer_token(headers).ok_or_else(|| {
            tracing::debug!("Missing or malformed bearer token");
            ApiError::Unauthorized
        })?;

        let well_formed = self.manager.validate_key(token).map_err(|e| {
            tracing::error!(error = %e, "API key validation failed");
            ApiError::Internal
        })?;
        if !well_formed {
            tracing::debug!("API key failed format check");
            return Err(ApiError::Unauthorized);
        }

        let key_hash = self.manager.hash_key(token);
        let record = self
            .store
            .find_api_key_by_hash(&key_hash)
            .await?
            .ok_or_else(|| {
                tracing::warn!("Unknown API key presented");
                ApiError::Unauthorized
            })?;

        if !record.is_usable_at(OffsetDateTime::now_utc()) {
            tracing::warn!(key_id = %record.id, "Revoked or expired API key presented");
            return Err(ApiError::Unauthorized);
        }

        let scopes = record
            .scopes
            .iter()
            .filter_map(|raw| match raw.parse::<Scope>() {
                Ok(scope) => Some(scope),
                Err(_) => {
                    tracing::warn!(key_id = %record.id, scope = %raw, "Ignoring unknown API key scope");
                    None
                }
            })
            .collect();

        // Fire-and-forget; a failed touch never fails the request
        let store = Arc::clone(&self.store);
        let key_id = record.id;
        tokio::spawn(async move {
            if let Err(e) = store.touch_api_key(key_id).await {
                tracing::warn!(key_id = %key_id, error = %e, "Failed to update API key last_used_at");
            }
        });

        Ok(ApiPrincipal {
            key_id: record.id,
            account_id: record.account_id,
            scopes,
            created_by: record.created_by,
        })
    }
}
