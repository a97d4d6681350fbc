//! Session token verification
//!
//! In-app calls carry an HS256 JWT issued by the identity provider
//! (Supabase). Only verification happens here; issuing tokens is the
//! provider's job.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audience Supabase puts on user tokens
const SESSION_AUDIENCE: &str = "authenticated";

/// JWT claims structure for Supabase-issued tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseClaims {
    /// Subject (profile ID as string, parsed to UUID)
    pub sub: String,
    pub email: Option<String>,
    /// Role (authenticated, anon, etc.)
    pub role: Option<String>,
    pub aud: Option<String>,
    pub iat: Option<i64>,
    pub exp: i64,
}

#[derive(Clone)]
pub struct SessionVerifier {
    decoding_key: Option<DecodingKey>,
}

impl SessionVerifier {
    /// An empty secret disables session verification
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: if secret.is_empty() {
                None
            } else {
                Some(DecodingKey::from_secret(secret.as_bytes()))
            },
        }
    }

    pub fn is_configured(&self) -> bool {
        self.decoding_key.is_some()
    }

    /// Validate a session token and return the profile ID it names
    pub fn verify(&self, token: &str) -> Result<Uuid, SessionError> {
        let decoding_key = self.decoding_key.as_ref().ok_or(SessionError::NotConfigured)?;

        // Explicit algorithm prevents algorithm confusion attacks
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 60; // 60 second clock skew tolerance
        validation.set_audience(&[SESSION_AUDIENCE]);

        let claims = decode::<SupabaseClaims>(token, decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    tracing::warn!("Session JWT audience validation failed, rejecting token");
                    SessionError::Invalid
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken
                | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm
                | jsonwebtoken::errors::ErrorKind::InvalidSignature => SessionError::Invalid,
                _ => SessionError::Validation(e.to_string()),
            })?;

        Uuid::parse_str(&claims.sub).map_err(|_| SessionError::Invalid)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session verification is not configured")]
    NotConfigured,
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Token validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    pub(crate) const SECRET: &str = "test-supabase-jwt-secret-32-chars!!";

    pub(crate) fn token(secret: &str, sub: &str, aud: &str, exp_offset: i64) -> String {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = SupabaseClaims {
            sub: sub.to_string(),
            email: Some("einkauf@example.com".to_string()),
            role: Some("authenticated".to_string()),
            aud: Some(aud.to_string()),
            iat: Some(now),
            exp: now + exp_offset,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_session_token() {
        let profile_id = Uuid::new_v4();
        let verifier = SessionVerifier::new(SECRET);
        let jwt = token(SECRET, &profile_id.to_string(), "authenticated", 3600);
        assert_eq!(verifier.verify(&jwt).unwrap(), profile_id);
    }

    #[test]
    fn test_rejects_bad_tokens() {
        let verifier = SessionVerifier::new(SECRET);
        let sub = Uuid::new_v4().to_string();

        let wrong_aud = token(SECRET, &sub, "anon", 3600);
        assert!(matches!(verifier.verify(&wrong_aud), Err(SessionError::Invalid)));

        let expired = token(SECRET, &sub, "authenticated", -3600);
        assert!(matches!(verifier.verify(&expired), Err(SessionError::Expired)));

        let forged = token("another-secret-entirely-32-chars!!", &sub, "authenticated", 3600);
        assert!(verifier.verify(&forged).is_err());

        let not_uuid = token(SECRET, "user-42", "authenticated", 3600);
        assert!(matches!(verifier.verify(&not_uuid), Err(SessionError::Invalid)));
    }

    #[test]
    fn test_unconfigured() {
        let verifier = SessionVerifier::new("");
        assert!(!verifier.is_configured());
        assert!(matches!(verifier.verify("x"), Err(SessionError::NotConfigured)));
    }
}
