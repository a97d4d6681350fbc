//! Stripe webhook signature verification
//!
//! The `stripe-signature` header has the form `t=<unix>,v1=<hex>[,v1=<hex>...]`.
//! The signed payload is `"{t}.{body}"`, HMAC-SHA256 with the endpoint secret.
//! Event processing belongs to the billing provider integration; only the
//! verified envelope is parsed here.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use time::OffsetDateTime;

use crate::error::{BillingError, BillingResult};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Default tolerance between the signed timestamp and now
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Minimal view of a Stripe event
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub livemode: bool,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.secret.is_empty()
    }

    /// Verify the header against the raw body and parse the event
    pub fn verify(&self, payload: &str, header: &str) -> BillingResult<WebhookEvent> {
        self.verify_at(payload, header, OffsetDateTime::now_utc().unix_timestamp())
    }

    pub fn verify_at(&self, payload: &str, header: &str, now: i64) -> BillingResult<WebhookEvent> {
        if !self.is_configured() {
            return Err(BillingError::Config(
                "STRIPE_WEBHOOK_SECRET is not set".to_string(),
            ));
        }

        let mut timestamp: Option<i64> = None;
        let mut signatures: Vec<Vec<u8>> = Vec::new();
        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => timestamp = value.parse().ok(),
                // Malformed hex is skipped, another v1 entry may still match
                "v1" => {
                    if let Ok(bytes) = hex::decode(value) {
                        signatures.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(BillingError::WebhookSignatureInvalid)?;
        if signatures.is_empty() {
            return Err(BillingError::WebhookSignatureInvalid);
        }

        let matched = signatures.iter().any(|signature| {
            self.mac_for(timestamp, payload)
                .map(|mac| mac.verify_slice(signature).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            return Err(BillingError::WebhookSignatureInvalid);
        }

        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(BillingError::WebhookTimestampOutOfTolerance);
        }

        serde_json::from_str(payload).map_err(|e| BillingError::WebhookPayload(e.to_string()))
    }

    /// Produce a header value for `payload` (used by tests and local tooling)
    pub fn sign(&self, payload: &str, timestamp: i64) -> BillingResult<String> {
        let mac = self.mac_for(timestamp, payload)?;
        Ok(format!(
            "t={},v1={}",
            timestamp,
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    fn mac_for(&self, timestamp: i64, payload: &str) -> BillingResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| BillingError::Config(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret_for_messmarkt_webhooks";
    const PAYLOAD: &str = r#"{"id":"evt_123","type":"customer.subscription.updated","created":1700000000,"livemode":false,"data":{"object":{}}}"#;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SECRET, DEFAULT_TOLERANCE_SECS)
    }

    #[test]
    fn test_valid_signature() {
        let now = 1_700_000_000;
        let header = verifier().sign(PAYLOAD, now).unwrap();
        let event = verifier().verify_at(PAYLOAD, &header, now + 10).unwrap();
        assert_eq!(event.id, "evt_123");
        assert_eq!(event.event_type, "customer.subscription.updated");
    }

    #[test]
    fn test_tampered_body_rejected() {
        let now = 1_700_000_000;
        let header = verifier().sign(PAYLOAD, now).unwrap();
        let tampered = PAYLOAD.replace("evt_123", "evt_999");
        assert!(matches!(
            verifier().verify_at(&tampered, &header, now),
            Err(BillingError::WebhookSignatureInvalid)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = 1_700_000_000;
        let header = WebhookVerifier::new("whsec_other_secret", 300)
            .sign(PAYLOAD, now)
            .unwrap();
        assert!(verifier().verify_at(PAYLOAD, &header, now).is_err());
    }

    #[test]
    fn test_any_v1_may_match() {
        let now = 1_700_000_000;
        let good = verifier().sign(PAYLOAD, now).unwrap();
        let good_sig = good.split_once(",v1=").unwrap().1;
        let header = format!("t={},v1={},v1={}", now, "00".repeat(32), good_sig);
        assert!(verifier().verify_at(PAYLOAD, &header, now).is_ok());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let signed_at = 1_700_000_000;
        let header = verifier().sign(PAYLOAD, signed_at).unwrap();
        assert!(matches!(
            verifier().verify_at(PAYLOAD, &header, signed_at + 301),
            Err(BillingError::WebhookTimestampOutOfTolerance)
        ));
    }

    #[test]
    fn test_malformed_header_rejected() {
        for header in ["", "garbage", "t=abc,v1=00", "t=1700000000", "v1=zz"] {
            assert!(
                verifier().verify_at(PAYLOAD, header, 1_700_000_000).is_err(),
                "{header}"
            );
        }
    }

    #[test]
    fn test_unconfigured_secret() {
        let verifier = WebhookVerifier::new("", 300);
        assert!(!verifier.is_configured());
        assert!(matches!(
            verifier.verify_at(PAYLOAD, "t=1,v1=00", 1),
            Err(BillingError::Config(_))
        ));
    }
}
