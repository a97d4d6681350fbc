//! Payment provider webhooks

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use messmarkt_billing::{BillingError, SIGNATURE_HEADER};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /api/stripe/webhook
///
/// Verifies the signature and acknowledges the event. Subscription state is
/// synchronised by the billing provider integration, not here.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    tracing::info!(body_len = body.len(), "Stripe webhook received");

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Stripe webhook missing signature header");
            ApiError::Validation("Missing Stripe signature".to_string())
        })?;

    let payload = std::str::from_utf8(&body).map_err(|_| {
        tracing::warn!("Stripe webhook body is not valid UTF-8");
        ApiError::Validation("Webhook body must be UTF-8".to_string())
    })?;

    let event = state.webhooks.verify(payload, signature).map_err(|e| match e {
        BillingError::Config(_) => {
            tracing::error!(error = %e, "Stripe webhook secret not configured");
            ApiError::Internal
        }
        other => {
            tracing::warn!(error = %other, "Stripe webhook verification failed");
            ApiError::Validation("Invalid webhook signature".to_string())
        }
    })?;

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        livemode = event.livemode,
        "Stripe webhook event verified"
    );

    Ok(Json(json!({ "received": true })))
}
