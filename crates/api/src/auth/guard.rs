//! Request pipeline for the public API
//!
//! Fixed order: authenticate (401), scope (403), account entitlement (403),
//! rate limit (429). Handlers only run once every stage has passed.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use messmarkt_billing::{Denial, EvaluationContext, Feature, RateLimitDecision};
use messmarkt_shared::types::Scope;
use serde::Serialize;

use super::api_key::ApiPrincipal;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const RATE_LIMIT_LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const RATE_LIMIT_REMAINING_HEADER: HeaderName =
    HeaderName::from_static("x-ratelimit-remaining");

/// A request that passed the pipeline
#[derive(Debug)]
pub struct ApiCall {
    pub principal: ApiPrincipal,
    pub context: EvaluationContext,
    pub rate: RateLimitDecision,
}

impl ApiCall {
    pub fn account_id(&self) -> uuid::Uuid {
        self.principal.account_id
    }

    /// Success envelope with the rate-limit headers attached
    pub fn respond<D: Serialize, M: Serialize>(&self, data: D, meta: M) -> Response {
        let mut response = Json(Envelope { data, meta }).into_response();
        let headers = response.headers_mut();
        headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(self.rate.limit));
        headers.insert(
            RATE_LIMIT_REMAINING_HEADER,
            HeaderValue::from(self.rate.remaining),
        );
        response
    }
}

#[derive(Serialize)]
struct Envelope<D, M> {
    data: D,
    meta: M,
}

/// Run the pipeline. `scope` is `None` for routes that only need a valid key.
pub async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    scope: Option<Scope>,
) -> ApiResult<ApiCall> {
    let principal = state.api_keys.verify_api_key(headers).await?;

    if let Some(required) = scope {
        if !principal.has_scope(required) {
            tracing::debug!(key_id = %principal.key_id, scope = %required, "API key lacks scope");
            return Err(ApiError::Forbidden(format!(
                "API key is missing the '{}' scope",
                required
            )));
        }
    }

    // Keys act for the account; whoever created the key plays no part here
    let context = state
        .resolver
        .resolve_for_account(principal.account_id, None)
        .await?;

    if let Some(denial) = context.check_account_feature(Feature::ApiAccess).denial() {
        tracing::debug!(account_id = %principal.account_id, denial = %denial, "API access denied");
        return Err(ApiError::Forbidden(match denial {
            Denial::Unauthenticated => "API key account not found".to_string(),
            other => other.to_string(),
        }));
    }

    let rate = state
        .rate_limiter
        .check_api_rate_limit(principal.account_id)
        .await?;
    if !rate.allowed {
        return Err(ApiError::RateLimited {
            limit: rate.limit,
            retry_after: rate.retry_after_seconds.unwrap_or(1),
        });
    }

    Ok(ApiCall {
        principal,
        context,
        rate,
    })
}
