//! In-app permission summary
//!
//! The web UI renders upgrade prompts from this snapshot instead of
//! re-deriving tier rules on the client.

use axum::{extract::State, http::HeaderMap, Json};
use messmarkt_billing::PermissionSummary;
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::bearer_token;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct PermissionsResponse {
    pub data: PermissionSummary,
    pub meta: Value,
}

/// GET /api/v1/me/permissions (session JWT)
pub async fn get_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<PermissionsResponse>> {
    let token = bearer_token(&headers).ok_or(ApiError::Unauthorized)?;
    let profile_id = state.sessions.verify(token).map_err(|e| {
        tracing::debug!(error = %e, "Session token rejected");
        ApiError::Unauthorized
    })?;

    let ctx = state.resolver.resolve_for_profile(profile_id).await?;
    if !ctx.is_authenticated() {
        tracing::warn!(profile_id = %profile_id, "Valid session for unknown profile");
        return Err(ApiError::Unauthorized);
    }

    let listing_count = match ctx.account() {
        Some(account) => state.store.count_listings(account.id).await?,
        None => 0,
    };
    let listing_count = u64::try_from(listing_count).unwrap_or(0);

    Ok(Json(PermissionsResponse {
        data: ctx.permission_summary(listing_count),
        meta: json!({ "profile_id": profile_id }),
    }))
}
