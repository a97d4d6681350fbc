//! Account statistics endpoint

use axum::{extract::State, http::HeaderMap, response::Response};
use serde::Serialize;

use crate::auth::authorize;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatsMeta {
    pub tier: messmarkt_shared::types::Tier,
}

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    // Any valid key may read its own account's counters
    let call = authorize(&state, &headers, None).await?;

    let stats = state.store.account_stats(call.account_id()).await?;
    let meta = StatsMeta {
        tier: call.context.plan_tier(),
    };

    Ok(call.respond(stats, meta))
}
