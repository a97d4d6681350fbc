//! Listing endpoints of the public API

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
};
use messmarkt_shared::types::{ListingStatus, Scope};
use messmarkt_shared::SubmitOutcome;
use serde_json::json;
use uuid::Uuid;

use crate::auth::authorize;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/v1/listings
pub async fn list_listings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let call = authorize(&state, &headers, Some(Scope::ListingsRead)).await?;

    let listings = state.store.list_listings(call.account_id()).await?;
    let total = listings.len();

    Ok(call.respond(listings, json!({ "total": total })))
}

/// POST /api/v1/listings/:listing_id/submit
///
/// Moves a draft to `pending_review`. Only drafts with at least one image
/// can be submitted.
pub async fn submit_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(listing_id): Path<String>,
) -> ApiResult<Response> {
    let call = authorize(&state, &headers, Some(Scope::ListingsWrite)).await?;

    let listing_id = Uuid::parse_str(&listing_id)
        .map_err(|_| ApiError::Validation("Invalid listing id".to_string()))?;

    let listing = state
        .store
        .find_listing(call.account_id(), listing_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if listing.status != ListingStatus::Draft {
        return Err(ApiError::Conflict(format!(
            "Listing is {}, only drafts can be submitted",
            listing.status
        )));
    }
    if listing.image_count <= 0 {
        return Err(ApiError::Validation(
            "Listing needs at least one image before submission".to_string(),
        ));
    }

    match state
        .store
        .submit_listing(call.account_id(), listing_id)
        .await?
    {
        SubmitOutcome::Submitted(listing) => {
            tracing::info!(
                account_id = %call.account_id(),
                listing_id = %listing.id,
                "Listing submitted for review"
            );
            Ok(call.respond(listing, json!({})))
        }
        // Another request moved it out of draft between read and write
        SubmitOutcome::NotDraft => Err(ApiError::Conflict(
            "Listing is no longer a draft".to_string(),
        )),
    }
}
