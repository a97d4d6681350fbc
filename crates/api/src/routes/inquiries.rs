//! Inquiry endpoints of the public API

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::HeaderMap,
    response::Response,
};
use messmarkt_shared::types::{InquiryStatus, Scope};
use messmarkt_shared::InquiryFilter;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::auth::authorize;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Raw query values. Both decoding and parsing happen after authorization
/// so bad input never answers ahead of a 401/403.
#[derive(Debug, Default, Deserialize)]
pub struct InquiryQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub status: Option<String>,
    pub listing_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InquiryParams {
    pub page: i64,
    pub limit: i64,
    pub filter: InquiryFilter,
}

impl InquiryQuery {
    pub fn parse(&self) -> ApiResult<InquiryParams> {
        let page = match non_empty(&self.page) {
            None => 1,
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| ApiError::Validation("page must be a positive integer".to_string()))?,
        };

        let limit = match non_empty(&self.limit) {
            None => DEFAULT_PAGE_SIZE,
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| ApiError::Validation("limit must be an integer".to_string()))?
                .clamp(1, MAX_PAGE_SIZE),
        };

        let status = non_empty(&self.status)
            .map(|raw| {
                raw.parse::<InquiryStatus>()
                    .map_err(|_| ApiError::Validation(format!("Unknown inquiry status: {}", raw)))
            })
            .transpose()?;

        let listing_id = non_empty(&self.listing_id)
            .map(|raw| {
                Uuid::parse_str(raw)
                    .map_err(|_| ApiError::Validation("listing_id must be a UUID".to_string()))
            })
            .transpose()?;

        Ok(InquiryParams {
            page,
            limit,
            filter: InquiryFilter {
                status,
                listing_id,
                limit,
                offset: (page - 1).saturating_mul(limit),
            },
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        Self {
            page,
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

/// GET /api/v1/inquiries
pub async fn list_inquiries(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<InquiryQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let call = authorize(&state, &headers, Some(Scope::InquiriesRead)).await?;
    let Query(query) = query.map_err(|e| {
        tracing::debug!(error = %e, "Malformed inquiry query string");
        ApiError::Validation("Malformed query string".to_string())
    })?;
    let params = query.parse()?;

    let (inquiries, total) = state
        .store
        .list_inquiries(call.account_id(), &params.filter)
        .await?;

    Ok(call.respond(inquiries, PageMeta::new(params.page, params.limit, total)))
}
