//! API routes

pub mod health;
pub mod inquiries;
pub mod listings;
pub mod me;
pub mod stats;
pub mod webhooks;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{security::security_headers_middleware, state::AppState};

/// Default and maximum page size for paginated endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Public REST API (API key auth) and in-app session routes - under /api/v1
    let api_v1_routes = Router::new()
        .route("/listings", get(listings::list_listings))
        .route("/listings/:listing_id/submit", post(listings::submit_listing))
        .route("/inquiries", get(inquiries::list_inquiries))
        .route("/stats", get(stats::get_stats))
        .route("/me/permissions", get(me::get_permissions));

    let mut router = Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_v1_routes);

    // Stripe webhook (public, uses signature verification) - only when runtime config allows
    if state.config.enable_billing {
        router = router.route("/api/stripe/webhook", post(webhooks::stripe_webhook));
    }

    router
        // Global request body size limit
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
