//! Messmarkt API Library
//!
//! Public REST API (API keys), in-app permission endpoint (session JWTs) and
//! the payment webhook intake.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod security;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
