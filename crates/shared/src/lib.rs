//! Messmarkt Shared Types and Utilities
//!
//! This crate contains the row types, store interface and database helpers
//! shared by the entitlement engine and the public API.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use db::*;
pub use error::*;
pub use store::{InquiryFilter, MarketplaceStore, MemoryStore, PgStore, SubmitOutcome};
pub use types::*;
