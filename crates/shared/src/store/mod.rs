//! Data store interface
//!
//! The relational backend is reached only through [`MarketplaceStore`]. Every
//! tenant-scoped query takes the owning account id and ignores soft-deleted
//! rows (`deleted_at IS NULL`).

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::types::{
    Account, AccountStats, ApiKeyRecord, Inquiry, InquiryStatus, Listing, PlanRow, Profile,
    SubscriptionRow,
};

/// Filter and page window for inquiry listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InquiryFilter {
    pub status: Option<InquiryStatus>,
    pub listing_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

/// Result of the conditional draft -> pending_review transition
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted(Listing),
    /// The listing left `draft` (or vanished) before the update applied
    NotDraft,
}

#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    /// Connectivity probe used by readiness checks
    async fn ping(&self) -> StoreResult<()>;

    async fn find_api_key_by_hash(&self, key_hash: &str) -> StoreResult<Option<ApiKeyRecord>>;

    async fn touch_api_key(&self, key_id: Uuid) -> StoreResult<()>;

    async fn find_account(&self, account_id: Uuid) -> StoreResult<Option<Account>>;

    async fn find_profile(&self, profile_id: Uuid) -> StoreResult<Option<Profile>>;

    /// Most recent subscription of the account
    async fn find_subscription(&self, account_id: Uuid) -> StoreResult<Option<SubscriptionRow>>;

    async fn find_plan(&self, slug: &str) -> StoreResult<Option<PlanRow>>;

    async fn list_listings(&self, account_id: Uuid) -> StoreResult<Vec<Listing>>;

    async fn count_listings(&self, account_id: Uuid) -> StoreResult<i64>;

    async fn find_listing(&self, account_id: Uuid, listing_id: Uuid)
        -> StoreResult<Option<Listing>>;

    /// Move a draft listing to `pending_review`. Must only succeed while the
    /// listing is still a draft at the moment of the write.
    async fn submit_listing(&self, account_id: Uuid, listing_id: Uuid)
        -> StoreResult<SubmitOutcome>;

    /// Page of inquiries plus the total matching count
    async fn list_inquiries(
        &self,
        account_id: Uuid,
        filter: &InquiryFilter,
    ) -> StoreResult<(Vec<Inquiry>, i64)>;

    async fn account_stats(&self, account_id: Uuid) -> StoreResult<AccountStats>;
}
