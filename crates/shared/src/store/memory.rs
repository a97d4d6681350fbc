//! In-process store used by tests and local development

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{InquiryFilter, MarketplaceStore, SubmitOutcome};
use crate::error::StoreResult;
use crate::types::{
    Account, AccountStats, ApiKeyRecord, Inquiry, InquiryStatus, Listing, ListingStatus, PlanRow,
    Profile, SubscriptionRow,
};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    profiles: HashMap<Uuid, Profile>,
    plans: HashMap<String, PlanRow>,
    subscriptions: HashMap<Uuid, SubscriptionRow>,
    api_keys: HashMap<Uuid, ApiKeyRecord>,
    listings: HashMap<Uuid, Listing>,
    inquiries: HashMap<Uuid, Inquiry>,
}

/// All tables live behind one lock so multi-row checks are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_account(&self, account: Account) {
        self.tables.write().await.accounts.insert(account.id, account);
    }

    pub async fn insert_profile(&self, profile: Profile) {
        self.tables.write().await.profiles.insert(profile.id, profile);
    }

    pub async fn insert_plan(&self, plan: PlanRow) {
        self.tables.write().await.plans.insert(plan.slug.clone(), plan);
    }

    /// Replaces any existing subscription of the same account
    pub async fn insert_subscription(&self, subscription: SubscriptionRow) {
        self.tables
            .write()
            .await
            .subscriptions
            .insert(subscription.account_id, subscription);
    }

    pub async fn insert_api_key(&self, key: ApiKeyRecord) {
        self.tables.write().await.api_keys.insert(key.id, key);
    }

    pub async fn insert_listing(&self, listing: Listing) {
        self.tables.write().await.listings.insert(listing.id, listing);
    }

    pub async fn insert_inquiry(&self, inquiry: Inquiry) {
        self.tables.write().await.inquiries.insert(inquiry.id, inquiry);
    }

    pub async fn revoke_api_key(&self, key_id: Uuid) {
        if let Some(key) = self.tables.write().await.api_keys.get_mut(&key_id) {
            key.revoked_at = Some(OffsetDateTime::now_utc());
        }
    }
}

fn live_listings(tables: &Tables, account_id: Uuid) -> impl Iterator<Item = &Listing> {
    tables
        .listings
        .values()
        .filter(move |l| l.account_id == account_id && l.deleted_at.is_none())
}

fn live_inquiries(tables: &Tables, account_id: Uuid) -> impl Iterator<Item = &Inquiry> {
    tables
        .inquiries
        .values()
        .filter(move |i| i.account_id == account_id && i.deleted_at.is_none())
}

#[async_trait]
impl MarketplaceStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_api_key_by_hash(&self, key_hash: &str) -> StoreResult<Option<ApiKeyRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .api_keys
            .values()
            .find(|k| k.key_hash == key_hash)
            .cloned())
    }

    async fn touch_api_key(&self, key_id: Uuid) -> StoreResult<()> {
        if let Some(key) = self.tables.write().await.api_keys.get_mut(&key_id) {
            key.last_used_at = Some(OffsetDateTime::now_utc());
        }
        Ok(())
    }

    async fn find_account(&self, account_id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.tables.read().await.accounts.get(&account_id).cloned())
    }

    async fn find_profile(&self, profile_id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.tables.read().await.profiles.get(&profile_id).cloned())
    }

    async fn find_subscription(&self, account_id: Uuid) -> StoreResult<Option<SubscriptionRow>> {
        Ok(self
            .tables
            .read()
            .await
            .subscriptions
            .get(&account_id)
            .cloned())
    }

    async fn find_plan(&self, slug: &str) -> StoreResult<Option<PlanRow>> {
        Ok(self.tables.read().await.plans.get(slug).cloned())
    }

    async fn list_listings(&self, account_id: Uuid) -> StoreResult<Vec<Listing>> {
        let tables = self.tables.read().await;
        let mut listings: Vec<Listing> = live_listings(&tables, account_id).cloned().collect();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listings)
    }

    async fn count_listings(&self, account_id: Uuid) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(live_listings(&tables, account_id).count() as i64)
    }

    async fn find_listing(
        &self,
        account_id: Uuid,
        listing_id: Uuid,
    ) -> StoreResult<Option<Listing>> {
        let tables = self.tables.read().await;
        let found = live_listings(&tables, account_id)
            .find(|l| l.id == listing_id)
            .cloned();
        Ok(found)
    }

    async fn submit_listing(
        &self,
        account_id: Uuid,
        listing_id: Uuid,
    ) -> StoreResult<SubmitOutcome> {
        let mut tables = self.tables.write().await;
        let Some(listing) = tables.listings.get_mut(&listing_id) else {
            return Ok(SubmitOutcome::NotDraft);
        };
        if listing.account_id != account_id
            || listing.deleted_at.is_some()
            || listing.status != ListingStatus::Draft
        {
            return Ok(SubmitOutcome::NotDraft);
        }
        listing.status = ListingStatus::PendingReview;
        listing.updated_at = OffsetDateTime::now_utc();
        Ok(SubmitOutcome::Submitted(listing.clone()))
    }

    async fn list_inquiries(
        &self,
        account_id: Uuid,
        filter: &InquiryFilter,
    ) -> StoreResult<(Vec<Inquiry>, i64)> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Inquiry> = live_inquiries(&tables, account_id)
            .filter(|i| filter.status.map_or(true, |s| i.status == s))
            .filter(|i| filter.listing_id.map_or(true, |id| i.listing_id == id))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn account_stats(&self, account_id: Uuid) -> StoreResult<AccountStats> {
        let tables = self.tables.read().await;
        let mut stats = AccountStats::default();
        for listing in live_listings(&tables, account_id) {
            stats.total_listings += 1;
            match listing.status {
                ListingStatus::Active => stats.active_listings += 1,
                ListingStatus::Draft => stats.draft_listings += 1,
                ListingStatus::PendingReview => stats.pending_review_listings += 1,
                _ => {}
            }
        }
        for inquiry in live_inquiries(&tables, account_id) {
            stats.total_inquiries += 1;
            if inquiry.status == InquiryStatus::New {
                stats.new_inquiries += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn listing(account_id: Uuid, status: ListingStatus) -> Listing {
        let now = OffsetDateTime::now_utc();
        Listing {
            id: Uuid::new_v4(),
            account_id,
            title: "Zeiss Contura G2".to_string(),
            manufacturer: Some("Zeiss".to_string()),
            model: Some("Contura G2".to_string()),
            price_cents: Some(4_500_000),
            currency: "EUR".to_string(),
            status,
            image_count: 3,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_submit_is_conditional_on_draft() {
        let store = MemoryStore::new();
        let account_id = Uuid::new_v4();
        let draft = listing(account_id, ListingStatus::Draft);
        let draft_id = draft.id;
        store.insert_listing(draft).await;

        let first = store.submit_listing(account_id, draft_id).await.unwrap();
        assert!(matches!(first, SubmitOutcome::Submitted(ref l) if l.status == ListingStatus::PendingReview));

        let second = store.submit_listing(account_id, draft_id).await.unwrap();
        assert_eq!(second, SubmitOutcome::NotDraft);
    }

    #[tokio::test]
    async fn test_listing_queries_are_tenant_scoped() {
        let store = MemoryStore::new();
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let foreign = listing(theirs, ListingStatus::Draft);
        let foreign_id = foreign.id;
        store.insert_listing(listing(mine, ListingStatus::Active)).await;
        store.insert_listing(foreign).await;

        let mut deleted = listing(mine, ListingStatus::Active);
        deleted.deleted_at = Some(OffsetDateTime::now_utc());
        store.insert_listing(deleted).await;

        assert_eq!(store.count_listings(mine).await.unwrap(), 1);
        assert!(store.find_listing(mine, foreign_id).await.unwrap().is_none());
        assert_eq!(
            store.submit_listing(mine, foreign_id).await.unwrap(),
            SubmitOutcome::NotDraft
        );
    }
}
