//! Postgres-backed store

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{InquiryFilter, MarketplaceStore, SubmitOutcome};
use crate::error::StoreResult;
use crate::types::{
    Account, AccountStats, ApiKeyRecord, Inquiry, Listing, PlanRow, Profile, SubscriptionRow,
};

const LISTING_COLUMNS: &str = "id, account_id, title, manufacturer, model, price_cents, currency, \
     status, image_count, created_at, updated_at, deleted_at";

const INQUIRY_COLUMNS: &str =
    "id, account_id, listing_id, contact_name, contact_email, message, status, created_at, deleted_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MarketplaceStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_api_key_by_hash(&self, key_hash: &str) -> StoreResult<Option<ApiKeyRecord>> {
        let key = sqlx::query_as::<_, ApiKeyRecord>(
            r#"
            SELECT id, account_id, name, key_prefix, key_hash, scopes, created_by,
                   expires_at, revoked_at, last_used_at, created_at
            FROM api_keys
            WHERE key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn touch_api_key(&self, key_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(key_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_account(&self, account_id: Uuid) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, name, is_suspended, plan_slug, created_at
            FROM accounts
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_profile(&self, profile_id: Uuid) -> StoreResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, account_id, email, full_name, role
            FROM profiles
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn find_subscription(&self, account_id: Uuid) -> StoreResult<Option<SubscriptionRow>> {
        let subscription = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, account_id, status, plan_slug, current_period_end
            FROM subscriptions
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subscription)
    }

    async fn find_plan(&self, slug: &str) -> StoreResult<Option<PlanRow>> {
        let plan = sqlx::query_as::<_, PlanRow>(
            "SELECT id, slug, name, feature_flags FROM plans WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(plan)
    }

    async fn list_listings(&self, account_id: Uuid) -> StoreResult<Vec<Listing>> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings \
             WHERE account_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC"
        );
        let listings = sqlx::query_as::<_, Listing>(&sql)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(listings)
    }

    async fn count_listings(&self, account_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM listings WHERE account_id = $1 AND deleted_at IS NULL",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn find_listing(
        &self,
        account_id: Uuid,
        listing_id: Uuid,
    ) -> StoreResult<Option<Listing>> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings \
             WHERE id = $1 AND account_id = $2 AND deleted_at IS NULL"
        );
        let listing = sqlx::query_as::<_, Listing>(&sql)
            .bind(listing_id)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(listing)
    }

    async fn submit_listing(
        &self,
        account_id: Uuid,
        listing_id: Uuid,
    ) -> StoreResult<SubmitOutcome> {
        // Conditional update: a concurrent submit loses the race and sees no row
        let sql = format!(
            "UPDATE listings SET status = 'pending_review', updated_at = NOW() \
             WHERE id = $1 AND account_id = $2 AND status = 'draft' AND deleted_at IS NULL \
             RETURNING {LISTING_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Listing>(&sql)
            .bind(listing_id)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match updated {
            Some(listing) => SubmitOutcome::Submitted(listing),
            None => SubmitOutcome::NotDraft,
        })
    }

    async fn list_inquiries(
        &self,
        account_id: Uuid,
        filter: &InquiryFilter,
    ) -> StoreResult<(Vec<Inquiry>, i64)> {
        let status = filter.status.map(|s| s.as_str());

        let page_sql = format!(
            "SELECT {INQUIRY_COLUMNS} FROM inquiries \
             WHERE account_id = $1 AND deleted_at IS NULL \
               AND ($2::varchar IS NULL OR status = $2) \
               AND ($3::uuid IS NULL OR listing_id = $3) \
             ORDER BY created_at DESC \
             LIMIT $4 OFFSET $5"
        );
        let page = sqlx::query_as::<_, Inquiry>(&page_sql)
            .bind(account_id)
            .bind(status)
            .bind(filter.listing_id)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool);

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM inquiries \
             WHERE account_id = $1 AND deleted_at IS NULL \
               AND ($2::varchar IS NULL OR status = $2) \
               AND ($3::uuid IS NULL OR listing_id = $3)",
        )
        .bind(account_id)
        .bind(status)
        .bind(filter.listing_id)
        .fetch_one(&self.pool);

        let (rows, total) = tokio::try_join!(page, total)?;
        Ok((rows, total))
    }

    async fn account_stats(&self, account_id: Uuid) -> StoreResult<AccountStats> {
        let stats = sqlx::query_as::<_, AccountStats>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE l.deleted_at IS NULL) AS total_listings,
                COUNT(*) FILTER (WHERE l.deleted_at IS NULL AND l.status = 'active') AS active_listings,
                COUNT(*) FILTER (WHERE l.deleted_at IS NULL AND l.status = 'draft') AS draft_listings,
                COUNT(*) FILTER (WHERE l.deleted_at IS NULL AND l.status = 'pending_review') AS pending_review_listings,
                (SELECT COUNT(*) FROM inquiries i
                  WHERE i.account_id = $1 AND i.deleted_at IS NULL) AS total_inquiries,
                (SELECT COUNT(*) FROM inquiries i
                  WHERE i.account_id = $1 AND i.deleted_at IS NULL AND i.status = 'new') AS new_inquiries
            FROM listings l
            WHERE l.account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
