//! Common types used across Messmarkt

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Subscription tier. Declaration order is the capability order:
/// every tier carries all entitlements of the tiers before it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Starter,
    Business,
    Enterprise,
}

impl Tier {
    /// Every tier, lowest first
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Starter, Tier::Business, Tier::Enterprise];

    /// Integer rank (higher = more capable)
    pub fn rank(&self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Starter => 1,
            Self::Business => 2,
            Self::Enterprise => 3,
        }
    }

    /// Resolve a plan slug to its tier. Unknown or missing slugs map to `Free`.
    pub fn from_slug(slug: Option<&str>) -> Self {
        slug.and_then(|s| s.parse().ok()).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Business => "business",
            Self::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "starter" => Ok(Self::Starter),
            "business" => Ok(Self::Business),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(format!("Invalid tier: {}", s)),
        }
    }
}

/// Role of a profile inside its account. Independent of the plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProfileRole {
    #[default]
    Member,
    Admin,
    SuperAdmin,
}

/// Subscription status as reported by the billing provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
}

impl SubscriptionStatus {
    /// Only active and trialing subscriptions grant their plan
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }

    /// Parse the provider status string; unrecognised values count as `Incomplete`
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            "canceled" | "cancelled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            _ => Self::Incomplete,
        }
    }
}

/// Listing lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Draft,
    PendingReview,
    Active,
    Rejected,
    Sold,
    Archived,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingReview => "pending_review",
            Self::Active => "active",
            Self::Rejected => "rejected",
            Self::Sold => "sold",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inquiry handling status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InquiryStatus {
    New,
    Read,
    Replied,
    Archived,
}

impl InquiryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Read => "read",
            Self::Replied => "replied",
            Self::Archived => "archived",
        }
    }
}

impl std::str::FromStr for InquiryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "read" => Ok(Self::Read),
            "replied" => Ok(Self::Replied),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("Invalid inquiry status: {}", s)),
        }
    }
}

/// Capability granted to an API key, checked independently of the plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "listings:read")]
    ListingsRead,
    #[serde(rename = "listings:write")]
    ListingsWrite,
    #[serde(rename = "inquiries:read")]
    InquiriesRead,
    #[serde(rename = "inquiries:write")]
    InquiriesWrite,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListingsRead => "listings:read",
            Self::ListingsWrite => "listings:write",
            Self::InquiriesRead => "inquiries:read",
            Self::InquiriesWrite => "inquiries:write",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "listings:read" => Ok(Self::ListingsRead),
            "listings:write" => Ok(Self::ListingsWrite),
            "inquiries:read" => Ok(Self::InquiriesRead),
            "inquiries:write" => Ok(Self::InquiriesWrite),
            _ => Err(format!("Unknown scope: {}", s)),
        }
    }
}

// =============================================================================
// Rows
// =============================================================================

/// Seller organization (tenant)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub is_suspended: bool,
    /// Plan assigned directly to the account, used when no subscription exists
    pub plan_slug: Option<String>,
    pub created_at: OffsetDateTime,
}

/// User identity within an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub account_id: Option<Uuid>,
    pub email: String,
    pub full_name: Option<String>,
    pub role: ProfileRole,
}

/// Plan as stored by the billing subsystem; `feature_flags` is a raw JSON object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PlanRow {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub feature_flags: Option<serde_json::Value>,
}

/// Subscription row; status is kept as the provider string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub status: String,
    pub plan_slug: Option<String>,
    pub current_period_end: Option<OffsetDateTime>,
}

/// Stored API key (the secret itself is never persisted, only its hash)
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub key_prefix: String,
    pub key_hash: String,
    pub scopes: Vec<String>,
    pub created_by: Option<Uuid>,
    pub expires_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
    pub last_used_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl ApiKeyRecord {
    /// A key is usable when it has not been revoked and has not expired
    pub fn is_usable_at(&self, now: OffsetDateTime) -> bool {
        if self.revoked_at.is_some() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        }
    }
}

/// Marketplace listing of a measurement machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Listing {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub account_id: Uuid,
    pub title: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub price_cents: Option<i64>,
    pub currency: String,
    pub status: ListingStatus,
    pub image_count: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing, default)]
    pub deleted_at: Option<OffsetDateTime>,
}

/// Buyer inquiry on a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Inquiry {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub account_id: Uuid,
    pub listing_id: Uuid,
    pub contact_name: String,
    pub contact_email: String,
    pub message: String,
    pub status: InquiryStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(skip_serializing, default)]
    pub deleted_at: Option<OffsetDateTime>,
}

/// Aggregated account statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AccountStats {
    pub total_listings: i64,
    pub active_listings: i64,
    pub draft_listings: i64,
    pub pending_review_listings: i64,
    pub total_inquiries: i64,
    pub new_inquiries: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_order() {
        assert!(Tier::Free < Tier::Starter);
        assert!(Tier::Starter < Tier::Business);
        assert!(Tier::Business < Tier::Enterprise);
        for pair in Tier::ALL.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_tier_from_slug() {
        assert_eq!(Tier::from_slug(Some("business")), Tier::Business);
        assert_eq!(Tier::from_slug(Some("Enterprise")), Tier::Enterprise);
        assert_eq!(Tier::from_slug(Some("platinum")), Tier::Free);
        assert_eq!(Tier::from_slug(None), Tier::Free);
    }

    #[test]
    fn test_subscription_status_activity() {
        assert!(SubscriptionStatus::from_str_lossy("active").is_active());
        assert!(SubscriptionStatus::from_str_lossy("trialing").is_active());
        assert!(!SubscriptionStatus::from_str_lossy("past_due").is_active());
        assert!(!SubscriptionStatus::from_str_lossy("canceled").is_active());
        assert_eq!(
            SubscriptionStatus::from_str_lossy("incomplete_expired"),
            SubscriptionStatus::Incomplete
        );
    }

    #[test]
    fn test_scope_round_trip_strings() {
        assert_eq!("listings:write".parse::<Scope>(), Ok(Scope::ListingsWrite));
        assert_eq!(Scope::InquiriesRead.to_string(), "inquiries:read");
        assert!("listings:*".parse::<Scope>().is_err());
        assert!("stats:read".parse::<Scope>().is_err());
    }

    #[test]
    fn test_api_key_usable() {
        let now = OffsetDateTime::now_utc();
        let mut key = ApiKeyRecord {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            name: "ci".to_string(),
            key_prefix: "mm_01abc...".to_string(),
            key_hash: "00".to_string(),
            scopes: vec![],
            created_by: None,
            expires_at: None,
            revoked_at: None,
            last_used_at: None,
            created_at: now,
        };
        assert!(key.is_usable_at(now));

        key.expires_at = Some(now - time::Duration::seconds(1));
        assert!(!key.is_usable_at(now));

        key.expires_at = Some(now + time::Duration::days(1));
        key.revoked_at = Some(now);
        assert!(!key.is_usable_at(now));
    }
}
