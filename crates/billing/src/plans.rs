//! Plan / tier model
//!
//! The feature → minimum tier table in [`Feature::required_tier`] is the only
//! place where a gated feature is tied to a tier. Every capability check is
//! derived from it.

use std::collections::{BTreeMap, BTreeSet};

use messmarkt_shared::types::{PlanRow, Tier};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Gated features known to the marketplace
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Statistics,
    FeaturedListings,
    AdvancedStatistics,
    EmailComposer,
    TeamManagement,
    ApiAccess,
    PrioritySupport,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::Statistics,
        Feature::FeaturedListings,
        Feature::AdvancedStatistics,
        Feature::EmailComposer,
        Feature::TeamManagement,
        Feature::ApiAccess,
        Feature::PrioritySupport,
    ];

    /// Minimum tier that unlocks the feature by default
    pub fn required_tier(&self) -> Tier {
        match self {
            Self::Statistics | Self::FeaturedListings => Tier::Starter,
            Self::AdvancedStatistics
            | Self::EmailComposer
            | Self::TeamManagement
            | Self::ApiAccess => Tier::Business,
            Self::PrioritySupport => Tier::Enterprise,
        }
    }

    /// Key used in a plan's `feature_flags` object
    pub fn key(&self) -> &'static str {
        match self {
            Self::Statistics => "statistics",
            Self::FeaturedListings => "featured_listings",
            Self::AdvancedStatistics => "advanced_statistics",
            Self::EmailComposer => "email_composer",
            Self::TeamManagement => "team_management",
            Self::ApiAccess => "api_access",
            Self::PrioritySupport => "priority_support",
        }
    }
}

impl std::str::FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.key() == s)
            .ok_or_else(|| format!("Unknown feature: {}", s))
    }
}

/// Numeric limits a plan can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LimitKind {
    #[serde(rename = "max_listings")]
    Listings,
    #[serde(rename = "max_images")]
    Images,
    #[serde(rename = "max_featured")]
    FeaturedListings,
    #[serde(rename = "max_team_members")]
    TeamMembers,
}

impl LimitKind {
    pub const ALL: [LimitKind; 4] = [
        LimitKind::Listings,
        LimitKind::Images,
        LimitKind::FeaturedListings,
        LimitKind::TeamMembers,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Listings => "max_listings",
            Self::Images => "max_images",
            Self::FeaturedListings => "max_featured",
            Self::TeamMembers => "max_team_members",
        }
    }
}

impl std::str::FromStr for LimitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LimitKind::ALL
            .into_iter()
            .find(|k| k.key() == s)
            .ok_or_else(|| format!("Unknown limit: {}", s))
    }
}

/// A numeric entitlement. Stored numbers below zero mean unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Max(u32),
    Unlimited,
}

impl Limit {
    pub fn from_raw(raw: i64) -> Self {
        if raw < 0 {
            Self::Unlimited
        } else {
            Self::Max(u32::try_from(raw).unwrap_or(u32::MAX))
        }
    }

    /// Sentinel form: `-1` for unlimited
    pub fn as_raw(&self) -> i64 {
        match self {
            Self::Max(n) => i64::from(*n),
            Self::Unlimited => -1,
        }
    }

    /// Whether one more item fits when `current` are already used
    pub fn allows(&self, current: u64) -> bool {
        match self {
            Self::Max(max) => current < u64::from(*max),
            Self::Unlimited => true,
        }
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_raw())
    }
}

/// Default limits for one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub listings: Limit,
    pub images: Limit,
    pub featured_listings: Limit,
    pub team_members: Limit,
}

impl TierLimits {
    pub fn get(&self, kind: LimitKind) -> Limit {
        match kind {
            LimitKind::Listings => self.listings,
            LimitKind::Images => self.images,
            LimitKind::FeaturedListings => self.featured_listings,
            LimitKind::TeamMembers => self.team_members,
        }
    }

    fn set(&mut self, kind: LimitKind, limit: Limit) {
        match kind {
            LimitKind::Listings => self.listings = limit,
            LimitKind::Images => self.images = limit,
            LimitKind::FeaturedListings => self.featured_listings = limit,
            LimitKind::TeamMembers => self.team_members = limit,
        }
    }
}

/// Limits applied when a plan's flags carry no numeric entry.
///
/// Overridable per tier and kind through `LIMIT_<TIER>_<KIND>`, for example
/// `LIMIT_STARTER_MAX_LISTINGS=20` or `LIMIT_BUSINESS_MAX_IMAGES=-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitDefaults {
    pub free: TierLimits,
    pub starter: TierLimits,
    pub business: TierLimits,
    pub enterprise: TierLimits,
}

impl Default for LimitDefaults {
    fn default() -> Self {
        Self {
            free: TierLimits {
                listings: Limit::Max(3),
                images: Limit::Max(5),
                featured_listings: Limit::Max(0),
                team_members: Limit::Max(1),
            },
            starter: TierLimits {
                listings: Limit::Max(15),
                images: Limit::Max(10),
                featured_listings: Limit::Max(1),
                team_members: Limit::Max(2),
            },
            business: TierLimits {
                listings: Limit::Max(50),
                images: Limit::Max(20),
                featured_listings: Limit::Max(5),
                team_members: Limit::Max(5),
            },
            enterprise: TierLimits {
                listings: Limit::Unlimited,
                images: Limit::Max(50),
                featured_listings: Limit::Max(20),
                team_members: Limit::Unlimited,
            },
        }
    }
}

impl LimitDefaults {
    /// Built-in table with overrides from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Built-in table with overrides from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut defaults = Self::default();
        for tier in Tier::ALL {
            for kind in LimitKind::ALL {
                let name = format!(
                    "LIMIT_{}_{}",
                    tier.as_str().to_uppercase(),
                    kind.key().to_uppercase()
                );
                let Some(raw) = lookup(&name) else { continue };
                match raw.trim().parse::<i64>() {
                    Ok(value) => defaults.for_tier_mut(tier).set(kind, Limit::from_raw(value)),
                    Err(_) => {
                        tracing::warn!(variable = %name, value = %raw, "Ignoring non-numeric limit override")
                    }
                }
            }
        }
        defaults
    }

    pub fn for_tier(&self, tier: Tier) -> &TierLimits {
        match tier {
            Tier::Free => &self.free,
            Tier::Starter => &self.starter,
            Tier::Business => &self.business,
            Tier::Enterprise => &self.enterprise,
        }
    }

    fn for_tier_mut(&mut self, tier: Tier) -> &mut TierLimits {
        match tier {
            Tier::Free => &mut self.free,
            Tier::Starter => &mut self.starter,
            Tier::Business => &mut self.business,
            Tier::Enterprise => &mut self.enterprise,
        }
    }

    pub fn get(&self, tier: Tier, kind: LimitKind) -> Limit {
        self.for_tier(tier).get(kind)
    }
}

/// Typed view of a plan's `feature_flags` object.
///
/// Flags only ever add entitlements: a `false` entry is the same as no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    granted: BTreeSet<Feature>,
    limits: BTreeMap<LimitKind, Limit>,
}

impl FeatureFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, feature: Feature) -> Self {
        self.granted.insert(feature);
        self
    }

    pub fn with_limit(mut self, kind: LimitKind, limit: Limit) -> Self {
        self.limits.insert(kind, limit);
        self
    }

    /// Parse the stored JSON. Unknown keys are logged and skipped.
    pub fn from_json(value: &Value) -> Self {
        let mut flags = Self::default();
        let Some(map) = value.as_object() else {
            if !value.is_null() {
                tracing::warn!("Plan feature_flags is not a JSON object, ignoring");
            }
            return flags;
        };

        for (key, value) in map {
            if let Ok(feature) = key.parse::<Feature>() {
                if is_truthy(value) {
                    flags.granted.insert(feature);
                }
            } else if let Ok(kind) = key.parse::<LimitKind>() {
                match value.as_i64() {
                    Some(raw) => {
                        flags.limits.insert(kind, Limit::from_raw(raw));
                    }
                    None => tracing::warn!(key = %key, "Plan limit is not an integer, ignoring"),
                }
            } else {
                tracing::warn!(key = %key, "Unknown plan feature flag, ignoring");
            }
        }
        flags
    }

    pub fn grants(&self, feature: Feature) -> bool {
        self.granted.contains(&feature)
    }

    pub fn limit(&self, kind: LimitKind) -> Option<Limit> {
        self.limits.get(&kind).copied()
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => false,
    }
}

/// A plan snapshot, immutable for the lifetime of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub slug: String,
    pub name: String,
    pub tier: Tier,
    pub flags: FeatureFlags,
}

impl Plan {
    pub fn new(slug: impl Into<String>, flags: FeatureFlags) -> Self {
        let slug = slug.into();
        Self {
            tier: Tier::from_slug(Some(&slug)),
            name: slug.clone(),
            slug,
            flags,
        }
    }

    pub fn from_row(row: &PlanRow) -> Self {
        Self {
            slug: row.slug.clone(),
            name: row.name.clone(),
            tier: Tier::from_slug(Some(&row.slug)),
            flags: row
                .feature_flags
                .as_ref()
                .map(FeatureFlags::from_json)
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_tier_table() {
        assert_eq!(Feature::Statistics.required_tier(), Tier::Starter);
        assert_eq!(Feature::ApiAccess.required_tier(), Tier::Business);
        assert_eq!(Feature::PrioritySupport.required_tier(), Tier::Enterprise);
        for feature in Feature::ALL {
            assert_eq!(feature.key().parse::<Feature>(), Ok(feature));
        }
    }

    #[test]
    fn test_limit_sentinel() {
        assert_eq!(Limit::from_raw(-1), Limit::Unlimited);
        assert_eq!(Limit::from_raw(-42), Limit::Unlimited);
        assert_eq!(Limit::from_raw(7), Limit::Max(7));
        assert!(!Limit::Max(0).allows(0));
        assert!(Limit::Max(3).allows(2));
        assert!(!Limit::Max(3).allows(3));
        assert!(Limit::Unlimited.allows(u64::MAX));
        assert_eq!(serde_json::to_value(Limit::Unlimited).unwrap(), json!(-1));
    }

    #[test]
    fn test_flags_from_json() {
        let flags = FeatureFlags::from_json(&json!({
            "statistics": true,
            "email_composer": false,
            "api_access": 1,
            "max_listings": 25,
            "max_images": -1,
            "stattistics": true,
        }));
        assert!(flags.grants(Feature::Statistics));
        assert!(!flags.grants(Feature::EmailComposer));
        assert!(flags.grants(Feature::ApiAccess));
        assert_eq!(flags.limit(LimitKind::Listings), Some(Limit::Max(25)));
        assert_eq!(flags.limit(LimitKind::Images), Some(Limit::Unlimited));
        assert_eq!(flags.limit(LimitKind::TeamMembers), None);
    }

    #[test]
    fn test_flags_from_non_object() {
        assert_eq!(FeatureFlags::from_json(&json!(null)), FeatureFlags::default());
        assert_eq!(FeatureFlags::from_json(&json!(["statistics"])), FeatureFlags::default());
    }

    #[test]
    fn test_limit_defaults_overrides() {
        let defaults = LimitDefaults::from_lookup(|name| match name {
            "LIMIT_STARTER_MAX_LISTINGS" => Some("20".to_string()),
            "LIMIT_FREE_MAX_IMAGES" => Some("-1".to_string()),
            "LIMIT_BUSINESS_MAX_FEATURED" => Some("lots".to_string()),
            _ => None,
        });
        assert_eq!(defaults.get(Tier::Starter, LimitKind::Listings), Limit::Max(20));
        assert_eq!(defaults.get(Tier::Free, LimitKind::Images), Limit::Unlimited);
        assert_eq!(
            defaults.get(Tier::Business, LimitKind::FeaturedListings),
            LimitDefaults::default().business.featured_listings
        );
    }

    #[test]
    fn test_plan_from_row() {
        let row = PlanRow {
            id: uuid::Uuid::new_v4(),
            slug: "business".to_string(),
            name: "Business".to_string(),
            feature_flags: None,
        };
        let plan = Plan::from_row(&row);
        assert_eq!(plan.tier, Tier::Business);
        assert_eq!(plan.flags, FeatureFlags::default());

        let legacy = Plan::new("gold", FeatureFlags::new());
        assert_eq!(legacy.tier, Tier::Free);
    }
}
