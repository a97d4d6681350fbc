//! Permission engine
//!
//! Answers "what may this caller do right now?" from an [`EvaluationContext`].
//!
//! ## Design Principles
//!
//! 1. **Pure**: every check is a total function of the context, no I/O
//! 2. **Single table**: feature gating derives from [`Feature::required_tier`]
//! 3. **Suspension first**: a suspended account fails every gated check

use messmarkt_shared::types::{ProfileRole, Tier};
use serde::Serialize;

use crate::context::EvaluationContext;
use crate::plans::{Feature, Limit, LimitKind, Plan};

/// Why a gated operation was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Denial {
    Unauthenticated,
    AccountSuspended,
    UpgradeRequired { required_tier: Tier },
    LimitReached { limit: u32 },
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Denial::Unauthenticated => write!(f, "Authentication required"),
            Denial::AccountSuspended => write!(f, "Account is suspended"),
            Denial::UpgradeRequired { required_tier } => {
                write!(f, "Requires the {} plan or higher", required_tier)
            }
            Denial::LimitReached { limit } => write!(f, "Plan limit of {} reached", limit),
        }
    }
}

/// Outcome of a gated check, for flows that render upgrade prompts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allowed,
    Denied(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Decision::Allowed => None,
            Decision::Denied(denial) => Some(denial),
        }
    }
}

impl EvaluationContext {
    pub fn is_authenticated(&self) -> bool {
        self.profile().is_some()
    }

    pub fn is_account_suspended(&self) -> bool {
        self.account().is_some_and(|a| a.is_suspended)
    }

    /// Admin or super admin. Role checks ignore tier and suspension.
    pub fn is_admin(&self) -> bool {
        matches!(
            self.profile().map(|p| p.role),
            Some(ProfileRole::Admin | ProfileRole::SuperAdmin)
        )
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self.profile().map(|p| p.role), Some(ProfileRole::SuperAdmin))
    }

    /// Plan whose flags and tier apply.
    ///
    /// An active subscription wins (its own plan, else the account plan), an
    /// inactive one grants nothing, no subscription falls back to the account plan.
    pub fn effective_plan(&self) -> Option<&Plan> {
        match self.subscription() {
            Some(sub) if sub.status.is_active() => sub.plan.as_ref().or(self.plan()),
            Some(_) => None,
            None => self.plan(),
        }
    }

    pub fn plan_tier(&self) -> Tier {
        self.effective_plan().map(|p| p.tier).unwrap_or_default()
    }

    pub fn has_tier(&self, min: Tier) -> bool {
        self.plan_tier() >= min
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.check_feature(feature).is_allowed()
    }

    pub fn check_feature(&self, feature: Feature) -> Decision {
        if !self.is_authenticated() {
            return Decision::Denied(Denial::Unauthenticated);
        }
        if self.is_account_suspended() {
            return Decision::Denied(Denial::AccountSuspended);
        }
        self.plan_decision(feature)
    }

    /// Feature gate for callers acting as the account itself (API keys).
    /// Needs a resolved account instead of a profile; suspension still vetoes.
    pub fn check_account_feature(&self, feature: Feature) -> Decision {
        if self.account().is_none() {
            return Decision::Denied(Denial::Unauthenticated);
        }
        if self.is_account_suspended() {
            return Decision::Denied(Denial::AccountSuspended);
        }
        self.plan_decision(feature)
    }

    fn plan_decision(&self, feature: Feature) -> Decision {
        let flagged = self
            .effective_plan()
            .is_some_and(|p| p.flags.grants(feature));
        if flagged || self.has_tier(feature.required_tier()) {
            Decision::Allowed
        } else {
            Decision::Denied(Denial::UpgradeRequired {
                required_tier: feature.required_tier(),
            })
        }
    }

    /// Plan's own numeric flag, else the configured default for its tier
    pub fn limit(&self, kind: LimitKind) -> Limit {
        self.effective_plan()
            .and_then(|p| p.flags.limit(kind))
            .unwrap_or_else(|| self.limit_defaults().get(self.plan_tier(), kind))
    }

    pub fn listing_limit(&self) -> Limit {
        self.limit(LimitKind::Listings)
    }

    pub fn image_limit(&self) -> Limit {
        self.limit(LimitKind::Images)
    }

    pub fn featured_limit(&self) -> Limit {
        self.limit(LimitKind::FeaturedListings)
    }

    pub fn team_member_limit(&self) -> Limit {
        self.limit(LimitKind::TeamMembers)
    }

    pub fn can_create_listing(&self, current: u64) -> bool {
        self.check_create_listing(current).is_allowed()
    }

    pub fn check_create_listing(&self, current: u64) -> Decision {
        if !self.is_authenticated() {
            return Decision::Denied(Denial::Unauthenticated);
        }
        if self.is_account_suspended() {
            return Decision::Denied(Denial::AccountSuspended);
        }
        match self.listing_limit() {
            limit if limit.allows(current) => Decision::Allowed,
            Limit::Max(limit) => Decision::Denied(Denial::LimitReached { limit }),
            Limit::Unlimited => Decision::Allowed,
        }
    }

    pub fn can_access_statistics(&self) -> bool {
        self.has_feature(Feature::Statistics)
    }

    pub fn can_access_advanced_statistics(&self) -> bool {
        self.has_feature(Feature::AdvancedStatistics)
    }

    pub fn can_access_email_composer(&self) -> bool {
        self.has_feature(Feature::EmailComposer)
    }

    pub fn can_feature_listings(&self) -> bool {
        self.has_feature(Feature::FeaturedListings)
    }

    pub fn can_manage_team(&self) -> bool {
        self.has_feature(Feature::TeamManagement)
    }

    pub fn can_use_api(&self) -> bool {
        self.has_feature(Feature::ApiAccess)
    }

    pub fn can_access_admin_panel(&self) -> bool {
        self.is_admin()
    }

    /// Master-data maintenance (manufacturers, machine categories)
    pub fn can_access_stammdaten(&self) -> bool {
        self.is_super_admin()
    }

    pub fn permission_summary(&self, listing_count: u64) -> PermissionSummary {
        PermissionSummary {
            tier: self.plan_tier(),
            plan: self.effective_plan().map(|p| p.slug.clone()),
            authenticated: self.is_authenticated(),
            account_suspended: self.is_account_suspended(),
            features: Feature::ALL
                .into_iter()
                .map(|feature| FeatureDecision {
                    feature,
                    decision: self.check_feature(feature),
                })
                .collect(),
            limits: PlanLimits {
                max_listings: self.listing_limit(),
                max_images: self.image_limit(),
                max_featured: self.featured_limit(),
                max_team_members: self.team_member_limit(),
            },
            listing_count,
            create_listing: self.check_create_listing(listing_count),
            admin_panel: self.can_access_admin_panel(),
            stammdaten: self.can_access_stammdaten(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureDecision {
    pub feature: Feature,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub max_listings: Limit,
    pub max_images: Limit,
    pub max_featured: Limit,
    pub max_team_members: Limit,
}

/// Snapshot of every decision for one context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionSummary {
    pub tier: Tier,
    pub plan: Option<String>,
    pub authenticated: bool,
    pub account_suspended: bool,
    pub features: Vec<FeatureDecision>,
    pub limits: PlanLimits,
    pub listing_count: u64,
    pub create_listing: Decision,
    pub admin_panel: bool,
    pub stammdaten: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::context::Subscription;
    use crate::plans::{FeatureFlags, LimitDefaults};
    use messmarkt_shared::types::{Account, Profile, SubscriptionStatus};
    use serde_json::json;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn profile(role: ProfileRole) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            account_id: None,
            email: "vertrieb@example.com".to_string(),
            full_name: Some("Vertrieb".to_string()),
            role,
        }
    }

    fn account(suspended: bool) -> Account {
        Account {
            id: Uuid::new_v4(),
            name: "Koordinatenmesstechnik AG".to_string(),
            is_suspended: suspended,
            plan_slug: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn ctx_on(slug: &str) -> EvaluationContext {
        EvaluationContext::new(LimitDefaults::default())
            .with_profile(profile(ProfileRole::Member))
            .with_account(account(false))
            .with_subscription(Subscription::new(
                SubscriptionStatus::Active,
                Some(Plan::new(slug, FeatureFlags::new())),
            ))
    }

    #[test]
    fn test_anonymous_gets_nothing() {
        let ctx = EvaluationContext::anonymous();
        assert!(!ctx.is_authenticated());
        assert_eq!(
            ctx.check_feature(Feature::Statistics),
            Decision::Denied(Denial::Unauthenticated)
        );
        assert!(!ctx.can_create_listing(0));
        assert_eq!(ctx.plan_tier(), Tier::Free);
    }

    #[test]
    fn test_tier_gating() {
        let starter = ctx_on("starter");
        assert!(starter.can_access_statistics());
        assert!(starter.can_feature_listings());
        assert!(!starter.can_use_api());
        assert_eq!(
            starter.check_feature(Feature::ApiAccess),
            Decision::Denied(Denial::UpgradeRequired {
                required_tier: Tier::Business
            })
        );

        let enterprise = ctx_on("enterprise");
        for feature in Feature::ALL {
            assert!(enterprise.has_feature(feature), "{:?}", feature);
        }
    }

    #[test]
    fn test_account_gate_needs_no_profile() {
        let keyed = EvaluationContext::new(LimitDefaults::default())
            .with_account(account(false))
            .with_subscription(Subscription::new(
                SubscriptionStatus::Active,
                Some(Plan::new("business", FeatureFlags::new())),
            ));
        assert!(!keyed.is_authenticated());
        assert_eq!(keyed.check_account_feature(Feature::ApiAccess), Decision::Allowed);
        assert_eq!(
            keyed.check_feature(Feature::ApiAccess),
            Decision::Denied(Denial::Unauthenticated)
        );

        let starter = ctx_on("starter");
        assert_eq!(
            starter.check_account_feature(Feature::ApiAccess),
            Decision::Denied(Denial::UpgradeRequired {
                required_tier: Tier::Business
            })
        );

        let suspended = EvaluationContext::new(LimitDefaults::default())
            .with_account(account(true))
            .with_plan(Plan::new("enterprise", FeatureFlags::new()));
        assert_eq!(
            suspended.check_account_feature(Feature::ApiAccess),
            Decision::Denied(Denial::AccountSuspended)
        );

        assert_eq!(
            EvaluationContext::anonymous().check_account_feature(Feature::ApiAccess),
            Decision::Denied(Denial::Unauthenticated)
        );
    }

    #[test]
    fn test_inactive_subscription_drops_to_free() {
        let ctx = EvaluationContext::new(LimitDefaults::default())
            .with_profile(profile(ProfileRole::Member))
            .with_plan(Plan::new("business", FeatureFlags::new()))
            .with_subscription(Subscription::new(
                SubscriptionStatus::PastDue,
                Some(Plan::new("enterprise", FeatureFlags::new())),
            ));
        assert_eq!(ctx.plan_tier(), Tier::Free);
        assert!(ctx.effective_plan().is_none());
    }

    #[test]
    fn test_active_subscription_without_plan_uses_account_plan() {
        let ctx = EvaluationContext::new(LimitDefaults::default())
            .with_profile(profile(ProfileRole::Member))
            .with_plan(Plan::new("business", FeatureFlags::new()))
            .with_subscription(Subscription::new(SubscriptionStatus::Active, None));
        assert_eq!(ctx.plan_tier(), Tier::Business);
    }

    #[test]
    fn test_explicit_flag_grants_below_tier() {
        let flags = FeatureFlags::from_json(&json!({ "api_access": true }));
        let ctx = EvaluationContext::new(LimitDefaults::default())
            .with_profile(profile(ProfileRole::Member))
            .with_plan(Plan::new("free", flags));
        assert!(ctx.can_use_api());
        assert!(!ctx.can_manage_team());
    }

    #[test]
    fn test_suspension_overrides_everything_but_roles() {
        let ctx = EvaluationContext::new(LimitDefaults::default())
            .with_profile(profile(ProfileRole::SuperAdmin))
            .with_account(account(true))
            .with_plan(Plan::new("enterprise", FeatureFlags::new()));
        for feature in Feature::ALL {
            assert_eq!(
                ctx.check_feature(feature),
                Decision::Denied(Denial::AccountSuspended)
            );
        }
        assert!(!ctx.can_create_listing(0));
        assert!(ctx.can_access_admin_panel());
        assert!(ctx.can_access_stammdaten());
    }

    #[test]
    fn test_listing_limits() {
        let free = ctx_on("free");
        assert_eq!(free.listing_limit(), Limit::Max(3));
        assert!(free.can_create_listing(2));
        assert_eq!(
            free.check_create_listing(3),
            Decision::Denied(Denial::LimitReached { limit: 3 })
        );

        let enterprise = ctx_on("enterprise");
        assert_eq!(enterprise.listing_limit(), Limit::Unlimited);
        assert!(enterprise.can_create_listing(1_000_000));

        let flags = FeatureFlags::new().with_limit(LimitKind::Listings, Limit::Max(0));
        let zero = EvaluationContext::new(LimitDefaults::default())
            .with_profile(profile(ProfileRole::Member))
            .with_plan(Plan::new("business", flags));
        assert!(!zero.can_create_listing(0));
        assert_eq!(zero.image_limit(), Limit::Max(20));
    }

    #[test]
    fn test_roles() {
        let member = ctx_on("enterprise");
        assert!(!member.is_admin());
        assert!(!member.can_access_admin_panel());

        let admin = EvaluationContext::anonymous().with_profile(profile(ProfileRole::Admin));
        assert!(admin.is_admin());
        assert!(!admin.is_super_admin());
        assert!(!admin.can_access_stammdaten());
    }

    #[test]
    fn test_summary_serializes() {
        let summary = ctx_on("starter").permission_summary(15);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["tier"], "starter");
        assert_eq!(value["limits"]["max_listings"], 15);
        assert_eq!(
            value["create_listing"],
            json!({ "denied": { "reason": "limit_reached", "limit": 15 } })
        );
        assert_eq!(value["features"][0]["feature"], "statistics");
        assert_eq!(value["features"][0]["decision"], "allowed");
    }
}
