//! Evaluation context and its resolver
//!
//! An [`EvaluationContext`] is built once per request and never mutated. The
//! permission engine reads nothing else.

use std::sync::Arc;

use messmarkt_shared::types::{Account, Profile, SubscriptionStatus};
use messmarkt_shared::MarketplaceStore;
use uuid::Uuid;

use crate::error::BillingResult;
use crate::plans::{LimitDefaults, Plan};

/// Subscription snapshot with its plan already resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub status: SubscriptionStatus,
    pub plan: Option<Plan>,
}

impl Subscription {
    pub fn new(status: SubscriptionStatus, plan: Option<Plan>) -> Self {
        Self { status, plan }
    }
}

/// Everything a permission decision may look at
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    profile: Option<Profile>,
    account: Option<Account>,
    subscription: Option<Subscription>,
    plan: Option<Plan>,
    limit_defaults: LimitDefaults,
}

impl EvaluationContext {
    pub fn new(limit_defaults: LimitDefaults) -> Self {
        Self {
            limit_defaults,
            ..Self::default()
        }
    }

    /// Context of an unauthenticated caller
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// Plan assigned directly to the account
    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn limit_defaults(&self) -> &LimitDefaults {
        &self.limit_defaults
    }
}

/// Shapes store rows into an [`EvaluationContext`]
#[derive(Clone)]
pub struct ContextResolver {
    store: Arc<dyn MarketplaceStore>,
    limit_defaults: LimitDefaults,
}

impl ContextResolver {
    pub fn new(store: Arc<dyn MarketplaceStore>, limit_defaults: LimitDefaults) -> Self {
        Self {
            store,
            limit_defaults,
        }
    }

    /// Resolve the context of a signed-in profile. Unknown profiles and
    /// profiles without an account yield an anonymous or account-less context.
    pub async fn resolve_for_profile(&self, profile_id: Uuid) -> BillingResult<EvaluationContext> {
        let Some(profile) = self.store.find_profile(profile_id).await? else {
            tracing::debug!(profile_id = %profile_id, "Profile not found, using anonymous context");
            return Ok(EvaluationContext::new(self.limit_defaults));
        };

        match profile.account_id {
            Some(account_id) => self.resolve_for_account(account_id, Some(profile)).await,
            None => Ok(EvaluationContext::new(self.limit_defaults).with_profile(profile)),
        }
    }

    /// Resolve the context of an account, optionally acting through a profile
    pub async fn resolve_for_account(
        &self,
        account_id: Uuid,
        profile: Option<Profile>,
    ) -> BillingResult<EvaluationContext> {
        let mut ctx = EvaluationContext::new(self.limit_defaults);
        if let Some(profile) = profile {
            ctx = ctx.with_profile(profile);
        }

        let Some(account) = self.store.find_account(account_id).await? else {
            tracing::debug!(account_id = %account_id, "Account not found");
            return Ok(ctx);
        };

        let (subscription, plan) = tokio::try_join!(
            self.load_subscription(account_id),
            self.load_plan(account.plan_slug.as_deref()),
        )?;

        if let Some(subscription) = subscription {
            ctx = ctx.with_subscription(subscription);
        }
        if let Some(plan) = plan {
            ctx = ctx.with_plan(plan);
        }
        Ok(ctx.with_account(account))
    }

    async fn load_subscription(&self, account_id: Uuid) -> BillingResult<Option<Subscription>> {
        let Some(row) = self.store.find_subscription(account_id).await? else {
            return Ok(None);
        };
        let status = SubscriptionStatus::from_str_lossy(&row.status);
        let plan = self.load_plan(row.plan_slug.as_deref()).await?;
        Ok(Some(Subscription::new(status, plan)))
    }

    async fn load_plan(&self, slug: Option<&str>) -> BillingResult<Option<Plan>> {
        let Some(slug) = slug else {
            return Ok(None);
        };
        match self.store.find_plan(slug).await? {
            Some(row) => Ok(Some(Plan::from_row(&row))),
            None => {
                tracing::warn!(plan = %slug, "Plan row missing, falling back to tier defaults");
                Ok(Some(Plan::new(slug, Default::default())))
            }
        }
    }
}
