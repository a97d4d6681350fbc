//! Messmarkt entitlements
//!
//! Plan/tier model, evaluation context, the permission engine, API rate
//! limiting and payment-provider webhook verification.

pub mod context;
pub mod entitlement;
pub mod error;
pub mod plans;
pub mod rate_limit;
pub mod webhook;

pub use context::{ContextResolver, EvaluationContext, Subscription};
pub use entitlement::{Decision, Denial, PermissionSummary};
pub use error::{BillingError, BillingResult};
pub use plans::{Feature, FeatureFlags, Limit, LimitDefaults, LimitKind, Plan, TierLimits};
pub use rate_limit::{
    ApiRateLimiter, CounterStore, InMemoryCounterStore, RateLimitConfig, RateLimitDecision,
    RedisCounterStore,
};
pub use webhook::{WebhookEvent, WebhookVerifier, SIGNATURE_HEADER};
