//! Shared application state

use std::sync::Arc;

use messmarkt_billing::{ApiRateLimiter, ContextResolver, CounterStore, WebhookVerifier};
use messmarkt_shared::MarketplaceStore;

use crate::auth::{ApiKeyAuthenticator, ApiKeyManager, SessionVerifier};
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn MarketplaceStore>,
    pub resolver: ContextResolver,
    pub api_keys: ApiKeyAuthenticator,
    pub sessions: SessionVerifier,
    pub rate_limiter: ApiRateLimiter,
    pub webhooks: WebhookVerifier,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn MarketplaceStore>,
        counters: Arc<dyn CounterStore>,
    ) -> Self {
        let resolver = ContextResolver::new(Arc::clone(&store), config.limit_defaults);
        let api_keys = ApiKeyAuthenticator::new(
            ApiKeyManager::new(&config.api_key_hmac_secret),
            Arc::clone(&store),
        );
        let sessions = SessionVerifier::new(&config.supabase_jwt_secret);
        let rate_limiter = ApiRateLimiter::new(counters, config.api_rate_limit);
        let webhooks = WebhookVerifier::new(
            config.stripe_webhook_secret.clone(),
            config.stripe_webhook_tolerance_secs,
        );

        Self {
            config: Arc::new(config),
            store,
            resolver,
            api_keys,
            sessions,
            rate_limiter,
            webhooks,
        }
    }
}
