//! Authentication for Messmarkt
//!
//! API keys for the public REST API, session JWTs for in-app calls.

pub mod api_key;
pub mod guard;
pub mod session;

pub use api_key::{bearer_token, has_scope, ApiKeyAuthenticator, ApiKeyManager, ApiPrincipal};
pub use guard::{authorize, ApiCall};
pub use session::{SessionError, SessionVerifier};
