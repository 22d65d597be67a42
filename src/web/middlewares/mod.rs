mod auth;
pub use auth::{AUTH_TOKEN, bearer_token, extract_context_fn};

mod rate_limit;
pub use rate_limit::{RateLimiter, client_key, rate_limit_fn};
