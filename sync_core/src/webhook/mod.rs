pub mod auth;
pub mod handlers;
pub mod rate_limit;

pub use handlers::{router, WebhookState};
