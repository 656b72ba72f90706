pub mod auth;
pub mod extract;
pub mod rate_limit;
pub mod response;
pub mod role;

pub use auth::{require_auth, CurrentUser};
pub use extract::{JsonBody, QueryParams};
pub use rate_limit::{rate_limit, RateLimiter};
pub use response::ApiResponse;
pub use role::{restrict_to, ADMIN_ROLES};
