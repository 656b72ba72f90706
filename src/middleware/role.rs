use axum::{extract::Request, extract::State, middleware::Next, response::Response};

use super::auth::CurrentUser;
use crate::database::models::Role;
use crate::error::ApiError;

pub const ADMIN_ROLES: &[Role] = &[Role::Admin, Role::SuperAdmin];

/// Role gate. Must run after [`super::require_auth`].
///
/// ```ignore
/// router.route_layer(from_fn_with_state(ADMIN_ROLES, restrict_to))
/// ```
pub async fn restrict_to(
    State(roles): State<&'static [Role]>,
    CurrentUser(user): CurrentUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !user.has_role(roles) {
        tracing::warn!(user_id = %user.id, role = %user.role, "Role check failed");
        return Err(ApiError::permission_denied());
    }
    Ok(next.run(request).await)
}
