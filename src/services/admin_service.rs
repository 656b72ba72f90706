//! Rules for administrators acting on other accounts.

use chrono::Utc;
use tracing::info;

use super::auth_service::hash;
use super::record_activity;
use super::validation::{normalize_email, validate_email_format, validate_name, validate_new_password};
use crate::database::models::{
    DashboardStats, NewActivity, NewUser, Plan, Role, Subscription, User, UserChanges, UserPreferences,
};
use crate::database::{Store, UserRepository};
use crate::error::ApiError;
use crate::state::AppState;

/// An account created by an administrator.
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub plan: Option<Plan>,
}

/// Profile fields an administrator may change on another account.
#[derive(Default)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub preferences: Option<UserPreferences>,
    pub active: Option<bool>,
}

/// Only a super-admin may act on a super-admin account.
pub fn ensure_can_manage(actor: &User, target: &User) -> Result<(), ApiError> {
    if target.role == Role::SuperAdmin && actor.role != Role::SuperAdmin {
        return Err(ApiError::forbidden("Only a super-admin can modify a super-admin account"));
    }
    Ok(())
}

/// Only a super-admin may hand out the super-admin role.
pub fn ensure_can_grant(actor: &User, role: Role) -> Result<(), ApiError> {
    if role == Role::SuperAdmin && actor.role != Role::SuperAdmin {
        return Err(ApiError::forbidden("Only a super-admin can grant the super-admin role"));
    }
    Ok(())
}

pub async fn dashboard(state: &AppState) -> Result<DashboardStats, ApiError> {
    Ok(state.store.dashboard_stats().await?)
}

pub async fn create_account(state: &AppState, actor: &User, input: NewAccount) -> Result<User, ApiError> {
    let role = input.role.unwrap_or(Role::User);
    ensure_can_grant(actor, role)?;

    validate_name(&input.name)?;
    let email = normalize_email(&input.email);
    validate_email_format(&email)?;
    validate_new_password(&input.password, &input.password)?;

    let mut account = NewUser::new(input.name.trim(), email, hash(input.password).await?);
    account.role = role;
    if let Some(plan) = input.plan {
        account.subscription = Subscription::new(plan, Utc::now());
    }

    let user = state.store.create_user(account).await?;
    info!(user_id = %user.id, actor_id = %actor.id, role = %user.role, "Account created by admin");
    record_activity(state, NewActivity::new(actor.id, actor.tenant_id, "admin_create_user", user.id.to_string())).await;
    Ok(user)
}

pub async fn update_account(
    state: &AppState,
    actor: &User,
    target: &User,
    update: AccountUpdate,
) -> Result<User, ApiError> {
    ensure_can_manage(actor, target)?;
    if let Some(role) = update.role {
        ensure_can_grant(actor, role)?;
    }

    let mut changes = UserChanges {
        role: update.role,
        preferences: update.preferences,
        active: update.active,
        ..Default::default()
    };
    if let Some(name) = update.name {
        validate_name(&name)?;
        changes.name = Some(name.trim().to_string());
    }
    if let Some(email) = update.email {
        let email = normalize_email(&email);
        validate_email_format(&email)?;
        changes.email = Some(email);
    }
    if changes.is_empty() {
        return Ok(target.clone());
    }

    let user = state
        .store
        .update_user(target.id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("No user found with that ID"))?;
    record_activity(state, NewActivity::new(actor.id, actor.tenant_id, "admin_update_user", user.id.to_string())).await;
    Ok(user)
}

/// Soft delete; the account stays in storage with `active = false`.
pub async fn deactivate_account(state: &AppState, actor: &User, target: &User) -> Result<(), ApiError> {
    ensure_can_manage(actor, target)?;
    let changes = UserChanges {
        active: Some(false),
        ..Default::default()
    };
    state
        .store
        .update_user(target.id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("No user found with that ID"))?;

    info!(user_id = %target.id, actor_id = %actor.id, "Account deactivated by admin");
    record_activity(state, NewActivity::new(actor.id, actor.tenant_id, "admin_delete_user", target.id.to_string())).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn with_role(role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "x".into(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: String::new(),
            role,
            subscription: Subscription::default(),
            tenant_id: None,
            preferences: UserPreferences::default(),
            active: true,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn admins_cannot_touch_super_admins() {
        let admin = with_role(Role::Admin);
        let root = with_role(Role::SuperAdmin);
        assert!(ensure_can_manage(&admin, &root).is_err());
        assert!(ensure_can_manage(&root, &root).is_ok());
        assert!(ensure_can_manage(&admin, &with_role(Role::User)).is_ok());
    }

    #[test]
    fn only_super_admins_grant_super_admin() {
        assert_eq!(
            ensure_can_grant(&with_role(Role::Admin), Role::SuperAdmin).unwrap_err().status_code(),
            403
        );
        assert!(ensure_can_grant(&with_role(Role::Admin), Role::Admin).is_ok());
        assert!(ensure_can_grant(&with_role(Role::SuperAdmin), Role::SuperAdmin).is_ok());
    }
}
