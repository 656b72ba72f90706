use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::record_activity;
use crate::database::models::{
    BillingInfo, Branding, NewActivity, NewTenant, Plan, Tenant, TenantChanges, TenantSettings, TenantSubscription,
    User,
};
use crate::database::{TenantRepository, UserRepository};
use crate::error::ApiError;
use crate::state::AppState;

pub const MIN_SLUG_LEN: usize = 2;
pub const MAX_SLUG_LEN: usize = 63;

pub struct TenantInput {
    pub name: String,
    pub slug: Option<String>,
    pub domain: Option<String>,
    pub owner_id: Uuid,
    pub plan: Option<Plan>,
    pub billing: Option<BillingInfo>,
    pub branding: Option<Branding>,
    pub settings: Option<TenantSettings>,
}

/// Lower-case ASCII alphanumerics separated by single hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('-').to_string()
}

/// Validate slug follows rules
pub fn validate_slug(slug: &str) -> Result<(), ApiError> {
    if slug.len() < MIN_SLUG_LEN || slug.len() > MAX_SLUG_LEN {
        return Err(ApiError::field(
            "slug",
            format!("Slug must be between {} and {} characters", MIN_SLUG_LEN, MAX_SLUG_LEN),
        ));
    }

    // Only allow lower-case alphanumerics and single inner hyphens
    let well_formed = slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--");
    if !well_formed {
        return Err(ApiError::field(
            "slug",
            "Slug can only contain lower-case letters, numbers, and single hyphens",
        ));
    }

    Ok(())
}

/// Host names only: no scheme, port or path.
pub fn normalize_domain(domain: &str) -> Result<String, ApiError> {
    let domain = domain.trim().trim_end_matches('.').to_lowercase();
    let valid = domain.contains('.')
        && domain.len() <= 253
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    if !valid {
        return Err(ApiError::field("domain", "Please provide a valid domain name"));
    }
    Ok(domain)
}

fn validate_tenant_name(name: &str) -> Result<(), ApiError> {
    let len = name.trim().chars().count();
    if len < 2 || len > 100 {
        return Err(ApiError::field("name", "Tenant name must be between 2 and 100 characters"));
    }
    Ok(())
}

/// Creates the tenant and links its owner in one unit of work.
pub async fn create_tenant(state: &AppState, input: TenantInput) -> Result<Tenant, ApiError> {
    validate_tenant_name(&input.name)?;

    let slug = match input.slug {
        Some(slug) => slug.trim().to_string(),
        None => slugify(&input.name),
    };
    validate_slug(&slug)?;
    let domain = input.domain.as_deref().map(normalize_domain).transpose()?;

    let owner = state
        .store
        .find_user(input.owner_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No user found with that ID"))?;

    // an owner keeps a single active tenant
    if let Some(current) = owner.tenant_id {
        if let Some(existing) = state.store.find_tenant(current).await? {
            if existing.owner_id == owner.id {
                return Err(ApiError::bad_request(format!("User already owns tenant {}", existing.slug)));
            }
        }
    }

    let now = Utc::now();
    let subscription = match input.plan {
        Some(plan) => TenantSubscription::new(plan, now),
        None => TenantSubscription::mirror(&owner.subscription),
    };

    let tenant = state
        .store
        .create_tenant(NewTenant {
            name: input.name.trim().to_string(),
            slug,
            domain,
            owner_id: owner.id,
            subscription,
            billing: input.billing.unwrap_or_default(),
            branding: input.branding.unwrap_or_default(),
            settings: input.settings.unwrap_or_default(),
        })
        .await?;

    info!(tenant_id = %tenant.id, owner_id = %owner.id, "Tenant created");
    record_activity(state, NewActivity::new(owner.id, Some(tenant.id), "tenant_create", tenant.slug.as_str())).await;
    Ok(tenant)
}

/// Validates the editable fields of `changes` in place.
pub fn validate_changes(changes: &mut TenantChanges) -> Result<(), ApiError> {
    if let Some(name) = &changes.name {
        validate_tenant_name(name)?;
        changes.name = Some(name.trim().to_string());
    }
    if let Some(slug) = &changes.slug {
        validate_slug(slug)?;
    }
    if let Some(Some(domain)) = &changes.domain {
        changes.domain = Some(Some(normalize_domain(domain)?));
    }
    Ok(())
}

/// The caller's own tenant; 404 when there is none, 403 when they do not own it.
pub async fn owned_tenant(state: &AppState, user: &User) -> Result<Tenant, ApiError> {
    let tenant = match user.tenant_id {
        Some(id) => state.store.find_tenant(id).await?,
        None => None,
    }
    .ok_or_else(|| ApiError::not_found("No tenant found for this user"))?;

    if tenant.owner_id != user.id {
        return Err(ApiError::forbidden("Only the tenant owner can perform this action"));
    }
    Ok(tenant)
}

/// Owner self-service update. Custom domains require a plan that includes them.
pub async fn update_owned_tenant(state: &AppState, user: &User, mut changes: TenantChanges) -> Result<Tenant, ApiError> {
    let tenant = owned_tenant(state, user).await?;
    validate_changes(&mut changes)?;

    if matches!(changes.domain, Some(Some(_))) && !tenant.subscription.features.custom_domain {
        return Err(ApiError::forbidden("Your plan does not include custom domains"));
    }

    let updated = state
        .store
        .update_tenant(tenant.id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("No tenant found with that ID"))?;

    record_activity(state, NewActivity::new(user.id, Some(updated.id), "tenant_update", updated.slug.as_str())).await;
    Ok(updated)
}
