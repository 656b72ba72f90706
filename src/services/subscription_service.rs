//! Plan transitions.
//!
//! The transition functions are pure; [`apply`] persists the result together
//! with the owned tenant's mirror and any invoice in one store call.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::info;

use super::record_activity;
use crate::database::models::invoice::generate_invoice_number;
use crate::database::models::{
    ConfigType, InvoiceItem, InvoiceStatus, NewActivity, NewInvoice, Plan, PlanDefinition, Subscription,
    SubscriptionStatus, TenantSubscription, User,
};
use crate::database::{ConfigRepository, Store, SubscriptionChange, SubscriptionOutcome, TenantRepository};
use crate::error::ApiError;
use crate::state::AppState;

/// Days between issuing an upgrade invoice and its due date.
pub const INVOICE_DUE_DAYS: i64 = 14;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot upgrade from {from} to {to}")]
    NotAnUpgrade { from: Plan, to: Plan },

    #[error("Cannot downgrade from {from} to {to}")]
    NotADowngrade { from: Plan, to: Plan },

    #[error("The free plan cannot be cancelled")]
    FreePlan,

    #[error("Subscription is already cancelled")]
    AlreadyCancelled,

    #[error("Subscription is not cancelled")]
    NotCancelled,
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

/// A requested change to a user's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Upgrade(Plan),
    Downgrade(Plan),
    Cancel,
    Reactivate,
}

impl Transition {
    fn action(&self) -> &'static str {
        match self {
            Transition::Upgrade(_) => "subscription_upgrade",
            Transition::Downgrade(_) => "subscription_downgrade",
            Transition::Cancel => "subscription_cancel",
            Transition::Reactivate => "subscription_reactivate",
        }
    }
}

/// Immediate switch to a higher plan; clears anything pending.
pub fn upgrade(current: &Subscription, target: Plan, now: DateTime<Utc>) -> Result<Subscription, TransitionError> {
    if target <= current.plan {
        return Err(TransitionError::NotAnUpgrade {
            from: current.plan,
            to: target,
        });
    }
    Ok(Subscription::new(target, now))
}

/// Schedules a lower plan for the end of the grace period.
pub fn downgrade(current: &Subscription, target: Plan, now: DateTime<Utc>) -> Result<Subscription, TransitionError> {
    if target >= current.plan {
        return Err(TransitionError::NotADowngrade {
            from: current.plan,
            to: target,
        });
    }
    Ok(Subscription {
        pending_plan: Some(target),
        cancel_at_period_end: false,
        end_date: Some(Subscription::grace_end(now)),
        ..current.clone()
    })
}

pub fn cancel(current: &Subscription, now: DateTime<Utc>) -> Result<Subscription, TransitionError> {
    if current.is_cancelled() || current.cancel_at_period_end {
        return Err(TransitionError::AlreadyCancelled);
    }
    if current.plan == Plan::Free {
        return Err(TransitionError::FreePlan);
    }
    Ok(Subscription {
        cancel_at_period_end: true,
        pending_plan: None,
        end_date: Some(Subscription::grace_end(now)),
        ..current.clone()
    })
}

/// Undoes a pending or completed cancellation, keeping the current plan.
pub fn reactivate(current: &Subscription, now: DateTime<Utc>) -> Result<Subscription, TransitionError> {
    if !current.cancel_at_period_end && !current.is_cancelled() {
        return Err(TransitionError::NotCancelled);
    }
    let start_date = if current.is_cancelled() { now } else { current.start_date };
    Ok(Subscription {
        status: SubscriptionStatus::Active,
        start_date,
        ..Subscription::new(current.plan, now)
    })
}

pub fn transition(
    current: &Subscription,
    requested: Transition,
    now: DateTime<Utc>,
) -> Result<Subscription, TransitionError> {
    match requested {
        Transition::Upgrade(plan) => upgrade(current, plan, now),
        Transition::Downgrade(plan) => downgrade(current, plan, now),
        Transition::Cancel => cancel(current, now),
        Transition::Reactivate => reactivate(current, now),
    }
}

/// Stored plan catalogue, or the built-in one when none has been saved.
pub async fn plan_catalogue(state: &AppState) -> Result<Vec<PlanDefinition>, ApiError> {
    let stored = state.store.find_config(ConfigType::SubscriptionPlans).await?;
    Ok(match stored {
        Some(entry) if !entry.plans.is_empty() => entry.plans,
        _ => PlanDefinition::default_catalogue(),
    })
}

fn upgrade_invoice(user: &User, plan: &PlanDefinition, now: DateTime<Utc>) -> NewInvoice {
    NewInvoice {
        invoice_number: generate_invoice_number(now),
        user_id: user.id,
        tenant_id: user.tenant_id,
        currency: plan.currency.clone(),
        status: InvoiceStatus::Unpaid,
        items: vec![InvoiceItem {
            description: format!("{} plan (monthly)", plan.name),
            quantity: 1,
            unit_amount: plan.price_monthly,
        }],
        issued_at: now,
        due_date: now + Duration::days(INVOICE_DUE_DAYS),
    }
}

/// The user's subscription with any due pending change applied and persisted.
pub async fn current(state: &AppState, user: &User) -> Result<Subscription, ApiError> {
    let mut subscription = user.subscription.clone();
    if subscription.settle(Utc::now()) {
        info!(user_id = %user.id, plan = %subscription.plan, "Pending subscription change settled");
        let outcome = persist(state, user, subscription, None).await?;
        return Ok(outcome.user.subscription);
    }
    Ok(subscription)
}

/// Validates and stores a self-service transition.
pub async fn apply(state: &AppState, user: &User, requested: Transition) -> Result<SubscriptionOutcome, ApiError> {
    let now = Utc::now();
    let mut settled = user.subscription.clone();
    settled.settle(now);

    let next = transition(&settled, requested, now)?;

    let invoice = match requested {
        Transition::Upgrade(plan) if plan.is_paid() => {
            let catalogue = plan_catalogue(state).await?;
            let definition = catalogue
                .iter()
                .find(|p| p.plan == plan)
                .cloned()
                .unwrap_or_else(|| fallback_definition(plan));
            Some(upgrade_invoice(user, &definition, now))
        }
        _ => None,
    };

    let outcome = persist(state, user, next, invoice).await?;
    info!(user_id = %user.id, action = requested.action(), plan = %outcome.user.subscription.plan, "Subscription changed");
    record_activity(
        state,
        NewActivity::new(user.id, user.tenant_id, requested.action(), outcome.user.subscription.plan.as_str()),
    )
    .await;
    Ok(outcome)
}

/// Administrative override: plan and status take effect immediately.
pub async fn set_plan(
    state: &AppState,
    user: &User,
    plan: Plan,
    status: Option<SubscriptionStatus>,
) -> Result<SubscriptionOutcome, ApiError> {
    let mut next = Subscription::new(plan, Utc::now());
    if let Some(status) = status {
        next.status = status;
    }
    persist(state, user, next, None).await
}

fn fallback_definition(plan: Plan) -> PlanDefinition {
    PlanDefinition::default_catalogue()
        .into_iter()
        .find(|p| p.plan == plan)
        .unwrap_or(PlanDefinition {
            plan,
            name: plan.as_str().to_string(),
            description: String::new(),
            price_monthly: 0,
            price_yearly: 0,
            currency: "usd".to_string(),
            highlights: Vec::new(),
            limits: plan.features(),
        })
}

/// Writes the subscription, the tenant mirror when the user owns a tenant,
/// and the invoice in one store transaction.
async fn persist(
    state: &AppState,
    user: &User,
    subscription: Subscription,
    invoice: Option<NewInvoice>,
) -> Result<SubscriptionOutcome, ApiError> {
    let tenant = match user.tenant_id {
        Some(tenant_id) => state
            .store
            .find_tenant(tenant_id)
            .await?
            .filter(|t| t.owner_id == user.id)
            .map(|t| (t.id, TenantSubscription::mirror(&subscription))),
        None => None,
    };

    let change = SubscriptionChange {
        user_id: user.id,
        subscription,
        tenant,
        invoice,
    };
    Ok(state.store.apply_subscription_change(change).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::subscription::GRACE_PERIOD_DAYS;

    fn on(plan: Plan) -> Subscription {
        Subscription::new(plan, Utc::now() - Duration::days(3))
    }

    #[test]
    fn upgrade_requires_higher_plan() {
        let now = Utc::now();
        let up = upgrade(&on(Plan::Free), Plan::Professional, now).unwrap();
        assert_eq!(up.plan, Plan::Professional);
        assert_eq!(up.status, SubscriptionStatus::Active);
        assert_eq!(up.start_date, now);

        let err = upgrade(&on(Plan::Professional), Plan::Starter, now).unwrap_err();
        assert_eq!(err.to_string(), "Cannot upgrade from professional to starter");
        assert!(upgrade(&on(Plan::Starter), Plan::Starter, now).is_err());
    }

    #[test]
    fn upgrade_clears_pending_changes() {
        let now = Utc::now();
        let pending = downgrade(&on(Plan::Professional), Plan::Free, now).unwrap();
        let up = upgrade(&pending, Plan::Enterprise, now).unwrap();
        assert_eq!(up.pending_plan, None);
        assert_eq!(up.end_date, None);
    }

    #[test]
    fn downgrade_is_deferred() {
        let now = Utc::now();
        let down = downgrade(&on(Plan::Enterprise), Plan::Starter, now).unwrap();
        assert_eq!(down.plan, Plan::Enterprise);
        assert_eq!(down.pending_plan, Some(Plan::Starter));
        assert_eq!(down.end_date, Some(now + Duration::days(GRACE_PERIOD_DAYS)));

        let err = downgrade(&on(Plan::Starter), Plan::Enterprise, now).unwrap_err();
        assert_eq!(err.to_string(), "Cannot downgrade from starter to enterprise");
    }

    #[test]
    fn cancel_rules() {
        let now = Utc::now();
        assert_eq!(cancel(&on(Plan::Free), now), Err(TransitionError::FreePlan));

        let cancelled = cancel(&on(Plan::Starter), now).unwrap();
        assert!(cancelled.cancel_at_period_end);
        assert_eq!(cancelled.plan, Plan::Starter);
        assert_eq!(cancel(&cancelled, now), Err(TransitionError::AlreadyCancelled));
    }

    #[test]
    fn reactivate_only_after_cancel() {
        let now = Utc::now();
        assert_eq!(reactivate(&on(Plan::Starter), now), Err(TransitionError::NotCancelled));

        let pending = cancel(&on(Plan::Starter), now).unwrap();
        let back = reactivate(&pending, now).unwrap();
        assert!(!back.cancel_at_period_end);
        assert_eq!(back.end_date, None);
        assert_eq!(back.plan, Plan::Starter);
        assert_eq!(back.start_date, pending.start_date);

        let mut settled = pending.clone();
        assert!(settled.settle(now + Duration::days(GRACE_PERIOD_DAYS + 1)));
        let back = reactivate(&settled, now).unwrap();
        assert_eq!(back.status, SubscriptionStatus::Active);
        assert_eq!(back.plan, Plan::Free);
    }
}
