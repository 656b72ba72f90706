use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::subscription::{Plan, Subscription};
use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Admin, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super-admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "super-admin" => Ok(Role::SuperAdmin),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub theme: String,
    pub language: String,
    pub email_notifications: bool,
    pub marketing_emails: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            language: "en".to_string(),
            email_notifications: true,
            marketing_emails: false,
        }
    }
}

/// Account record. Credential fields are never serialized.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[sqlx(json)]
    pub subscription: Subscription,
    pub tenant_id: Option<Uuid>,
    #[sqlx(json)]
    pub preferences: UserPreferences,
    pub active: bool,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// True when the password changed after a token issued at `issued_at_ms`.
    pub fn changed_password_after(&self, issued_at_ms: i64) -> bool {
        match self.password_changed_at {
            Some(changed) => changed.timestamp_millis() > issued_at_ms,
            None => false,
        }
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

/// Input for inserting a user. `email` must already be normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub subscription: Subscription,
    pub tenant_id: Option<Uuid>,
    pub preferences: UserPreferences,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role: Role::User,
            subscription: Subscription::new(Plan::Free, Utc::now()),
            tenant_id: None,
            preferences: UserPreferences::default(),
        }
    }
}

/// Partial update; `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub preferences: Option<UserPreferences>,
    pub subscription: Option<Subscription>,
    pub tenant_id: Option<Option<Uuid>>,
    pub active: Option<bool>,
    pub password_hash: Option<String>,
    pub password_changed_at: Option<DateTime<Utc>>,
    /// `Some(None)` clears the reset token and its expiry.
    pub password_reset: Option<Option<(String, DateTime<Utc>)>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.role.is_none()
            && self.preferences.is_none()
            && self.subscription.is_none()
            && self.tenant_id.is_none()
            && self.active.is_none()
            && self.password_hash.is_none()
            && self.password_changed_at.is_none()
            && self.password_reset.is_none()
            && self.last_login_at.is_none()
    }

    /// New password hash, change stamp, and any outstanding reset token cleared.
    pub fn password(hash: String, changed_at: DateTime<Utc>) -> Self {
        Self {
            password_hash: Some(hash),
            password_changed_at: Some(changed_at),
            password_reset: Some(None),
            ..Default::default()
        }
    }

    /// Applies the changes to an in-memory record.
    pub fn apply(self, user: &mut User, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(preferences) = self.preferences {
            user.preferences = preferences;
        }
        if let Some(subscription) = self.subscription {
            user.subscription = subscription;
        }
        if let Some(tenant_id) = self.tenant_id {
            user.tenant_id = tenant_id;
        }
        if let Some(active) = self.active {
            user.active = active;
        }
        if let Some(hash) = self.password_hash {
            user.password_hash = hash;
        }
        if let Some(changed) = self.password_changed_at {
            user.password_changed_at = Some(changed);
        }
        if let Some(reset) = self.password_reset {
            match reset {
                Some((token, expires)) => {
                    user.password_reset_token = Some(token);
                    user.password_reset_expires = Some(expires);
                }
                None => {
                    user.password_reset_token = None;
                    user.password_reset_expires = None;
                }
            }
        }
        if let Some(at) = self.last_login_at {
            user.last_login_at = Some(at);
        }
        user.updated_at = now;
    }
}

/// Criteria for listing users. Only active users are ever listed.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub plan: Option<Plan>,
    /// Case-insensitive match against name or email.
    pub search: Option<String>,
    pub tenant_id: Option<Uuid>,
    pub offset: u64,
    pub limit: u64,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        if !user.active {
            return false;
        }
        if let Some(role) = self.role {
            if user.role != role {
                return false;
            }
        }
        if let Some(plan) = self.plan {
            if user.subscription.plan != plan {
                return false;
            }
        }
        if let Some(tenant_id) = self.tenant_id {
            if user.tenant_id != Some(tenant_id) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !user.name.to_lowercase().contains(&needle) && !user.email.contains(&needle) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$abc$def".into(),
            role: Role::User,
            subscription: Subscription::new(Plan::Free, now),
            tenant_id: None,
            preferences: UserPreferences::default(),
            active: true,
            password_changed_at: None,
            password_reset_token: Some("deadbeef".into()),
            password_reset_expires: Some(now),
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn serialization_hides_credentials() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password_reset_token").is_none());
        assert!(json.get("password_reset_expires").is_none());
        assert_eq!(json["role"], "user");
        assert_eq!(json["subscription"]["plan"], "free");
    }

    #[test]
    fn role_round_trips_through_text() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!(Role::try_from("root".to_string()).is_err());
    }

    #[test]
    fn changed_password_after_compares_milliseconds() {
        let mut user = sample_user();
        let issued = Utc::now().timestamp_millis();
        assert!(!user.changed_password_after(issued));

        user.password_changed_at = Some(Utc::now() + chrono::Duration::milliseconds(5));
        assert!(user.changed_password_after(issued));
        assert!(!user.changed_password_after(issued + 60_000));
    }

    #[test]
    fn password_changes_clear_reset_fields() {
        let mut user = sample_user();
        let now = Utc::now();
        UserChanges::password("new-hash".into(), now).apply(&mut user, now);
        assert_eq!(user.password_hash, "new-hash");
        assert_eq!(user.password_changed_at, Some(now));
        assert!(user.password_reset_token.is_none());
        assert!(user.password_reset_expires.is_none());
    }

    #[test]
    fn filter_excludes_inactive_and_matches_search() {
        let mut user = sample_user();
        let filter = UserFilter {
            search: Some("LOVELACE".into()),
            ..Default::default()
        };
        assert!(filter.matches(&user));

        user.active = false;
        assert!(!filter.matches(&user));
    }
}
