#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;

use tenant_admin_api::auth::hash_password;
use tenant_admin_api::config::AppConfig;
use tenant_admin_api::database::models::{NewUser, Role, User};
use tenant_admin_api::database::{MemoryStore, Store, UserRepository};
use tenant_admin_api::mail::{MailError, MailMessage, Mailer};
use tenant_admin_api::services::seed::seed_default_configs;
use tenant_admin_api::{app, AppState};

pub const PASSWORD: &str = "correct-horse-battery";

/// Captures outgoing mail; optionally refuses every message.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<MailMessage>>,
    pub fail: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Delivery("smtp unavailable".into()));
        }
        self.sent.lock().push(message);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Value of the `jwt` cookie set by this response, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|c| c.strip_prefix("jwt="))
            .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
    }

    pub fn set_cookie_header(&self) -> String {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.security.jwt_secret = "integration-test-secret-that-is-long-enough".into();
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config(), RecordingMailer::default()).await
}

pub async fn spawn_app_with(config: AppConfig, mailer: RecordingMailer) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    seed_default_configs(store.as_ref()).await.expect("seed configs");

    let mailer = Arc::new(mailer);
    let state = AppState::new(store.clone() as Arc<dyn Store>, config, mailer.clone());
    TestApp {
        router: app(state.clone()),
        state,
        store,
        mailer,
    }
}

impl TestApp {
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> Result<TestResponse> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7");
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("jwt={}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body from {}", uri))?
        };

        Ok(TestResponse { status, headers, body })
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::GET, uri, None, token).await
    }

    pub async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::POST, uri, Some(body), token).await
    }

    pub async fn patch(&self, uri: &str, body: Value, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::PATCH, uri, Some(body), token).await
    }

    pub async fn put(&self, uri: &str, body: Value, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::PUT, uri, Some(body), token).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::DELETE, uri, None, token).await
    }

    /// Registers through the API and returns the session token and user id.
    pub async fn register(&self, name: &str, email: &str) -> Result<(String, String)> {
        let res = self
            .post(
                "/api/v1/auth/register",
                json!({ "name": name, "email": email, "password": PASSWORD, "password_confirm": PASSWORD }),
                None,
            )
            .await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "register failed: {}", res.body);
        let token = res.session_cookie().context("no session cookie")?;
        let id = res.body["data"]["user"]["id"].as_str().context("no user id")?.to_string();
        Ok((token, id))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TestResponse> {
        self.post("/api/v1/auth/login", json!({ "email": email, "password": password }), None)
            .await
    }

    /// Inserts an account with `role` directly and logs it in.
    pub async fn account_with_role(&self, role: Role, email: &str) -> Result<(String, User)> {
        let mut account = NewUser::new("Staff", email, hash_password(PASSWORD)?);
        account.role = role;
        let user = self.store.create_user(account).await?;

        let res = self.login(email, PASSWORD).await?;
        let token = res.session_cookie().context("admin login set no cookie")?;
        Ok((token, user))
    }
}
