use axum::{
    http::{header, HeaderName, HeaderValue, Method, Uri},
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{rate_limit, require_auth, restrict_to, ADMIN_ROLES};
use crate::state::AppState;

/// The complete application: operational routes at the root, the versioned
/// API under `/api/v1`, and the global layers.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes(&state))
        .nest("/users", user_routes(&state))
        .nest("/subscriptions", subscription_routes(&state))
        .nest("/config", config_routes(&state))
        .nest("/admin", admin_routes(&state))
        .route("/contact", post(public::contact::submit))
        .layer(from_fn_with_state(state.clone(), rate_limit));

    let body_limit = state.config.api.max_request_size_bytes;
    let cors = cors_layer(&state.config.security);

    Router::new()
        .route("/", get(public::system::root))
        .route("/health", get(public::system::health))
        .nest("/api/v1", api)
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("0"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentialed CORS for the configured origins only.
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    use public::auth;

    let session = Router::new()
        .route("/update-password", patch(protected::auth::update_password))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password/:token", patch(auth::reset_password))
        .merge(session)
}

fn user_routes(state: &AppState) -> Router<AppState> {
    use protected::users;

    Router::new()
        .route("/me", get(users::me).patch(users::update_me).delete(users::delete_me))
        .route("/me/activity", get(users::my_activity))
        .route("/me/tenant", get(users::my_tenant).patch(users::update_my_tenant))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

fn subscription_routes(state: &AppState) -> Router<AppState> {
    use protected::subscriptions;

    Router::new()
        .route("/current", get(subscriptions::current))
        .route("/upgrade", post(subscriptions::upgrade))
        .route("/downgrade", post(subscriptions::downgrade))
        .route("/cancel", post(subscriptions::cancel))
        .route("/reactivate", post(subscriptions::reactivate))
        .route("/invoices", get(subscriptions::invoices))
        .route("/invoices/:id", get(subscriptions::invoice))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

fn config_routes(state: &AppState) -> Router<AppState> {
    use elevated::config;

    // route_layer order: the last layer added runs first
    let admin = Router::new()
        .route("/", get(config::list))
        .route("/:type", get(config::get).put(config::upsert))
        .route_layer(from_fn_with_state(ADMIN_ROLES, restrict_to))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new().route("/plans", get(public::plans::list)).merge(admin)
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    use elevated::{activities, invoices, stats, tenants, users};

    Router::new()
        .route("/stats", get(stats::dashboard))
        .route("/users", get(users::list).post(users::create))
        .route("/users/:id", get(users::get).patch(users::update).delete(users::delete))
        .route("/users/:id/subscription", patch(users::set_subscription))
        .route("/tenants", get(tenants::list).post(tenants::create))
        .route("/tenants/:id", get(tenants::get).patch(tenants::update).delete(tenants::delete))
        .route("/invoices", get(invoices::list))
        .route("/invoices/:id/status", patch(invoices::update_status))
        .route("/activities", get(activities::list))
        .route_layer(from_fn_with_state(ADMIN_ROLES, restrict_to))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Can't find {} on this server!", uri.path()))
}
