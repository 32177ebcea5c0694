//!
//! healthtrack gateway HTTP surface
//! --------------------------------
//! Axum front for the remote-auth adapter. Every endpoint is JSON-only; the
//! rendered pages of the original application are out of scope here.
//!
//! Responsibilities:
//! - Login/logout backed by the `identity` credential validator.
//! - Signed session cookie carrying the flat identity payload.
//! - Per-request identity materialization via `RequestContext`.
//! - Onboarding gate on protected routes while `active` is false.
//! - Explicit profile refresh, the only identity update path besides re-login.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::config::GatewayConfig;
use crate::error::AppError;
use crate::identity::{
    CredentialValidator, RequestContext, SessionPayload, SessionSigner, SESSION_COOKIE,
};

/// Shared server state injected into all handlers.
///
/// There are no session maps here: the session lives entirely in the signed
/// client cookie, so the state is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub validator: Arc<CredentialValidator>,
    pub signer: SessionSigner,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

fn set_session_cookie(value: &str) -> HeaderValue {
    // HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!("{}={}; HttpOnly; SameSite=Strict; Path=/", SESSION_COOKIE, value)).unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!("{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Strict; Path=/", SESSION_COOKIE)).unwrap()
}

fn request_context(state: &AppState, headers: &HeaderMap) -> RequestContext {
    RequestContext::new(state.signer.clone(), parse_cookie(headers, SESSION_COOKIE))
}

fn err_response(e: AppError) -> (StatusCode, HeaderMap, Json<serde_json::Value>) {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, HeaderMap::new(), Json(serde_json::json!({"status": "error", "error": e})))
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    match state.validator.authenticate(&payload.username, &payload.password).await {
        Some(record) => {
            let sealed = state.signer.seal(&SessionPayload::from_record(&record));
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_session_cookie(&sealed));
            (StatusCode::OK, headers, Json(serde_json::json!({"status": "ok", "identity": record})))
        }
        // The cause (rejection vs. timeout vs. malformed body) stays in the
        // logs; the client always sees the same generic message.
        None => err_response(AppError::auth("bad_credentials", "incorrect username or password")),
    }
}

async fn logout(headers: HeaderMap) -> impl IntoResponse {
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    let had_session = parse_cookie(&headers, SESSION_COOKIE).is_some();
    (StatusCode::OK, h, Json(serde_json::json!({"status": "ok", "had_session": had_session})))
}

async fn whoami(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let ctx = request_context(&state, &headers);
    let id = ctx.current_identity();
    (
        StatusCode::OK,
        HeaderMap::new(),
        Json(serde_json::json!({
            "status": "ok",
            "authenticated": id.authenticated,
            "identity": id.record,
            "isStaffEquivalent": id.is_staff_equivalent(),
            "isAdminEquivalent": id.is_admin_equivalent(),
        })),
    )
}

/// Sample protected route. Anonymous callers get 401; authenticated callers
/// whose profile is incomplete (`active == false`) are held at the
/// onboarding gate with 403 until they finish their profile.
async fn panel(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let ctx = request_context(&state, &headers);
    let id = ctx.current_identity();
    if !id.authenticated {
        return err_response(AppError::auth("login_required", "log in to continue"));
    }
    if !id.record.active {
        return err_response(AppError::forbidden("profile_incomplete", "complete your profile to continue"));
    }
    (
        StatusCode::OK,
        HeaderMap::new(),
        Json(serde_json::json!({
            "status": "ok",
            "identifier": id.record.identifier,
            "role": id.record.role.as_str(),
            "isStaffEquivalent": id.is_staff_equivalent(),
        })),
    )
}

/// Re-fetch the profile from the usuarios API and re-seal the session.
async fn profile_refresh(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let ctx = request_context(&state, &headers);
    let id = ctx.current_identity();
    if !id.authenticated {
        return err_response(AppError::auth("login_required", "log in to continue"));
    }
    match state.validator.refresh(&id.record).await {
        Some(fresh) => {
            let sealed = state.signer.seal(&SessionPayload::from_record(&fresh));
            let mut h = HeaderMap::new();
            h.insert("Set-Cookie", set_session_cookie(&sealed));
            (StatusCode::OK, h, Json(serde_json::json!({"status": "ok", "identity": fresh})))
        }
        None => err_response(AppError::transport("refresh_failed", "could not refresh profile")),
    }
}

/// Build the gateway router over the given state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "healthtrack gateway ok" }))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/whoami", get(whoami))
        .route("/panel", get(panel))
        .route("/profile/refresh", post(profile_refresh))
        .with_state(state)
}

/// Start the gateway bound to the configured port.
pub async fn run(cfg: GatewayConfig) -> anyhow::Result<()> {
    let state = AppState {
        validator: Arc::new(CredentialValidator::new(cfg.api.clone())?),
        signer: SessionSigner::new(&cfg.secret),
    };
    let router = app(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!("Starting gateway on {} (usuarios API at {})", addr, cfg.api.base_url);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
