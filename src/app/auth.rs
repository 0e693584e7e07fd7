//! Login, callback and logout handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;

use crate::auth::AuthError;
use crate::error::HttpError;
use crate::http::{AppState, RequestContext};

/// Start the provider round trip.
pub async fn login(
    State(state): State<AppState>,
    mut ctx: RequestContext,
) -> Result<Response, HttpError> {
    let (token, cookie) = state.state_guard.issue()?;
    ctx.add_cookie(cookie);
    let url = state.provider.auth_code_url(token.value());
    ctx.redirect(&url, StatusCode::TEMPORARY_REDIRECT)
}

/// Dev-mode login with the configured access token.
pub async fn login_bypass(
    State(state): State<AppState>,
    mut ctx: RequestContext,
) -> Result<Response, HttpError> {
    let Some(token) = state.config.oauth.bypass_token.as_deref() else {
        return Err(HttpError::not_found());
    };
    let identity = state
        .provider
        .fetch_user(token)
        .await
        .map_err(AuthError::Provider)?;
    tracing::info!(parent: ctx.span(), user = %identity.name(), "Signed in with bypass token");
    ctx.set_identity(identity);
    ctx.redirect("/", StatusCode::TEMPORARY_REDIRECT)
}

/// Provider redirect target. The state is checked before the code is used.
pub async fn callback(
    State(state): State<AppState>,
    mut ctx: RequestContext,
) -> Result<Response, HttpError> {
    let removal = state
        .state_guard
        .validate(ctx.cookies(), ctx.query("state").as_deref())?;
    ctx.add_cookie(removal);

    let code = ctx.query("code").unwrap_or_default();
    let token = state
        .provider
        .exchange(&code)
        .await
        .map_err(AuthError::InvalidCode)?;
    let identity = state
        .provider
        .fetch_user(&token)
        .await
        .map_err(AuthError::Provider)?;

    tracing::info!(parent: ctx.span(), user = %identity.name(), "Signed in through OAuth provider");
    ctx.set_identity(identity);
    ctx.redirect("/", StatusCode::TEMPORARY_REDIRECT)
}

pub async fn logout(mut ctx: RequestContext) -> Result<Response, HttpError> {
    ctx.clear_identity();
    ctx.redirect("/", StatusCode::TEMPORARY_REDIRECT)
}
