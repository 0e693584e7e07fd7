//! Per-request context handed to route handlers.
//!
//! # Responsibilities
//! - Expose the request's identity (or its absence)
//! - Carry the request span so handler logs are correlated
//! - Collect cookie changes and write them with the response
//! - Produce the final response (`render`, `redirect`)
//!
//! # Design Decisions
//! - `render` and `redirect` consume the context, so nothing can be written
//!   after a response has been produced
//! - Session changes go through `set_identity` / `clear_identity` only
//! - No shared mutable state: one context per request, dropped with it

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::Span;
use url::form_urlencoded;

use crate::error::HttpError;
use crate::http::render::Component;
use crate::http::HX_REQUEST;
use crate::session::{Identity, SessionCodec};

/// Cookie lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CookieError {
    #[error("cookie not found: {0}")]
    NotFound(String),
}

/// Failure producing a response from the context.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("failed to render component")]
    Render(#[from] std::fmt::Error),

    #[error("redirect status must be 3xx, got {0}")]
    RedirectStatus(StatusCode),

    #[error("invalid redirect location: {0}")]
    Location(#[from] header::InvalidHeaderValue),
}

impl From<ResponseError> for HttpError {
    fn from(err: ResponseError) -> Self {
        HttpError::internal(err)
    }
}

/// Everything a handler needs for one request.
pub struct RequestContext {
    identity: Option<Identity>,
    span: Span,
    request_id: String,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    jar: CookieJar,
    status: StatusCode,
    codec: Arc<SessionCodec>,
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
    Arc<SessionCodec>: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get(crate::http::X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            identity: parts.extensions.get::<Identity>().cloned(),
            span: Span::current(),
            request_id,
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            jar: CookieJar::from_headers(&parts.headers),
            status: StatusCode::OK,
            codec: Arc::<SessionCodec>::from_ref(state),
        })
    }
}

impl RequestContext {
    /// The signed-in user, if any.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The request span; events logged inside it carry the request id.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The client asked for a fragment rather than a full page.
    pub fn is_partial(&self) -> bool {
        self.headers.contains_key(HX_REQUEST)
    }

    /// First value of query parameter `key`.
    pub fn query(&self, key: &str) -> Option<String> {
        let query = self.uri.query()?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    pub fn cookie(&self, name: &str) -> Result<String, CookieError> {
        self.jar
            .get(name)
            .map(|c| c.value().to_string())
            .ok_or_else(|| CookieError::NotFound(name.to_string()))
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.jar
    }

    /// Queue a prepared cookie for the response.
    pub fn add_cookie(&mut self, cookie: Cookie<'static>) {
        self.jar = std::mem::take(&mut self.jar).add(cookie);
    }

    /// Queue `name=value` for `max_age`, scoped to the whole site.
    pub fn set_cookie(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        max_age: Duration,
    ) {
        let cookie = Cookie::build((name.into(), value.into()))
            .path("/")
            .http_only(true)
            .secure(true)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(
                i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX),
            ))
            .build();
        self.add_cookie(cookie);
    }

    /// Persist `identity` in the session cookie.
    ///
    /// An encoding failure is logged and the request continues without a
    /// session.
    pub fn set_identity(&mut self, identity: Identity) {
        match self.codec.session_cookie(&identity) {
            Ok(cookie) => {
                self.add_cookie(cookie);
                self.identity = Some(identity);
            }
            Err(err) => {
                tracing::error!(parent: &self.span, error = %err, "Failed to write session cookie");
            }
        }
    }

    /// Remove the session cookie. Idempotent.
    pub fn clear_identity(&mut self) {
        let removal = self.codec.removal_cookie();
        self.add_cookie(removal);
        self.identity = None;
    }

    /// Status used by the next `render`.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Open a child span of the request span, closed by [`SpanHandle::end`]
    /// or on drop.
    pub fn new_span(&self, name: &'static str) -> SpanHandle {
        let span = tracing::info_span!(parent: &self.span, "span", name);
        SpanHandle {
            span,
            name,
            start: Instant::now(),
            ended: false,
        }
    }

    /// Render `component` as the HTML body.
    pub fn render<C>(self, component: &C) -> Result<Response, HttpError>
    where
        C: Component + ?Sized,
    {
        let body = component
            .render_to_string()
            .map_err(ResponseError::from)?;
        Ok((self.status, self.jar, Html(body)).into_response())
    }

    /// Answer with a redirect to `location`.
    pub fn redirect(self, location: &str, status: StatusCode) -> Result<Response, HttpError> {
        if !status.is_redirection() {
            return Err(ResponseError::RedirectStatus(status).into());
        }
        let location = HeaderValue::from_str(location).map_err(ResponseError::from)?;
        Ok((status, self.jar, [(header::LOCATION, location)]).into_response())
    }
}

/// Handle to a span opened with [`RequestContext::new_span`].
pub struct SpanHandle {
    span: Span,
    name: &'static str,
    start: Instant,
    ended: bool,
}

impl SpanHandle {
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Close the span. Further calls do nothing.
    pub fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        tracing::trace!(
            parent: &self.span,
            span = self.name,
            elapsed_us = self.start.elapsed().as_micros() as u64,
            "span ended"
        );
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl Drop for SpanHandle {
    fn drop(&mut self) {
        self.end();
    }
}
