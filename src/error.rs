//! Per-request error shape and its rendering.
//!
//! # Responsibilities
//! - Classify every failure family into an [`HttpError`]
//! - Turn panic payloads into errors (no panic crosses the recovery boundary)
//! - Render errors through a pluggable [`ErrorHandler`]
//!
//! # Data Flow
//! ```text
//! handler → Err(HttpError) → IntoResponse (status + HttpError in extensions)
//!                                   │
//! panic → from_panic ───────────────┤
//!                                   ▼
//!                  recovery stage: log once → ErrorHandler::render
//! ```
//!
//! # Design Decisions
//! - Client-facing messages come from the classification, never from the
//!   cause; the cause is for logs only
//! - Handlers return whole `Response` values, so a body can never be
//!   half-written when the recovery stage takes over

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::any::Any;
use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::AuthError;
use crate::http::render::escape;
use crate::session::SessionError;

/// Message shown to clients for anything unclassified.
pub const INTERNAL_MESSAGE: &str = "Internal Server Error";

type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// A classified request failure.
#[derive(Clone)]
pub struct HttpError {
    status: StatusCode,
    message: Cow<'static, str>,
    cause: Option<Cause>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            message: message.into(),
            cause: None,
        }
    }

    /// 500 with the generic message. The cause is logged, never shown.
    pub fn internal<E>(cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE).with_cause(cause)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found")
    }

    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Convert a panic payload into an internal error.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::internal(PanicError(message))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Stable machine-readable code for structured bodies.
    pub fn code(&self) -> &'static str {
        match self.status {
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::FORBIDDEN => "forbidden",
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::REQUEST_TIMEOUT => "timeout",
            StatusCode::SERVICE_UNAVAILABLE => "unavailable",
            s if s.is_server_error() => "internal_error",
            _ => "error",
        }
    }
}

impl fmt::Debug for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpError")
            .field("status", &self.status.as_u16())
            .field("message", &self.message)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .finish()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl StdError for HttpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn StdError + 'static))
    }
}

impl IntoResponse for HttpError {
    /// Produces a bare response tagged with the error; the recovery stage
    /// replaces the body using the configured [`ErrorHandler`].
    fn into_response(self) -> Response {
        let mut response = (self.status, self.message.to_string()).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<SessionError> for HttpError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidSignature | SessionError::Malformed => {
                HttpError::bad_request("invalid session").with_cause(err)
            }
            SessionError::NotPresent | SessionError::Expired => {
                HttpError::new(StatusCode::UNAUTHORIZED, "not signed in").with_cause(err)
            }
            SessionError::Encoding(_) => HttpError::internal(err),
        }
    }
}

impl From<AuthError> for HttpError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingState | AuthError::InvalidState => {
                HttpError::bad_request("invalid oauth state").with_cause(err)
            }
            AuthError::InvalidCode(_) => HttpError::bad_request("invalid oauth code").with_cause(err),
            AuthError::StateGeneration(_) | AuthError::Provider(_) => HttpError::internal(err),
        }
    }
}

/// Panic converted into an error value.
#[derive(Debug, Error)]
#[error("handler panicked: {0}")]
pub struct PanicError(pub String);

/// What the error handler knows about the failed request.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: Method,
    pub path: String,
    pub request_id: String,
    /// Client asked for a fragment (`Hx-Request`).
    pub partial: bool,
}

/// Renders classified errors into responses.
pub trait ErrorHandler: Send + Sync + 'static {
    fn render(&self, meta: &RequestMeta, err: &HttpError) -> Response;
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
    request_id: &'a str,
}

/// JSON envelope for partial requests, a minimal HTML page otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorHandler;

impl DefaultErrorHandler {
    pub fn json(meta: &RequestMeta, err: &HttpError) -> Response {
        let body = ErrorEnvelope {
            error: ErrorBody {
                code: err.code(),
                message: err.message(),
                request_id: &meta.request_id,
            },
        };
        (err.status(), axum::Json(body)).into_response()
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn render(&self, meta: &RequestMeta, err: &HttpError) -> Response {
        if meta.partial {
            return Self::json(meta, err);
        }
        let page = format!(
            "<!DOCTYPE html><html><head><title>{code} {message}</title></head>\
             <body><h1>{code}</h1><p>{message}</p><small>request {id}</small></body></html>",
            code = err.status().as_u16(),
            message = escape(err.message()),
            id = escape(&meta.request_id),
        );
        let mut response = (err.status(), page).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ProviderError;

    fn meta(partial: bool) -> RequestMeta {
        RequestMeta {
            method: Method::GET,
            path: "/x".into(),
            request_id: "req-1".into(),
            partial,
        }
    }

    #[test]
    fn panic_payloads_become_internal_errors() {
        let err = HttpError::from_panic(Box::new("boom"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), INTERNAL_MESSAGE);
        assert_eq!(err.cause().unwrap().to_string(), "handler panicked: boom");

        let err = HttpError::from_panic(Box::new(String::from("owned")));
        assert!(err.cause().unwrap().to_string().contains("owned"));

        let err = HttpError::from_panic(Box::new(42u8));
        assert!(err.cause().unwrap().to_string().contains("unknown"));
    }

    #[test]
    fn session_errors_are_classified() {
        let err = HttpError::from(SessionError::InvalidSignature);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "invalid session");

        let err = HttpError::from(SessionError::Malformed);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn auth_errors_are_classified() {
        assert_eq!(
            HttpError::from(AuthError::InvalidState).message(),
            "invalid oauth state"
        );
        assert_eq!(
            HttpError::from(AuthError::MissingState).status(),
            StatusCode::BAD_REQUEST
        );

        let code = HttpError::from(AuthError::InvalidCode(ProviderError::Rejected(
            "bad_verification_code".into(),
        )));
        assert_eq!(code.status(), StatusCode::BAD_REQUEST);
        assert_eq!(code.message(), "invalid oauth code");

        let provider = HttpError::from(AuthError::Provider(ProviderError::Rejected(
            "secret detail".into(),
        )));
        assert_eq!(provider.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!provider.message().contains("secret detail"));
        assert!(provider.to_string().contains("secret detail"));
    }

    #[test]
    fn into_response_tags_the_response() {
        let response = HttpError::bad_request("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let tagged = response.extensions().get::<HttpError>().unwrap();
        assert_eq!(tagged.message(), "nope");
    }

    #[tokio::test]
    async fn partial_requests_get_json() {
        let response = DefaultErrorHandler.render(&meta(true), &HttpError::not_found());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "not_found");
        assert_eq!(json["error"]["message"], "Not Found");
        assert_eq!(json["error"]["request_id"], "req-1");
    }

    #[tokio::test]
    async fn full_requests_get_escaped_html() {
        let err = HttpError::bad_request("<script>");
        let response = DefaultErrorHandler.render(&meta(false), &err);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("&lt;script&gt;"));
        assert!(!body.contains("<script>"));
    }
}
