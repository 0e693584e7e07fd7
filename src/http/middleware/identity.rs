//! Identity stage.
//!
//! Reads the session cookie and attaches the [`Identity`] to the request
//! extensions for [`RequestContext`](crate::http::RequestContext).
//!
//! | cookie                 | outcome                                 |
//! |------------------------|-----------------------------------------|
//! | absent                 | continue anonymously                    |
//! | valid                  | continue with identity                  |
//! | expired                | continue anonymously                    |
//! | tampered or malformed  | 400 via the error handler, cookie cleared |

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::error::HttpError;
use crate::observability::metrics::record_session_failure;
use crate::session::{SessionCodec, SessionError};

pub async fn identity_middleware(
    State(codec): State<Arc<SessionCodec>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    match codec.read(&jar) {
        Ok(identity) => {
            tracing::trace!(user = %identity.name(), "Session identity attached");
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(SessionError::NotPresent) => next.run(req).await,
        Err(SessionError::Expired) => {
            record_session_failure(SessionError::Expired.kind());
            tracing::debug!("Session expired; continuing anonymously");
            next.run(req).await
        }
        Err(err) => {
            record_session_failure(err.kind());
            let jar = jar.add(codec.removal_cookie());
            (jar, HttpError::from(err)).into_response()
        }
    }
}
