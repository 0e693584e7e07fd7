//! Content routes.

use axum::body::{Body, Bytes};
use axum::response::Response;
use futures_util::StreamExt;
use std::convert::Infallible;
use std::time::Duration;

use crate::app::views::{Index, Layout, Lorem, TITLE};
use crate::error::HttpError;
use crate::http::RequestContext;
use crate::session::Identity;

/// How long `/wait` holds its connection open.
const WAIT: Duration = Duration::from_secs(10);

pub async fn index(ctx: RequestContext) -> Result<Response, HttpError> {
    let mut span = ctx.new_span("index");
    let identity = ctx.identity().cloned();
    tracing::debug!(
        parent: span.span(),
        user = identity.as_ref().map(Identity::name),
        "index endpoint"
    );
    span.end();

    let page = Index {
        identity: identity.as_ref(),
        content: None,
    };
    ctx.render(&Layout {
        title: TITLE,
        body: &page,
    })
}

/// Cached for every visitor alike, so the page never shows who is signed in.
pub async fn lorem(ctx: RequestContext) -> Result<Response, HttpError> {
    tracing::debug!(parent: ctx.span(), partial = ctx.is_partial(), "lorem endpoint");
    if ctx.is_partial() {
        return ctx.render(&Lorem);
    }
    let page = Index {
        identity: None,
        content: Some(&Lorem),
    };
    ctx.render(&Layout {
        title: TITLE,
        body: &page,
    })
}

pub async fn panic() -> Response {
    panic!("some unknown reason")
}

pub async fn error() -> Result<Response, HttpError> {
    Err(HttpError::internal(std::io::Error::other(
        "something bad happened",
    )))
}

/// Streams its first line, then holds the connection for [`WAIT`].
pub async fn wait() -> Response {
    let first = futures_util::stream::once(async {
        Ok::<_, Infallible>(Bytes::from_static(b"starting wait\n"))
    });
    let last = futures_util::stream::once(async {
        tokio::time::sleep(WAIT).await;
        Ok::<_, Infallible>(Bytes::from_static(b"ending wait\n"))
    });
    Response::new(Body::from_stream(first.chain(last)))
}

pub async fn not_found() -> HttpError {
    HttpError::not_found()
}
