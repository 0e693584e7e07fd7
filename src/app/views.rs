//! Page components and the application error page.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::fmt::{self, Write};

use crate::error::{DefaultErrorHandler, ErrorHandler, HttpError, RequestMeta};
use crate::http::render::{escape, Component};
use crate::session::Identity;

pub const TITLE: &str = "d2s";

const HTMX: &str = "https://unpkg.com/htmx.org@1.9.12";

const LOREM: [&str; 3] = [
    "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod \
     tempor incididunt ut labore et dolore magna aliqua.",
    "Ut enim ad minim veniam, quis nostrud exercitation ullamco laboris nisi \
     ut aliquip ex ea commodo consequat.",
    "Duis aute irure dolor in reprehenderit in voluptate velit esse cillum \
     dolore eu fugiat nulla pariatur.",
];

/// Full HTML document around `body`.
pub struct Layout<'a> {
    pub title: &'a str,
    pub body: &'a dyn Component,
}

impl Component for Layout<'_> {
    fn render(&self, out: &mut String) -> fmt::Result {
        write!(
            out,
            "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
             <title>{}</title><script src=\"{}\"></script></head><body>",
            escape(self.title),
            HTMX
        )?;
        self.body.render(out)?;
        out.write_str("</body></html>")
    }
}

/// Home page: greeting or login link, plus an optional content section.
pub struct Index<'a> {
    pub identity: Option<&'a Identity>,
    pub content: Option<&'a dyn Component>,
}

impl Component for Index<'_> {
    fn render(&self, out: &mut String) -> fmt::Result {
        out.write_str("<main><nav>")?;
        match self.identity {
            Some(identity) => write!(
                out,
                "<span>Hello, {}</span> <a href=\"/auth/logout\">Logout</a>",
                escape(identity.name())
            )?,
            None => out.write_str("<a href=\"/auth/login\">Login with GitHub</a>")?,
        }
        out.write_str(
            "</nav><button hx-get=\"/lorem\" hx-target=\"#content\">Lorem</button>\
             <section id=\"content\">",
        )?;
        if let Some(content) = self.content {
            content.render(out)?;
        }
        out.write_str("</section></main>")
    }
}

/// Static filler served by the cached `/lorem` route.
pub struct Lorem;

impl Component for Lorem {
    fn render(&self, out: &mut String) -> fmt::Result {
        out.write_str("<article>")?;
        for paragraph in LOREM {
            write!(out, "<p>{}</p>", paragraph)?;
        }
        out.write_str("</article>")
    }
}

pub struct ErrorView<'a> {
    pub status: StatusCode,
    pub message: &'a str,
    pub request_id: &'a str,
}

impl Component for ErrorView<'_> {
    fn render(&self, out: &mut String) -> fmt::Result {
        write!(
            out,
            "<div class=\"error\"><h1>{}</h1><p>{}</p><small>request {}</small></div>",
            self.status.as_u16(),
            escape(self.message),
            escape(self.request_id)
        )
    }
}

/// JSON for fragment requests, the site layout otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppErrorHandler;

impl ErrorHandler for AppErrorHandler {
    fn render(&self, meta: &RequestMeta, err: &HttpError) -> Response {
        if meta.partial {
            return DefaultErrorHandler::json(meta, err);
        }
        let view = ErrorView {
            status: err.status(),
            message: err.message(),
            request_id: &meta.request_id,
        };
        let page = Layout {
            title: TITLE,
            body: &view,
        };
        match page.render_to_string() {
            Ok(html) => {
                let mut response = (err.status(), html).into_response();
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                );
                response
            }
            Err(_) => DefaultErrorHandler.render(meta, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn index_greets_the_user() {
        let identity = Identity::new("<Ada>", "ada@example.com", "t");
        let html = Index {
            identity: Some(&identity),
            content: None,
        }
        .render_to_string()
        .unwrap();
        assert!(html.contains("Hello, &lt;Ada&gt;"));
        assert!(html.contains("/auth/logout"));

        let html = Index {
            identity: None,
            content: Some(&Lorem),
        }
        .render_to_string()
        .unwrap();
        assert!(html.contains("/auth/login"));
        assert!(html.contains("Lorem ipsum"));
    }

    #[test]
    fn layout_wraps_the_body() {
        let html = Layout {
            title: TITLE,
            body: &Lorem,
        }
        .render_to_string()
        .unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.ends_with("</body></html>"));
        assert!(html.contains("<article>"));
    }

    #[tokio::test]
    async fn error_page_uses_layout() {
        let meta = RequestMeta {
            method: Method::GET,
            path: "/nope".into(),
            request_id: "req-9".into(),
            partial: false,
        };
        let response = AppErrorHandler.render(&meta, &HttpError::not_found());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("<title>d2s</title>"));
        assert!(html.contains("Not Found"));
        assert!(html.contains("req-9"));
    }
}
