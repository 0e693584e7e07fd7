//! Cache keys.
//!
//! A fingerprint is built from the request line and the vary headers:
//! ```text
//! GET /lorem?a=1&b=2
//! hx-request=true
//! x-other!            ← header absent
//! ```
//! Query pairs are sorted and the refresh key is dropped, so `?b=2&a=1&opn`
//! and `?a=1&b=2` share an entry.

use axum::http::{HeaderMap, HeaderName, Method, Uri};
use std::fmt;
use url::form_urlencoded;

use crate::cache::CacheError;

/// Identity of a cacheable request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Single line for logs.
        f.write_str(&self.0.replace('\n', " | "))
    }
}

/// Which request attributes select a stored response.
#[derive(Debug, Clone)]
pub struct VaryPolicy {
    headers: Vec<HeaderName>,
    refresh_key: String,
}

impl VaryPolicy {
    pub fn new<S: AsRef<str>>(headers: &[S], refresh_key: &str) -> Result<Self, CacheError> {
        let mut names = headers
            .iter()
            .map(|h| {
                HeaderName::try_from(h.as_ref())
                    .map_err(|_| CacheError::InvalidVaryHeader(h.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        names.dedup();

        Ok(Self {
            headers: names,
            refresh_key: refresh_key.to_string(),
        })
    }

    pub fn refresh_key(&self) -> &str {
        &self.refresh_key
    }

    /// Whether the query carries the refresh marker.
    pub fn is_refresh(&self, uri: &Uri) -> bool {
        uri.query().is_some_and(|q| {
            form_urlencoded::parse(q.as_bytes()).any(|(k, _)| k == self.refresh_key.as_str())
        })
    }

    pub fn fingerprint(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Fingerprint {
        let mut key = String::with_capacity(64);
        key.push_str(method.as_str());
        key.push(' ');
        key.push_str(uri.path());

        if let Some(query) = uri.query() {
            let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
                .filter(|(k, _)| k != self.refresh_key.as_str())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if !pairs.is_empty() {
                pairs.sort();
                let encoded = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs)
                    .finish();
                key.push('?');
                key.push_str(&encoded);
            }
        }

        for name in &self.headers {
            key.push('\n');
            key.push_str(name.as_str());

            let mut values = headers.get_all(name).iter().peekable();
            if values.peek().is_none() {
                key.push('!');
                continue;
            }
            key.push('=');
            for (i, value) in values.enumerate() {
                if i > 0 {
                    key.push(',');
                }
                // Opaque bytes keep distinct values distinct.
                match value.to_str() {
                    Ok(v) => key.push_str(v),
                    Err(_) => key.push_str(&hex::encode(value.as_bytes())),
                }
            }
        }

        Fingerprint(key)
    }
}
