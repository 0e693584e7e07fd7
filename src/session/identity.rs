//! The authenticated user's minimal profile.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity attached to a request once its session cookie verified.
///
/// Fields are private: an identity is immutable once constructed and is
/// rebuilt from the cookie on every request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    name: String,
    email: String,
    token: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            token: token.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Provider access token. Opaque to this crate.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("token", &"*****")
            .finish()
    }
}
