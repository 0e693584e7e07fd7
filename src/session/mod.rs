//! Stateless sessions.
//!
//! # Data Flow
//! ```text
//! Request cookie "session"
//!     → codec.rs (verify tag, decode envelope, check age)
//!     → Identity attached to the request by the identity stage
//!
//! Successful login
//!     → RequestContext::set_identity
//!     → codec.rs (encode, sign)
//!     → Set-Cookie on the response
//! ```
//!
//! # Design Decisions
//! - No server-side session table; the cookie is the session
//! - Absent, expired and tampered cookies are distinct outcomes
//! - One signer (signer.rs) is shared with the OAuth state guard

pub mod codec;
pub mod identity;
pub mod signer;

pub use codec::{SessionCodec, SessionError, SESSION_COOKIE};
pub use identity::Identity;
pub use signer::{KeyError, SignatureError, Signer, SigningKey};
