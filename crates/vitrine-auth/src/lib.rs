//! Authentication for the chat-embedded mini-app.
//!
//! The hosting client hands every request an opaque, signed `initData`
//! blob asserting who the user is and when the assertion was issued.
//! [`init_data::validate`] checks the HMAC signature and freshness and
//! extracts the embedded user; [`replay::ReplayGuard`] enforces
//! at-most-once acceptance of a logical order submission.

pub mod error;
pub mod init_data;
pub mod replay;

pub use error::AuthError;
pub use init_data::{parse_init_data, validate, validate_at, TrustCredential, WebAppUser};
pub use replay::{order_fingerprint, ReplayGuard};
