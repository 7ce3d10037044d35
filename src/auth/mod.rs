//! The `auth` module resolves TLS client certificates into configured
//! identities and carries each identity's read/write topic ACL.

pub mod authenticator;
pub mod identity;

pub use authenticator::{AuthError, Authenticator, Credential};
pub use identity::{Fingerprint, FingerprintError, Identity, IdentityError, IdentityStore};
