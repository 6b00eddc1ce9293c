//! # Caller Identity
//!
//! Identity of the authenticated caller, derived from a verified
//! credential. Immutable for the lifetime of a request and never
//! persisted by this crate — the audit log in the API layer records a
//! projection of it.

use serde::{Deserialize, Serialize};

/// The authenticated caller behind a command request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// User id from the identity store (the `sub` claim).
    pub id: i64,
    /// The caller's email address.
    pub email: String,
    /// Role names granted to the caller.
    pub roles: Vec<String>,
}

impl CallerIdentity {
    /// Check whether the caller holds the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
