//! # topline-core — Command-Pipeline Domain
//!
//! Domain layer for the Topline ERP command service (the write side of a
//! CQRS split — the read side lives in the separate query service).
//!
//! ## What lives here
//!
//! - [`command`] — the command envelope: write method, resource kind,
//!   the immutable [`command::CommandRequest`], and the terminal
//!   [`command::CommandResult`] returned to the gateway exactly once.
//! - [`identity`] — [`identity::CallerIdentity`] derived from a verified
//!   credential; immutable per request.
//! - [`validate`] — per-resource validation rules. A validation pass
//!   collects **every** violated field, not just the first, so a caller
//!   can fix all issues at once. Cross-field checks against reference
//!   data go through the injected [`validate::ReferenceReader`] seam.
//!
//! ## Crate Policy
//!
//! - No I/O and no framework types: the HTTP surface, the database, and
//!   the audit queue live in `topline-api`. Reference-data lookups are a
//!   trait so the API layer can back them with Postgres and tests can
//!   back them with fixtures.
//! - All quantities are validated here; a command that reaches a domain
//!   handler has passed shape validation for its method.

pub mod command;
pub mod identity;
pub mod validate;

pub use command::{
    CommandRequest, CommandResult, CommandStatus, FailureInfo, FailureKind, ResourceKind,
    UnknownResource, WriteMethod,
};
pub use identity::CallerIdentity;
pub use validate::{
    CommandPayload, FieldViolation, NullReferenceReader, ReferenceError, ReferenceReader,
    ValidateError, ValidatedCommand, ValidationError,
};
