//! # API Route Modules
//!
//! - `command` — the write surface:
//!   `POST|PUT|PATCH|DELETE /api/command/{resource}`. Sequences the
//!   pipeline: validation → dispatch → audit → response serialization.
//! - `health` — unauthenticated probes (`/health`, `/info`), mounted
//!   outside the CQRS guard and the auth middleware.

pub mod command;
pub mod health;
