//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- Resolves the calling [`Principal`] from a JWT Bearer token.
//! - [`rbac::RequireModerator`] -- Requires at least the `moderator` role.
//!
//! [`Principal`]: portal_core::permissions::Principal

pub mod auth;
pub mod rbac;
