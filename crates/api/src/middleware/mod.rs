//! Request extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the caller from a JWT Bearer token.
//! - [`rbac::RequireStaff`] -- Requires the staff capability.
//! - [`rbac::RequireAuth`] -- Requires any authenticated user.
//! - [`body::ApiJson`] / [`body::ApiForm`] -- Bodies rejected as JSON 400s.

pub mod auth;
pub mod body;
pub mod rbac;
