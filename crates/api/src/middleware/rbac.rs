//! Capability extractors.
//!
//! Each wraps [`AuthUser`] and rejects callers lacking the capability, so
//! authorization is enforced by the handler signature.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use cantus_core::error::CoreError;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires staff or superuser. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn moderate(RequireStaff(user): RequireStaff) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireStaff(pub AuthUser);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(AppError::Core(CoreError::Forbidden(
                "Staff access required".into(),
            )));
        }
        Ok(RequireStaff(user))
    }
}

/// Requires any authenticated user.
///
/// Equivalent to [`AuthUser`], named so route signatures read as intent.
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        Ok(RequireAuth(user))
    }
}
