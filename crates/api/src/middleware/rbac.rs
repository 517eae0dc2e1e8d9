//! Admin gate for the portal's management endpoints.

use autobids_core::error::CoreError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// An authenticated user whose `is_admin` flag is set.
///
/// The flag comes from the `users` row loaded by [`AuthUser`], so an admin
/// who is demoted loses access on their next request even with a live token.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        match user.is_admin() {
            true => Ok(RequireAdmin(user)),
            false => Err(AppError::Core(CoreError::Forbidden(
                "Only administrators may do this".into(),
            ))),
        }
    }
}
