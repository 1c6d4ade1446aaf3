//! Bearer credential verification extractor.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use storedesk_shared::ProblemDetails;

use crate::error::Problem;
use crate::state::AppState;

/// Verified caller identity from `Authorization: Bearer <access token>`
#[derive(Debug, Clone)]
pub struct Bearer {
    pub username: String,
}

impl<S> FromRequestParts<S> for Bearer
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Problem;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let app_state = AppState::from_ref(state);
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|v| v.trim().to_string());

        async move {
            let token = token.ok_or_else(|| {
                Problem(ProblemDetails::unauthorized("Missing bearer credential"))
            })?;

            let username = app_state.verify_access(&token).await.ok_or_else(|| {
                tracing::debug!("Rejected expired or unknown bearer credential");
                Problem(ProblemDetails::unauthorized("Access credential expired or unknown"))
            })?;

            Ok(Bearer { username })
        }
    }
}
