//! Authentication routes (login, refresh).

use axum::{extract::State, Json};
use storedesk_shared::{CredentialPair, LoginRequest, ProblemDetails, RefreshRequest};

use crate::error::Problem;
use crate::state::AppState;

/// Login with the configured operator account
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<CredentialPair>, Problem> {
    tracing::info!("Logging in user: {}", payload.username);

    if payload.username != state.config.admin_user
        || payload.password != state.config.admin_password
    {
        return Err(Problem(ProblemDetails::unauthorized(
            "Invalid username or password",
        )));
    }

    Ok(Json(state.issue(&payload.username).await))
}

/// Exchange a refresh credential for a new pair
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<CredentialPair>, Problem> {
    match state.rotate(&payload.refresh_token).await {
        Some(pair) => {
            tracing::info!("Rotated credentials");
            Ok(Json(pair))
        }
        None => {
            tracing::info!("Rejected unknown or used refresh credential");
            Err(Problem(ProblemDetails::unauthorized(
                "Refresh credential unknown or already used",
            )))
        }
    }
}
