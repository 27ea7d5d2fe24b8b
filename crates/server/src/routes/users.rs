//! User lookup.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use uuid::Uuid;

use sika_core::{User, UserId};

use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::services::UserService;
use crate::state::AppState;

const INVALID_USER_ID: &str = "invalid user id";

/// Response body for a found user.
#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: User,
}

/// `GET /{id}` - fetch a user by id.
///
/// Ids must be UUIDs. A well-formed id with no matching record gets the same
/// 400 response as a malformed one, so clients cannot tell the two apart.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for malformed or unknown ids and
/// `AppError::Database` for any other store failure.
#[tracing::instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserEnvelope>> {
    if Uuid::parse_str(&id).is_err() {
        return Err(AppError::BadRequest(INVALID_USER_ID.to_string()));
    }
    let id = UserId::parse(&id).map_err(|_| AppError::BadRequest(INVALID_USER_ID.to_string()))?;

    match state.users().get(&id).await {
        Ok(user) => Ok(Json(UserEnvelope { user })),
        Err(RepositoryError::NotFound) => Err(AppError::BadRequest(INVALID_USER_ID.to_string())),
        Err(e) => Err(e.into()),
    }
}
