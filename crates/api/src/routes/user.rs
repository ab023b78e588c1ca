use axum::{Json, extract::State};
use finadvise_db::models::User;
use serde::Serialize;
use tracing::debug;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Upserts the caller's profile from the identity carried by their token.
pub async fn sync(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.sync(&auth.claims.profile()).await?;
    debug!(user_id = %user.id, "User synced");
    Ok(Json(to_response(user)))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.find(&auth.user_id).await?;
    Ok(Json(to_response(user)))
}

fn to_response(u: User) -> UserResponse {
    UserResponse {
        id: u.id,
        email: u.email,
        first_name: u.first_name,
        last_name: u.last_name,
        full_name: u.full_name,
        image_url: u.image_url,
        created_at: u.created_at.try_to_rfc3339_string().unwrap_or_default(),
        updated_at: u.updated_at.try_to_rfc3339_string().unwrap_or_default(),
    }
}
