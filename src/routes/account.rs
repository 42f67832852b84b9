use axum::response::IntoResponse;
use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::purchase::PurchaseRecord;
use crate::models::user::PublicUser;
use crate::responses::JsonResponse;
use crate::routes::auth::session::AuthSession;
use crate::state::AppState;

fn user_id(claims_id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(claims_id)
        .map_err(|_| ApiError::Auth("session carries a malformed user id".into()))
}

// GET /api/health
pub async fn health() -> impl IntoResponse {
    JsonResponse::success("ok")
}

// GET /api/me
//
// Provisions the local record on first authenticated contact; the navbar and
// account widgets render purchase state from this response.
pub async fn handle_me(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Result<Json<PublicUser>, ApiError> {
    let user_id = user_id(&claims.id)?;
    let user = app_state
        .db
        .ensure_user(user_id, &claims.email, &claims.name)
        .await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfilePayload {
    pub display_name: Option<String>,
}

// PUT /api/account/profile
pub async fn update_profile(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user_id(&claims.id)?;
    let display_name = match payload.display_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => {
            return Err(ApiError::Validation(
                "missing required field: displayName".into(),
            ))
        }
    };

    app_state.db.update_display_name(user_id, display_name).await?;
    info!(%user_id, "updated display name");
    Ok(JsonResponse::success("profile updated"))
}

// GET /api/account/purchases
pub async fn list_purchases(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Result<Json<Vec<PurchaseRecord>>, ApiError> {
    let user_id = user_id(&claims.id)?;
    let purchases = app_state.purchases.list_for_user(user_id).await?;
    Ok(Json(purchases))
}
