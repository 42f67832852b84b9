use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::ProductKind;
use crate::error::ApiError;
use crate::routes::auth::session::AuthSession;
use crate::services::stripe::{CheckoutLineItem, CheckoutMode, CreateCheckoutSessionRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSessionPayload {
    pub price_id: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSessionResponse {
    pub session_id: String,
    pub url: Option<String>,
}

fn required<'a>(
    field: &'static str,
    value: &'a Option<String>,
) -> Result<&'a str, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::Validation(format!("missing required field: {}", field))),
    }
}

// POST /api/create-checkout-session
pub async fn create_checkout_session(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(payload): Json<CreateCheckoutSessionPayload>,
) -> Result<Json<CreateCheckoutSessionResponse>, ApiError> {
    // All field validation happens before any provider call.
    let price_id = required("priceId", &payload.price_id)?;
    let success_url = required("successUrl", &payload.success_url)?;
    let cancel_url = required("cancelUrl", &payload.cancel_url)?;

    // Redirect targets must stay on this site.
    for (field, url) in [("successUrl", success_url), ("cancelUrl", cancel_url)] {
        if !url.starts_with(&app_state.config.base_url) {
            return Err(ApiError::Validation(format!(
                "{} must be under {}",
                field, app_state.config.base_url
            )));
        }
    }

    let user_id = Uuid::parse_str(&claims.id)
        .map_err(|_| ApiError::Auth("session carries a malformed user id".into()))?;

    // The startup-validated price map is the single authority for which
    // prices are sellable and in which mode.
    let kind = app_state
        .config
        .product_for_price(price_id)
        .ok_or_else(|| ApiError::NotFound(format!("price not found: {}", price_id)))?;
    let mode = match kind {
        ProductKind::Course => CheckoutMode::Payment,
        ProductKind::Subscription => CheckoutMode::Subscription,
    };

    let metadata = [
        ("user_id".to_string(), user_id.to_string()),
        ("price_id".to_string(), price_id.to_string()),
    ]
    .into_iter()
    .collect();

    let session = app_state
        .stripe
        .create_checkout_session(CreateCheckoutSessionRequest {
            success_url: success_url.to_string(),
            cancel_url: cancel_url.to_string(),
            mode,
            line_items: vec![CheckoutLineItem {
                price: price_id.to_string(),
                quantity: 1,
            }],
            client_reference_id: Some(user_id.to_string()),
            metadata: Some(metadata),
        })
        .await?;

    info!(%user_id, price_id, session_id = %session.id, "created checkout session");

    Ok(Json(CreateCheckoutSessionResponse {
        session_id: session.id,
        url: session.url,
    }))
}
