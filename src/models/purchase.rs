use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Append-only record of a confirmed checkout, one row per Stripe session.
/// `stripe_session_id` is unique, which makes redelivered webhook events
/// observable as conflict-ignored inserts.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub product_id: String,
    pub stripe_session_id: String,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub user_id: uuid::Uuid,
    pub product_id: String,
    pub stripe_session_id: String,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub status: String,
}
