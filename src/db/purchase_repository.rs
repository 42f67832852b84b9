use async_trait::async_trait;
use uuid::Uuid;

use crate::models::purchase::{NewPurchase, PurchaseRecord};

#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    /// Append a purchase row. Returns false when a row for the same Stripe
    /// session already exists, i.e. the webhook delivery was a duplicate.
    async fn record_purchase(&self, purchase: &NewPurchase) -> Result<bool, sqlx::Error>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PurchaseRecord>, sqlx::Error>;
}
