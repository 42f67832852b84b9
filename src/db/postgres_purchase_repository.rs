use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::purchase_repository::PurchaseRepository;
use crate::models::purchase::{NewPurchase, PurchaseRecord};

pub struct PostgresPurchaseRepository {
    pub pool: PgPool,
}

#[async_trait]
impl PurchaseRepository for PostgresPurchaseRepository {
    async fn record_purchase(&self, purchase: &NewPurchase) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO purchases (user_id, product_id, stripe_session_id, amount_total, currency, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (stripe_session_id) DO NOTHING
            "#,
        )
        .bind(purchase.user_id)
        .bind(&purchase.product_id)
        .bind(&purchase.stripe_session_id)
        .bind(purchase.amount_total)
        .bind(&purchase.currency)
        .bind(&purchase.status)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PurchaseRecord>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PurchaseRecord>(
            r#"
            SELECT id,
                   user_id,
                   product_id,
                   stripe_session_id,
                   amount_total,
                   currency,
                   status,
                   created_at
            FROM purchases
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
