use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::user::PublicUser;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_public_user_by_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PublicUser>, sqlx::Error>;

    /// Upsert the local record for an identity-provider-issued user. Called
    /// on first authenticated contact; purchase flags are never touched here.
    async fn ensure_user(
        &self,
        user_id: Uuid,
        email: &str,
        display_name: &str,
    ) -> Result<PublicUser, sqlx::Error>;

    /// Set `course_bought` and stamp the purchase time once. Replays keep the
    /// original timestamp. Returns false when no such user exists.
    async fn mark_course_purchased(
        &self,
        user_id: Uuid,
        purchased_at: OffsetDateTime,
    ) -> Result<bool, sqlx::Error>;

    /// Set `subscription_active` and stamp the activation time once. Returns
    /// false when no such user exists.
    async fn activate_subscription(
        &self,
        user_id: Uuid,
        activated_at: OffsetDateTime,
    ) -> Result<bool, sqlx::Error>;

    async fn update_display_name(
        &self,
        user_id: Uuid,
        display_name: &str,
    ) -> Result<(), sqlx::Error>;
}
