use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::user_repository::UserRepository;
use crate::models::user::PublicUser;

pub struct PostgresUserRepository {
    pub pool: PgPool,
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_public_user_by_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PublicUser>, sqlx::Error> {
        let row = sqlx::query_as::<_, PublicUser>(
            r#"
            SELECT id,
                   email,
                   display_name,
                   course_bought,
                   subscription_active,
                   subscription_date
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn ensure_user(
        &self,
        user_id: Uuid,
        email: &str,
        display_name: &str,
    ) -> Result<PublicUser, sqlx::Error> {
        // Identity lives with the provider; email may rotate between visits.
        let row = sqlx::query_as::<_, PublicUser>(
            r#"
            INSERT INTO users (id, email, display_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email
            RETURNING id,
                      email,
                      display_name,
                      course_bought,
                      subscription_active,
                      subscription_date
            "#,
        )
        .bind(user_id)
        .bind(email)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn mark_course_purchased(
        &self,
        user_id: Uuid,
        purchased_at: OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        // Targeted field update; COALESCE keeps the first timestamp on
        // redelivery.
        let result = sqlx::query(
            r#"
            UPDATE users
            SET course_bought = TRUE,
                course_purchased_at = COALESCE(course_purchased_at, $2)
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(purchased_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn activate_subscription(
        &self,
        user_id: Uuid,
        activated_at: OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET subscription_active = TRUE,
                subscription_date = COALESCE(subscription_date, $2)
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(activated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_display_name(
        &self,
        user_id: Uuid,
        display_name: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET display_name = $2 WHERE id = $1")
            .bind(user_id)
            .bind(display_name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
