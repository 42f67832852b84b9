use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: uuid::Uuid,
    pub email: String,
    pub display_name: String,
    pub course_bought: bool,
    pub course_purchased_at: Option<time::OffsetDateTime>,
    pub subscription_active: bool,
    pub subscription_date: Option<time::OffsetDateTime>,
    pub created_at: time::OffsetDateTime,
}

/// The slice of the user record the client is allowed to see. The navbar and
/// account widgets render purchase state from exactly these fields.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: uuid::Uuid,
    pub email: String,
    pub display_name: String,
    pub course_bought: bool,
    pub subscription_active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub subscription_date: Option<time::OffsetDateTime>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        PublicUser {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            course_bought: user.course_bought,
            subscription_active: user.subscription_active,
            subscription_date: user.subscription_date,
        }
    }
}
