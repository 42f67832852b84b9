#![allow(dead_code)]
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::purchase_repository::PurchaseRepository;
use crate::db::user_repository::UserRepository;
use crate::models::purchase::{NewPurchase, PurchaseRecord};
use crate::models::user::{PublicUser, User};

/// In-memory stand-in for both repositories. Mutations are observable
/// through the shared maps and call counters; `fail_writes` simulates a
/// storage outage.
#[derive(Clone, Default)]
pub struct MockDb {
    pub users: Arc<Mutex<HashMap<Uuid, User>>>,
    pub purchases: Arc<Mutex<Vec<PurchaseRecord>>>,
    pub fail_writes: Arc<Mutex<bool>>,
    pub mark_course_calls: Arc<Mutex<usize>>,
    pub activate_subscription_calls: Arc<Mutex<usize>>,
    pub record_purchase_calls: Arc<Mutex<usize>>,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user: User) -> Self {
        self.users.lock().unwrap().insert(user.id, user);
        self
    }

    pub fn failing_writes(self) -> Self {
        *self.fail_writes.lock().unwrap() = true;
        self
    }

    pub fn seed_user(id: Uuid) -> User {
        User {
            id,
            email: "buyer@example.com".into(),
            display_name: "Buyer".into(),
            course_bought: false,
            course_purchased_at: None,
            subscription_active: false,
            subscription_date: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn check_writable(&self) -> Result<(), sqlx::Error> {
        if *self.fail_writes.lock().unwrap() {
            Err(sqlx::Error::PoolClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserRepository for MockDb {
    async fn find_public_user_by_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PublicUser>, sqlx::Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .map(PublicUser::from))
    }

    async fn ensure_user(
        &self,
        user_id: Uuid,
        email: &str,
        display_name: &str,
    ) -> Result<PublicUser, sqlx::Error> {
        self.check_writable()?;
        let mut users = self.users.lock().unwrap();
        let user = users.entry(user_id).or_insert_with(|| User {
            id: user_id,
            email: email.to_string(),
            display_name: display_name.to_string(),
            course_bought: false,
            course_purchased_at: None,
            subscription_active: false,
            subscription_date: None,
            created_at: OffsetDateTime::now_utc(),
        });
        user.email = email.to_string();
        Ok(PublicUser::from(user.clone()))
    }

    async fn mark_course_purchased(
        &self,
        user_id: Uuid,
        purchased_at: OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        self.check_writable()?;
        *self.mark_course_calls.lock().unwrap() += 1;
        let mut users = self.users.lock().unwrap();
        match users.get_mut(&user_id) {
            Some(user) => {
                user.course_bought = true;
                user.course_purchased_at.get_or_insert(purchased_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn activate_subscription(
        &self,
        user_id: Uuid,
        activated_at: OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        self.check_writable()?;
        *self.activate_subscription_calls.lock().unwrap() += 1;
        let mut users = self.users.lock().unwrap();
        match users.get_mut(&user_id) {
            Some(user) => {
                user.subscription_active = true;
                user.subscription_date.get_or_insert(activated_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_display_name(
        &self,
        user_id: Uuid,
        display_name: &str,
    ) -> Result<(), sqlx::Error> {
        self.check_writable()?;
        if let Some(user) = self.users.lock().unwrap().get_mut(&user_id) {
            user.display_name = display_name.to_string();
        }
        Ok(())
    }
}

#[async_trait]
impl PurchaseRepository for MockDb {
    async fn record_purchase(&self, purchase: &NewPurchase) -> Result<bool, sqlx::Error> {
        self.check_writable()?;
        *self.record_purchase_calls.lock().unwrap() += 1;
        let mut purchases = self.purchases.lock().unwrap();
        if purchases
            .iter()
            .any(|p| p.stripe_session_id == purchase.stripe_session_id)
        {
            return Ok(false);
        }
        purchases.push(PurchaseRecord {
            id: Uuid::new_v4(),
            user_id: purchase.user_id,
            product_id: purchase.product_id.clone(),
            stripe_session_id: purchase.stripe_session_id.clone(),
            amount_total: purchase.amount_total,
            currency: purchase.currency.clone(),
            status: purchase.status.clone(),
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(true)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PurchaseRecord>, sqlx::Error> {
        Ok(self
            .purchases
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }
}
