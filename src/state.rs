use crate::config::Config;
use crate::db::purchase_repository::PurchaseRepository;
use crate::db::user_repository::UserRepository;
use crate::services::stripe::StripeService;
use crate::utils::jwt::JwtKeys;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn UserRepository>,
    pub purchases: Arc<dyn PurchaseRepository>,
    pub stripe: Arc<dyn StripeService>,
    pub config: Arc<Config>,
    pub jwt_keys: Arc<JwtKeys>,
}
