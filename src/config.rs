use std::collections::BTreeMap;
use std::env;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} is invalid: {1}")]
    Invalid(&'static str, String),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Course,
    Subscription,
}

pub struct StripeSettings {
    pub secret_key: String,
    pub publishable_key: String,
    pub webhook_secret: String,
}

pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub base_url: String,
    pub bind_addr: SocketAddr,
    pub stripe: StripeSettings,
    /// Price-id-to-product mapping, enumerated once at startup. The webhook
    /// reconciler and checkout initiator both resolve prices through this
    /// map rather than re-reading the environment per request.
    prices: BTreeMap<String, ProductKind>,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok(); // Load .env file

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(v) => v
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::Invalid("BIND_ADDR", e.to_string()))?,
            Err(_) => SocketAddr::from(([127, 0, 0, 1], 3000)),
        };

        let course_price_id = require("COURSE_PRICE_ID")?;
        let subscription_price_id = require("SUBSCRIPTION_PRICE_ID")?;
        let prices = build_price_map(course_price_id, subscription_price_id)?;

        Ok(Config {
            database_url: require("DATABASE_URL")?,
            frontend_origin: require("FRONTEND_ORIGIN")?,
            base_url: require("BASE_URL")?,
            bind_addr,
            stripe: StripeSettings {
                secret_key: require("STRIPE_SECRET_KEY")?,
                publishable_key: require("STRIPE_PUBLISHABLE_KEY")?,
                webhook_secret: require("STRIPE_WEBHOOK_SECRET")?,
            },
            prices,
            jwt_secret: require("JWT_SECRET")?,
            jwt_issuer: require("JWT_ISSUER")?,
            jwt_audience: require("JWT_AUDIENCE")?,
        })
    }

    pub fn product_for_price(&self, price_id: &str) -> Option<ProductKind> {
        self.prices.get(price_id).copied()
    }

    pub fn price_for_product(&self, kind: ProductKind) -> Option<&str> {
        self.prices
            .iter()
            .find(|(_, k)| **k == kind)
            .map(|(id, _)| id.as_str())
    }

    #[cfg(test)]
    pub fn for_tests(course_price_id: &str, subscription_price_id: &str) -> Self {
        Config {
            database_url: String::new(),
            frontend_origin: "https://atelier.example.com".into(),
            base_url: "https://atelier.example.com".into(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            stripe: StripeSettings {
                secret_key: "sk_test_stub".into(),
                publishable_key: "pk_test_stub".into(),
                webhook_secret: "whsec_0123456789abcdef0123456789ABCDEF".into(),
            },
            prices: build_price_map(course_price_id.into(), subscription_price_id.into())
                .expect("test price ids should be distinct"),
            jwt_secret: "0123456789abcdef0123456789abcdef".into(),
            jwt_issuer: "test-issuer".into(),
            jwt_audience: "test-audience".into(),
        }
    }
}

fn build_price_map(
    course_price_id: String,
    subscription_price_id: String,
) -> Result<BTreeMap<String, ProductKind>, ConfigError> {
    if course_price_id == subscription_price_id {
        return Err(ConfigError::Invalid(
            "SUBSCRIPTION_PRICE_ID",
            "must differ from COURSE_PRICE_ID".into(),
        ));
    }
    let mut prices = BTreeMap::new();
    prices.insert(course_price_id, ProductKind::Course);
    prices.insert(subscription_price_id, ProductKind::Subscription);
    Ok(prices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_map_resolves_both_products() {
        let config = Config::for_tests("price_course_1", "price_sub_1");
        assert_eq!(
            config.product_for_price("price_course_1"),
            Some(ProductKind::Course)
        );
        assert_eq!(
            config.product_for_price("price_sub_1"),
            Some(ProductKind::Subscription)
        );
        assert_eq!(config.product_for_price("price_other"), None);
    }

    #[test]
    fn price_map_rejects_duplicate_ids() {
        let err = build_price_map("price_x".into(), "price_x".into()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("SUBSCRIPTION_PRICE_ID", _)));
    }

    #[test]
    fn price_for_product_inverts_the_map() {
        let config = Config::for_tests("price_course_1", "price_sub_1");
        assert_eq!(
            config.price_for_product(ProductKind::Course),
            Some("price_course_1")
        );
        assert_eq!(
            config.price_for_product(ProductKind::Subscription),
            Some("price_sub_1")
        );
    }
}
