#![allow(dead_code)]
use super::{
    CheckoutSession, CreateCheckoutSessionRequest, StripeEvent, StripeService, StripeServiceError,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Default)]
pub struct MockStripeService {
    pub created_sessions: Arc<Mutex<Vec<CheckoutSession>>>,
    pub last_create_requests: Arc<Mutex<Vec<CreateCheckoutSessionRequest>>>,
    pub events: Arc<Mutex<Vec<StripeEvent>>>,
    pub session_line_items: Arc<Mutex<HashMap<String, Vec<String>>>>,
    pub line_item_lookups: Arc<Mutex<Vec<String>>>,
    pub reject_signatures: Arc<Mutex<bool>>,
    pub fail_checkout: Arc<Mutex<bool>>,
}

impl MockStripeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_line_items(self, session_id: &str, price_ids: &[&str]) -> Self {
        self.session_line_items.lock().unwrap().insert(
            session_id.to_string(),
            price_ids.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn rejecting_signatures(self) -> Self {
        *self.reject_signatures.lock().unwrap() = true;
        self
    }

    pub fn failing_checkout(self) -> Self {
        *self.fail_checkout.lock().unwrap() = true;
        self
    }
}

fn make_id(prefix: &str) -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("{}_{}", prefix, ts)
}

#[async_trait]
impl StripeService for MockStripeService {
    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        if *self.fail_checkout.lock().unwrap() {
            return Err(StripeServiceError::Api("checkout unavailable".into()));
        }

        // capture the request
        self.last_create_requests.lock().unwrap().push(req.clone());

        // synthesize a session
        let session = CheckoutSession {
            id: make_id("cs_test"),
            url: Some("https://example.test/checkout".into()),
        };
        self.created_sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        _signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError> {
        if *self.reject_signatures.lock().unwrap() {
            return Err(StripeServiceError::Webhook(
                "signature did not match".into(),
            ));
        }

        let val: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        let id = match val.get("id").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => make_id("evt"),
        };
        let ty = val
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let evt = StripeEvent {
            id,
            r#type: ty,
            payload: val,
        };
        self.events.lock().unwrap().push(evt.clone());
        Ok(evt)
    }

    async fn list_line_item_prices(
        &self,
        session_id: &str,
    ) -> Result<Vec<String>, StripeServiceError> {
        self.line_item_lookups
            .lock()
            .unwrap()
            .push(session_id.to_string());
        Ok(self
            .session_line_items
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}
