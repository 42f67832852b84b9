use axum::Json;
use axum::{extract::State, http::HeaderMap, response::IntoResponse};
use axum::response::Response;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ProductKind;
use crate::error::ApiError;
use crate::models::purchase::NewPurchase;
use crate::state::AppState;

// Small helper: nested json lookup
fn jget<'a>(val: &'a serde_json::Value, path: &[&str]) -> Option<&'a serde_json::Value> {
    let mut cur = val;
    for key in path {
        cur = cur.get(*key)?;
    }
    Some(cur)
}

fn extract_str<'a>(val: &'a serde_json::Value, path: &[&str]) -> Option<&'a str> {
    jget(val, path)?.as_str()
}

fn extract_i64(val: &serde_json::Value, path: &[&str]) -> Option<i64> {
    jget(val, path)?.as_i64()
}

fn extract_session_id(event: &serde_json::Value) -> Option<String> {
    extract_str(event, &["data", "object", "id"]).map(|s| s.to_string())
}

/// Purchaser attribution: explicit metadata first, then the client reference
/// set at session creation.
fn extract_checkout_user_id(event: &serde_json::Value) -> Option<Uuid> {
    let obj = jget(event, &["data", "object"])?;
    if let Some(uid) = obj
        .get("metadata")
        .and_then(|m| m.get("user_id"))
        .and_then(|v| v.as_str())
    {
        if let Ok(id) = Uuid::parse_str(uid) {
            return Some(id);
        }
    }
    if let Some(id_str) = obj.get("client_reference_id").and_then(|v| v.as_str()) {
        if let Ok(id) = Uuid::parse_str(id_str) {
            return Some(id);
        }
    }
    None
}

fn extract_metadata_price_id(event: &serde_json::Value) -> Option<String> {
    extract_str(event, &["data", "object", "metadata", "price_id"]).map(|s| s.to_string())
}

fn ack() -> Response {
    Json(serde_json::json!({ "received": true })).into_response()
}

// POST /api/stripe-webhook
pub async fn stripe_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let sig = match headers
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
    {
        Some(s) => s,
        None => {
            return ApiError::Signature("missing Stripe-Signature header".into()).into_response()
        }
    };

    // Verification needs the unparsed body; nothing below runs on an
    // unauthenticated payload.
    let evt = match app_state.stripe.verify_webhook(&body, sig) {
        Ok(e) => e,
        Err(err) => {
            warn!(?err, "stripe webhook verification failed");
            return ApiError::from(err).into_response();
        }
    };

    let evt_type = evt.r#type.as_str();
    let payload = &evt.payload;

    if evt_type != "checkout.session.completed" {
        // Acknowledged so the provider does not retry; completion is the only
        // event this service reconciles.
        info!(evt_type, "unhandled stripe event acknowledged");
        return ack();
    }

    let session_id = match extract_session_id(payload) {
        Some(id) => id,
        None => {
            warn!("checkout.session.completed missing session id");
            return ack();
        }
    };

    let user_id = match extract_checkout_user_id(payload) {
        Some(id) => id,
        None => {
            warn!(%session_id, "unable to attribute checkout completion to a user");
            return ack();
        }
    };

    // Product resolution: session metadata first, line-item re-fetch for
    // sessions created without it.
    let price_id = match extract_metadata_price_id(payload) {
        Some(id) => id,
        None => {
            match app_state.stripe.list_line_item_prices(&session_id).await {
                Ok(prices) => match prices.into_iter().next() {
                    Some(id) => id,
                    None => {
                        warn!(%user_id, %session_id, "completed session carries no line items");
                        return ack();
                    }
                },
                Err(err) => {
                    error!(?err, %user_id, %session_id, "failed to fetch line items for completed session");
                    return ApiError::from(err).into_response();
                }
            }
        }
    };

    let kind = match app_state.config.product_for_price(&price_id) {
        Some(kind) => kind,
        None => {
            warn!(%user_id, %session_id, price_id, "completed session for unconfigured price");
            return ack();
        }
    };

    let now = OffsetDateTime::now_utc();
    let applied = match kind {
        ProductKind::Course => app_state.db.mark_course_purchased(user_id, now).await,
        ProductKind::Subscription => app_state.db.activate_subscription(user_id, now).await,
    };
    match applied {
        Ok(true) => {}
        Ok(false) => {
            warn!(%user_id, %session_id, "checkout completion for unknown user record");
            return ack();
        }
        Err(err) => {
            error!(?err, %user_id, %session_id, "failed to apply purchase to user record");
            return ApiError::Store(err).into_response();
        }
    }

    let purchase = NewPurchase {
        user_id,
        product_id: price_id.clone(),
        stripe_session_id: session_id.clone(),
        amount_total: extract_i64(payload, &["data", "object", "amount_total"]),
        currency: extract_str(payload, &["data", "object", "currency"]).map(|s| s.to_string()),
        status: "paid".into(),
    };
    match app_state.purchases.record_purchase(&purchase).await {
        Ok(true) => {
            info!(%user_id, %session_id, price_id, ?kind, "recorded completed purchase");
        }
        Ok(false) => {
            info!(%user_id, %session_id, "duplicate webhook delivery; purchase already recorded");
        }
        Err(err) => {
            error!(?err, %user_id, %session_id, "failed to record purchase");
            return ApiError::Store(err).into_response();
        }
    }

    ack()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::MockDb;
    use crate::services::stripe::MockStripeService;
    use crate::state::test_support::{test_state, COURSE_PRICE, SUBSCRIPTION_PRICE};
    use axum::extract::State as AxumState;
    use axum::http::{HeaderValue, StatusCode};
    use std::sync::Arc;

    fn signed_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Stripe-Signature", HeaderValue::from_static("t=1,v1=stub"));
        headers
    }

    fn completed_event(session_id: &str, user_id: Uuid, price_id: &str) -> axum::body::Bytes {
        let body = serde_json::json!({
            "id": format!("evt_{}", session_id),
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": session_id,
                "metadata": { "user_id": user_id.to_string(), "price_id": price_id },
                "amount_total": 4900,
                "currency": "usd"
            } }
        });
        axum::body::Bytes::from(serde_json::to_vec(&body).unwrap())
    }

    #[tokio::test]
    async fn course_purchase_sets_flag_and_records_ledger_row() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::new().with_user(MockDb::seed_user(user_id)));
        let state = test_state(db.clone(), Arc::new(MockStripeService::new()));

        let resp = stripe_webhook(
            AxumState(state),
            signed_headers(),
            completed_event("cs_test_123", user_id, COURSE_PRICE),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "received": true }));

        let users = db.users.lock().unwrap();
        let user = users.get(&user_id).unwrap();
        assert!(user.course_bought);
        assert!(user.course_purchased_at.is_some());
        assert!(!user.subscription_active);
        assert!(user.subscription_date.is_none());

        let purchases = db.purchases.lock().unwrap();
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].user_id, user_id);
        assert_eq!(purchases[0].product_id, COURSE_PRICE);
        assert_eq!(purchases[0].stripe_session_id, "cs_test_123");
        assert_eq!(purchases[0].amount_total, Some(4900));
        assert_eq!(purchases[0].currency.as_deref(), Some("usd"));
        assert_eq!(purchases[0].status, "paid");
    }

    #[tokio::test]
    async fn subscription_purchase_activates_and_stamps_once() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::new().with_user(MockDb::seed_user(user_id)));
        let state = test_state(db.clone(), Arc::new(MockStripeService::new()));

        let resp = stripe_webhook(
            AxumState(state),
            signed_headers(),
            completed_event("cs_test_sub", user_id, SUBSCRIPTION_PRICE),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let users = db.users.lock().unwrap();
        let user = users.get(&user_id).unwrap();
        assert!(user.subscription_active);
        assert!(user.subscription_date.is_some());
        assert!(!user.course_bought);
        assert!(user.course_purchased_at.is_none());
    }

    #[tokio::test]
    async fn replaying_the_same_event_is_idempotent() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::new().with_user(MockDb::seed_user(user_id)));
        let state = test_state(db.clone(), Arc::new(MockStripeService::new()));

        let first = stripe_webhook(
            AxumState(state.clone()),
            signed_headers(),
            completed_event("cs_test_replay", user_id, COURSE_PRICE),
        )
        .await;
        assert_eq!(first.status(), StatusCode::OK);

        let stamped = db
            .users
            .lock()
            .unwrap()
            .get(&user_id)
            .unwrap()
            .course_purchased_at;

        let second = stripe_webhook(
            AxumState(state),
            signed_headers(),
            completed_event("cs_test_replay", user_id, COURSE_PRICE),
        )
        .await;
        assert_eq!(second.status(), StatusCode::OK);

        let users = db.users.lock().unwrap();
        let user = users.get(&user_id).unwrap();
        assert!(user.course_bought);
        // Set-once: the original timestamp survives the redelivery.
        assert_eq!(user.course_purchased_at, stamped);
        assert_eq!(db.purchases.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_signature_rejects_without_touching_the_store() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::new().with_user(MockDb::seed_user(user_id)));
        let stripe = Arc::new(MockStripeService::new().rejecting_signatures());
        let state = test_state(db.clone(), stripe);

        let resp = stripe_webhook(
            AxumState(state),
            signed_headers(),
            completed_event("cs_test_bad", user_id, COURSE_PRICE),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let users = db.users.lock().unwrap();
        assert!(!users.get(&user_id).unwrap().course_bought);
        assert!(db.purchases.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_signature_header_rejects_without_touching_the_store() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::new().with_user(MockDb::seed_user(user_id)));
        let state = test_state(db.clone(), Arc::new(MockStripeService::new()));

        let resp = stripe_webhook(
            AxumState(state),
            HeaderMap::new(),
            completed_event("cs_test_nosig", user_id, COURSE_PRICE),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let users = db.users.lock().unwrap();
        assert!(!users.get(&user_id).unwrap().course_bought);
        assert!(db.purchases.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_event_types_are_acknowledged_and_ignored() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::new().with_user(MockDb::seed_user(user_id)));
        let state = test_state(db.clone(), Arc::new(MockStripeService::new()));

        let body = serde_json::json!({
            "id": "evt_other",
            "type": "invoice.payment_failed",
            "data": { "object": { "id": "in_123" } }
        });
        let resp = stripe_webhook(
            AxumState(state),
            signed_headers(),
            axum::body::Bytes::from(serde_json::to_vec(&body).unwrap()),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let users = db.users.lock().unwrap();
        let user = users.get(&user_id).unwrap();
        assert!(!user.course_bought && !user.subscription_active);
    }

    #[tokio::test]
    async fn unattributable_event_is_acknowledged_without_updates() {
        let db = Arc::new(MockDb::new());
        let state = test_state(db.clone(), Arc::new(MockStripeService::new()));

        let body = serde_json::json!({
            "id": "evt_anon",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_test_anon", "metadata": {} } }
        });
        let resp = stripe_webhook(
            AxumState(state),
            signed_headers(),
            axum::body::Bytes::from(serde_json::to_vec(&body).unwrap()),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(db.purchases.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn client_reference_id_is_the_attribution_fallback() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::new().with_user(MockDb::seed_user(user_id)));
        let state = test_state(db.clone(), Arc::new(MockStripeService::new()));

        let body = serde_json::json!({
            "id": "evt_ref",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_ref",
                "client_reference_id": user_id.to_string(),
                "metadata": { "price_id": COURSE_PRICE }
            } }
        });
        let resp = stripe_webhook(
            AxumState(state),
            signed_headers(),
            axum::body::Bytes::from(serde_json::to_vec(&body).unwrap()),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(db.users.lock().unwrap().get(&user_id).unwrap().course_bought);
    }

    #[tokio::test]
    async fn line_items_are_refetched_when_metadata_lacks_a_price() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::new().with_user(MockDb::seed_user(user_id)));
        let stripe = Arc::new(
            MockStripeService::new()
                .with_session_line_items("cs_test_li", &[SUBSCRIPTION_PRICE]),
        );
        let state = test_state(db.clone(), stripe.clone());

        let body = serde_json::json!({
            "id": "evt_li",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_li",
                "metadata": { "user_id": user_id.to_string() }
            } }
        });
        let resp = stripe_webhook(
            AxumState(state),
            signed_headers(),
            axum::body::Bytes::from(serde_json::to_vec(&body).unwrap()),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            stripe.line_item_lookups.lock().unwrap().as_slice(),
            &["cs_test_li".to_string()]
        );
        assert!(
            db.users
                .lock()
                .unwrap()
                .get(&user_id)
                .unwrap()
                .subscription_active
        );
    }

    #[tokio::test]
    async fn unconfigured_price_is_acknowledged_without_updates() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::new().with_user(MockDb::seed_user(user_id)));
        let state = test_state(db.clone(), Arc::new(MockStripeService::new()));

        let resp = stripe_webhook(
            AxumState(state),
            signed_headers(),
            completed_event("cs_test_unk", user_id, "price_retired"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let users = db.users.lock().unwrap();
        let user = users.get(&user_id).unwrap();
        assert!(!user.course_bought && !user.subscription_active);
    }

    #[tokio::test]
    async fn store_failure_returns_500_for_provider_retry() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(
            MockDb::new()
                .with_user(MockDb::seed_user(user_id))
                .failing_writes(),
        );
        let state = test_state(db, Arc::new(MockStripeService::new()));

        let resp = stripe_webhook(
            AxumState(state),
            signed_headers(),
            completed_event("cs_test_down", user_id, COURSE_PRICE),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
