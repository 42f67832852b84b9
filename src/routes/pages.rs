use axum::extract::{Query, State};
use axum::response::Html;
use serde::Deserialize;

use crate::state::AppState;

fn page(title: &str, head_extra: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · Atelier</title>
{head_extra}
</head>
<body>
{body}
</body>
</html>"#
    ))
}

// GET /
pub async fn landing(State(app_state): State<AppState>) -> Html<String> {
    let config = &app_state.config;
    let course_price = config
        .price_for_product(crate::config::ProductKind::Course)
        .unwrap_or_default();
    let subscription_price = config
        .price_for_product(crate::config::ProductKind::Subscription)
        .unwrap_or_default();

    let body = format!(
        r#"<nav id="navbar">
  <span class="brand">Atelier</span>
  <span id="account-widget">Sign in to purchase</span>
</nav>
<section id="home">
  <h1>Learn the craft.</h1>
  <p>A complete course on production audio engineering, plus an ongoing membership.</p>
</section>
<section id="pricing">
  <div class="offer">
    <h2>The Course</h2>
    <button class="buy" data-price-id="{course_price}">Buy the course</button>
  </div>
  <div class="offer">
    <h2>Membership</h2>
    <button class="buy" data-price-id="{subscription_price}">Subscribe</button>
  </div>
  <p id="checkout-error" hidden></p>
</section>
<script>
let checkoutInFlight = false;

async function loadAccount() {{
  const res = await fetch('/api/me');
  if (!res.ok) return null;
  const me = await res.json();
  const widget = document.getElementById('account-widget');
  widget.textContent = me.courseBought
    ? me.displayName + ' · course owner'
    : me.subscriptionActive
      ? me.displayName + ' · member'
      : me.displayName;
  return me;
}}

async function startCheckout(priceId) {{
  // One request at a time; the provider page replaces this one.
  if (checkoutInFlight) return;
  checkoutInFlight = true;
  const errorEl = document.getElementById('checkout-error');
  errorEl.hidden = true;
  try {{
    const me = await loadAccount();
    if (!me) {{
      throw new Error('Please sign in before purchasing.');
    }}
    const csrfToken = await (await fetch('/api/csrf-token')).text();
    const res = await fetch('/api/create-checkout-session', {{
      method: 'POST',
      headers: {{ 'content-type': 'application/json', 'x-csrf-token': csrfToken }},
      body: JSON.stringify({{
        priceId,
        successUrl: location.origin + '/success?session_id={{CHECKOUT_SESSION_ID}}',
        cancelUrl: location.origin + '/cancel',
      }}),
    }});
    const data = await res.json();
    if (!res.ok) {{
      throw new Error(data.message || 'Failed to create checkout session');
    }}
    location.assign(data.url);
  }} catch (err) {{
    errorEl.textContent = err.message;
    errorEl.hidden = false;
    checkoutInFlight = false;
  }}
}}

document.querySelectorAll('button.buy').forEach((btn) => {{
  btn.addEventListener('click', () => startCheckout(btn.dataset.priceId));
}});
loadAccount();
</script>"#,
    );
    // Exposed for the provider's browser SDK; harmless to publish.
    let head = format!(
        r#"<meta name="stripe-publishable-key" content="{}">"#,
        config.stripe.publishable_key
    );
    page("Home", &head, &body)
}

#[derive(Debug, Deserialize)]
pub struct SuccessParams {
    pub session_id: Option<String>,
}

// GET /success?session_id=...
pub async fn success(Query(params): Query<SuccessParams>) -> Html<String> {
    let session_note = params
        .session_id
        .map(|id| format!(r#"<p class="session">Reference: <code>{}</code></p>"#, id))
        .unwrap_or_default();
    let body = format!(
        r#"<main class="status success">
  <h1>Payment received</h1>
  <p>Your payment has been processed. Access appears on your account as soon as the payment provider confirms it.</p>
  {session_note}
  <a href="/">Go back home</a>
</main>"#
    );
    page("Payment received", "", &body)
}

// GET /cancel
pub async fn cancel() -> Html<String> {
    let body = r#"<main class="status cancel">
  <h1>Checkout cancelled</h1>
  <p>No payment was taken. You can restart checkout whenever you like.</p>
  <a href="/">Go back home</a>
</main>"#;
    page("Checkout cancelled", "", body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::MockDb;
    use crate::services::stripe::MockStripeService;
    use crate::state::test_support::{test_state, COURSE_PRICE, SUBSCRIPTION_PRICE};
    use axum::extract::State as AxumState;
    use std::sync::Arc;

    #[tokio::test]
    async fn landing_embeds_both_offers_and_the_publishable_key() {
        let state = test_state(Arc::new(MockDb::new()), Arc::new(MockStripeService::new()));
        let Html(html) = landing(AxumState(state)).await;
        assert!(html.contains(COURSE_PRICE));
        assert!(html.contains(SUBSCRIPTION_PRICE));
        assert!(html.contains("pk_test_stub"));
        assert!(html.contains("/api/create-checkout-session"));
    }

    #[tokio::test]
    async fn success_page_echoes_the_session_reference() {
        let Html(html) = success(Query(SuccessParams {
            session_id: Some("cs_test_123".into()),
        }))
        .await;
        assert!(html.contains("cs_test_123"));
        assert!(html.contains("Payment received"));
    }

    #[tokio::test]
    async fn cancel_page_renders() {
        let Html(html) = cancel().await;
        assert!(html.contains("Checkout cancelled"));
    }
}
