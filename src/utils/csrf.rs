use axum::{
    body::Body,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use rand_core::RngCore;

/// Double-submit check: unsafe methods must carry an `x-csrf-token` header
/// matching the `csrf_token` cookie. The Stripe webhook route is mounted
/// outside this layer; the provider sends neither.
pub async fn validate_csrf(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    if matches!(
        req.method(),
        &Method::POST | &Method::PUT | &Method::DELETE | &Method::PATCH
    ) {
        let token_header = req
            .headers()
            .get("x-csrf-token")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let jar = CookieJar::from_headers(req.headers());
        let cookie_token = jar.get("csrf_token").map(|c| c.value().to_string());

        match (token_header, cookie_token) {
            (Some(header), Some(cookie)) if header == cookie => Ok(next.run(req).await),
            _ => Err(StatusCode::FORBIDDEN),
        }
    } else {
        Ok(next.run(req).await)
    }
}

pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; 32]; // 256-bit token
    rand_core::OsRng.fill_bytes(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

pub async fn get_csrf_token() -> Response {
    let token = generate_csrf_token();

    let set_cookie_value = format!(
        "csrf_token={}; Path=/; SameSite=Strict; Secure",
        token
    );

    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&set_cookie_value) {
        Ok(value) => {
            headers.insert(SET_COOKIE, value);
        }
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }

    // Body carries the token for the frontend to echo back in the header
    (StatusCode::OK, headers, token).into_response()
}
