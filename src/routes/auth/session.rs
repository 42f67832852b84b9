use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;

use crate::error::ApiError;
use crate::routes::auth::claims::Claims;
use crate::state::AppState;
use crate::utils::jwt::decode_jwt;

/// Identity resolution that never rejects: yields the validated claims or
/// `None` for missing/invalid credentials. Handlers that require a user wrap
/// this through `AuthSession`.
#[derive(Debug, PartialEq)]
pub struct MaybeAuthSession(pub Option<Claims>);

/// Authenticated session; rejects with 401 when no valid credential is
/// presented.
#[derive(Debug, PartialEq)]
pub struct AuthSession(pub Claims);

fn bearer_token(parts: &Parts) -> Option<String> {
    <Authorization<Bearer> as axum_extra::headers::Header>::decode(
        &mut parts
            .headers
            .get_all(axum::http::header::AUTHORIZATION)
            .iter(),
    )
    .ok()
    .map(|auth| auth.token().to_string())
}

impl FromRequestParts<AppState> for MaybeAuthSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get("auth_token")
            .map(|c| c.value().to_string())
            .or_else(|| bearer_token(parts));

        let Some(token) = token else {
            return Ok(MaybeAuthSession(None));
        };

        match decode_jwt(
            &token,
            &state.jwt_keys,
            &state.config.jwt_issuer,
            &state.config.jwt_audience,
        ) {
            Ok(data) => Ok(MaybeAuthSession(Some(data.claims))),
            Err(_) => Ok(MaybeAuthSession(None)),
        }
    }
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybeAuthSession(claims) = MaybeAuthSession::from_request_parts(parts, state)
            .await
            .unwrap_or(MaybeAuthSession(None));

        claims
            .map(AuthSession)
            .ok_or_else(|| ApiError::Auth("authentication required".into()))
    }
}
