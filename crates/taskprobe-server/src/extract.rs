//! Request extractors: form values and the delivery's attempt context.

use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use taskprobe_core::domain::{AttemptContext, FormPayload};

use crate::error::ApiError;

/// Urlencoded body values first, then the query string, so a body value
/// shadows a query value of the same name.
///
/// Bodies with any other content type are ignored.
#[derive(Debug, Clone, Default)]
pub struct FormValues(pub FormPayload);

impl<S: Send + Sync> FromRequest<S> for FormValues {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let query = req.uri().query().map(str::to_owned);

        let mut payload = if is_urlencoded(req.headers()) {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;
            FormPayload::decode(&body)
        } else {
            FormPayload::new()
        };
        if let Some(query) = query {
            payload.extend_from_encoded(query.as_bytes());
        }
        Ok(Self(payload))
    }
}

fn is_urlencoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
}

/// Platform delivery metadata read from the request headers.
#[derive(Debug, Clone, Default)]
pub struct Attempt(pub AttemptContext);

impl<S: Send + Sync> FromRequestParts<S> for Attempt {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(attempt_from_headers(&parts.headers)))
    }
}

pub fn attempt_from_headers(headers: &HeaderMap) -> AttemptContext {
    AttemptContext::from_header_pairs(
        headers
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?))),
    )
}
