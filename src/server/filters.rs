//! Request filters applied to every route.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use std::fmt;

/// Header carrying the transaction id across services.
pub const TX_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const TX_ID_LENGTH: usize = 20;
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Transaction id of the current request, added to request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionId(pub String);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reuses the caller's `X-Request-Id` or mints a new one, and echoes it back.
pub async fn transaction_id(mut request: Request, next: Next) -> Response {
    let tid = request
        .headers()
        .get(&TX_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(String::from)
        .unwrap_or_else(generate_tid);

    request
        .extensions_mut()
        .insert(TransactionId(tid.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&tid) {
        response.headers_mut().insert(TX_HEADER, value);
    }
    response
}

fn generate_tid() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..TX_ID_LENGTH)
        .map(|_| LETTERS[rng.random_range(0..LETTERS.len())] as char)
        .collect();
    format!("tid_{}", suffix)
}
