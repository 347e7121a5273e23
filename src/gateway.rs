use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::app::GatewayState;
use crate::authz::Decision;
use crate::errors::AppError;

/// Where the bearer credential travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// `Authorization: Bearer <token>` header.
    BearerHeader,
    /// A cookie with the given name.
    Cookie(String),
}

/// Per-request boundary of the policy engine.
///
/// Extracts the credential from the configured transport, asks the decision
/// engine, and maps the decision onto a concrete response: pass-through,
/// redirect to the login entry point with the original destination preserved,
/// or the app's generic not-found body.
pub async fn gateway_middleware(
    State(state): State<GatewayState>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let token = extract_credential(&state.token_source, req.headers());

    match state.engine.decide(&path, token.as_deref()).await {
        Decision::Allow => next.run(req).await,
        Decision::RedirectLogin => {
            let target = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or(&path);
            let location = format!("{}?next={}", state.login_path, encode_query_value(target));
            Redirect::to(&location).into_response()
        }
        Decision::DenyNotFound => AppError::not_found("resource not found").into_response(),
    }
}

fn extract_credential(source: &TokenSource, headers: &HeaderMap) -> Option<String> {
    match source {
        TokenSource::BearerHeader => headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|value| value.trim().to_string()),
        TokenSource::Cookie(name) => cookie_value(headers, name),
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Percent-encode a value for use inside a query string. Unreserved
/// characters and `/` stay literal so login targets remain readable.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
