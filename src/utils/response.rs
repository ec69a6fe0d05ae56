use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

/// Build the error envelope `{"error": kind, "message": ..., ...context}`.
///
/// Context fields sit at the top level of the body so clients can read e.g.
/// `retryAfterSeconds` or the purchase-limit breakdown without unwrapping.
pub fn error(
    kind: &str,
    message: impl Into<String>,
    context: Map<String, Value>,
    status: StatusCode,
) -> Response {
    let mut body = Map::new();
    body.insert("error".to_string(), Value::String(kind.to_string()));
    body.insert("message".to_string(), Value::String(message.into()));
    for (k, v) in context {
        body.insert(k, v);
    }

    (status, Json(Value::Object(body))).into_response()
}

/// 201 for a freshly created resource.
pub fn created<T>(data: T) -> Response
where
    T: Serialize,
{
    (StatusCode::CREATED, Json(data)).into_response()
}

/// 200 for reads and for idempotent replays of earlier creations.
pub fn ok<T>(data: T) -> Response
where
    T: Serialize,
{
    (StatusCode::OK, Json(data)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_envelope_flattens_context() {
        let mut ctx = Map::new();
        ctx.insert("retryAfterSeconds".to_string(), json!(60));
        let response = error(
            "rate_limited",
            "rate limit exceeded",
            ctx,
            StatusCode::TOO_MANY_REQUESTS,
        );
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn created_sets_201() {
        let response = created(json!({"token": "t"}));
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
