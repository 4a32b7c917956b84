use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Axum middleware that gates requests behind the configured API key.
///
/// Auth flow (evaluated in order):
/// 1. No key configured → passthrough
/// 2. `x-api-key` header matches → passthrough
/// 3. `Authorization: Bearer <key>` matches → passthrough
/// 4. None matched → 401 `{"error":"unauthorized"}`
pub async fn require_api_key(State(app): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = app.config.api_key.as_deref() else {
        return next.run(req).await;
    };

    if presented_keys(req.headers()).any(|key| key == expected) {
        return next.run(req).await;
    }

    tracing::warn!(path = %req.uri().path(), "rejected request without valid api key");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "unauthorized" })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn presented_keys(headers: &HeaderMap) -> impl Iterator<Item = &str> {
    let header = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    header.into_iter().chain(bearer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use basex_core::GatewayConfig;
    use tower::ServiceExt;

    fn app(key: Option<&str>) -> Router {
        let mut config = GatewayConfig::default();
        if let Some(key) = key {
            config = config.with_api_key(key);
        }
        let state = AppState::new(config);
        Router::new()
            .route("/v1/api/semantic/action", get(|| async { "ok" }))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
            .with_state(state)
    }

    async fn status(app: Router, header: Option<(&str, &str)>) -> StatusCode {
        let mut builder = axum::http::Request::builder().uri("/v1/api/semantic/action");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        let req = builder.body(Body::empty()).unwrap();
        app.oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn no_key_configured_passes_through() {
        assert_eq!(status(app(None), None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_key_is_rejected() {
        assert_eq!(status(app(Some("secret")), None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_key_is_rejected() {
        let got = status(app(Some("secret")), Some(("x-api-key", "nope"))).await;
        assert_eq!(got, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn header_key_is_accepted() {
        let got = status(app(Some("secret")), Some(("x-api-key", "secret"))).await;
        assert_eq!(got, StatusCode::OK);
    }

    #[tokio::test]
    async fn bearer_key_is_accepted() {
        let got = status(app(Some("secret")), Some(("authorization", "Bearer secret"))).await;
        assert_eq!(got, StatusCode::OK);
    }
}
