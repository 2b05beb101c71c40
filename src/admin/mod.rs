//! Admin API.
//!
//! Read-only views of gateway state on a separate listener, guarded by a
//! bearer API key.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Instant;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::resilience::BreakerRegistry;
use crate::routing::ServiceRegistry;
use crate::security::RateLimiter;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub breakers: Arc<BreakerRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub registry: Arc<dyn ServiceRegistry>,
    pub started_at: Instant,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(
        breakers: Arc<BreakerRegistry>,
        limiter: Arc<RateLimiter>,
        registry: Arc<dyn ServiceRegistry>,
        api_key: &str,
    ) -> Self {
        Self {
            breakers,
            limiter,
            registry,
            started_at: Instant::now(),
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breakers", get(get_breakers))
        .route("/admin/rate-limits", get(get_rate_limits))
        .route("/admin/services", get(get_services))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, RateLimitConfig, ServiceConfig};
    use crate::resilience::CallOutcome;
    use crate::routing::StaticRegistry;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn state() -> AdminState {
        AdminState::new(
            Arc::new(BreakerRegistry::new(CircuitBreakerConfig::default())),
            Arc::new(RateLimiter::new(RateLimitConfig::default())),
            Arc::new(StaticRegistry::from_config(&[ServiceConfig::new(
                "weather-service",
                "127.0.0.1:9001",
            )])),
            "admin-secret-key",
        )
    }

    fn get(path: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(path);
        if let Some(key) = key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_key() {
        let router = setup_admin_router(state());

        let response = router.clone().oneshot(get("/admin/status", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router.oneshot(get("/admin/status", Some("nope"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn status_reports_operational() {
        let router = setup_admin_router(state());
        let response = router
            .oneshot(get("/admin/status", Some("admin-secret-key")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["status"], "operational");
    }

    #[tokio::test]
    async fn breakers_show_open_state() {
        let state = state();
        let breaker = state.breakers.get("weather-service");
        for _ in 0..5 {
            breaker.try_acquire().unwrap().record(CallOutcome::Failure);
        }

        let response = setup_admin_router(state)
            .oneshot(get("/admin/breakers", Some("admin-secret-key")))
            .await
            .unwrap();
        let body = json(response).await;
        assert_eq!(body[0]["service"], "weather-service");
        assert_eq!(body[0]["state"], "OPEN");
    }

    #[tokio::test]
    async fn services_and_rate_limits() {
        let state = state();
        state.limiter.admit("sub:42", "default");
        let router = setup_admin_router(state);

        let services = json(
            router
                .clone()
                .oneshot(get("/admin/services", Some("admin-secret-key")))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(services[0]["name"], "weather-service");
        assert_eq!(services[0]["address"], "127.0.0.1:9001");

        let limits = json(
            router
                .oneshot(get("/admin/rate-limits", Some("admin-secret-key")))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(limits["buckets"], 1);
        assert_eq!(limits["classes"]["default"]["capacity"], 20);
    }
}
