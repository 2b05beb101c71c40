//! Request pipeline.
//!
//! # Responsibilities
//! - Run every request through authentication, rate limiting, the circuit
//!   breaker and the upstream call, in that order
//! - Short-circuit at the first rejection
//! - Report exactly one outcome to exactly one breaker per forwarded request
//!
//! # Design Decisions
//! - Paths with dot segments are refused before anything else; the path is
//!   forwarded exactly as it was matched
//! - Route lookup is pure and done first so the rate class is known, but an
//!   unmatched path is only reported after auth and rate limiting
//! - The body is buffered before a breaker permit is taken; a rejected body
//!   never counts against the backend
//! - The permit travels with the call; cancellation drops it and counts as a failure
//! - The outcome is recorded once the whole response body has arrived

use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, uri::Authority, uri::Scheme, HeaderMap, Request, Uri};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::{AuthError, CallerIdentity, OpenEndpoints, TokenValidator};
use crate::config::{GatewayConfig, DEFAULT_RATE_CLASS};
use crate::error::GatewayError;
use crate::http::request;
use crate::http::upstream::{Upstream, UpstreamError};
use crate::observability::metrics;
use crate::resilience::{
    BreakerRegistry, BreakerState, CallOutcome, CallPermit, CircuitBreaker, FallbackReason,
    FallbackResponder, RetryPolicy,
};
use crate::routing::{Route, RouteTable, ServiceRegistry};
use crate::security::{headers, limits, RateLimiter};

const UNMATCHED_SERVICE: &str = "none";

/// The gateway pipeline. Shared by every request handler.
#[derive(Debug)]
pub struct Dispatcher {
    open_endpoints: OpenEndpoints,
    validator: TokenValidator,
    limiter: Arc<RateLimiter>,
    routes: RouteTable,
    registry: Arc<dyn ServiceRegistry>,
    breakers: Arc<BreakerRegistry>,
    fallback: FallbackResponder,
    upstream: Upstream,
    retry: RetryPolicy,
    max_body_size: usize,
}

impl Dispatcher {
    pub fn from_config(config: &GatewayConfig, registry: Arc<dyn ServiceRegistry>) -> Self {
        Self {
            open_endpoints: OpenEndpoints::new(config.auth.open_endpoints.iter().cloned()),
            validator: TokenValidator::new(config.auth.jwt_secret.as_bytes()),
            limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            routes: RouteTable::from_config(config.routes.clone()),
            registry,
            breakers: Arc::new(BreakerRegistry::new(config.circuit_breaker.clone())),
            fallback: FallbackResponder,
            upstream: Upstream::new(&config.timeouts, config.security.max_response_size),
            retry: RetryPolicy::new(config.retries.clone()),
            max_body_size: config.security.max_body_size,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    pub fn registry(&self) -> &Arc<dyn ServiceRegistry> {
        &self.registry
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Handle one inbound request. Never fails: every outcome is a response.
    pub async fn dispatch(&self, request: Request<Body>, peer: Option<SocketAddr>) -> Response {
        let start = Instant::now();
        let method = request.method().to_string();
        let route = self.routes.match_path(request.uri().path());
        let service = route.map_or(UNMATCHED_SERVICE, |r| r.service.as_str());

        let response = match self.process(request, peer, route).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(kind = err.kind(), error = %err, "Request rejected");
                err.into_response()
            }
        };

        metrics::record_request(&method, response.status().as_u16(), service, start);
        response
    }

    async fn process(
        &self,
        request: Request<Body>,
        peer: Option<SocketAddr>,
        route: Option<&Route>,
    ) -> Result<Response, GatewayError> {
        let path = request.uri().path().to_string();
        limits::check_path(&path)?;

        // 1-3. Authentication, unless the path is open.
        let identity = if self.open_endpoints.is_open(&path) {
            CallerIdentity::unauthenticated(peer.map(|p| p.ip()))
        } else {
            self.authenticate(request.headers()).inspect_err(|e| {
                metrics::record_auth_failure(e.reason());
                tracing::info!(path = %path, reason = e.reason(), "Authentication failed");
            })?
        };

        // 4. Rate limiting.
        let class = route.map_or(DEFAULT_RATE_CLASS, |r| r.rate_class.as_str());
        let admission = self.limiter.admit(&identity.key(), class);
        if !admission.allowed {
            return Err(GatewayError::RateLimited {
                retry_after: admission.retry_after.unwrap_or(Duration::from_secs(1)),
            });
        }

        let route = route.ok_or_else(|| GatewayError::RouteNotFound(path.clone()))?;

        let (parts, body) = request.into_parts();
        let body = limits::read_body(&parts.headers, body, self.max_body_size).await?;

        // 5. Circuit breaker.
        let breaker = self.breakers.get(&route.service);
        let permit = match breaker.try_acquire() {
            Ok(permit) => permit,
            Err(rejected) => {
                tracing::debug!(service = %route.service, state = rejected.state.as_str(), "Short-circuited");
                return Ok(self.degraded(&route.service, FallbackReason::BreakerOpen));
            }
        };

        let Some(authority) = self.registry.resolve(&route.service) else {
            tracing::warn!(service = %route.service, "Service has no registered address");
            permit.record(CallOutcome::Failure);
            return Ok(self.degraded(&route.service, FallbackReason::ConnectionRefused));
        };

        // 6. Forward.
        let uri = match upstream_uri(&authority, &parts.uri) {
            Ok(uri) => uri,
            Err(e) => {
                permit.release();
                return Err(GatewayError::BadRequest(e.to_string()));
            }
        };
        let headers = upstream_headers(&parts.headers, &identity, peer);

        Ok(self
            .forward(&route.service, &breaker, permit, parts, uri, headers, body)
            .await)
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<CallerIdentity, AuthError> {
        let token = request::bearer_token(headers)?;
        let claims = self.validator.validate(token)?;
        Ok(CallerIdentity::Authenticated(claims))
    }

    #[allow(clippy::too_many_arguments)]
    async fn forward(
        &self,
        service: &str,
        breaker: &CircuitBreaker,
        permit: CallPermit,
        parts: Parts,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let request_id = request::request_id(&parts.headers).unwrap_or("unknown").to_string();
        let trial = permit.is_trial();
        let mut attempt = 0;

        let result = loop {
            attempt += 1;
            let mut upstream_request = Request::new(Body::from(body.clone()));
            *upstream_request.method_mut() = parts.method.clone();
            *upstream_request.uri_mut() = uri.clone();
            *upstream_request.headers_mut() = headers.clone();

            match self.upstream.send(upstream_request).await {
                Err(e)
                    if self.retry.should_retry(&parts.method, e.is_connect(), attempt, trial)
                        && breaker.state() == BreakerState::Closed =>
                {
                    let delay = self.retry.delay(attempt);
                    tracing::info!(
                        request_id = %request_id,
                        service = %service,
                        attempt,
                        delay = ?delay,
                        error = %e,
                        "Retrying after connection error"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => break other,
            }
        };

        match result {
            Ok(response) => {
                let status = response.status();
                permit.record(CallOutcome::from_status(status.as_u16()));
                if status.is_server_error() {
                    tracing::warn!(request_id = %request_id, service = %service, status = %status, "Backend error");
                }

                let (mut parts, body) = response.into_parts();
                headers::strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::from(body))
            }
            Err(UpstreamError::ResponseTooLarge { limit }) => {
                // The backend answered in time; the size cap is gateway policy.
                permit.record(CallOutcome::Success);
                tracing::warn!(request_id = %request_id, service = %service, limit, "Upstream response too large");
                GatewayError::ResponseTooLarge { limit }.into_response()
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    service = %service,
                    attempts = attempt,
                    error = %e,
                    "Upstream call failed"
                );
                permit.record(CallOutcome::Failure);
                self.degraded(service, e.fallback_reason())
            }
        }
    }

    fn degraded(&self, service: &str, reason: FallbackReason) -> Response {
        let fallback = self.fallback.respond(service, reason);
        tracing::info!(service = %service, reason = fallback.reason.as_str(), "Serving fallback response");
        metrics::record_fallback(service, fallback.reason.as_str());
        fallback.into_response()
    }
}

fn upstream_uri(authority: &Authority, inbound: &Uri) -> Result<Uri, axum::http::Error> {
    let path_and_query = inbound.path_and_query().map_or("/", |pq| pq.as_str());
    Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(authority.clone())
        .path_and_query(path_and_query)
        .build()
}

fn upstream_headers(inbound: &HeaderMap, identity: &CallerIdentity, peer: Option<SocketAddr>) -> HeaderMap {
    let mut out = inbound.clone();
    headers::strip_hop_by_hop(&mut out);
    headers::strip_identity(&mut out);
    // The client sets Host from the upstream URI.
    out.remove(header::HOST);

    if let Some(claims) = identity.claims() {
        headers::inject_identity(&mut out, claims);
    }
    if let Some(peer) = peer {
        headers::append_forwarded_for(&mut out, peer.ip());
    }
    out
}
