//! Admission gate middleware.
//!
//! The gate is the only component that talks to both the rate limiter and
//! the principal directory. Per request it extracts the credential, probes
//! the existing quota window, bootstraps a fresh one on first sight of a
//! credential, and either forwards the request to the protected handler or
//! rejects it with a status the caller can act on (403 auth, 429 throttle,
//! 500 internal).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, warn};

use crate::config::RateLimitingConfig;
use crate::directory::PrincipalDirectory;
use crate::error::GateError;
use crate::ratelimit::{LimiterError, Probe, SharedRateLimiter, WindowKey};
use crate::store::CounterStore;

/// Primary credential carrier.
const API_KEY_HEADER: &str = "x-api-key";
/// Fallback credential carrier.
const API_KEY_PARAM: &str = "api_key";
/// Response header reporting the quota left in the current window.
const REMAINING_HEADER: &str = "ratelimit-remaining";

/// Request-level orchestrator for quota admission.
pub struct AdmissionGate<S> {
    limiter: SharedRateLimiter<S>,
    directory: Arc<dyn PrincipalDirectory>,
    namespace: String,
    resource: String,
    window_period: Duration,
}

impl<S: CounterStore> AdmissionGate<S> {
    /// Create a new admission gate.
    pub fn new(
        limiter: SharedRateLimiter<S>,
        directory: Arc<dyn PrincipalDirectory>,
        config: &RateLimitingConfig,
    ) -> Self {
        Self {
            limiter,
            directory,
            namespace: config.namespace.clone(),
            resource: config.resource.clone(),
            window_period: config.window_period(),
        }
    }

    /// Resolve `credential` to a post-decrement remaining count,
    /// bootstrapping a quota window on first sight.
    ///
    /// A negative count means the window is exhausted and the request must
    /// be rejected; the count is still reported so callers see how far
    /// over quota they are.
    pub async fn check(&self, credential: &str) -> Result<i64, GateError> {
        let key = WindowKey::new(&self.namespace, &self.resource, credential);

        match self.limiter.allow_if_tracked(&key).await {
            Ok(Probe::Tracked(remaining)) => Ok(remaining),
            Ok(Probe::Untracked) => self.bootstrap(&key, credential).await,
            Err(e) => Err(map_limiter_error(e)),
        }
    }

    async fn bootstrap(&self, key: &WindowKey, credential: &str) -> Result<i64, GateError> {
        let principal = self
            .directory
            .find_by_credential(credential)
            .await
            .map_err(|e| {
                warn!(error = %e, "principal directory lookup failed");
                GateError::DirectoryUnavailable(e.to_string())
            })?;

        let Some(principal) = principal else {
            debug!("unknown api key, rejecting");
            return Err(GateError::CredentialInvalid);
        };

        self.limiter
            .allow_new(key, principal.quota_per_window, self.window_period)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to bootstrap quota window");
                map_limiter_error(e)
            })
    }
}

fn map_limiter_error(err: LimiterError) -> GateError {
    match err {
        LimiterError::Decode(e) => GateError::StoreDecodeError(e.to_string()),
        other => GateError::StoreUnavailable(other.to_string()),
    }
}

/// Axum middleware enforcing the quota before the protected handler runs.
///
/// Admitted requests pass through untouched except for the
/// `RateLimit-Remaining` response header, which is also attached to 429
/// rejections so throttled callers can see the window state.
pub async fn admit<S: CounterStore + 'static>(
    State(gate): State<Arc<AdmissionGate<S>>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(credential) = extract_credential(&request) else {
        return reject(GateError::CredentialMissing, None);
    };

    match gate.check(&credential).await {
        Ok(remaining) if remaining >= 0 => {
            let mut response = next.run(request).await;
            set_remaining_header(&mut response, remaining);
            response
        }
        Ok(remaining) => reject(GateError::QuotaExhausted { remaining }, Some(remaining)),
        Err(e) => reject(e, None),
    }
}

/// Read the credential from the header carrier, falling back to the query
/// parameter. Empty values count as missing.
fn extract_credential(request: &Request) -> Option<String> {
    if let Some(value) = request.headers().get(API_KEY_HEADER) {
        if let Ok(value) = value.to_str() {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    let params: Query<HashMap<String, String>> = Query::try_from_uri(request.uri()).ok()?;
    params.get(API_KEY_PARAM).filter(|v| !v.is_empty()).cloned()
}

fn reject(err: GateError, remaining: Option<i64>) -> Response {
    let status = err.status_code();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "rejecting request due to internal fault");
    } else {
        // Expected outcomes (bad credentials, drained windows), not faults.
        debug!(error = %err, status = %status, "rejecting request");
    }

    let mut response = (status, err.to_string()).into_response();
    if let Some(remaining) = remaining {
        set_remaining_header(&mut response, remaining);
    }
    response
}

fn set_remaining_header(response: &mut Response, remaining: i64) {
    if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
        response.headers_mut().insert(REMAINING_HEADER, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{Principal, StaticDirectory};
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    const PERIOD: Duration = Duration::from_secs(300);

    fn test_config() -> RateLimitingConfig {
        RateLimitingConfig::default()
    }

    fn test_gate(quota: i64) -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let directory = StaticDirectory::new().with_principal(
            "abc",
            Principal {
                identifier: "abc".to_string(),
                quota_per_window: quota,
            },
        );
        let gate = Arc::new(AdmissionGate::new(
            SharedRateLimiter::new(store.clone()),
            Arc::new(directory),
            &test_config(),
        ));

        let router = Router::new()
            .route("/rank", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                gate,
                admit::<Arc<MemoryStore>>,
            ));

        (router, store)
    }

    async fn send(router: &Router, uri: &str, api_key: Option<&str>) -> Response {
        let mut builder = http::Request::builder().uri(uri);
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn remaining_header(response: &Response) -> Option<String> {
        response
            .headers()
            .get(REMAINING_HEADER)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_quota_drain_scenario() {
        let (router, _store) = test_gate(3);

        // Bootstrap consumes the first unit.
        let response = send(&router, "/rank", Some("abc")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(remaining_header(&response).as_deref(), Some("2"));

        for expected in ["1", "0"] {
            let response = send(&router, "/rank", Some("abc")).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(remaining_header(&response).as_deref(), Some(expected));
        }

        // Window drained; rejections stay at -1 until the TTL expires.
        for _ in 0..2 {
            let response = send(&router, "/rank", Some("abc")).await;
            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
            assert_eq!(remaining_header(&response).as_deref(), Some("-1"));
        }
    }

    #[tokio::test]
    async fn test_missing_credential_rejected_before_any_store_call() {
        let (router, store) = test_gate(3);

        let response = send(&router, "/rank", None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(store.operations(), 0);
    }

    #[tokio::test]
    async fn test_query_parameter_fallback() {
        let (router, _store) = test_gate(3);

        let response = send(&router, "/rank?api_key=abc", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(remaining_header(&response).as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_empty_header_falls_back_to_query() {
        let (router, _store) = test_gate(3);

        let response = send(&router, "/rank?api_key=abc", Some("")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_credential_rejected_without_window() {
        let (router, store) = test_gate(3);

        let response = send(&router, "/rank", Some("xyz")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_window_fails_closed() {
        let (router, store) = test_gate(3);
        store
            .set_with_ttl("ratelimiter:apikey:abc", "garbage", PERIOD)
            .await
            .unwrap();

        let response = send(&router, "/rank", Some("abc")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // The protected handler never ran.
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_ne!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_zero_quota_principal_rejected_on_first_request() {
        let (router, _store) = test_gate(0);

        let response = send(&router, "/rank", Some("abc")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(remaining_header(&response).as_deref(), Some("-1"));
    }
}
