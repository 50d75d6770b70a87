use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, VARY,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use shared::http::normalized_header_value;
use std::sync::Arc;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE";
const ALLOWED_HEADERS: &str = "Content-Type, Accept";
const MAX_ORIGIN_LEN: usize = 256;

/// Cross-origin policy. Cookies are never allowed.
#[derive(Clone, Debug)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
    allow_any: bool,
}

impl CorsPolicy {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        let allow_any = allowed_origins.iter().any(|origin| origin == "*");
        CorsPolicy {
            allowed_origins,
            allow_any,
        }
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.allow_any || self.allowed_origins.iter().any(|allowed| allowed == origin)
    }

    fn allowed_origin(&self, request: &Request) -> Option<HeaderValue> {
        let origin = normalized_header_value(request.headers(), ORIGIN.as_str(), MAX_ORIGIN_LEN)?;
        if !self.allows(&origin) {
            return None;
        }
        HeaderValue::from_str(&origin).ok()
    }
}

/// Answers every `OPTIONS` request without running the inner chain, and
/// adds the allow-origin header to responses for allowed origins.
pub async fn cors(State(policy): State<Arc<CorsPolicy>>, request: Request, next: Next) -> Response {
    let origin = policy.allowed_origin(&request);

    if request.method() == Method::OPTIONS {
        let is_preflight = request.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD);
        let mut response = StatusCode::NO_CONTENT.into_response();

        if let (true, Some(origin)) = (is_preflight, origin) {
            let headers = response.headers_mut();
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.insert(
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            );
            headers.insert(
                ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOWED_HEADERS),
            );
            headers.insert(VARY, HeaderValue::from_static("Origin"));
        }

        return response;
    }

    let mut response = next.run(request).await;
    if let Some(origin) = origin {
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.append(VARY, HeaderValue::from_static("Origin"));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn counting_router(policy: CorsPolicy) -> (Router, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler_calls = calls.clone();
        let router = Router::new()
            .route(
                "/v1/projects",
                get(move || {
                    let calls = handler_calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        "[]"
                    }
                }),
            )
            .layer(from_fn_with_state(Arc::new(policy), cors));
        (router, calls)
    }

    fn request(method: Method, origin: Option<&str>, preflight: bool) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder()
            .method(method)
            .uri("/v1/projects");
        if let Some(origin) = origin {
            builder = builder.header(ORIGIN, origin);
        }
        if preflight {
            builder = builder.header(ACCESS_CONTROL_REQUEST_METHOD, "GET");
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_preflight_short_circuits() {
        let (router, calls) = counting_router(CorsPolicy::new(vec!["https://ui.example.com".into()]));

        let response = router
            .oneshot(request(Method::OPTIONS, Some("https://ui.example.com"), true))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://ui.example.com"
        );
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            ALLOWED_METHODS
        );
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            ALLOWED_HEADERS
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_options_never_reaches_handler() {
        let (router, calls) = counting_router(CorsPolicy::new(vec!["https://ui.example.com".into()]));

        for req in [
            request(Method::OPTIONS, Some("https://evil.example.com"), true),
            request(Method::OPTIONS, None, false),
            request(Method::OPTIONS, Some("https://ui.example.com"), false),
        ] {
            let response = router.clone().oneshot(req).await.unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_simple_request_headers() {
        let (router, calls) = counting_router(CorsPolicy::new(vec!["https://ui.example.com".into()]));

        let response = router
            .clone()
            .oneshot(request(Method::GET, Some("https://ui.example.com"), false))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://ui.example.com"
        );
        assert_eq!(response.headers().get(VARY).unwrap(), "Origin");

        let response = router
            .oneshot(request(Method::GET, Some("https://evil.example.com"), false))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_wildcard_policy() {
        let policy = CorsPolicy::new(vec!["*".into()]);
        assert!(policy.allows("https://anything.example.com"));

        let policy = CorsPolicy::new(Vec::new());
        assert!(!policy.allows("https://anything.example.com"));
    }
}
