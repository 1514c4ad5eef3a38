//! Request logging middleware applied to every RPC.
//!
//! [`RequestLogLayer`] wraps the whole router, so it sees each call as a raw
//! HTTP/2 request whose path is the fully qualified gRPC method (for example
//! `/vip.VIP/GetIsVIPByID`). For every method not matched by the configured
//! [`MethodMatcher`] it opens a `grpc_request` span around the call and logs
//! the resulting gRPC code and latency. Calls dropped before they complete
//! (request timeout, client cancellation) are logged too, so every tracked
//! invocation yields exactly one record. Ignored methods (the health check by
//! default) pass through untouched.

use core::task::{Context, Poll};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tonic::Code;
use tonic::codegen::http;
use tower::{Layer, Service};
use tracing::Instrument;

/// Set of method paths excluded from request logging.
///
/// A pattern matches a path exactly, or as a prefix when it ends with `*`.
#[derive(Debug, Clone, Default)]
pub struct MethodMatcher {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl MethodMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Self::default();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            match pattern.strip_suffix('*') {
                Some(prefix) => matcher.prefixes.push(prefix.to_string()),
                None => matcher.exact.push(pattern.to_string()),
            }
        }
        matcher
    }

    pub fn matches(&self, path: &str) -> bool {
        self.exact.iter().any(|method| method == path)
            || self.prefixes.iter().any(|prefix| path.starts_with(prefix))
    }
}

/// Layer producing [`RequestLog`] services.
#[derive(Debug, Clone)]
pub struct RequestLogLayer {
    ignored: Arc<MethodMatcher>,
}

impl RequestLogLayer {
    pub fn new(ignored: MethodMatcher) -> Self {
        Self {
            ignored: Arc::new(ignored),
        }
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLog<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLog {
            inner,
            ignored: Arc::clone(&self.ignored),
        }
    }
}

/// Logs each non-ignored request once it completes or is dropped.
#[derive(Debug, Clone)]
pub struct RequestLog<S> {
    inner: S,
    ignored: Arc<MethodMatcher>,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for RequestLog<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: core::fmt::Display + Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let path = req.uri().path().to_string();
        if self.ignored.matches(&path) {
            return Box::pin(self.inner.call(req));
        }

        let span = tracing::info_span!("grpc_request", rpc.method = %path);
        let record = CallRecord::new(path);
        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let result = fut.await;
                match &result {
                    Ok(response) => record.finish(grpc_code(response)),
                    Err(e) => record.fail(e),
                }
                result
            }
            .instrument(span),
        )
    }
}

/// Tracks one logged call. Dropping it before [`CallRecord::finish`] or
/// [`CallRecord::fail`] means the call was cut short (request timeout or
/// client cancellation), which is logged as well.
struct CallRecord {
    path: String,
    start: Instant,
    logged: bool,
}

impl CallRecord {
    fn new(path: String) -> Self {
        Self {
            path,
            start: Instant::now(),
            logged: false,
        }
    }

    fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    fn finish(mut self, code: Code) {
        self.logged = true;
        log_completion(&self.path, code, self.elapsed_ms());
    }

    fn fail(mut self, error: &dyn core::fmt::Display) {
        self.logged = true;
        let elapsed_ms = self.elapsed_ms();
        tracing::error!(grpc.method = %self.path, elapsed_ms, error = %error, "finished call with transport error");
    }
}

impl Drop for CallRecord {
    fn drop(&mut self) {
        if !self.logged {
            let elapsed_ms = self.elapsed_ms();
            tracing::warn!(
                grpc.method = %self.path,
                grpc.code = "Cancelled",
                elapsed_ms,
                "unary call dropped before completion"
            );
        }
    }
}

/// Reads `grpc-status` from the response head. Successful unary responses
/// carry it in the trailers instead, so a missing header counts as `Ok`.
fn grpc_code<B>(response: &http::Response<B>) -> Code {
    response
        .headers()
        .get("grpc-status")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i32>().ok())
        .map(Code::from_i32)
        .unwrap_or(Code::Ok)
}

fn log_completion(path: &str, code: Code, elapsed_ms: f64) {
    let grpc_code = format!("{code:?}");
    match code {
        Code::Ok
        | Code::Cancelled
        | Code::InvalidArgument
        | Code::NotFound
        | Code::AlreadyExists
        | Code::Unauthenticated => {
            tracing::info!(grpc.method = %path, grpc.code = %grpc_code, elapsed_ms, "finished unary call")
        }
        Code::Unknown | Code::Unimplemented | Code::Internal | Code::DataLoss => {
            tracing::error!(grpc.method = %path, grpc.code = %grpc_code, elapsed_ms, "finished unary call")
        }
        _ => {
            tracing::warn!(grpc.method = %path, grpc.code = %grpc_code, elapsed_ms, "finished unary call")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use futures::FutureExt;
    use parking_lot::Mutex;
    use tower::ServiceExt;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::SubscriberExt;
    use vip_core::proto::GET_IS_VIP_BY_ID_PATH;

    const HEALTH_CHECK: &str = "/grpc.health.v1.Health/Check";

    /// Fields of one captured log event.
    #[derive(Debug, Default, Clone)]
    struct Captured {
        message: String,
        method: String,
        code: String,
    }

    impl Visit for Captured {
        fn record_debug(&mut self, field: &Field, value: &dyn core::fmt::Debug) {
            let value = format!("{value:?}");
            match field.name() {
                "message" => self.message = value,
                "grpc.method" => self.method = value,
                "grpc.code" => self.code = value,
                _ => {}
            }
        }

        fn record_str(&mut self, field: &Field, value: &str) {
            self.record_debug(field, &format_args!("{value}"));
        }
    }

    /// Subscriber layer collecting every event emitted on this thread.
    #[derive(Clone, Default)]
    struct EventLog(Arc<Mutex<Vec<Captured>>>);

    impl EventLog {
        fn install(&self) -> tracing::subscriber::DefaultGuard {
            tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
        }

        fn events(&self) -> Vec<Captured> {
            self.0.lock().clone()
        }
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventLog {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut captured = Captured::default();
            event.record(&mut captured);
            self.0.lock().push(captured);
        }
    }

    fn request(path: &str) -> http::Request<()> {
        http::Request::builder().uri(path).body(()).unwrap()
    }

    #[test]
    fn matches_exact_and_prefix_patterns() {
        let matcher = MethodMatcher::new([
            "/grpc.health.v1.Health/Check",
            " ",
            "/grpc.reflection.*",
        ]);

        assert!(matcher.matches("/grpc.health.v1.Health/Check"));
        assert!(!matcher.matches("/grpc.health.v1.Health/Watch"));
        assert!(matcher.matches("/grpc.reflection.v1.ServerReflection/ServerReflectionInfo"));
        assert!(!matcher.matches(GET_IS_VIP_BY_ID_PATH));
    }

    #[test]
    fn empty_matcher_ignores_nothing() {
        assert!(!MethodMatcher::default().matches(""));
        assert!(!MethodMatcher::new(Vec::<String>::new()).matches(GET_IS_VIP_BY_ID_PATH));
    }

    #[test]
    fn reads_grpc_status_header() {
        let response = http::Response::builder()
            .header("grpc-status", "3")
            .body(())
            .unwrap();
        assert_eq!(grpc_code(&response), Code::InvalidArgument);

        let response = http::Response::new(());
        assert_eq!(grpc_code(&response), Code::Ok);
    }

    #[tokio::test]
    async fn passes_every_request_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let inner = tower::service_fn(move |req: http::Request<()>| {
            counter.fetch_add(1, Ordering::SeqCst);
            let path = req.uri().path().to_string();
            async move { Ok::<_, Infallible>(http::Response::new(path)) }
        });

        let layer = RequestLogLayer::new(MethodMatcher::new([HEALTH_CHECK]));
        let service = layer.layer(inner);

        for path in [GET_IS_VIP_BY_ID_PATH, HEALTH_CHECK] {
            let response = service.clone().oneshot(request(path)).await.unwrap();
            assert_eq!(response.body(), path);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn logs_tracked_methods_once_and_skips_ignored() {
        let log = EventLog::default();
        let _guard = log.install();

        let inner = tower::service_fn(|req: http::Request<()>| async move {
            let mut response = http::Response::new(());
            if req.uri().path() == GET_IS_VIP_BY_ID_PATH {
                response
                    .headers_mut()
                    .insert("grpc-status", http::HeaderValue::from_static("3"));
            }
            Ok::<_, Infallible>(response)
        });
        let service = RequestLogLayer::new(MethodMatcher::new([HEALTH_CHECK])).layer(inner);

        service.clone().oneshot(request(HEALTH_CHECK)).await.unwrap();
        assert!(log.events().is_empty());

        service.oneshot(request(GET_IS_VIP_BY_ID_PATH)).await.unwrap();
        let events = log.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "finished unary call");
        assert_eq!(events[0].method, GET_IS_VIP_BY_ID_PATH);
        assert_eq!(events[0].code, "InvalidArgument");
    }

    #[test]
    fn dropped_call_is_still_logged() {
        let log = EventLog::default();
        let _guard = log.install();

        let inner = tower::service_fn(|_req: http::Request<()>| {
            std::future::pending::<Result<http::Response<()>, Infallible>>()
        });
        let mut service = RequestLogLayer::new(MethodMatcher::new([HEALTH_CHECK])).layer(inner);

        assert!(service.call(request(GET_IS_VIP_BY_ID_PATH)).now_or_never().is_none());

        let events = log.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "unary call dropped before completion");
        assert_eq!(events[0].method, GET_IS_VIP_BY_ID_PATH);
        assert_eq!(events[0].code, "Cancelled");
    }

    #[test]
    fn dropped_ignored_call_stays_silent() {
        let log = EventLog::default();
        let _guard = log.install();

        let inner = tower::service_fn(|_req: http::Request<()>| {
            std::future::pending::<Result<http::Response<()>, Infallible>>()
        });
        let mut service = RequestLogLayer::new(MethodMatcher::new([HEALTH_CHECK])).layer(inner);

        assert!(service.call(request(HEALTH_CHECK)).now_or_never().is_none());
        assert!(log.events().is_empty());
    }
}
