//! Inbound HTTP surface: subscription management, metrics and health

use exposure_api::{PfdSubscription, ProblemDetails};
use exposure_sbi::{ExposureMetrics, PfdChangeNotifier};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SUBSCRIPTIONS_PATH: &str = "/nnef-pfdmanagement/v1/subscriptions";

/// Largest request body read into memory
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Request routing for the broker's own endpoints
pub struct Api {
    notifier: Arc<PfdChangeNotifier>,
    metrics: ExposureMetrics,
    /// Absolute prefix used to build `Location` headers
    subscriptions_uri: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Subscriptions,
    Subscription(&'a str),
    Metrics,
    Health,
    Unknown,
}

fn route(path: &str) -> Route<'_> {
    match path {
        "/metrics" => Route::Metrics,
        "/healthz" => Route::Health,
        SUBSCRIPTIONS_PATH => Route::Subscriptions,
        _ => match path.strip_prefix(SUBSCRIPTIONS_PATH).and_then(|rest| rest.strip_prefix('/')) {
            Some(id) if !id.is_empty() && !id.contains('/') => Route::Subscription(id),
            _ => Route::Unknown,
        },
    }
}

impl Api {
    pub fn new(
        notifier: Arc<PfdChangeNotifier>,
        metrics: ExposureMetrics,
        service_uri: impl Into<String>,
    ) -> Self {
        Self {
            notifier,
            metrics,
            subscriptions_uri: format!("{}/subscriptions", service_uri.into()),
        }
    }

    pub async fn handle<B>(
        self: Arc<Self>,
        req: Request<B>,
    ) -> Result<Response<Full<Bytes>>, Infallible>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!("{} {}", method, path);

        let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                warn!("{} {} rejected: body exceeds {} bytes", method, path, MAX_BODY_BYTES);
                return Ok(problem_response(&ProblemDetails::payload_too_large(format!(
                    "request body exceeds {} bytes",
                    MAX_BODY_BYTES
                ))));
            }
            Err(e) => {
                debug!("Failed to read body of {} {}: {}", method, path, e);
                return Ok(problem_response(&ProblemDetails::malformed_request_syntax(
                    e.to_string(),
                )));
            }
        };
        Ok(self.dispatch(&method, &path, body).await)
    }

    pub async fn dispatch(&self, method: &Method, path: &str, body: Bytes) -> Response<Full<Bytes>> {
        match (method, route(path)) {
            (&Method::POST, Route::Subscriptions) => self.subscribe(&body).await,
            (&Method::DELETE, Route::Subscription(id)) => self.unsubscribe(id).await,
            (&Method::GET, Route::Subscription(id)) => match self.notifier.subscription(id).await {
                Ok(sub) => {
                    let view = PfdSubscription {
                        application_ids: sub.topics,
                        notify_uri: sub.notify_uri,
                        supported_features: None,
                    };
                    json_response(StatusCode::OK, &view)
                }
                Err(e) => problem_response(&e.to_problem()),
            },
            (&Method::GET, Route::Metrics) => match self.metrics.gather() {
                Ok(text) => text_response(StatusCode::OK, "text/plain; version=0.0.4", text),
                Err(e) => problem_response(&ProblemDetails::system_failure(e.to_string())),
            },
            (_, Route::Health) => text_response(StatusCode::OK, "text/plain", "OK\n".to_string()),
            (_, Route::Unknown) => text_response(
                StatusCode::NOT_FOUND,
                "text/plain",
                "Not Found\n".to_string(),
            ),
            _ => text_response(
                StatusCode::METHOD_NOT_ALLOWED,
                "text/plain",
                "Method Not Allowed\n".to_string(),
            ),
        }
    }

    async fn subscribe(&self, body: &[u8]) -> Response<Full<Bytes>> {
        let sub: PfdSubscription = match serde_json::from_slice(body) {
            Ok(sub) => sub,
            Err(e) => {
                warn!("Malformed subscription request: {}", e);
                return problem_response(&ProblemDetails::malformed_request_syntax(e.to_string()));
            }
        };

        match self
            .notifier
            .subscribe(&sub.application_ids, &sub.notify_uri)
            .await
        {
            Ok(id) => {
                info!("Created subscription [{}] for {}", id, sub.notify_uri);
                let mut response = json_response(StatusCode::CREATED, &sub);
                let location = format!("{}/{}", self.subscriptions_uri, id);
                if let Ok(value) = HeaderValue::from_str(&location) {
                    response.headers_mut().insert(LOCATION, value);
                }
                response
            }
            Err(e) => problem_response(&e.to_problem()),
        }
    }

    async fn unsubscribe(&self, id: &str) -> Response<Full<Bytes>> {
        match self.notifier.unsubscribe(id).await {
            Ok(()) => {
                let mut response = Response::new(Full::new(Bytes::new()));
                *response.status_mut() = StatusCode::NO_CONTENT;
                response
            }
            Err(e) => problem_response(&e.to_problem()),
        }
    }
}

fn text_response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_response<T: serde::Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => problem_response(&ProblemDetails::system_failure(e.to_string())),
    }
}

fn problem_response(problem: &ProblemDetails) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(problem).unwrap_or_default();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() =
        StatusCode::from_u16(problem.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/problem+json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use exposure_api::PfdChangeNotification;
    use exposure_sbi::{NotifySink, SbiError};

    struct DiscardSink;

    #[async_trait]
    impl NotifySink for DiscardSink {
        async fn notify(&self, _: &str, _: &[PfdChangeNotification]) -> Result<(), SbiError> {
            Ok(())
        }
    }

    fn api() -> Api {
        let metrics = ExposureMetrics::new().unwrap();
        let notifier =
            Arc::new(PfdChangeNotifier::new(Arc::new(DiscardSink)).with_metrics(metrics.clone()));
        Api::new(
            notifier,
            metrics,
            "https://127.0.0.5:8000/nnef-pfdmanagement/v1",
        )
    }

    async fn body_json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_route() {
        assert_eq!(route(SUBSCRIPTIONS_PATH), Route::Subscriptions);
        assert_eq!(
            route("/nnef-pfdmanagement/v1/subscriptions/7"),
            Route::Subscription("7")
        );
        assert_eq!(route("/nnef-pfdmanagement/v1/subscriptions/"), Route::Unknown);
        assert_eq!(route("/nnef-pfdmanagement/v1/subscriptions/7/x"), Route::Unknown);
        assert_eq!(route("/metrics"), Route::Metrics);
        assert_eq!(route("/other"), Route::Unknown);
    }

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe() {
        let api = api();
        let body = Bytes::from(r#"{"applicationIds":["app1"],"notifyUri":"http://af/notify"}"#);

        let response = api.dispatch(&Method::POST, SUBSCRIPTIONS_PATH, body).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok()),
            Some("https://127.0.0.5:8000/nnef-pfdmanagement/v1/subscriptions/1")
        );

        let response = api
            .dispatch(&Method::GET, "/nnef-pfdmanagement/v1/subscriptions/1", Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["applicationIds"][0], "app1");

        let response = api
            .dispatch(&Method::DELETE, "/nnef-pfdmanagement/v1/subscriptions/1", Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = api
            .dispatch(&Method::DELETE, "/nnef-pfdmanagement/v1/subscriptions/1", Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["cause"], "DATA_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_missing_notify_uri() {
        let api = api();
        let body = Bytes::from(r#"{"applicationIds":["app1"]}"#);
        let response = api.dispatch(&Method::POST, SUBSCRIPTIONS_PATH, body).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let problem = body_json(response).await;
        assert_eq!(problem["cause"], "DATA_NOT_FOUND");
        assert_eq!(problem["detail"], "Absent of Notify URI");
    }

    #[tokio::test]
    async fn test_oversized_body_rejected_before_parsing() {
        let api = Arc::new(api());
        let body = Full::new(Bytes::from(vec![b' '; MAX_BODY_BYTES + 1]));
        let req = Request::post(SUBSCRIPTIONS_PATH).body(body).unwrap();

        let response = api.clone().handle(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["cause"], "PAYLOAD_TOO_LARGE");

        let body = Full::new(Bytes::from(
            r#"{"applicationIds":["app1"],"notifyUri":"http://af/cb"}"#,
        ));
        let req = Request::post(SUBSCRIPTIONS_PATH).body(body).unwrap();
        let response = api.handle(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let api = api();
        let response = api
            .dispatch(&Method::POST, SUBSCRIPTIONS_PATH, Bytes::from("{not json"))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["cause"], "MALFORMED_REQUEST_SYNTAX");
    }

    #[tokio::test]
    async fn test_metrics_and_health() {
        let api = api();
        let response = api.dispatch(&Method::GET, "/healthz", Bytes::new()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = Bytes::from(r#"{"applicationIds":["app1"],"notifyUri":"http://af/notify"}"#);
        api.dispatch(&Method::POST, SUBSCRIPTIONS_PATH, body).await;

        let response = api.dispatch(&Method::GET, "/metrics", Bytes::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let text = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(text.to_vec()).unwrap();
        assert!(text.contains("subscriptions_active 1"));
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let api = api();
        let response = api
            .dispatch(&Method::PUT, SUBSCRIPTIONS_PATH, Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
