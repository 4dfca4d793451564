use crate::{metrics::AdmissionMetrics, pipeline::Pipeline, review::AdmissionReview};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// The path the webhook configuration points at. Requests to `/` are served
/// too.
pub const VALIDATE_PATH: &str = "/validate-registry";

#[derive(Clone, Debug)]
pub struct Admission {
    pipeline: Pipeline,
    metrics: AdmissionMetrics,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type Body = http_body_util::Full<bytes::Bytes>;

// === impl Admission ===

impl Admission {
    pub fn new(pipeline: Pipeline, metrics: AdmissionMetrics) -> Self {
        Self { pipeline, metrics }
    }
}

impl<B> tower::Service<Request<B>> for Admission
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        trace!(method = %req.method(), path = %req.uri().path());
        if req.method() != http::Method::POST || !matches!(req.uri().path(), "/" | VALIDATE_PATH)
        {
            return Box::pin(future::ok(
                Response::builder()
                    .status(http::StatusCode::NOT_FOUND)
                    .body(Body::default())
                    .expect("not found response must be valid"),
            ));
        }

        let admission = self.clone();
        Box::pin(async move {
            let bytes = match req.into_body().collect().await {
                Ok(body) => body.to_bytes(),
                Err(error) => {
                    warn!(%error, "Failed to read request body");
                    admission.metrics.invalid();
                    return Ok(bad_request("cannot read body"));
                }
            };

            let decision = match admission.pipeline.admit(&bytes).await {
                Ok(decision) => decision,
                Err(error) => {
                    warn!(%error, "Failed to parse admission review");
                    admission.metrics.invalid();
                    return Ok(bad_request(error));
                }
            };
            admission.metrics.record(&decision);

            let rsp = decision.into_review();
            debug!(?rsp);
            json_response(rsp)
        })
    }
}

fn bad_request(reason: impl ToString) -> Response<Body> {
    Response::builder()
        .status(http::StatusCode::BAD_REQUEST)
        .header(http::header::CONTENT_TYPE, "text/plain")
        .body(Body::from(reason.to_string()))
        .expect("bad request response must be valid")
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}
