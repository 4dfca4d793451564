//! Decoding of inbound `AdmissionReview`s and encoding of verdicts.

use bytes::Bytes;
use kube::core::{admission, DynamicObject};
use serde_json::Value;
use thiserror::Error;

type Review = admission::AdmissionReview<DynamicObject>;
type KubeAdmissionRequest = admission::AdmissionRequest<DynamicObject>;
pub type AdmissionResponse = admission::AdmissionResponse;
pub type AdmissionReview = admission::AdmissionReview<DynamicObject>;

/// The inbound envelope could not be turned into an [`AdmissionRequest`].
///
/// No verdict can be produced for such a request; it is rejected by the
/// transport instead.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to parse admission review: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid admission review: {0}")]
    Review(#[from] admission::ConvertAdmissionReviewError),

    #[error("admission request missing 'object'")]
    MissingObject,
}

/// A decoded admission request for a single workload.
#[derive(Clone, Debug)]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: String,
    pub namespace: String,

    /// The JSON-serialized workload object under review.
    pub raw_object: Bytes,

    // Echoes the request's uid and review version back to the API server.
    rsp: AdmissionResponse,
}

/// The outcome of reviewing one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub uid: String,
    pub allowed: bool,

    /// The reason for a denial. Always `None` when `allowed` is set.
    pub message: Option<String>,
}

const DEFAULT_DENY_MESSAGE: &str = "denied";

/// Decodes a serialized `AdmissionReview` into an [`AdmissionRequest`].
///
/// The workload object is kept as raw JSON so that a malformed object still
/// yields a request that can be denied.
pub fn decode(body: &[u8]) -> Result<AdmissionRequest, DecodeError> {
    let mut review: Value = serde_json::from_slice(body)?;
    let obj = take_object(&mut review);
    let review: Review = serde_json::from_value(review)?;
    let req: KubeAdmissionRequest = review.try_into()?;
    let rsp = AdmissionResponse::from(&req);

    let obj = obj.ok_or(DecodeError::MissingObject)?;
    let namespace = req
        .namespace
        .or_else(|| {
            obj.pointer("/metadata/namespace")
                .and_then(Value::as_str)
                .map(Into::into)
        })
        .unwrap_or_default();
    let raw_object = Bytes::from(serde_json::to_vec(&obj)?);

    Ok(AdmissionRequest {
        uid: req.uid,
        kind: req.kind.kind,
        namespace,
        raw_object,
        rsp,
    })
}

/// Removes the workload objects from the request so that kube only has to
/// decode the envelope. Returns `object`; a `null` object counts as missing.
fn take_object(review: &mut Value) -> Option<Value> {
    let req = review.get_mut("request")?.as_object_mut()?;
    req.remove("oldObject");
    req.remove("object").filter(|obj| !obj.is_null())
}

// === impl AdmissionRequest ===

impl AdmissionRequest {
    /// Builds the response to this request carrying `verdict`.
    ///
    /// The response always echoes this request's uid.
    pub(crate) fn respond(&self, verdict: Verdict) -> AdmissionResponse {
        if verdict.allowed {
            return self.rsp.clone();
        }
        let message = verdict
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_DENY_MESSAGE.to_string());
        self.rsp.clone().deny(message)
    }
}

// === impl Verdict ===

impl Verdict {
    pub fn new(uid: impl Into<String>, allowed: bool, message: impl Into<String>) -> Self {
        let message = if allowed {
            None
        } else {
            let message = message.into();
            if message.is_empty() {
                Some(DEFAULT_DENY_MESSAGE.to_string())
            } else {
                Some(message)
            }
        };
        Self {
            uid: uid.into(),
            allowed,
            message,
        }
    }

    pub fn allow(uid: impl Into<String>) -> Self {
        Self::new(uid, true, "")
    }

    pub fn deny(uid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(uid, false, message)
    }
}
