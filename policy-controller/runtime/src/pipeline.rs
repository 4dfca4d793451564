use crate::{
    review::{self, AdmissionRequest, AdmissionReview, DecodeError, Verdict},
    workload::{self, ExtractError},
};
use registry_policy_controller_core::{evaluate, PolicySource};
use std::sync::Arc;
use tracing::{debug, info, warn};

const IMAGE_NOT_ALLOWED: &str = "image not allowed";
const POLICY_UNAVAILABLE: &str = "registry policy unavailable";

/// Reviews admission requests against the policy supplied by a
/// [`PolicySource`].
///
/// The source is queried on every request; nothing is retained between
/// requests.
#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn PolicySource>,
}

/// Why a request was denied.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// No container image matched the registry policy.
    Policy,
    UnsupportedKind,
    ObjectDecode,
    /// The policy could not be loaded, so nothing may be admitted.
    PolicyUnavailable,
}

/// A verdict together with the request it answers.
#[derive(Debug)]
pub struct Decision {
    pub verdict: Verdict,
    pub reason: Option<DenyReason>,
    req: AdmissionRequest,
}

// === impl Pipeline ===

impl Pipeline {
    pub fn new(source: impl PolicySource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Decodes a serialized `AdmissionReview` and decides it.
    ///
    /// Fails only when the envelope cannot be decoded; every other failure,
    /// including a malformed workload object, produces a denial.
    pub async fn admit(&self, body: &[u8]) -> Result<Decision, DecodeError> {
        let req = review::decode(body)?;
        debug!(uid = %req.uid, kind = %req.kind, ns = %req.namespace, "Reviewing");
        Ok(self.decide(req).await)
    }

    pub async fn decide(&self, req: AdmissionRequest) -> Decision {
        let (verdict, reason) = match self.review(&req).await {
            Ok(()) => (Verdict::allow(req.uid.clone()), None),
            Err((reason, message)) => {
                info!(uid = %req.uid, ns = %req.namespace, kind = %req.kind, %message, "Denied");
                (Verdict::deny(req.uid.clone(), message), Some(reason))
            }
        };
        Decision {
            verdict,
            reason,
            req,
        }
    }

    async fn review(&self, req: &AdmissionRequest) -> Result<(), (DenyReason, String)> {
        // Workloads that cannot be inspected are denied whether or not a policy
        // is available.
        let containers = workload::containers(&req.kind, &req.raw_object).map_err(|error| {
            let reason = match error {
                ExtractError::UnsupportedKind(_) => DenyReason::UnsupportedKind,
                ExtractError::ObjectDecode { .. } => DenyReason::ObjectDecode,
            };
            (reason, error.to_string())
        })?;

        let policy = match self.source.load_policy().await {
            Ok(policy) => policy,
            Err(error) => {
                warn!(%error, "Failed to load registry policy");
                return Err((DenyReason::PolicyUnavailable, POLICY_UNAVAILABLE.to_string()));
            }
        };

        if evaluate(&req.namespace, &containers, &policy) {
            Ok(())
        } else {
            Err((DenyReason::Policy, IMAGE_NOT_ALLOWED.to_string()))
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

// === impl DenyReason ===

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::UnsupportedKind => "unsupported_kind",
            Self::ObjectDecode => "object_decode",
            Self::PolicyUnavailable => "policy_unavailable",
        }
    }
}

// === impl Decision ===

impl Decision {
    /// The workload kind named by the request.
    pub fn kind(&self) -> &str {
        &self.req.kind
    }

    pub fn into_review(self) -> AdmissionReview {
        self.req.respond(self.verdict).into_review()
    }
}
