use crate::{pipeline::Decision, workload::WorkloadKind};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct AdmissionMetrics {
    requests: Family<RequestLabels, Counter>,
    denials: Family<DenyLabels, Counter>,
    invalid: Counter,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct RequestLabels {
    kind: &'static str,
    result: &'static str,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct DenyLabels {
    reason: &'static str,
}

// === impl AdmissionMetrics ===

impl AdmissionMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let requests = Family::<RequestLabels, Counter>::default();
        reg.register(
            "requests",
            "Total number of admission requests reviewed, by workload kind and result",
            requests.clone(),
        );

        let denials = Family::<DenyLabels, Counter>::default();
        reg.register(
            "denials",
            "Total number of admission requests denied, by reason",
            denials.clone(),
        );

        let invalid = Counter::default();
        reg.register(
            "invalid",
            "Total number of admission requests rejected because they could not be decoded",
            invalid.clone(),
        );

        Self {
            requests,
            denials,
            invalid,
        }
    }

    pub(crate) fn record(&self, decision: &Decision) {
        // Kinds come from the request, so only known kinds become label values.
        let kind = decision
            .kind()
            .parse::<WorkloadKind>()
            .map(|k| k.as_str())
            .unwrap_or("other");
        let result = if decision.verdict.allowed {
            "allowed"
        } else {
            "denied"
        };
        self.requests
            .get_or_create(&RequestLabels { kind, result })
            .inc();

        if let Some(reason) = decision.reason {
            self.denials
                .get_or_create(&DenyLabels {
                    reason: reason.as_str(),
                })
                .inc();
        }
    }

    pub(crate) fn invalid(&self) {
        self.invalid.inc();
    }
}
