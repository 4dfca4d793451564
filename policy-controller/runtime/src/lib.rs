pub use registry_policy_controller_core as core;

mod admission;
mod args;
mod metrics;
pub mod pipeline;
pub mod review;
pub mod source;
pub mod workload;

pub use self::{
    admission::{Admission, VALIDATE_PATH},
    args::Args,
    metrics::AdmissionMetrics,
    pipeline::{Decision, DenyReason, Pipeline},
    source::FilePolicySource,
};
