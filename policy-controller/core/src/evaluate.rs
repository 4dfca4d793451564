use crate::{ContainerRef, RegistryPolicy};
use tracing::trace;

/// Decides whether a workload's containers are admitted under `policy`.
///
/// An empty policy denies everything. Otherwise containers are checked in
/// declaration order, and the first container whose image starts with a
/// common prefix, or with one of the prefixes listed for `ns`, admits the
/// whole workload. A workload with no matching container is denied.
pub fn evaluate(ns: &str, containers: &[ContainerRef], policy: &RegistryPolicy) -> bool {
    if policy.is_empty() {
        trace!("No registry policies defined");
        return false;
    }

    let ns_prefixes = policy.namespace_prefixes(ns);
    for ContainerRef { image } in containers {
        trace!(%image, "Checking container image");

        if let Some(prefix) = policy.common.iter().find(|p| image.starts_with(p.as_str())) {
            trace!(%image, %prefix, "Image matches common registry");
            return true;
        }

        if let Some(prefix) = ns_prefixes
            .into_iter()
            .flatten()
            .find(|p| image.starts_with(p.as_str()))
        {
            trace!(%image, %prefix, %ns, "Image matches namespace registry");
            return true;
        }
    }

    false
}
