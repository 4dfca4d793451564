use k8s_openapi::api::{
    apps::v1::{DaemonSet, Deployment, StatefulSet},
    core::v1::{Container, Pod, PodTemplateSpec},
};
use registry_policy_controller_core::ContainerRef;
use serde::de::DeserializeOwned;
use std::{fmt, str::FromStr};
use thiserror::Error;

/// The workload kinds whose containers are reviewed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Pod,
    Deployment,
    DaemonSet,
    StatefulSet,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported kind: {0}")]
    UnsupportedKind(String),

    #[error("failed to parse {kind} object: {source}")]
    ObjectDecode {
        kind: WorkloadKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads the containers declared by a serialized workload of the given kind.
pub fn containers(kind: &str, raw: &[u8]) -> Result<Vec<ContainerRef>, ExtractError> {
    kind.parse::<WorkloadKind>()?.containers(raw)
}

// === impl WorkloadKind ===

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 4] = [
        Self::Pod,
        Self::Deployment,
        Self::DaemonSet,
        Self::StatefulSet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::Deployment => "Deployment",
            Self::DaemonSet => "DaemonSet",
            Self::StatefulSet => "StatefulSet",
        }
    }

    /// Decodes `raw` as this kind and returns its containers in declaration
    /// order. Controllers read the containers of their pod template.
    pub fn containers(self, raw: &[u8]) -> Result<Vec<ContainerRef>, ExtractError> {
        let containers = match self {
            Self::Pod => self.decode::<Pod>(raw)?.spec.map(|spec| spec.containers),
            Self::Deployment => self
                .decode::<Deployment>(raw)?
                .spec
                .and_then(|spec| template_containers(spec.template)),
            Self::DaemonSet => self
                .decode::<DaemonSet>(raw)?
                .spec
                .and_then(|spec| template_containers(spec.template)),
            Self::StatefulSet => self
                .decode::<StatefulSet>(raw)?
                .spec
                .and_then(|spec| template_containers(spec.template)),
        };

        Ok(containers
            .into_iter()
            .flatten()
            .map(|Container { image, .. }| ContainerRef::new(image.unwrap_or_default()))
            .collect())
    }

    fn decode<T: DeserializeOwned>(self, raw: &[u8]) -> Result<T, ExtractError> {
        serde_json::from_slice(raw)
            .map_err(|source| ExtractError::ObjectDecode { kind: self, source })
    }
}

impl FromStr for WorkloadKind {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ExtractError::UnsupportedKind(s.to_string()))
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn template_containers(template: PodTemplateSpec) -> Option<Vec<Container>> {
    template.spec.map(|spec| spec.containers)
}
