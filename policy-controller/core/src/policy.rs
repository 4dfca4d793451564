use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The set of registry prefixes that container images may be pulled from.
///
/// Prefixes are literal strings: an image is allowed by a prefix only if the
/// image reference begins with exactly those bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegistryPolicy {
    /// Prefixes allowed in every namespace.
    #[serde(default, rename = "commonRegistries")]
    pub common: Vec<String>,

    /// Prefixes allowed only in the namespace they are keyed by.
    #[serde(default, rename = "namespaceRegistryMap")]
    pub per_namespace: BTreeMap<String, Vec<String>>,
}

/// Supplies the current [`RegistryPolicy`].
///
/// Sources are queried once per admission decision and may return a freshly
/// parsed policy each time.
#[async_trait::async_trait]
pub trait PolicySource: Send + Sync {
    async fn load_policy(&self) -> Result<RegistryPolicy>;
}

/// A source that always returns the same policy.
#[derive(Clone, Debug, Default)]
pub struct StaticPolicy(RegistryPolicy);

// === impl RegistryPolicy ===

impl RegistryPolicy {
    /// Returns true when neither common nor namespace-scoped prefixes exist.
    pub fn is_empty(&self) -> bool {
        self.common.is_empty() && self.per_namespace.is_empty()
    }

    pub fn namespace_prefixes(&self, ns: &str) -> Option<&[String]> {
        self.per_namespace.get(ns).map(Vec::as_slice)
    }
}

// === impl StaticPolicy ===

impl StaticPolicy {
    pub fn new(policy: RegistryPolicy) -> Self {
        Self(policy)
    }
}

impl From<RegistryPolicy> for StaticPolicy {
    fn from(policy: RegistryPolicy) -> Self {
        Self(policy)
    }
}

#[async_trait::async_trait]
impl PolicySource for StaticPolicy {
    async fn load_policy(&self) -> Result<RegistryPolicy> {
        Ok(self.0.clone())
    }
}
