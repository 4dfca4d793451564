use anyhow::{Context, Result};
use registry_policy_controller_core::{PolicySource, RegistryPolicy};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Reads the registry policy from two YAML files on every request.
///
/// The common file holds a sequence of prefixes; the namespace file maps
/// namespace names to sequences of prefixes. These are typically mounted from
/// a ConfigMap, so edits take effect without a restart.
#[derive(Clone, Debug)]
pub struct FilePolicySource {
    common_path: PathBuf,
    namespace_path: PathBuf,
}

// === impl FilePolicySource ===

impl FilePolicySource {
    pub fn new(common_path: impl Into<PathBuf>, namespace_path: impl Into<PathBuf>) -> Self {
        Self {
            common_path: common_path.into(),
            namespace_path: namespace_path.into(),
        }
    }
}

#[async_trait::async_trait]
impl PolicySource for FilePolicySource {
    async fn load_policy(&self) -> Result<RegistryPolicy> {
        let common = read_yaml(&self.common_path).await?;
        let per_namespace = read_yaml(&self.namespace_path).await?;
        Ok(RegistryPolicy {
            common,
            per_namespace,
        })
    }
}

async fn read_yaml<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_yaml(&data).with_context(|| format!("failed to parse {}", path.display()))
}

/// An empty or `null` document parses as the default value.
fn parse_yaml<T: DeserializeOwned + Default>(data: &[u8]) -> serde_yaml::Result<T> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    let value = serde_yaml::from_slice::<Option<T>>(data)?;
    Ok(value.unwrap_or_default())
}
