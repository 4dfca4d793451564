use crate::{
    admission::Admission, metrics::AdmissionMetrics, pipeline::Pipeline,
    source::FilePolicySource,
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[clap(
    name = "registry-policy",
    about = "Admits workloads whose container images come from approved registries"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "registry_policy=info,warn",
        env = "REGISTRY_POLICY_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Disables the admission controller server.
    #[clap(long)]
    admission_controller_disabled: bool,

    /// A YAML list of image prefixes allowed in every namespace.
    #[clap(
        long,
        default_value = "/etc/policies/commonRegistries.yaml",
        env = "REGISTRY_POLICY_COMMON_REGISTRIES"
    )]
    common_registries_path: PathBuf,

    /// A YAML map of namespace names to the image prefixes allowed in them.
    #[clap(
        long,
        default_value = "/etc/policies/namespaceRegistryMap.yaml",
        env = "REGISTRY_POLICY_NAMESPACE_REGISTRIES"
    )]
    namespace_registries_path: PathBuf,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            admission_controller_disabled,
            common_registries_path,
            namespace_registries_path,
        } = self;

        let server = if admission_controller_disabled {
            None
        } else {
            Some(server)
        };

        let mut prom = <Registry>::default();
        let admission_metrics =
            AdmissionMetrics::register(prom.sub_registry_with_prefix("admission"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(server)
            .build()
            .await?;

        info!(
            common = %common_registries_path.display(),
            namespaced = %namespace_registries_path.display(),
            "Reading registry policy from files"
        );
        let source = FilePolicySource::new(common_registries_path, namespace_registries_path);
        let admission = Admission::new(Pipeline::new(source), admission_metrics);
        let runtime = runtime.spawn_server(move || admission.clone());

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
