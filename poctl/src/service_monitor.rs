use crate::{
    client,
    manifest::{self, Manifest},
    ClientArgs, ClientSet,
};
use anyhow::{bail, Context, Result};
use kube::api::{Patch, PatchParams};
use poctl_core::{service_monitor::from_service, FIELD_MANAGER};
use poctl_k8s_api::{ResourceExt, Service, ServiceMonitor};
use std::{future::Future, io, path::PathBuf};
use tracing::info;

const DEFAULT_NAMESPACE: &str = "default";

/// Create a ServiceMonitor that scrapes an existing Service.
#[derive(Debug, clap::Args)]
pub struct CreateArgs {
    /// Service name to create the service monitor from.
    #[clap(long, short = 's', required_unless_present = "from_file")]
    service: Option<String>,

    /// Namespace of the service. Defaults to the namespace set in
    /// `--from-file`, then `default`.
    #[clap(long, short = 'n')]
    namespace: Option<String>,

    /// Only scrape the service port with this name.
    #[clap(long, short = 'p')]
    port: Option<String>,

    /// Read the service from a manifest file instead of the cluster.
    #[clap(long, conflicts_with = "service")]
    from_file: Option<PathBuf>,

    /// Print the service monitor instead of applying it.
    #[clap(long)]
    dry_run: bool,
}

// === impl CreateArgs ===

impl CreateArgs {
    pub async fn run(self, client: &ClientArgs) -> Result<()> {
        self.create(|| client.try_client_set(), io::stdout()).await
    }

    /// Connects to the cluster only when the service has to be fetched or the
    /// monitor applied.
    async fn create<C, F>(self, connect: C, mut out: impl io::Write) -> Result<()>
    where
        C: FnOnce() -> F,
        F: Future<Output = Result<ClientSet, client::Error>>,
    {
        let Self {
            service,
            namespace,
            port,
            from_file,
            dry_run,
        } = self;
        let port = port.as_deref();

        let Some(path) = from_file else {
            let name = service.unwrap_or_default();
            if name.is_empty() {
                bail!("service name is required");
            }
            let namespace = namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
            let clients = connect().await?;
            if !dry_run {
                create_from_service(&clients, namespace, &name, port).await?;
                return Ok(());
            }
            let monitor = derive(&clients, namespace, &name, port).await?;
            return write_yaml(&mut out, &monitor);
        };

        let service = read_service(&path)?;
        let namespace = namespace
            .or_else(|| service.namespace())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let monitor = from_service(&service, &namespace, port)
            .context("error while creating service monitor")?;
        if dry_run {
            return write_yaml(&mut out, &monitor);
        }
        let clients = connect().await?;
        apply(&clients, &monitor).await?;
        Ok(())
    }
}

/// Derives a ServiceMonitor from the named Service and applies it.
pub async fn create_from_service(
    clients: &ClientSet,
    namespace: &str,
    service: &str,
    port: Option<&str>,
) -> Result<ServiceMonitor> {
    let monitor = derive(clients, namespace, service, port).await?;
    apply(clients, &monitor).await
}

async fn derive(
    clients: &ClientSet,
    namespace: &str,
    service: &str,
    port: Option<&str>,
) -> Result<ServiceMonitor> {
    if service.is_empty() {
        bail!("service name is required");
    }
    let service = get_service(clients, namespace, service).await?;
    from_service(&service, namespace, port).context("error while creating service monitor")
}

pub async fn get_service(clients: &ClientSet, namespace: &str, name: &str) -> Result<Service> {
    clients
        .services(namespace)
        .get_opt(name)
        .await
        .with_context(|| format!("error while getting service {name}"))?
        .with_context(|| format!("service {name} not found in namespace {namespace}"))
}

/// Server-side applies `monitor`.
pub async fn apply(clients: &ClientSet, monitor: &ServiceMonitor) -> Result<ServiceMonitor> {
    let name = monitor.name_any();
    let namespace = monitor.namespace().unwrap_or_default();
    let params = PatchParams::apply(FIELD_MANAGER);
    let applied = clients
        .service_monitors(&namespace)
        .patch(&name, &params, &Patch::Apply(monitor))
        .await
        .with_context(|| format!("error while creating service monitor {name}"))?;
    info!(%name, %namespace, endpoints = applied.spec.endpoints.len(), "Applied service monitor");
    Ok(applied)
}

fn write_yaml(out: &mut impl io::Write, monitor: &ServiceMonitor) -> Result<()> {
    out.write_all(serde_yaml::to_string(monitor)?.as_bytes())?;
    Ok(())
}

fn read_service(path: &std::path::Path) -> Result<Service> {
    let manifests = manifest::read(path)
        .with_context(|| format!("error while reading {}", path.display()))?;
    let mut services = manifests.into_iter().filter_map(|m| match m {
        Manifest::Service(svc) => Some(svc),
        _ => None,
    });
    match (services.next(), services.next()) {
        (Some(svc), None) => Ok(svc),
        (None, _) => bail!("{} does not contain a Service", path.display()),
        (Some(_), Some(_)) => bail!("{} contains more than one Service", path.display()),
    }
}
