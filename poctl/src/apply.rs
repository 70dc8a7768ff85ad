use crate::{
    manifest::{self, Manifest},
    ClientArgs, ClientSet,
};
use anyhow::{Context, Result};
use kube::{
    api::{Patch, PatchParams},
    discovery::{self, Scope},
};
use poctl_core::FIELD_MANAGER;
use poctl_k8s_api::{DynamicObject, ResourceExt};
use std::path::PathBuf;
use tracing::info;

/// Server-side apply the objects in a manifest file.
#[derive(Debug, clap::Args)]
pub struct ApplyArgs {
    /// Manifest to apply; `-` reads from stdin.
    #[clap(long, short = 'f')]
    filename: PathBuf,

    /// Namespace for namespaced objects that do not set one.
    #[clap(long, short = 'n', default_value = "default")]
    namespace: String,

    /// Ask the API server to validate the objects without persisting them.
    #[clap(long)]
    dry_run: bool,
}

// === impl ApplyArgs ===

impl ApplyArgs {
    pub async fn run(self, client: &ClientArgs) -> Result<()> {
        let manifests = manifest::read(&self.filename)
            .with_context(|| format!("error while reading {}", self.filename.display()))?;
        let clients = client.try_client_set().await?;
        apply_manifests(&clients, manifests, &self.namespace, self.dry_run).await?;
        Ok(())
    }
}

/// Applies each manifest in order, stopping at the first failure.
pub async fn apply_manifests(
    clients: &ClientSet,
    manifests: Vec<Manifest>,
    default_ns: &str,
    dry_run: bool,
) -> Result<Vec<DynamicObject>> {
    let mut params = PatchParams::apply(FIELD_MANAGER);
    params.dry_run = dry_run;

    let mut applied = Vec::with_capacity(manifests.len());
    for manifest in manifests {
        let gvk = manifest.gvk();
        let name = manifest
            .metadata()
            .name
            .clone()
            .with_context(|| format!("{} has no name", gvk.kind))?;
        let mut obj = manifest
            .into_dynamic()
            .with_context(|| format!("error while encoding {} {name}", gvk.kind))?;

        let (resource, caps) = discovery::pinned_kind(&clients.client(), &gvk)
            .await
            .with_context(|| {
                format!("error while discovering {}/{}", gvk.api_version(), gvk.kind)
            })?;
        let namespace = match caps.scope {
            Scope::Namespaced => {
                let ns = obj.namespace().unwrap_or_else(|| default_ns.to_string());
                obj.metadata.namespace = Some(ns.clone());
                Some(ns)
            }
            Scope::Cluster => None,
        };

        let api = clients.dynamic(&resource, namespace.as_deref());
        let obj = api
            .patch(&name, &params, &Patch::Apply(&obj))
            .await
            .with_context(|| format!("error while applying {} {name}", gvk.kind))?;
        info!(kind = %gvk.kind, %name, namespace = ?namespace, dry_run, "Applied");
        applied.push(obj);
    }
    Ok(applied)
}
