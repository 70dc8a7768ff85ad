//! Builds Kubernetes API clients from a kubeconfig.

use kube::{
    config::{KubeConfigOptions, Kubeconfig, KubeconfigError},
    Api, Client, Config,
};
use poctl_k8s_api::{
    ApiResource, ClusterRole, ClusterRoleBinding, CustomResourceDefinition, DynamicObject,
    PrometheusAgent, Service, ServiceMonitor,
};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("kubeconfig {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("no kubeconfig given and the home directory could not be determined")]
    NoHome,

    #[error("failed to read kubeconfig {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },

    #[error("failed to load client configuration: {0}")]
    Config(#[from] KubeconfigError),

    #[error("failed to create client: {0}")]
    Client(#[from] kube::Error),
}

/// Selects the cluster to talk to.
#[derive(Clone, Debug, Default, clap::Args)]
pub struct ClientArgs {
    /// Path to the kubeconfig file. Defaults to `$KUBECONFIG` or
    /// `~/.kube/config`.
    #[clap(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// The kubeconfig context to use.
    #[clap(long, global = true)]
    pub context: Option<String>,

    /// The kubeconfig cluster to use.
    #[clap(long, global = true)]
    pub cluster: Option<String>,

    /// The kubeconfig user to use.
    #[clap(long, global = true)]
    pub user: Option<String>,
}

/// Typed and dynamic clients sharing one connection.
#[derive(Clone)]
pub struct ClientSet {
    client: Client,
}

// === impl ClientArgs ===

impl ClientArgs {
    pub async fn try_client_set(&self) -> Result<ClientSet, Error> {
        let path = resolve_kubeconfig(self.kubeconfig.as_deref())?;
        tracing::debug!(kubeconfig = %path.display(), "Loading client configuration");
        let kubeconfig = Kubeconfig::read_from(&path).map_err(|source| Error::Read {
            path: path.clone(),
            source,
        })?;

        let config = Config::from_custom_kubeconfig(kubeconfig, &self.options()).await?;
        let client = Client::try_from(config)?;
        Ok(ClientSet::new(client))
    }

    fn options(&self) -> KubeConfigOptions {
        KubeConfigOptions {
            context: self.context.clone(),
            cluster: self.cluster.clone(),
            user: self.user.clone(),
        }
    }
}

/// Finds the kubeconfig to load.
///
/// An explicit path wins, then the first existing entry of `$KUBECONFIG`,
/// then `$HOME/.kube/config`.
pub fn resolve_kubeconfig(explicit: Option<&Path>) -> Result<PathBuf, Error> {
    resolve_kubeconfig_from(
        explicit,
        std::env::var_os("KUBECONFIG"),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

fn resolve_kubeconfig_from(
    explicit: Option<&Path>,
    kubeconfig_env: Option<OsString>,
    home: Option<PathBuf>,
) -> Result<PathBuf, Error> {
    if let Some(path) = explicit {
        return existing(path.to_path_buf());
    }

    if let Some(paths) = kubeconfig_env.filter(|p| !p.is_empty()) {
        if let Some(path) = std::env::split_paths(&paths).find(|p| p.is_file()) {
            return Ok(path);
        }
        tracing::debug!(?paths, "No kubeconfig in KUBECONFIG exists");
    }

    let home = home.filter(|h| !h.as_os_str().is_empty()).ok_or(Error::NoHome)?;
    existing(home.join(".kube").join("config"))
}

fn existing(path: PathBuf) -> Result<PathBuf, Error> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::NotFound(path))
    }
}

// === impl ClientSet ===

impl ClientSet {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn services(&self, ns: &str) -> Api<Service> {
        Api::namespaced(self.client(), ns)
    }

    pub fn service_monitors(&self, ns: &str) -> Api<ServiceMonitor> {
        Api::namespaced(self.client(), ns)
    }

    pub fn prometheus_agents(&self, ns: &str) -> Api<PrometheusAgent> {
        Api::namespaced(self.client(), ns)
    }

    pub fn cluster_role_bindings(&self) -> Api<ClusterRoleBinding> {
        Api::all(self.client())
    }

    pub fn cluster_roles(&self) -> Api<ClusterRole> {
        Api::all(self.client())
    }

    pub fn custom_resource_definitions(&self) -> Api<CustomResourceDefinition> {
        Api::all(self.client())
    }

    /// Returns an untyped client for `resource`. Cluster-scoped resources
    /// take no namespace.
    pub fn dynamic(&self, resource: &ApiResource, ns: Option<&str>) -> Api<DynamicObject> {
        match ns {
            Some(ns) => Api::namespaced_with(self.client(), ns, resource),
            None => Api::all_with(self.client(), resource),
        }
    }
}
