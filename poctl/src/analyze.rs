//! Compliance checks for monitoring resources deployed in a cluster.

use crate::{ClientArgs, ClientSet};
use anyhow::{bail, Context, Result};
use kube::api::ListParams;
use poctl_core::rbac::{self, Report, Violation};
use poctl_k8s_api::{PrometheusAgent, Resource};
use tracing::{debug, info};

/// Selects the ClusterRoleBindings installed for the Prometheus agent.
pub const PROMETHEUS_AGENT_BINDING_SELECTOR: &str = "name=prometheus-agent";

/// Check that a monitoring resource is deployed correctly.
#[derive(Debug, clap::Args)]
pub struct AnalyzeArgs {
    /// The kind of resource to analyze.
    #[clap(long, value_enum)]
    kind: Kind,

    /// The name of the resource.
    #[clap(long)]
    name: String,

    /// The namespace of the resource.
    #[clap(long, short = 'n', default_value = "default")]
    namespace: String,

    /// Label selector for the ClusterRoleBindings that grant the agent its
    /// permissions.
    #[clap(long, default_value = PROMETHEUS_AGENT_BINDING_SELECTOR)]
    binding_selector: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Kind {
    #[value(name = "prometheusagent", alias = "prometheus-agent")]
    PrometheusAgent,
}

/// Identifies the agent to analyze.
#[derive(Clone, Debug)]
pub struct AgentTarget {
    pub name: String,
    pub namespace: String,
    pub binding_selector: String,
}

// === impl AnalyzeArgs ===

impl AnalyzeArgs {
    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub async fn run(self, client: &ClientArgs) -> Result<()> {
        let clients = client.try_client_set().await?;
        match self.kind {
            Kind::PrometheusAgent => {
                let target = AgentTarget {
                    name: self.name,
                    namespace: self.namespace,
                    binding_selector: self.binding_selector,
                };
                let report = run_prometheus_agent_analyzer(&clients, &target).await?;
                if !report.is_compliant() {
                    for violation in report.violations() {
                        println!("{violation}");
                    }
                    bail!(
                        "PrometheusAgent {}/{} has {} compliance issue(s)",
                        target.namespace,
                        target.name,
                        report.violations().len()
                    );
                }
                Ok(())
            }
        }
    }
}

/// Checks that the agent's service account is bound to ClusterRoles that let
/// it discover and scrape targets.
pub async fn run_prometheus_agent_analyzer(
    clients: &ClientSet,
    target: &AgentTarget,
) -> Result<Report> {
    let AgentTarget {
        name,
        namespace,
        binding_selector,
    } = target;

    let Some(agent) = clients
        .prometheus_agents(namespace)
        .get_opt(name)
        .await
        .context("error while getting PrometheusAgent")?
    else {
        if !crd_installed(clients).await {
            bail!("the PrometheusAgent CRD is not installed in the cluster");
        }
        bail!("PrometheusAgent {name} not found in namespace {namespace}");
    };

    let bindings = clients
        .cluster_role_bindings()
        .list(&ListParams::default().labels(binding_selector))
        .await
        .context("failed to list ClusterRoleBindings")?;
    debug!(bindings = bindings.items.len(), %binding_selector, "Listed ClusterRoleBindings");

    let service_account = agent.spec.service_account();
    let mut report = Report::default();
    if !rbac::is_service_account_bound(&bindings.items, service_account, namespace) {
        report.push(Violation::ServiceAccountNotBound {
            service_account: service_account.to_string(),
            namespace: namespace.clone(),
        });
        return Ok(report);
    }

    for binding in &bindings.items {
        let role_name = match rbac::cluster_role_ref(binding) {
            Ok(role_name) => role_name,
            Err(violation) => {
                report.push(violation);
                continue;
            }
        };

        let role = clients
            .cluster_roles()
            .get_opt(role_name)
            .await
            .with_context(|| format!("failed to get ClusterRole {role_name}"))?;
        match role {
            Some(role) => report.extend(rbac::check_cluster_role(binding, &role)),
            None => report.push(Violation::ClusterRoleNotFound {
                binding: binding.metadata.name.clone().unwrap_or_default(),
                cluster_role: role_name.to_string(),
            }),
        }
    }

    if report.is_compliant() {
        info!(%name, %namespace, "Prometheus Agent is compliant, no issues found");
    }
    Ok(report)
}

/// Returns false only when the API server confirms the CRD is absent.
async fn crd_installed(clients: &ClientSet) -> bool {
    let crd_name = format!(
        "{}.{}",
        PrometheusAgent::plural(&()),
        PrometheusAgent::group(&())
    );
    match clients.custom_resource_definitions().get_opt(&crd_name).await {
        Ok(crd) => crd.is_some(),
        Err(error) => {
            debug!(%error, %crd_name, "Could not look up CRD");
            true
        }
    }
}
