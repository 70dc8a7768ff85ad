//! Checks that a Prometheus agent's RBAC grants what it needs to discover and
//! scrape targets.

use poctl_k8s_api::{ClusterRole, ClusterRoleBinding, PolicyRule, ResourceExt};
use std::fmt;

/// Verbs needed on every resource used for service discovery.
pub const DISCOVERY_VERBS: [&str; 3] = ["get", "list", "watch"];

const CONFIGMAPS: &str = "configmaps";
const METRICS_URL: &str = "/metrics";
const SERVICE_ACCOUNT_KIND: &str = "ServiceAccount";
const CLUSTER_ROLE_KIND: &str = "ClusterRole";
const WILDCARD: &str = "*";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    ServiceAccountNotBound {
        service_account: String,
        namespace: String,
    },
    MissingVerbs {
        cluster_role: String,
        resource: String,
        verbs: Vec<String>,
    },
    MissingMetricsAccess {
        cluster_role: String,
    },
    UnsupportedRoleRef {
        binding: String,
        kind: String,
    },
    ClusterRoleNotFound {
        binding: String,
        cluster_role: String,
    },
}

/// The outcome of an analysis.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    violations: Vec<Violation>,
}

// === impl Violation ===

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceAccountNotBound {
                service_account,
                namespace,
            } => write!(
                f,
                "ServiceAccount {namespace}/{service_account} is not bound to any ClusterRoleBinding"
            ),
            Self::MissingVerbs {
                cluster_role,
                resource,
                verbs,
            } => write!(
                f,
                "ClusterRole {cluster_role} is missing verbs [{}] for resource {resource}",
                verbs.join(", ")
            ),
            Self::MissingMetricsAccess { cluster_role } => write!(
                f,
                "ClusterRole {cluster_role} does not include 'get' verb for NonResourceURL '{METRICS_URL}'"
            ),
            Self::UnsupportedRoleRef { binding, kind } => write!(
                f,
                "ClusterRoleBinding {binding} references a {kind}; only ClusterRoles are supported"
            ),
            Self::ClusterRoleNotFound {
                binding,
                cluster_role,
            } => write!(
                f,
                "ClusterRole {cluster_role} referenced by ClusterRoleBinding {binding} does not exist"
            ),
        }
    }
}

// === impl Report ===

impl Report {
    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn is_compliant(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

impl Extend<Violation> for Report {
    fn extend<T: IntoIterator<Item = Violation>>(&mut self, iter: T) {
        self.violations.extend(iter);
    }
}

// === checks ===

/// Returns true if any of the bindings has the named service account as a
/// subject.
///
/// Subjects that omit a namespace match a service account in any namespace.
pub fn is_service_account_bound<'a>(
    bindings: impl IntoIterator<Item = &'a ClusterRoleBinding>,
    name: &str,
    namespace: &str,
) -> bool {
    bindings
        .into_iter()
        .flat_map(|crb| crb.subjects.iter().flatten())
        .any(|subject| {
            subject.kind == SERVICE_ACCOUNT_KIND
                && subject.name == name
                && subject.namespace.as_deref().map_or(true, |ns| ns == namespace)
        })
}

/// Returns an error if the binding does not reference a ClusterRole.
pub fn cluster_role_ref(binding: &ClusterRoleBinding) -> Result<&str, Violation> {
    if binding.role_ref.kind != CLUSTER_ROLE_KIND {
        return Err(Violation::UnsupportedRoleRef {
            binding: binding.name_any(),
            kind: binding.role_ref.kind.clone(),
        });
    }
    Ok(&binding.role_ref.name)
}

/// Checks the rules of the ClusterRole bound by `binding`.
///
/// Every resource a rule names must be readable with the discovery verbs,
/// except `configmaps`, which only needs `get`. A rule that names the
/// `/metrics` non-resource URL must allow `get`.
pub fn check_cluster_role(binding: &ClusterRoleBinding, role: &ClusterRole) -> Vec<Violation> {
    let cluster_role = binding.role_ref.name.as_str();
    let mut violations = Vec::new();

    for rule in role.rules.iter().flatten() {
        for resource in rule.resources.iter().flatten() {
            let required: &[&str] = if resource == CONFIGMAPS {
                &["get"]
            } else {
                &DISCOVERY_VERBS
            };
            let missing = missing_verbs(rule, required);
            if !missing.is_empty() {
                tracing::debug!(%cluster_role, %resource, ?missing, "Missing verbs");
                violations.push(Violation::MissingVerbs {
                    cluster_role: cluster_role.to_string(),
                    resource: resource.clone(),
                    verbs: missing,
                });
            }
        }

        let names_metrics = rule
            .non_resource_urls
            .iter()
            .flatten()
            .any(|url| url == METRICS_URL);
        if names_metrics && !allows(rule, "get") {
            violations.push(Violation::MissingMetricsAccess {
                cluster_role: cluster_role.to_string(),
            });
        }
    }

    violations
}

fn allows(rule: &PolicyRule, verb: &str) -> bool {
    rule.verbs.iter().any(|v| v == verb || v == WILDCARD)
}

fn missing_verbs(rule: &PolicyRule, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|verb| !allows(rule, verb))
        .map(|verb| verb.to_string())
        .collect()
}
