use crate::labels;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A Prometheus server running in agent mode.
///
/// Only the fields consumed by this tool are modelled; everything else in the
/// resource is ignored when reading it.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "monitoring.coreos.com",
    version = "v1alpha1",
    kind = "PrometheusAgent",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusAgentSpec {
    /// The service account the agent pods run as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_monitor_selector: Option<labels::Selector>,
}

impl PrometheusAgentSpec {
    /// Pods without an explicit service account run as `default`.
    pub const DEFAULT_SERVICE_ACCOUNT: &'static str = "default";

    pub fn service_account(&self) -> &str {
        match self.service_account_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => Self::DEFAULT_SERVICE_ACCOUNT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;

    #[test]
    fn resource_type() {
        assert_eq!(
            PrometheusAgent::api_version(&()),
            "monitoring.coreos.com/v1alpha1"
        );
        assert_eq!(PrometheusAgent::plural(&()), "prometheusagents");
    }

    #[test]
    fn ignores_unmodelled_fields() {
        let agent: PrometheusAgent = serde_yaml::from_str(
            r#"
apiVersion: monitoring.coreos.com/v1alpha1
kind: PrometheusAgent
metadata:
  name: agent
  namespace: monitoring
spec:
  serviceAccountName: prometheus-agent
  replicas: 2
  remoteWrite:
    - url: http://mimir:9009/api/v1/push
"#,
        )
        .expect("manifest must parse");
        assert_eq!(agent.spec.service_account(), "prometheus-agent");
        assert_eq!(agent.spec.replicas, Some(2));
    }

    #[test]
    fn service_account_defaults() {
        assert_eq!(PrometheusAgentSpec::default().service_account(), "default");
        let spec = PrometheusAgentSpec {
            service_account_name: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(spec.service_account(), "default");
    }
}
