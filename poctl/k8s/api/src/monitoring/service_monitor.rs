use crate::labels;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU16;

/// Declares how a set of services should be scraped.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "monitoring.coreos.com",
    version = "v1",
    kind = "ServiceMonitor",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMonitorSpec {
    /// The label on the target service to use as the job name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_label: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_labels: Vec<String>,

    #[serde(default)]
    pub endpoints: Vec<Endpoint>,

    /// Selects the services to scrape.
    pub selector: labels::Selector,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<NamespaceSelector>,
}

/// A scrapable endpoint of a selected service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Name of the service port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    /// Name or number of the target port of the pod behind the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<Port>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_timeout: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub honor_labels: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSelector {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub any: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_names: Vec<String>,
}

/// References a port by name or number.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum Port {
    Number(NonZeroU16),
    Name(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;
    use maplit::btreemap;

    #[test]
    fn resource_type() {
        assert_eq!(ServiceMonitor::api_version(&()), "monitoring.coreos.com/v1");
        assert_eq!(ServiceMonitor::kind(&()), "ServiceMonitor");
        assert_eq!(ServiceMonitor::plural(&()), "servicemonitors");
    }

    #[test]
    fn parses_manifest() {
        let sm: ServiceMonitor = serde_yaml::from_str(
            r#"
apiVersion: monitoring.coreos.com/v1
kind: ServiceMonitor
metadata:
  name: web
  namespace: shop
spec:
  selector:
    matchLabels:
      app: web
  endpoints:
    - port: metrics
      honorLabels: true
    - targetPort: 9090
      interval: 30s
"#,
        )
        .expect("manifest must parse");

        assert_eq!(
            sm.spec.selector,
            labels::Selector::from_map(btreemap! { "app".to_string() => "web".to_string() }),
        );
        assert_eq!(
            sm.spec.endpoints,
            vec![
                Endpoint {
                    port: Some("metrics".to_string()),
                    honor_labels: Some(true),
                    ..Default::default()
                },
                Endpoint {
                    target_port: NonZeroU16::new(9090).map(Port::Number),
                    interval: Some("30s".to_string()),
                    ..Default::default()
                },
            ],
        );
    }

    #[test]
    fn omits_unset_fields() {
        let endpoint = Endpoint {
            port: Some("http".to_string()),
            honor_labels: Some(true),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&endpoint).unwrap(),
            serde_json::json!({ "port": "http", "honorLabels": true }),
        );
    }
}
