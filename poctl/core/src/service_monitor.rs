//! Derives a `ServiceMonitor` from the `Service` it should scrape.

use poctl_k8s_api::{
    labels, Endpoint, IntOrString, Port, Service, ServiceMonitor, ServiceMonitorSpec,
    ServicePort,
};
use std::num::NonZeroU16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("service has no name")]
    MissingName,

    #[error("service {0} exposes no ports")]
    NoPorts(String),

    #[error("service {service} has no port named {port} (available: {available})")]
    PortNotFound {
        service: String,
        port: String,
        available: String,
    },

    #[error("service {service} has an invalid port number {port}")]
    InvalidPort { service: String, port: i32 },
}

/// Builds a `ServiceMonitor` named after `service` that carries its labels
/// and scrapes its ports.
///
/// The monitor's `matchLabels` are the service's pod selector. When `port` is
/// set and not empty, only the service port with that name becomes an
/// endpoint.
pub fn from_service(
    service: &Service,
    namespace: &str,
    port: Option<&str>,
) -> Result<ServiceMonitor, Error> {
    let name = service.metadata.name.clone().ok_or(Error::MissingName)?;
    let port = port.filter(|p| !p.is_empty());

    let spec = service.spec.as_ref();
    let ports = spec.and_then(|s| s.ports.as_deref()).unwrap_or_default();
    if ports.is_empty() {
        return Err(Error::NoPorts(name));
    }

    let endpoints = ports
        .iter()
        .filter(|p| match port {
            Some(wanted) => p.name.as_deref() == Some(wanted),
            None => true,
        })
        .map(|p| endpoint(&name, p))
        .collect::<Result<Vec<_>, _>>()?;

    if let (Some(wanted), true) = (port, endpoints.is_empty()) {
        let available = ports
            .iter()
            .filter_map(|p| p.name.as_deref())
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(Error::PortNotFound {
            service: name,
            port: wanted.to_string(),
            available,
        });
    }

    tracing::debug!(service = %name, endpoints = endpoints.len(), "Derived endpoints");

    let pod_selector = spec.and_then(|s| s.selector.clone()).unwrap_or_default();
    let spec = ServiceMonitorSpec {
        endpoints,
        selector: labels::Selector::from_map(pod_selector),
        ..Default::default()
    };
    let mut monitor = ServiceMonitor::new(&name, spec);
    monitor.metadata.namespace = Some(namespace.to_string());
    monitor.metadata.labels = service.metadata.labels.clone();
    Ok(monitor)
}

/// Named ports are referenced by name. Unnamed ports can only be referenced
/// through the pod port they target.
fn endpoint(service: &str, port: &ServicePort) -> Result<Endpoint, Error> {
    if let Some(name) = port.name.as_deref().filter(|n| !n.is_empty()) {
        return Ok(Endpoint {
            port: Some(name.to_string()),
            honor_labels: Some(true),
            ..Default::default()
        });
    }

    let target_port = match port.target_port.as_ref() {
        Some(IntOrString::String(name)) => Port::Name(name.clone()),
        Some(IntOrString::Int(n)) => port_number(service, *n)?,
        None => port_number(service, port.port)?,
    };
    Ok(Endpoint {
        target_port: Some(target_port),
        honor_labels: Some(true),
        ..Default::default()
    })
}

fn port_number(service: &str, port: i32) -> Result<Port, Error> {
    u16::try_from(port)
        .ok()
        .and_then(NonZeroU16::new)
        .map(Port::Number)
        .ok_or_else(|| Error::InvalidPort {
            service: service.to_string(),
            port,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::{btreemap, convert_args};
    use poctl_k8s_api::{ObjectMeta, ServiceSpec};

    fn mk_service(ports: Vec<ServicePort>) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("shop".to_string()),
                labels: Some(convert_args!(btreemap!(
                    "app.kubernetes.io/name" => "web",
                    "team" => "storefront",
                ))),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(convert_args!(btreemap!("app" => "web-pods"))),
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn named_port(name: &str, port: i32) -> ServicePort {
        ServicePort {
            name: Some(name.to_string()),
            port,
            ..Default::default()
        }
    }

    fn by_name(name: &str) -> Endpoint {
        Endpoint {
            port: Some(name.to_string()),
            honor_labels: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn every_port_becomes_an_endpoint() {
        let svc = mk_service(vec![named_port("http", 80), named_port("metrics", 9090)]);
        let sm = from_service(&svc, "shop", None).expect("must derive");

        assert_eq!(sm.metadata.name.as_deref(), Some("web"));
        assert_eq!(sm.metadata.namespace.as_deref(), Some("shop"));
        assert_eq!(sm.metadata.labels, svc.metadata.labels);
        assert_eq!(sm.spec.endpoints, vec![by_name("http"), by_name("metrics")]);
    }

    #[test]
    fn selector_is_the_pod_selector() {
        let svc = mk_service(vec![named_port("http", 80)]);
        let sm = from_service(&svc, "shop", None).expect("must derive");

        let pods = poctl_k8s_api::Labels::from(convert_args!(btreemap!("app" => "web-pods")));
        assert!(sm.spec.selector.matches(&pods));
        assert_eq!(
            sm.spec.selector.match_labels(),
            svc.spec.as_ref().and_then(|s| s.selector.as_ref()),
        );
        let service_labels = poctl_k8s_api::Labels::from(svc.metadata.labels.clone());
        assert!(!sm.spec.selector.matches(&service_labels));
    }

    #[test]
    fn unlabelled_services_are_accepted() {
        let mut svc = mk_service(vec![named_port("http", 80)]);
        svc.metadata.labels = None;
        let sm = from_service(&svc, "shop", None).expect("must derive");
        assert_eq!(sm.metadata.labels, None);
        assert_eq!(sm.spec.endpoints, vec![by_name("http")]);
    }

    #[test]
    fn port_filter() {
        let svc = mk_service(vec![named_port("http", 80), named_port("metrics", 9090)]);
        let sm = from_service(&svc, "shop", Some("metrics")).expect("must derive");
        assert_eq!(sm.spec.endpoints, vec![by_name("metrics")]);
    }

    #[test]
    fn empty_port_filter_keeps_every_port() {
        let svc = mk_service(vec![named_port("http", 80), named_port("metrics", 9090)]);
        let sm = from_service(&svc, "shop", Some("")).expect("must derive");
        assert_eq!(sm.spec.endpoints, vec![by_name("http"), by_name("metrics")]);
    }

    #[test]
    fn unknown_port_filter() {
        let svc = mk_service(vec![named_port("http", 80), named_port("metrics", 9090)]);
        assert_eq!(
            from_service(&svc, "shop", Some("grpc")),
            Err(Error::PortNotFound {
                service: "web".to_string(),
                port: "grpc".to_string(),
                available: "http, metrics".to_string(),
            }),
        );
    }

    #[test]
    fn unnamed_port_uses_target_port() {
        let svc = mk_service(vec![ServicePort {
            port: 80,
            target_port: Some(IntOrString::Int(8080)),
            ..Default::default()
        }]);
        let sm = from_service(&svc, "shop", None).expect("must derive");
        assert_eq!(
            sm.spec.endpoints,
            vec![Endpoint {
                target_port: NonZeroU16::new(8080).map(Port::Number),
                honor_labels: Some(true),
                ..Default::default()
            }],
        );

        let svc = mk_service(vec![ServicePort {
            port: 80,
            target_port: Some(IntOrString::String("admin-http".to_string())),
            ..Default::default()
        }]);
        let sm = from_service(&svc, "shop", None).expect("must derive");
        assert_eq!(
            sm.spec.endpoints[0].target_port,
            Some(Port::Name("admin-http".to_string())),
        );

        let svc = mk_service(vec![ServicePort {
            port: 80,
            ..Default::default()
        }]);
        let sm = from_service(&svc, "shop", None).expect("must derive");
        assert_eq!(
            sm.spec.endpoints[0].target_port,
            NonZeroU16::new(80).map(Port::Number),
        );
    }

    #[test]
    fn invalid_port_number() {
        let svc = mk_service(vec![ServicePort {
            port: 80,
            target_port: Some(IntOrString::Int(0)),
            ..Default::default()
        }]);
        assert_eq!(
            from_service(&svc, "shop", None),
            Err(Error::InvalidPort {
                service: "web".to_string(),
                port: 0,
            }),
        );
    }

    #[test]
    fn rejects_services_without_ports_or_name() {
        let svc = mk_service(vec![]);
        assert_eq!(
            from_service(&svc, "shop", None),
            Err(Error::NoPorts("web".to_string())),
        );

        let svc = Service::default();
        assert_eq!(from_service(&svc, "shop", None), Err(Error::MissingName));
    }

    #[test]
    fn serializes_with_type_information() {
        let svc = mk_service(vec![named_port("metrics", 9090)]);
        let sm = from_service(&svc, "shop", None).expect("must derive");
        let json = serde_json::to_value(&sm).unwrap();
        assert_eq!(json["apiVersion"], "monitoring.coreos.com/v1");
        assert_eq!(json["kind"], "ServiceMonitor");
        assert_eq!(
            json["spec"]["selector"]["matchLabels"],
            serde_json::json!({ "app": "web-pods" }),
        );
        assert_eq!(json["metadata"]["labels"]["team"], "storefront");
        assert_eq!(
            json["spec"]["endpoints"],
            serde_json::json!([{ "port": "metrics", "honorLabels": true }]),
        );
    }
}
