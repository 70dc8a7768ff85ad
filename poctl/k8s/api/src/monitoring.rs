pub mod prometheus_agent;
pub mod service_monitor;

pub use self::{
    prometheus_agent::{PrometheusAgent, PrometheusAgentSpec},
    service_monitor::{Endpoint, NamespaceSelector, Port, ServiceMonitor, ServiceMonitorSpec},
};
