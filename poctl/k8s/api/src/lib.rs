#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
pub mod monitoring;

pub use self::{
    labels::Labels,
    monitoring::{
        Endpoint, NamespaceSelector, Port, PrometheusAgent, PrometheusAgentSpec, ServiceMonitor,
        ServiceMonitorSpec,
    },
};
pub use k8s_openapi::{
    api::{
        self,
        core::v1::{Service, ServicePort, ServiceSpec},
        rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject},
    },
    apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
    apimachinery::pkg::util::intstr::IntOrString,
};
pub use kube::core::{
    ApiResource, DynamicObject, GroupVersionKind, ObjectMeta, Resource, ResourceExt,
};
