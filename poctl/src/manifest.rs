//! Decodes Kubernetes manifests into typed objects.

use poctl_k8s_api::{
    ClusterRole, ClusterRoleBinding, CustomResourceDefinition, DynamicObject, GroupVersionKind,
    ObjectMeta, PrometheusAgent, Resource, Service, ServiceMonitor,
};
use serde::Deserialize;
use serde_json::Value;
use std::{fs, io, path::Path};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read manifest: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse document {index}: {source}")]
    Parse {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("document {index} has no apiVersion or kind")]
    MissingType { index: usize },

    #[error("failed to decode document {index} as {kind}: {source}")]
    Decode {
        index: usize,
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A decoded manifest document.
#[derive(Clone, Debug)]
pub enum Manifest {
    Service(Service),
    ServiceMonitor(ServiceMonitor),
    PrometheusAgent(PrometheusAgent),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
    CustomResourceDefinition(CustomResourceDefinition),
    Other(DynamicObject),
}

/// Reads every document from a YAML or JSON stream. Empty documents are
/// skipped.
pub fn decode(reader: impl io::Read) -> Result<Vec<Manifest>, Error> {
    let mut manifests = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_reader(reader).enumerate() {
        let value =
            Value::deserialize(document).map_err(|source| Error::Parse { index, source })?;
        if value.is_null() {
            continue;
        }
        manifests.push(Manifest::from_value(index, value)?);
    }
    Ok(manifests)
}

/// Reads a manifest file, or stdin when `path` is `-`.
pub fn read(path: &Path) -> Result<Vec<Manifest>, Error> {
    if path == Path::new("-") {
        return decode(io::stdin().lock());
    }
    decode(fs::File::open(path)?)
}

// === impl Manifest ===

impl Manifest {
    fn from_value(index: usize, value: Value) -> Result<Self, Error> {
        let (api_version, kind) = match (
            value.get("apiVersion").and_then(Value::as_str),
            value.get("kind").and_then(Value::as_str),
        ) {
            (Some(api_version), Some(kind)) if !api_version.is_empty() && !kind.is_empty() => {
                (api_version.to_string(), kind.to_string())
            }
            _ => return Err(Error::MissingType { index }),
        };

        let decode_err = |source| Error::Decode {
            index,
            kind: kind.clone(),
            source,
        };
        let manifest = if is::<Service>(&api_version, &kind) {
            Self::Service(serde_json::from_value(value).map_err(decode_err)?)
        } else if is::<ServiceMonitor>(&api_version, &kind) {
            Self::ServiceMonitor(serde_json::from_value(value).map_err(decode_err)?)
        } else if is::<PrometheusAgent>(&api_version, &kind) {
            Self::PrometheusAgent(serde_json::from_value(value).map_err(decode_err)?)
        } else if is::<ClusterRole>(&api_version, &kind) {
            Self::ClusterRole(serde_json::from_value(value).map_err(decode_err)?)
        } else if is::<ClusterRoleBinding>(&api_version, &kind) {
            Self::ClusterRoleBinding(serde_json::from_value(value).map_err(decode_err)?)
        } else if is::<CustomResourceDefinition>(&api_version, &kind) {
            Self::CustomResourceDefinition(serde_json::from_value(value).map_err(decode_err)?)
        } else {
            Self::Other(serde_json::from_value(value).map_err(decode_err)?)
        };
        Ok(manifest)
    }

    pub fn gvk(&self) -> GroupVersionKind {
        match self {
            Self::Service(_) => gvk_of::<Service>(),
            Self::ServiceMonitor(_) => gvk_of::<ServiceMonitor>(),
            Self::PrometheusAgent(_) => gvk_of::<PrometheusAgent>(),
            Self::ClusterRole(_) => gvk_of::<ClusterRole>(),
            Self::ClusterRoleBinding(_) => gvk_of::<ClusterRoleBinding>(),
            Self::CustomResourceDefinition(_) => gvk_of::<CustomResourceDefinition>(),
            Self::Other(obj) => {
                let types = obj.types.clone().unwrap_or_default();
                let (group, version) = match types.api_version.split_once('/') {
                    Some((group, version)) => (group.to_string(), version.to_string()),
                    None => (String::new(), types.api_version),
                };
                GroupVersionKind::gvk(&group, &version, &types.kind)
            }
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Service(o) => o.meta(),
            Self::ServiceMonitor(o) => o.meta(),
            Self::PrometheusAgent(o) => o.meta(),
            Self::ClusterRole(o) => o.meta(),
            Self::ClusterRoleBinding(o) => o.meta(),
            Self::CustomResourceDefinition(o) => o.meta(),
            Self::Other(o) => o.meta(),
        }
    }

    /// Converts the document into an untyped object, keeping its type
    /// information.
    pub fn into_dynamic(self) -> Result<DynamicObject, serde_json::Error> {
        let value = match self {
            Self::Service(o) => serde_json::to_value(o)?,
            Self::ServiceMonitor(o) => serde_json::to_value(o)?,
            Self::PrometheusAgent(o) => serde_json::to_value(o)?,
            Self::ClusterRole(o) => serde_json::to_value(o)?,
            Self::ClusterRoleBinding(o) => serde_json::to_value(o)?,
            Self::CustomResourceDefinition(o) => serde_json::to_value(o)?,
            Self::Other(o) => return Ok(o),
        };
        serde_json::from_value(value)
    }
}

fn is<K: Resource<DynamicType = ()>>(api_version: &str, kind: &str) -> bool {
    K::api_version(&()) == api_version && K::kind(&()) == kind
}

fn gvk_of<K: Resource<DynamicType = ()>>() -> GroupVersionKind {
    GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()))
}
