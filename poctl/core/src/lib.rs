#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod rbac;
pub mod service_monitor;

/// The field manager used for server-side apply.
pub const FIELD_MANAGER: &str = "application/apply-patch";
