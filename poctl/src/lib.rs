#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod analyze;
pub mod apply;
mod args;
pub mod client;
pub mod manifest;
pub mod service_monitor;
#[cfg(test)]
mod test_util;

pub use self::{
    args::Args,
    client::{ClientArgs, ClientSet},
};
