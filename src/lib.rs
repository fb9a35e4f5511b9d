pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::http::{HttpTransport, HttpTransportOptions, StderrSink, TracingSink};
pub use crate::config::toml_config::ProxyConfig;
pub use crate::core::hooks::{EndpointResolver, ParseHook, RequestBuilder};
pub use crate::core::parsers;
pub use crate::core::proxy::{OperationHandle, ProxyBuilder, ServiceProxy};
pub use crate::domain::model::{
    CallRequest, ElementName, OperationDescriptor, ProxyEndpoint, ServiceDescriptor, SoapResponse,
    SoapVersion,
};
pub use crate::domain::ports::{DebugSink, Transport};
pub use crate::utils::error::{ProxyError, Result};
