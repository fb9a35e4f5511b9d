pub mod hooks;
pub mod parsers;
pub mod proxy;

pub use crate::domain::model::{CallRequest, OperationDescriptor, ServiceDescriptor, SoapResponse};
pub use crate::domain::ports::{DebugSink, Transport};
pub use crate::utils::error::Result;
