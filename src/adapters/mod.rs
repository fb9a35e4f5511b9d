// Adapters layer: concrete implementations for external systems (http transport, WSDL and SOAP XML).

pub mod http;
pub mod soap;
pub mod wsdl;
pub mod xml;
