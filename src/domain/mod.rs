// Domain layer: core models and ports (interfaces) shared by the adapters and the proxy.

pub mod model;
pub mod ports;
