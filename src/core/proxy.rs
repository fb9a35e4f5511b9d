use crate::adapters::http::{HttpTransport, HttpTransportOptions, TracingSink};
use crate::adapters::{soap, wsdl};
use crate::core::hooks::{EndpointResolver, Hooks, ParseHook};
use crate::domain::model::{
    CallRequest, OperationDescriptor, ProxyEndpoint, ServiceDescriptor, SoapRequest, SoapResponse,
};
use crate::domain::ports::{DebugSink, Transport};
use crate::utils::error::{ProxyError, Result};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// 綁定在一份 WSDL 上的 SOAP 客戶端
///
/// 建構時就會抓取並解析 WSDL；拿到 `ServiceProxy` 代表服務描述已經可用。
pub struct ServiceProxy<T: Transport = HttpTransport> {
    endpoint: ProxyEndpoint,
    descriptor: ServiceDescriptor,
    transport: T,
    hooks: Hooks,
    resolver: EndpointResolver,
    debug_sink: Arc<dyn DebugSink>,
    debug: AtomicBool,
}

impl ServiceProxy<HttpTransport> {
    pub async fn new(uri: &str) -> Result<Self> {
        Self::builder(uri).build().await
    }

    pub fn builder(uri: impl Into<String>) -> ProxyBuilder {
        ProxyBuilder::new(uri)
    }
}

impl<T: Transport> ServiceProxy<T> {
    pub async fn with_transport(uri: &str, transport: T) -> Result<Self> {
        ProxyBuilder::new(uri).build_with(transport).await
    }

    pub fn endpoint(&self) -> &ProxyEndpoint {
        &self.endpoint
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn service_methods(&self) -> Vec<&str> {
        self.descriptor.service_methods()
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.descriptor.has_operation(name)
    }

    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::SeqCst)
    }

    /// 開啟時在傳輸層登記一次診斷輸出，關閉時移除
    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::SeqCst);
        if enabled {
            self.transport
                .set_debug_output(Some(Arc::clone(&self.debug_sink)));
            tracing::debug!("🔍 Debug output enabled for {}", self.endpoint);
        } else {
            self.transport.set_debug_output(None);
            tracing::debug!("Debug output disabled for {}", self.endpoint);
        }
    }

    /// 呼叫前會先經過 endpoint resolver 的服務位址
    pub fn service_location(&self) -> Url {
        self.descriptor
            .location
            .clone()
            .unwrap_or_else(|| self.endpoint.base_url())
    }

    pub fn operation(&self, name: &str) -> Result<OperationHandle<'_, T>> {
        Ok(OperationHandle {
            proxy: self,
            descriptor: self.resolve(name)?,
        })
    }

    pub async fn call<I, K, V>(&self, operation: &str, params: I) -> Result<Value>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.call_request(build_request(operation, params)).await
    }

    pub async fn call_request(&self, request: CallRequest) -> Result<Value> {
        let operation = self.resolve(&request.operation)?;
        let raw = self.dispatch(operation, &request).await?;
        self.hooks.apply(&operation.name, raw.body)
    }

    /// 不套用 parse hook，回傳原始 XML 與解碼後的 Body
    pub async fn call_raw(&self, request: CallRequest) -> Result<SoapResponse> {
        let operation = self.resolve(&request.operation)?;
        self.dispatch(operation, &request).await
    }

    fn resolve(&self, name: &str) -> Result<&OperationDescriptor> {
        self.descriptor.operation(name).ok_or_else(|| {
            tracing::warn!("❌ Operation '{}' is not declared by {}", name, self.endpoint);
            ProxyError::NoSuchOperation {
                name: name.to_string(),
            }
        })
    }

    async fn dispatch(
        &self,
        operation: &OperationDescriptor,
        request: &CallRequest,
    ) -> Result<SoapResponse> {
        let body = match self.hooks.request_builder(&operation.name) {
            Some(build) => build(request, operation)?,
            None => soap::default_body(&self.descriptor.target_namespace, operation, request)?,
        };

        let url = self
            .resolver
            .resolve(&self.service_location(), operation);
        let soap_request = SoapRequest {
            url,
            soap_version: operation.soap_version,
            soap_action: operation.soap_action.clone(),
            envelope: soap::build_envelope(operation.soap_version, &body),
        };

        tracing::info!("📤 Calling {} at {}", operation.name, soap_request.url);
        let started = Instant::now();
        let response = self.transport.post(&soap_request).await?;
        tracing::debug!(
            "📥 {} answered HTTP {} in {:?}",
            operation.name,
            response.status,
            started.elapsed()
        );

        let body = soap::interpret_response(&response, soap_request.url.as_str())?;
        Ok(SoapResponse {
            operation: operation.name.clone(),
            status: response.status,
            xml: response.body,
            body,
        })
    }
}

impl<T: Transport> fmt::Debug for ServiceProxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProxy")
            .field("endpoint", &self.endpoint.to_string())
            .field("service", &self.descriptor.service_name)
            .field("operations", &self.descriptor.service_methods())
            .field("hooks", &self.hooks)
            .field("debug", &self.debug())
            .finish()
    }
}

/// 已解析好的單一操作，省去每次呼叫的名稱查詢
pub struct OperationHandle<'a, T: Transport> {
    proxy: &'a ServiceProxy<T>,
    descriptor: &'a OperationDescriptor,
}

impl<'a, T: Transport> OperationHandle<'a, T> {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &OperationDescriptor {
        self.descriptor
    }

    pub fn params(&self) -> &[String] {
        &self.descriptor.input_params
    }

    pub async fn call<I, K, V>(&self, params: I) -> Result<Value>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let request = build_request(&self.descriptor.name, params);
        let raw = self.proxy.dispatch(self.descriptor, &request).await?;
        self.proxy.hooks.apply(&self.descriptor.name, raw.body)
    }

    pub async fn call_raw<I, K, V>(&self, params: I) -> Result<SoapResponse>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let request = build_request(&self.descriptor.name, params);
        self.proxy.dispatch(self.descriptor, &request).await
    }
}

fn build_request<I, K, V>(operation: &str, params: I) -> CallRequest
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    params
        .into_iter()
        .fold(CallRequest::new(operation), |request, (key, value)| {
            request.param(key, value)
        })
}

pub struct ProxyBuilder {
    uri: String,
    options: HttpTransportOptions,
    hooks: Hooks,
    resolver: EndpointResolver,
    debug: bool,
    debug_sink: Option<Arc<dyn DebugSink>>,
}

impl fmt::Debug for ProxyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyBuilder")
            .field("uri", &self.uri)
            .field("options", &self.options)
            .field("hooks", &self.hooks)
            .field("resolver", &self.resolver)
            .field("debug", &self.debug)
            .finish()
    }
}

impl ProxyBuilder {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            options: HttpTransportOptions::default(),
            hooks: Hooks::new(),
            resolver: EndpointResolver::default(),
            debug: false,
            debug_sink: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.options.user_agent = user_agent.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.insert(name.into(), value.into());
        self
    }

    pub fn parse_hook<F>(mut self, operation: impl Into<String>, hook: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.hooks.set_parse_hook(operation, Arc::new(hook));
        self
    }

    /// 註冊現成的 parser（見 `core::parsers`）
    pub fn parser(mut self, operation: impl Into<String>, hook: ParseHook) -> Self {
        self.hooks.set_parse_hook(operation, hook);
        self
    }

    pub fn request_builder<F>(mut self, operation: impl Into<String>, builder: F) -> Self
    where
        F: Fn(&CallRequest, &OperationDescriptor) -> Result<String> + Send + Sync + 'static,
    {
        self.hooks.set_request_builder(operation, Arc::new(builder));
        self
    }

    pub fn endpoint_resolver(mut self, resolver: EndpointResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    pub async fn build(self) -> Result<ServiceProxy<HttpTransport>> {
        let endpoint = ProxyEndpoint::parse(&self.uri)?;
        let transport = HttpTransport::new(&endpoint, &self.options)?;
        self.connect(endpoint, transport).await
    }

    pub async fn build_with<T: Transport>(self, transport: T) -> Result<ServiceProxy<T>> {
        let endpoint = ProxyEndpoint::parse(&self.uri)?;
        self.connect(endpoint, transport).await
    }

    async fn connect<T: Transport>(
        self,
        endpoint: ProxyEndpoint,
        transport: T,
    ) -> Result<ServiceProxy<T>> {
        let ProxyBuilder {
            hooks,
            resolver,
            debug,
            debug_sink,
            ..
        } = self;

        let debug_sink: Arc<dyn DebugSink> = match debug_sink {
            Some(sink) => sink,
            None => Arc::new(TracingSink),
        };
        if debug {
            transport.set_debug_output(Some(Arc::clone(&debug_sink)));
        }

        tracing::info!("📡 Loading WSDL from {}", endpoint);
        let descriptor = load_descriptor(&endpoint, &transport).await?;

        let known = descriptor.service_methods();
        for name in hooks.unknown_operations(&known) {
            tracing::warn!("⚠️ Hook registered for '{}' which the WSDL does not declare", name);
        }

        tracing::info!(
            "✅ {} ready with {} operations (secure: {})",
            descriptor.service_name.as_deref().unwrap_or("service"),
            descriptor.operations.len(),
            transport.uses_secure_transport()
        );

        Ok(ServiceProxy {
            endpoint,
            descriptor,
            transport,
            hooks,
            resolver,
            debug_sink,
            debug: AtomicBool::new(debug),
        })
    }
}

async fn load_descriptor<T: Transport>(
    endpoint: &ProxyEndpoint,
    transport: &T,
) -> Result<ServiceDescriptor> {
    let source = endpoint.to_string();

    let response = transport
        .fetch(endpoint.url())
        .await
        .map_err(|e| match e {
            ProxyError::Transport(err) => ProxyError::wsdl(&source, format!("unreachable: {}", err)),
            other => other,
        })?;

    if !response.is_success() {
        return Err(ProxyError::wsdl(
            &source,
            format!("HTTP {}", response.status),
        ));
    }

    wsdl::parse_wsdl(&source, &response.body)
}
