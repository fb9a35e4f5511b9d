use crate::domain::model::{ProxyEndpoint, SoapRequest, SoapVersion, TransportResponse};
use crate::domain::ports::{DebugSink, Transport};
use crate::utils::error::{ProxyError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone)]
pub struct HttpTransportOptions {
    pub timeout: Duration,
    pub user_agent: String,
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpTransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            user_agent: format!("service-proxy/{}", env!("CARGO_PKG_VERSION")),
            headers: BTreeMap::new(),
        }
    }
}

/// 以 reqwest 實作的 HTTP(S) 傳輸層，綁定在 WSDL 位址上
pub struct HttpTransport {
    client: Client,
    secure: bool,
    debug_output: RwLock<Option<Arc<dyn DebugSink>>>,
}

impl HttpTransport {
    pub fn new(endpoint: &ProxyEndpoint, options: &HttpTransportOptions) -> Result<Self> {
        let secure = endpoint.is_secure();

        let mut builder = Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .default_headers(build_header_map(&options.headers)?);
        if secure {
            builder = builder.use_rustls_tls();
        }

        tracing::debug!(
            "Opening HTTP transport for {} (secure: {}, timeout: {:?})",
            endpoint,
            secure,
            options.timeout
        );

        Ok(Self {
            client: builder.build()?,
            secure,
            debug_output: RwLock::new(None),
        })
    }

    fn debug_sink(&self) -> Option<Arc<dyn DebugSink>> {
        match self.debug_output.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn trace(&self, lines: &[String]) {
        if let Some(sink) = self.debug_sink() {
            for line in lines {
                sink.write(line);
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn uses_secure_transport(&self) -> bool {
        self.secure
    }

    fn set_debug_output(&self, sink: Option<Arc<dyn DebugSink>>) {
        let mut guard = match self.debug_output.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = sink;
    }

    async fn fetch(&self, url: &Url) -> Result<TransportResponse> {
        self.trace(&[format!("-> GET {}", url)]);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        self.trace(&[format!("<- {} ({} bytes)", status, body.len()), body.clone()]);
        Ok(TransportResponse { status, body })
    }

    async fn post(&self, request: &SoapRequest) -> Result<TransportResponse> {
        let content_type = content_type_for(request.soap_version, request.soap_action.as_deref());

        let mut builder = self
            .client
            .post(request.url.clone())
            .header(CONTENT_TYPE, content_type.as_str())
            .body(request.envelope.clone());

        // SOAP 1.2 把 action 放在 Content-Type 裡
        if request.soap_version == SoapVersion::Soap11 {
            builder = builder.header(
                "SOAPAction",
                format!("\"{}\"", request.soap_action.as_deref().unwrap_or_default()),
            );
        }

        self.trace(&[
            format!("-> POST {}", request.url),
            format!("-> Content-Type: {}", content_type),
            request.envelope.clone(),
        ]);

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        self.trace(&[format!("<- {} ({} bytes)", status, body.len()), body.clone()]);
        Ok(TransportResponse { status, body })
    }
}

fn content_type_for(version: SoapVersion, action: Option<&str>) -> String {
    match (version, action) {
        (SoapVersion::Soap11, _) => "text/xml; charset=utf-8".to_string(),
        (SoapVersion::Soap12, Some(action)) if !action.is_empty() => {
            format!("application/soap+xml; charset=utf-8; action=\"{}\"", action)
        }
        (SoapVersion::Soap12, _) => "application/soap+xml; charset=utf-8".to_string(),
    }
}

fn build_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| ProxyError::InvalidConfigValueError {
                field: "headers".to_string(),
                value: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| ProxyError::InvalidConfigValueError {
                field: format!("headers.{}", name),
                value: value.clone(),
                reason: e.to_string(),
            })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// 把線路內容送進 tracing
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl DebugSink for TracingSink {
    fn write(&self, line: &str) {
        tracing::debug!(target: "service_proxy::wire", "{}", line);
    }
}

/// 寫到 stderr，每行帶時間戳
#[derive(Debug, Clone, Default)]
pub struct StderrSink;

impl DebugSink for StderrSink {
    fn write(&self, line: &str) {
        eprintln!("[{}] {}", chrono::Local::now().format("%H:%M:%S%.3f"), line);
    }
}
