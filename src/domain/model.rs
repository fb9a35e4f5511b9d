use crate::utils::error::Result;
use crate::utils::validation::parse_absolute_url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// 已驗證的 WSDL 位址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    url: Url,
}

impl ProxyEndpoint {
    pub fn parse(uri: &str) -> Result<Self> {
        Ok(Self {
            url: parse_absolute_url(uri)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// 去掉 query 與 fragment 的位址，WSDL 沒有宣告 soap:address 時當作服務位址
    pub fn base_url(&self) -> Url {
        let mut url = self.url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoapVersion {
    Soap11,
    Soap12,
}

impl SoapVersion {
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "http://schemas.xmlsoap.org/soap/envelope/",
            SoapVersion::Soap12 => "http://www.w3.org/2003/05/soap-envelope",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingStyle {
    Document,
    Rpc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub soap_action: Option<String>,
    pub soap_version: SoapVersion,
    pub style: BindingStyle,
    /// 依 WSDL 宣告順序排列的輸入參數名稱
    pub input_params: Vec<String>,
    /// document 風格時 input part 指向的 schema element，作為 Body 的最外層元素
    pub input_element: Option<ElementName>,
}

/// 帶命名空間的元素名稱
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementName {
    pub name: String,
    pub namespace: Option<String>,
}

/// 建構時從 WSDL 讀出的服務描述，之後不再改變
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub service_name: Option<String>,
    pub target_namespace: String,
    pub location: Option<Url>,
    pub operations: BTreeMap<String, OperationDescriptor>,
}

impl ServiceDescriptor {
    pub fn operation(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.get(name)
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn service_methods(&self) -> Vec<&str> {
        self.operations.keys().map(String::as_str).collect()
    }
}

/// 呼叫請求：操作名稱加上依插入順序保存的具名參數
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub operation: String,
    pub params: Vec<(String, serde_json::Value)>,
}

impl CallRequest {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.set(name, value);
        self
    }

    /// 同名參數會覆蓋原值並保留原位置
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.params.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// 準備送到傳輸層的 SOAP 請求
#[derive(Debug, Clone, PartialEq)]
pub struct SoapRequest {
    pub url: Url,
    pub soap_version: SoapVersion,
    pub soap_action: Option<String>,
    pub envelope: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 未經 ParseHook 處理的回應
#[derive(Debug, Clone, PartialEq)]
pub struct SoapResponse {
    pub operation: String,
    pub status: u16,
    pub xml: String,
    pub body: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_security_and_base_url() {
        let endpoint =
            ProxyEndpoint::parse("https://sec.example.com/paos/genSSHA-SOAP.php?wsdl").unwrap();
        assert!(endpoint.is_secure());
        assert_eq!(
            endpoint.base_url().as_str(),
            "https://sec.example.com/paos/genSSHA-SOAP.php"
        );

        let plain = ProxyEndpoint::parse("http://example.com/isbn.wso?WSDL").unwrap();
        assert!(!plain.is_secure());
    }

    #[test]
    fn test_call_request_keeps_order_and_overwrites() {
        let mut request = CallRequest::new("genSSHA")
            .param("text", "hello world")
            .param("hash_type", "sha512");
        request.set("text", "bye");

        assert_eq!(request.params.len(), 2);
        assert_eq!(request.params[0].0, "text");
        assert_eq!(request.get("text"), Some(&json!("bye")));
        assert_eq!(request.get("missing"), None);
    }
}
