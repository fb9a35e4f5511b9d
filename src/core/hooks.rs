use crate::domain::model::{CallRequest, OperationDescriptor};
use crate::utils::error::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// 把原始回應轉成呼叫端要的值
pub type ParseHook = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// 自訂請求 body（SOAP Body 內的 XML）
pub type RequestBuilder =
    Arc<dyn Fn(&CallRequest, &OperationDescriptor) -> Result<String> + Send + Sync>;

/// 以操作名稱為鍵的 hook 表
#[derive(Clone, Default)]
pub struct Hooks {
    parsers: HashMap<String, ParseHook>,
    builders: HashMap<String, RequestBuilder>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_parse_hook(&mut self, operation: impl Into<String>, hook: ParseHook) {
        self.parsers.insert(operation.into(), hook);
    }

    pub fn set_request_builder(&mut self, operation: impl Into<String>, builder: RequestBuilder) {
        self.builders.insert(operation.into(), builder);
    }

    pub fn parse_hook(&self, operation: &str) -> Option<&ParseHook> {
        self.parsers.get(operation)
    }

    pub fn request_builder(&self, operation: &str) -> Option<&RequestBuilder> {
        self.builders.get(operation)
    }

    /// 有 hook 時回傳 `hook(raw)`，否則原樣回傳
    pub fn apply(&self, operation: &str, raw: Value) -> Result<Value> {
        match self.parse_hook(operation) {
            Some(hook) => hook(raw),
            None => Ok(raw),
        }
    }

    /// 登記了 hook 但 WSDL 裡沒有的操作名稱
    pub fn unknown_operations<'a>(&'a self, known: &'a [&'a str]) -> impl Iterator<Item = &'a str> {
        self.parsers
            .keys()
            .chain(self.builders.keys())
            .map(String::as_str)
            .filter(move |name| !known.contains(name))
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("parsers", &self.parsers.keys().collect::<Vec<_>>())
            .field("builders", &self.builders.keys().collect::<Vec<_>>())
            .finish()
    }
}

type ResolveFn = dyn Fn(&Url, &OperationDescriptor) -> Url + Send + Sync;

/// 每次呼叫前決定實際請求位址的策略
#[derive(Clone)]
pub struct EndpointResolver {
    resolve: Arc<ResolveFn>,
}

impl EndpointResolver {
    pub fn new<F>(resolve: F) -> Self
    where
        F: Fn(&Url, &OperationDescriptor) -> Url + Send + Sync + 'static,
    {
        Self {
            resolve: Arc::new(resolve),
        }
    }

    /// 直接使用 WSDL 宣告的服務位址
    pub fn service_location() -> Self {
        Self::new(|base, _| base.clone())
    }

    /// 忽略 WSDL 的位址，固定送到 `location`
    pub fn fixed(location: Url) -> Self {
        Self::new(move |_, _| location.clone())
    }

    /// 在位址後面附加 query 參數
    pub fn with_query<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::service_location().and_query(params)
    }

    /// 先套用目前的策略，再附加 query 參數
    pub fn and_query<I, K, V>(self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let params: Vec<(String, String)> = params
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        let inner = self.resolve;

        Self::new(move |base, operation| {
            let mut url = inner(base, operation);
            if !params.is_empty() {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in &params {
                    pairs.append_pair(key, value);
                }
            }
            url
        })
    }

    pub fn resolve(&self, base: &Url, operation: &OperationDescriptor) -> Url {
        (self.resolve)(base, operation)
    }
}

impl Default for EndpointResolver {
    fn default() -> Self {
        Self::service_location()
    }
}

impl fmt::Debug for EndpointResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EndpointResolver")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{BindingStyle, SoapVersion};
    use crate::utils::error::ProxyError;
    use serde_json::json;

    fn operation(name: &str) -> OperationDescriptor {
        OperationDescriptor {
            name: name.to_string(),
            soap_action: None,
            soap_version: SoapVersion::Soap11,
            style: BindingStyle::Document,
            input_params: vec![],
            input_element: None,
        }
    }

    #[test]
    fn test_apply_with_and_without_hook() {
        let mut hooks = Hooks::new();
        hooks.set_parse_hook(
            "GetUser",
            Arc::new(|raw: Value| -> Result<Value> { Ok(json!({ "wrapped": raw })) }),
        );

        let raw = json!({"GetUserResponse": {"User": "bob"}});
        assert_eq!(
            hooks.apply("GetUser", raw.clone()).unwrap(),
            json!({ "wrapped": raw.clone() })
        );
        assert_eq!(hooks.apply("GetDotnetDailyFact", raw.clone()).unwrap(), raw);
    }

    #[test]
    fn test_hook_errors_propagate() {
        let mut hooks = Hooks::new();
        hooks.set_parse_hook(
            "genSSHA",
            Arc::new(|_: Value| -> Result<Value> { Err(ProxyError::protocol("unexpected shape")) }),
        );
        assert!(matches!(
            hooks.apply("genSSHA", Value::Null),
            Err(ProxyError::Protocol { .. })
        ));
    }

    #[test]
    fn test_unknown_operations() {
        let mut hooks = Hooks::new();
        hooks.set_parse_hook("IsValidISBN13", crate::core::parsers::boolean());
        hooks.set_parse_hook("Typo", crate::core::parsers::raw());

        let known = ["IsValidISBN13"];
        let unknown: Vec<&str> = hooks.unknown_operations(&known).collect();
        assert_eq!(unknown, vec!["Typo"]);
    }

    #[test]
    fn test_resolver_appends_query() {
        let base = Url::parse("http://localhost/services/isbnservice.wso").unwrap();
        let resolver = EndpointResolver::with_query([("dummy", "1")]);

        assert_eq!(
            resolver.resolve(&base, &operation("IsValidISBN13")).as_str(),
            "http://localhost/services/isbnservice.wso?dummy=1"
        );
        assert_eq!(
            EndpointResolver::default()
                .resolve(&base, &operation("IsValidISBN13"))
                .as_str(),
            base.as_str()
        );
    }

    #[test]
    fn test_fixed_resolver_with_query() {
        let base = Url::parse("http://localhost/svc").unwrap();
        let fixed = Url::parse("https://proxy.example.com/soap?key=abc").unwrap();
        let resolver = EndpointResolver::fixed(fixed).and_query([("trace", "on")]);

        assert_eq!(
            resolver.resolve(&base, &operation("GetUser")).as_str(),
            "https://proxy.example.com/soap?key=abc&trace=on"
        );
    }
}
