use crate::core::hooks::EndpointResolver;
use crate::core::parsers;
use crate::core::proxy::ProxyBuilder;
use crate::utils::error::{ProxyError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub proxy: ProxySection,
    pub endpoint: Option<EndpointSection>,
    /// 操作名稱 -> parser 名稱（raw / text / boolean / integer）
    pub parsers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySection {
    pub wsdl: String,
    pub timeout_seconds: Option<u64>,
    pub debug: Option<bool>,
    pub user_agent: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSection {
    /// 取代 WSDL 中 soap:address 的位址
    pub location: Option<String>,
    pub query: Option<BTreeMap<String, String>>,
}

impl ProxyConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ProxyError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ProxyError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${API_KEY})，找不到的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| ProxyError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("proxy.wsdl", &self.proxy.wsdl)?;

        if let Some(timeout) = self.proxy.timeout_seconds {
            validation::validate_positive_number("proxy.timeout_seconds", timeout, 1)?;
        }

        if let Some(user_agent) = &self.proxy.user_agent {
            validation::validate_non_empty_string("proxy.user_agent", user_agent)?;
        }

        if let Some(location) = self.endpoint.as_ref().and_then(|e| e.location.as_deref()) {
            validation::validate_url("endpoint.location", location)?;
        }

        for (operation, parser) in self.parsers.iter().flatten() {
            if parsers::by_name(parser).is_none() {
                return Err(ProxyError::InvalidConfigValueError {
                    field: format!("parsers.{}", operation),
                    value: parser.clone(),
                    reason: format!(
                        "Unknown parser. Valid parsers: {}",
                        parsers::PARSER_NAMES.join(", ")
                    ),
                });
            }
        }

        Ok(())
    }

    pub fn wsdl(&self) -> &str {
        &self.proxy.wsdl
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.proxy.timeout_seconds.map(Duration::from_secs)
    }

    pub fn debug_enabled(&self) -> bool {
        self.proxy.debug.unwrap_or(false)
    }

    /// 依配置建立 endpoint resolver；沒有任何覆寫時回傳 `None`
    pub fn endpoint_resolver(&self) -> Result<Option<EndpointResolver>> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(None);
        };

        let base = match &endpoint.location {
            Some(location) => {
                let url = Url::parse(location).map_err(|e| ProxyError::InvalidConfigValueError {
                    field: "endpoint.location".to_string(),
                    value: location.clone(),
                    reason: e.to_string(),
                })?;
                Some(EndpointResolver::fixed(url))
            }
            None => None,
        };

        let resolver = match (base, &endpoint.query) {
            (Some(base), Some(query)) => base.and_query(query.clone()),
            (Some(base), None) => base,
            (None, Some(query)) => EndpointResolver::with_query(query.clone()),
            (None, None) => return Ok(None),
        };
        Ok(Some(resolver))
    }

    /// 驗證後轉成 `ProxyBuilder`
    pub fn into_builder(self) -> Result<ProxyBuilder> {
        self.validate_config()?;

        let mut builder = ProxyBuilder::new(self.proxy.wsdl.clone()).debug(self.debug_enabled());

        if let Some(timeout) = self.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &self.proxy.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        for (name, value) in self.proxy.headers.iter().flatten() {
            builder = builder.header(name.clone(), value.clone());
        }
        if let Some(resolver) = self.endpoint_resolver()? {
            builder = builder.endpoint_resolver(resolver);
        }
        for (operation, parser) in self.parsers.iter().flatten() {
            // validate_config 已確認名稱有效
            if let Some(hook) = parsers::by_name(parser) {
                builder = builder.parser(operation.clone(), hook);
            }
        }

        Ok(builder)
    }
}

impl Validate for ProxyConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
