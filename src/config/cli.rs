use crate::config::toml_config::ProxyConfig;
use crate::core::proxy::ProxyBuilder;
use crate::utils::error::{ProxyError, Result};
use crate::utils::validation::{self, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "service-proxy")]
#[command(about = "Call SOAP operations described by a WSDL document")]
pub struct CliConfig {
    #[arg(long, help = "WSDL URL (overrides the one in --config)")]
    pub wsdl: Option<String>,

    #[arg(long, help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "List the operations declared by the WSDL")]
    pub list: bool,

    #[arg(long, help = "Operation to call")]
    pub call: Option<String>,

    #[arg(short, long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    #[arg(long, help = "Request timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Dump raw wire traffic to stderr")]
    pub debug: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,
}

impl CliConfig {
    /// `--param` 轉成有序的參數列表
    pub fn call_params(&self) -> Result<Vec<(String, Value)>> {
        self.params.iter().map(String::as_str).map(parse_param).collect()
    }

    /// 合併設定檔與命令列參數，命令列優先
    pub fn proxy_builder(&self) -> Result<ProxyBuilder> {
        let mut builder = match (&self.config, &self.wsdl) {
            (Some(path), wsdl) => {
                let mut file_config = ProxyConfig::from_file(path)?;
                if let Some(wsdl) = wsdl {
                    file_config.proxy.wsdl = wsdl.clone();
                }
                file_config.into_builder()?
            }
            (None, Some(wsdl)) => ProxyBuilder::new(wsdl.clone()),
            (None, None) => {
                return Err(ProxyError::MissingConfigError {
                    field: "--wsdl or --config".to_string(),
                })
            }
        };

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        if self.debug {
            builder = builder
                .debug(true)
                .debug_sink(std::sync::Arc::new(crate::adapters::http::StderrSink));
        }
        Ok(builder)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if self.wsdl.is_none() && self.config.is_none() {
            return Err(ProxyError::MissingConfigError {
                field: "--wsdl or --config".to_string(),
            });
        }
        if let Some(wsdl) = &self.wsdl {
            validation::validate_url("--wsdl", wsdl)?;
        }
        if let Some(timeout) = self.timeout {
            validation::validate_positive_number("--timeout", timeout, 1)?;
        }
        if let Some(operation) = &self.call {
            validation::validate_non_empty_string("--call", operation)?;
        }
        self.call_params()?;
        Ok(())
    }
}

/// `name=value`；value 若是合法 JSON（數字、布林、物件）就照 JSON 解讀，否則當字串
pub fn parse_param(raw: &str) -> Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| ProxyError::InvalidConfigValueError {
            field: "--param".to_string(),
            value: raw.to_string(),
            reason: "expected NAME=VALUE".to_string(),
        })?;

    validation::validate_non_empty_string("--param", name)?;

    let value = serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.trim().to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("isbn=978-0977616633").unwrap(),
            ("isbn".to_string(), json!("978-0977616633"))
        );
        assert_eq!(parse_param("count=3").unwrap(), ("count".to_string(), json!(3)));
        assert_eq!(
            parse_param("text=hello=world").unwrap(),
            ("text".to_string(), json!("hello=world"))
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=value").is_err());
    }

    #[test]
    fn test_cli_parsing_and_validation() {
        let config = CliConfig::parse_from([
            "service-proxy",
            "--wsdl",
            "http://webservices.example.com/isbnservice.wso?WSDL",
            "--call",
            "IsValidISBN13",
            "-p",
            "sISBN=978-0977616633",
            "--timeout",
            "5",
        ]);

        assert!(config.validate().is_ok());
        assert_eq!(config.call.as_deref(), Some("IsValidISBN13"));
        assert_eq!(
            config.call_params().unwrap(),
            vec![("sISBN".to_string(), json!("978-0977616633"))]
        );
        assert!(config.proxy_builder().is_ok());
    }

    #[test]
    fn test_cli_requires_a_source() {
        let config = CliConfig::parse_from(["service-proxy", "--list"]);
        assert!(matches!(
            config.validate(),
            Err(ProxyError::MissingConfigError { .. })
        ));

        let config = CliConfig::parse_from(["service-proxy", "--wsdl", "bacon"]);
        assert!(config.validate().is_err());
    }
}
