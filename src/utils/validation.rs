use crate::utils::error::{ProxyError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// 解析並檢查 WSDL 位址：必須是絕對的 http/https URI
pub fn parse_absolute_url(url_str: &str) -> Result<Url> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(ProxyError::invalid_argument("URI cannot be empty"));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| ProxyError::invalid_argument(format!("'{}' is not a URI: {}", url_str, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ProxyError::invalid_argument(format!(
                "Unsupported URI scheme: {}",
                scheme
            )))
        }
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => {
            return Err(ProxyError::invalid_argument(format!(
                "'{}' has no host",
                url_str
            )))
        }
    }

    Ok(url)
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    parse_absolute_url(url_str)
        .map(|_| ())
        .map_err(|e| ProxyError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: e.to_string(),
        })
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(ProxyError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ProxyError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute_url() {
        assert!(parse_absolute_url("https://example.com/svc?wsdl").is_ok());
        assert!(parse_absolute_url("http://example.com").is_ok());
        assert!(matches!(
            parse_absolute_url("bacon"),
            Err(ProxyError::InvalidArgument { .. })
        ));
        assert!(matches!(
            parse_absolute_url(""),
            Err(ProxyError::InvalidArgument { .. })
        ));
        assert!(matches!(
            parse_absolute_url("ftp://example.com/file.wsdl"),
            Err(ProxyError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("proxy.wsdl", "https://example.com").is_ok());
        assert!(matches!(
            validate_url("proxy.wsdl", "invalid-url"),
            Err(ProxyError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("proxy.timeout_seconds", 5, 1).is_ok());
        assert!(validate_positive_number("proxy.timeout_seconds", 0, 1).is_err());
    }
}
