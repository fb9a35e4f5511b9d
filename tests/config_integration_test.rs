use anyhow::Result;
use httpmock::prelude::*;
use serde_json::json;
use service_proxy::{ProxyConfig, ProxyError};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

const ISBN_WSDL: &str = include_str!("fixtures/isbn_service.wsdl");

#[tokio::test]
async fn test_proxy_from_toml_config() -> Result<()> {
    let server = MockServer::start_async().await;
    let wsdl = ISBN_WSDL.replace("http://localhost/services", &server.url("/services"));

    let wsdl_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/services/isbnservice.wso")
                .header("x-api-key", "secret-from-env");
            then.status(200).body(wsdl);
        })
        .await;
    let soap_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/gateway/isbn")
                .query_param("dummy", "1")
                .header("x-api-key", "secret-from-env")
                .body_contains("<sISBN>978-0977616633</sISBN>");
            then.status(200).body(
                r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>
                   <IsValidISBN13Response xmlns="http://webservices.daehosting.com/ISBN">
                   <IsValidISBN13Result>true</IsValidISBN13Result></IsValidISBN13Response>
                   </soap:Body></soap:Envelope>"#,
            );
        })
        .await;

    std::env::set_var("SERVICE_PROXY_IT_KEY", "secret-from-env");

    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("isbn.toml");
    let config_content = format!(
        r#"
[proxy]
wsdl = "{}"
timeout_seconds = 5
user_agent = "isbn-checker/1.0"

[proxy.headers]
X-Api-Key = "${{SERVICE_PROXY_IT_KEY}}"

[endpoint]
location = "{}"

[endpoint.query]
dummy = "1"

[parsers]
IsValidISBN13 = "boolean"
"#,
        server.url("/services/isbnservice.wso?WSDL"),
        server.url("/gateway/isbn")
    );
    tokio::fs::write(&config_path, config_content).await?;

    let config = ProxyConfig::from_file(&config_path)?;
    let builder = assert_ok!(config.into_builder());
    let proxy = builder.build().await?;

    let result = proxy
        .call("IsValidISBN13", [("sISBN", "978-0977616633")])
        .await?;
    assert_eq!(result, json!(true));

    wsdl_mock.assert_async().await;
    soap_mock.assert_async().await;

    std::env::remove_var("SERVICE_PROXY_IT_KEY");
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_never_builds() -> Result<()> {
    let config = ProxyConfig::from_toml_str(
        r#"
[proxy]
wsdl = "http://ws.example.com/zipcode.asmx?wsdl"

[parsers]
ZIPCodeWorld_US = "csv"
"#,
    )?;

    let error = assert_err!(config.into_builder());
    assert!(matches!(error, ProxyError::InvalidConfigValueError { .. }));
    Ok(())
}
