use clap::Parser;
use service_proxy::utils::error::{ErrorSeverity, ProxyError};
use service_proxy::utils::{logger, validation::Validate};
use service_proxy::{CallRequest, CliConfig, ServiceProxy, Transport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting service-proxy CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(&config).await {
        tracing::error!(
            "❌ service-proxy failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2, // 可重試
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(config: &CliConfig) -> Result<(), ProxyError> {
    let proxy: ServiceProxy = config.proxy_builder()?.build().await?;

    let Some(operation) = config.call.as_deref() else {
        // 沒指定 --call 時列出操作
        print_operations(&proxy);
        return Ok(());
    };

    if config.list {
        print_operations(&proxy);
    }

    let request = config
        .call_params()?
        .into_iter()
        .fold(CallRequest::new(operation), |request, (name, value)| {
            request.param(name, value)
        });

    let result = proxy.call_request(request).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn print_operations(proxy: &ServiceProxy) {
    let descriptor = proxy.descriptor();
    println!(
        "📋 {} ({} operations, secure: {})",
        descriptor.service_name.as_deref().unwrap_or("service"),
        descriptor.operations.len(),
        proxy.transport().uses_secure_transport()
    );
    for operation in descriptor.operations.values() {
        println!("  - {}({})", operation.name, operation.input_params.join(", "));
    }
}
