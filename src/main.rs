use clap::Parser;
use market_insight::utils::error::ErrorSeverity;
use market_insight::utils::{logger, validation::Validate};
use market_insight::{CliConfig, MarketDataConfig, MarketDataError, MarketDataService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting market-insight CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證參數與配置
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => fail(e),
    };

    let service = match MarketDataService::from_config(&config) {
        Ok(service) => service,
        Err(e) => fail(e),
    };

    let options = cli.query_options();
    for round in 1..=cli.repeat {
        let result = service.get_industry_data(&cli.industry, &options).await;

        if let Some(error) = &result.error {
            tracing::warn!("⚠️ Round {}: {}", round, error);
        } else if !result.has_data {
            tracing::warn!("⚠️ Round {}: no data for {}", round, cli.industry);
        }

        let output = if cli.pretty {
            serde_json::to_string_pretty(&result)?
        } else {
            serde_json::to_string(&result)?
        };
        println!("{}", output);
    }

    let stats = service.get_cache_stats();
    tracing::info!(
        "📊 Cache stats: {} hits, {} misses, {} sets, {} keys",
        stats.hits,
        stats.misses,
        stats.sets,
        stats.keys
    );

    Ok(())
}

fn load_config(cli: &CliConfig) -> market_insight::Result<MarketDataConfig> {
    cli.validate()?;
    let config = MarketDataConfig::from_file(&cli.config)?;
    config.validate()?;
    tracing::info!("✅ Loaded configuration from {}", cli.config);
    Ok(config)
}

fn fail(e: MarketDataError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ market-insight failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    // 輸出用戶友好的錯誤信息
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}
