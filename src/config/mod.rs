pub mod toml_config;

pub use toml_config::{MarketDataConfig, SourceConfig, SourceKind};

use crate::domain::model::QueryOptions;
use crate::utils::error::{MarketDataError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
use clap::Parser;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "market-insight"))]
#[cfg_attr(
    feature = "cli",
    command(about = "Aggregate industry market size and growth from multiple sources")
)]
pub struct CliConfig {
    #[cfg_attr(feature = "cli", arg(long, default_value = "market-data.toml"))]
    pub config: String,

    #[cfg_attr(feature = "cli", arg(long))]
    pub industry: String,

    #[cfg_attr(feature = "cli", arg(long))]
    pub start_year: Option<i32>,

    #[cfg_attr(feature = "cli", arg(long))]
    pub end_year: Option<i32>,

    #[cfg_attr(feature = "cli", arg(long))]
    pub year: Option<i32>,

    #[cfg_attr(feature = "cli", arg(long, help = "Skip the cache lookup"))]
    pub bypass_cache: bool,

    #[cfg_attr(feature = "cli", arg(long, default_value = "1"))]
    pub repeat: u64,

    #[cfg_attr(feature = "cli", arg(long, help = "Pretty-print the JSON result"))]
    pub pretty: bool,

    #[cfg_attr(feature = "cli", arg(long, help = "Emit logs as JSON lines"))]
    pub json_logs: bool,

    #[cfg_attr(feature = "cli", arg(long, help = "Enable verbose output"))]
    pub verbose: bool,
}

impl CliConfig {
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            start_year: self.start_year,
            end_year: self.end_year,
            year: self.year,
            bypass_cache: self.bypass_cache,
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("config", &self.config)?;
        validation::validate_non_empty_string("industry", &self.industry)?;
        validation::validate_positive_number("repeat", self.repeat, 1)?;

        if let (Some(start), Some(end)) = (self.start_year, self.end_year) {
            if start > end {
                return Err(MarketDataError::InvalidConfigValueError {
                    field: "start_year".to_string(),
                    value: start.to_string(),
                    reason: format!("Start year must not be after end year {}", end),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli() -> CliConfig {
        CliConfig {
            config: "market-data.toml".to_string(),
            industry: "Software".to_string(),
            start_year: None,
            end_year: None,
            year: None,
            bypass_cache: false,
            repeat: 1,
            pretty: false,
            json_logs: false,
            verbose: false,
        }
    }

    #[test]
    fn test_cli_validation() {
        assert!(cli().validate().is_ok());

        let mut config = cli();
        config.industry = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = cli();
        config.repeat = 0;
        assert!(config.validate().is_err());

        let mut config = cli();
        config.start_year = Some(2024);
        config.end_year = Some(2020);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_query_options() {
        let mut config = cli();
        config.year = Some(2023);
        config.bypass_cache = true;

        let options = config.query_options();
        assert_eq!(options.year, Some(2023));
        assert!(options.bypass_cache);
        assert!(options.start_year.is_none());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_parse_arguments() {
        let config = CliConfig::try_parse_from([
            "market-insight",
            "--industry",
            "Medical Devices",
            "--start-year",
            "2020",
            "--bypass-cache",
            "--repeat",
            "2",
        ])
        .unwrap();

        assert_eq!(config.config, "market-data.toml");
        assert_eq!(config.industry, "Medical Devices");
        assert_eq!(config.start_year, Some(2020));
        assert!(config.bypass_cache);
        assert_eq!(config.repeat, 2);
    }
}
