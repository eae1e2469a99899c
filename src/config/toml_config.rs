use crate::adapters::{HttpSource, StaticRecord, StaticSource, DEFAULT_MIN_MATCH_SCORE};
use crate::core::cache::{MarketDataCache, DEFAULT_TTL};
use crate::core::coordinator::MarketDataService;
use crate::core::resolver::CodeMapping;
use crate::domain::model::{FallbackEntry, DEFAULT_SOURCE_QUALITY, MAX_SOURCE_QUALITY};
use crate::domain::ports::SourceAdapter;
use crate::utils::error::{MarketDataError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketDataConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub fallback: HashMap<String, FallbackEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL.as_secs()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub source_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Static,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingEntry {
    pub industry: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub r#type: SourceKind,
    pub quality: Option<u8>,
    pub synthetic: Option<bool>,
    pub min_match_score: Option<f64>,
    pub default_code: Option<String>,
    #[serde(default)]
    pub mappings: Vec<MappingEntry>,
    pub data_source: Option<String>,

    // http
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
    pub parameters: Option<HashMap<String, String>>,
    pub field_mapping: Option<HashMap<String, String>>,

    // static
    #[serde(default)]
    pub records: Vec<StaticRecord>,
}

impl SourceConfig {
    pub fn quality(&self) -> u8 {
        self.quality.unwrap_or(DEFAULT_SOURCE_QUALITY)
    }

    pub fn min_match_score(&self) -> f64 {
        self.min_match_score.unwrap_or(DEFAULT_MIN_MATCH_SCORE)
    }

    pub fn code_mapping(&self) -> CodeMapping {
        let mapping: CodeMapping = self
            .mappings
            .iter()
            .map(|m| (m.industry.as_str(), m.code.as_str()))
            .collect();
        match &self.default_code {
            Some(code) => mapping.with_default(code.clone()),
            None => mapping,
        }
    }

    /// 依設定建立對應的來源
    pub fn build_adapter(&self) -> Result<Arc<dyn SourceAdapter>> {
        let synthetic = self.synthetic.unwrap_or(false);
        let adapter: Arc<dyn SourceAdapter> = match self.r#type {
            SourceKind::Static => {
                let mut source = StaticSource::new(&self.id, self.quality(), self.code_mapping())
                    .with_records(self.records.clone())
                    .with_synthetic(synthetic)
                    .with_min_match_score(self.min_match_score());
                if let Some(data_source) = &self.data_source {
                    source = source.with_data_source(data_source.clone());
                }
                Arc::new(source)
            }
            SourceKind::Http => {
                let endpoint = validation::validate_required_field(
                    &format!("sources.{}.endpoint", self.id),
                    &self.endpoint,
                )?;
                let mut source =
                    HttpSource::new(&self.id, self.quality(), endpoint.clone(), self.code_mapping())
                        .with_headers(self.headers.clone().unwrap_or_default())
                        .with_parameters(self.parameters.clone().unwrap_or_default())
                        .with_field_mapping(self.field_mapping.clone().unwrap_or_default())
                        .with_synthetic(synthetic)
                        .with_min_match_score(self.min_match_score());
                if let Some(timeout) = self.timeout_seconds {
                    source = source.with_timeout(Duration::from_secs(timeout));
                }
                Arc::new(source)
            }
        };
        Ok(adapter)
    }

    fn validate_source(&self) -> Result<()> {
        validation::validate_non_empty_string("sources.id", &self.id)?;

        let field = |name: &str| format!("sources.{}.{}", self.id, name);
        validation::validate_range(&field("quality"), self.quality(), 1, MAX_SOURCE_QUALITY)?;
        validation::validate_range(&field("min_match_score"), self.min_match_score(), 0.0, 1.0)?;

        if self.mappings.is_empty() {
            return Err(MarketDataError::ConfigValidationError {
                field: field("mappings"),
                message: "At least one industry mapping is required".to_string(),
            });
        }

        if self.r#type == SourceKind::Http {
            let endpoint = validation::validate_required_field(&field("endpoint"), &self.endpoint)?;
            validation::validate_url(&field("endpoint"), endpoint)?;
            if let Some(timeout) = self.timeout_seconds {
                validation::validate_positive_number(&field("timeout_seconds"), timeout, 1)?;
            }
        }

        Ok(())
    }
}

impl MarketDataConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MarketDataError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MarketDataError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${BLS_API_KEY})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| MarketDataError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_seconds)
    }

    pub fn source_timeout(&self) -> Option<Duration> {
        self.coordinator.source_timeout_seconds.map(Duration::from_secs)
    }

    /// 建立服務；在 Tokio runtime 中會一併啟動快取清理任務
    pub fn build_service(&self) -> Result<MarketDataService> {
        let cache = Arc::new(MarketDataCache::new(self.cache_ttl()));
        if tokio::runtime::Handle::try_current().is_ok() {
            cache.spawn_sweeper();
        }

        let mut service = MarketDataService::new(cache);
        for source in &self.sources {
            service = service.with_source(source.build_adapter()?);
        }
        for (industry, entry) in &self.fallback {
            service = service.with_fallback(industry, entry.clone());
        }
        if let Some(timeout) = self.source_timeout() {
            service = service.with_source_timeout(timeout);
        }

        tracing::info!(
            "🔧 Market data service ready with {} sources, {} fallback entries",
            self.sources.len(),
            self.fallback.len()
        );
        Ok(service)
    }
}

impl Validate for MarketDataConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_positive_number("cache.ttl_seconds", self.cache.ttl_seconds, 1)?;

        if let Some(timeout) = self.coordinator.source_timeout_seconds {
            validation::validate_positive_number("coordinator.source_timeout_seconds", timeout, 1)?;
        }

        validation::validate_unique("sources.id", self.sources.iter().map(|s| s.id.as_str()))?;
        for source in &self.sources {
            source.validate_source()?;
        }

        for (industry, entry) in &self.fallback {
            validation::validate_non_empty_string("fallback", industry)?;
            let values = entry
                .global_market_size
                .iter()
                .chain(entry.geographic_distribution.iter().flat_map(|d| d.values()));
            for value in values {
                if *value < 0.0 {
                    return Err(MarketDataError::InvalidConfigValueError {
                        field: format!("fallback.{}", industry),
                        value: value.to_string(),
                        reason: "Market size and regional shares cannot be negative".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
