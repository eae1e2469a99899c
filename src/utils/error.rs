use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("No classification code matched '{industry}' (best score {score:.2})")]
    ResolutionMiss { industry: String, score: f64 },

    #[error("Source '{source_id}' unavailable: {message}")]
    SourceUnavailable { source_id: String, message: String },

    #[error("No market data available for '{industry}'")]
    NoDataAvailable { industry: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MarketDataError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_) | Self::SourceUnavailable { .. } => ErrorCategory::Network,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::SerializationError(_)
            | Self::ValidationError { .. }
            | Self::ResolutionMiss { .. }
            | Self::NoDataAvailable { .. } => ErrorCategory::Data,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 降級結果，不影響整批處理
            Self::ResolutionMiss { .. } | Self::NoDataAvailable { .. } => ErrorSeverity::Low,
            Self::ApiError(_) | Self::SourceUnavailable { .. } => ErrorSeverity::Medium,
            Self::SerializationError(_) | Self::ValidationError { .. } => ErrorSeverity::High,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ApiError(_) | Self::SourceUnavailable { .. } => {
                "Check network connectivity and the source endpoint, then retry later"
            }
            Self::IoError(_) => "Check that the file exists and is readable",
            Self::SerializationError(_) => "Check that the source returns a JSON object",
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => "Review the TOML configuration file",
            Self::ValidationError { .. } => "Provide a non-empty industry name",
            Self::ResolutionMiss { .. } => "Add a mapping entry for this industry to the source",
            Self::NoDataAvailable { .. } => "Try a broader industry name or add a fallback entry",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ApiError(_) | Self::SourceUnavailable { .. } => {
                format!("A market data source could not be reached: {}", self)
            }
            Self::IoError(e) => format!("Could not read a required file: {}", e),
            Self::MissingConfigError { field } => {
                format!("The configuration is missing '{}'", field)
            }
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketDataError>;
