mod weighting;

use std::env;
use std::fmt;
use std::path::PathBuf;

pub use weighting::{WeightingEntry, WeightingKey, WeightingTable};

const DEFAULT_RETAKE_YEAR_FAILED_UNITS: u32 = 3;
const DEFAULT_MAX_UNIT_ATTEMPTS: u32 = 5;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let retake_year_failed_units = read_u32(
            "ACADEMIC_RETAKE_YEAR_FAILED_UNITS",
            DEFAULT_RETAKE_YEAR_FAILED_UNITS,
        )?;
        let max_unit_attempts = read_u32("ACADEMIC_MAX_UNIT_ATTEMPTS", DEFAULT_MAX_UNIT_ATTEMPTS)?;
        let weighting_path = env::var("ACADEMIC_WEIGHTING_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            engine: EngineConfig {
                retake_year_failed_units,
                max_unit_attempts,
                weighting_path,
            },
        })
    }
}

fn read_u32(variable: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidNumber { variable }),
        Err(_) => Ok(default),
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Progression thresholds and the source of the year weighting table.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub retake_year_failed_units: u32,
    pub max_unit_attempts: u32,
    pub weighting_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retake_year_failed_units: DEFAULT_RETAKE_YEAR_FAILED_UNITS,
            max_unit_attempts: DEFAULT_MAX_UNIT_ATTEMPTS,
            weighting_path: None,
        }
    }
}

impl EngineConfig {
    /// Load the weighting table once; the built-in table is used when no path is configured.
    pub fn weighting_table(&self) -> Result<WeightingTable, ConfigError> {
        match &self.weighting_path {
            Some(path) => WeightingTable::from_path(path),
            None => Ok(WeightingTable::standard()),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber {
        variable: &'static str,
    },
    WeightingIo {
        path: PathBuf,
        source: std::io::Error,
    },
    WeightingParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    InvalidWeighting {
        detail: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a non-negative integer")
            }
            ConfigError::WeightingIo { path, .. } => {
                write!(f, "unable to read weighting table {}", path.display())
            }
            ConfigError::WeightingParse { path, .. } => {
                write!(f, "weighting table {} is not valid JSON", path.display())
            }
            ConfigError::InvalidWeighting { detail } => {
                write!(f, "invalid weighting table: {detail}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidNumber { .. } | ConfigError::InvalidWeighting { .. } => None,
            ConfigError::WeightingIo { source, .. } => Some(source),
            ConfigError::WeightingParse { source, .. } => Some(source),
        }
    }
}
