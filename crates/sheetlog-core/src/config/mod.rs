//! Configuration system for sheetlog.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sheetlog_extractors::DatasetSchema;

use crate::error::{SheetlogError, SheetlogResult};
use crate::import::{DuplicatePolicy, EngineConfig};
use crate::traits::LlmConfig;

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Anthropic,
}

impl LlmProvider {
    fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }
}

/// Provider configuration with type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    /// Provider type.
    pub provider: LlmProvider,
    /// Provider-specific configuration.
    #[serde(flatten)]
    pub config: LlmConfig,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            config: LlmConfig {
                model: "gpt-4.1-nano-2025-04-14".to_string(),
                ..Default::default()
            },
        }
    }
}

/// Top-level import configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// SQLite database holding records and sessions.
    pub database_path: PathBuf,
    /// Release note provider; notes are skipped when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summarizer: Option<LlmProviderConfig>,
    pub summary_timeout_secs: u64,
    pub max_reported_duplicates: usize,
    pub duplicate_policy: DuplicatePolicy,
    pub max_upload_bytes: usize,
    /// Schema used when neither the request nor `dataset_schemas` names one.
    pub default_schema: String,
    /// Named schemas, in addition to the built-in presets.
    pub schemas: HashMap<String, DatasetSchema>,
    /// Dataset name to schema name.
    pub dataset_schemas: HashMap<String, String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        let data_dir = dirs::home_dir()
            .map(|h| h.join(".sheetlog"))
            .unwrap_or_else(|| PathBuf::from(".sheetlog"));

        Self {
            database_path: data_dir.join("sheetlog.db"),
            summarizer: None,
            summary_timeout_secs: engine.summary_timeout.as_secs(),
            max_reported_duplicates: engine.max_reported_duplicates,
            duplicate_policy: engine.duplicate_policy,
            max_upload_bytes: engine.max_upload_bytes,
            default_schema: "generic".to_string(),
            schemas: HashMap::new(),
            dataset_schemas: HashMap::new(),
        }
    }
}

impl ImportConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> SheetlogResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| SheetlogError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| SheetlogError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| SheetlogError::Configuration(e.to_string())),
            _ => Err(SheetlogError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from `SHEETLOG_*` environment variables.
    pub fn from_env() -> SheetlogResult<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> SheetlogResult<Self> {
        let mut config = Self::default();

        if let Some(path) = var("SHEETLOG_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(secs) = var("SHEETLOG_SUMMARY_TIMEOUT_SECS") {
            config.summary_timeout_secs = parse_number("SHEETLOG_SUMMARY_TIMEOUT_SECS", &secs)?;
        }
        if let Some(bytes) = var("SHEETLOG_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse_number("SHEETLOG_MAX_UPLOAD_BYTES", &bytes)?;
        }
        if let Some(policy) = var("SHEETLOG_DUPLICATE_POLICY") {
            config.duplicate_policy = match policy.to_lowercase().as_str() {
                "reject" => DuplicatePolicy::Reject,
                "reject_conflicting" => DuplicatePolicy::RejectConflicting,
                "keep_first" => DuplicatePolicy::KeepFirst,
                other => {
                    return Err(SheetlogError::Configuration(format!(
                        "Unknown duplicate policy: {}",
                        other
                    )))
                }
            };
        }
        if let Some(schema) = var("SHEETLOG_DEFAULT_SCHEMA") {
            config.default_schema = schema;
        }

        // Release notes
        if let Some(provider) = var("SHEETLOG_LLM_PROVIDER") {
            let provider = LlmProvider::parse(&provider).ok_or_else(|| {
                SheetlogError::Configuration(format!("Unknown LLM provider: {}", provider))
            })?;
            let mut llm = LlmProviderConfig {
                provider,
                ..Default::default()
            };
            if provider == LlmProvider::Anthropic {
                llm.config.model = "claude-3-5-haiku-latest".to_string();
            }
            if let Some(model) = var("SHEETLOG_LLM_MODEL") {
                llm.config.model = model;
            }
            let key_var = match provider {
                LlmProvider::OpenAI => "OPENAI_API_KEY",
                LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            };
            llm.config.api_key = var(key_var);
            llm.config.base_url = var("SHEETLOG_LLM_BASE_URL");
            config.summarizer = Some(llm);
        }

        Ok(config)
    }

    /// Resolve the schema for a dataset.
    ///
    /// An explicit name wins, then the dataset's mapping, then the default.
    /// Names are looked up among configured schemas before the presets.
    pub fn resolve_schema(
        &self,
        dataset: &str,
        explicit: Option<&str>,
    ) -> SheetlogResult<DatasetSchema> {
        let name = explicit
            .or_else(|| self.dataset_schemas.get(dataset).map(String::as_str))
            .unwrap_or(&self.default_schema);

        self.schemas
            .get(name)
            .cloned()
            .or_else(|| DatasetSchema::preset(name))
            .ok_or_else(|| SheetlogError::invalid_input(format!("Unknown schema: {}", name)))
    }

    /// Engine tunables derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            duplicate_policy: self.duplicate_policy,
            max_reported_duplicates: self.max_reported_duplicates,
            summary_timeout: Duration::from_secs(self.summary_timeout_secs),
            max_upload_bytes: self.max_upload_bytes,
            ..EngineConfig::default()
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> SheetlogResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SheetlogError::Configuration(format!("{} must be a number, got {}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetlog_extractors::KeySpec;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ImportConfig::default();
        assert!(config.database_path.ends_with(".sheetlog/sheetlog.db"));
        assert!(config.summarizer.is_none());
        assert_eq!(config.engine_config().summary_timeout, Duration::from_secs(20));
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
database_path = "/tmp/records.db"
duplicate_policy = "keep_first"

[summarizer]
provider = "anthropic"
model = "claude-3-5-haiku-latest"

[dataset_schemas]
applications = "rehabilitation_applications"

[schemas.members]
keep_unmapped = true
key = {{ field = "MemberId" }}
"#
        )
        .unwrap();

        let config = ImportConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/records.db"));
        assert_eq!(config.duplicate_policy, DuplicatePolicy::KeepFirst);
        let llm = config.summarizer.as_ref().unwrap();
        assert_eq!(llm.provider, LlmProvider::Anthropic);
        assert_eq!(llm.config.max_tokens, 800);

        let members = config.resolve_schema("anything", Some("members")).unwrap();
        assert_eq!(members.key, KeySpec::field("MemberId"));
        let applications = config.resolve_schema("applications", None).unwrap();
        assert_eq!(applications.key.field, "OriginalSlumNumber");
        let other = config.resolve_schema("other", None).unwrap();
        assert_eq!(other, DatasetSchema::generic());
    }

    #[test]
    fn test_from_yaml_and_json_files() {
        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(yaml, "max_reported_duplicates: 3").unwrap();
        assert_eq!(
            ImportConfig::from_file(yaml.path()).unwrap().max_reported_duplicates,
            3
        );

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(json, r#"{{"summary_timeout_secs": 5}}"#).unwrap();
        assert_eq!(
            ImportConfig::from_file(json.path())
                .unwrap()
                .engine_config()
                .summary_timeout,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            ImportConfig::from_file(file.path()),
            Err(SheetlogError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_schema() {
        let err = ImportConfig::default()
            .resolve_schema("members", Some("missing"))
            .unwrap_err();
        assert!(matches!(err, SheetlogError::InvalidInput { .. }));
    }

    #[test]
    fn test_from_vars() {
        let vars: HashMap<&str, &str> = [
            ("SHEETLOG_DATABASE_PATH", "/data/sheetlog.db"),
            ("SHEETLOG_DUPLICATE_POLICY", "reject_conflicting"),
            ("SHEETLOG_LLM_PROVIDER", "OpenAI"),
            ("OPENAI_API_KEY", "sk-test"),
        ]
        .into_iter()
        .collect();
        let config = ImportConfig::from_vars(|name| vars.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/data/sheetlog.db"));
        assert_eq!(config.duplicate_policy, DuplicatePolicy::RejectConflicting);
        let llm = config.summarizer.unwrap();
        assert_eq!(llm.provider, LlmProvider::OpenAI);
        assert_eq!(llm.config.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_from_vars_rejects_bad_numbers() {
        let err = ImportConfig::from_vars(|name| {
            (name == "SHEETLOG_MAX_UPLOAD_BYTES").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, SheetlogError::Configuration(_)));
    }
}
