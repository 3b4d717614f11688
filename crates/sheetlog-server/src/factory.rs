//! Factory for creating the import engine from configuration.

use std::sync::Arc;

use sheetlog_core::config::ImportConfig;
use sheetlog_core::error::SheetlogResult;
use sheetlog_core::import::ImportEngine;
use sheetlog_core::versioning::SqliteRecordStore;
use sheetlog_llm::LlmFactory;
use tracing::{info, warn};

/// Create an [`ImportEngine`] from configuration.
///
/// A summarizer that cannot be built is logged and left out; imports then
/// commit without release notes.
pub fn create_engine(config: &ImportConfig) -> SheetlogResult<ImportEngine> {
    let store = SqliteRecordStore::new(&config.database_path)?;
    info!(path = %config.database_path.display(), "Record store opened");

    let mut engine = ImportEngine::new(Arc::new(store)).with_config(config.engine_config());

    if let Some(ref provider) = config.summarizer {
        match LlmFactory::summarizer(provider) {
            Ok(summarizer) => {
                info!(provider = ?provider.provider, model = %provider.config.model, "Release notes enabled");
                engine = engine.with_summarizer(summarizer);
            }
            Err(e) => warn!(error = %e, "Release notes disabled"),
        }
    }

    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetlog_core::config::{LlmProvider, LlmProviderConfig};

    #[test]
    fn test_create_engine_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = ImportConfig {
            database_path: dir.path().join("nested").join("sheetlog.db"),
            ..Default::default()
        };
        create_engine(&config).unwrap();
        assert!(config.database_path.exists());
    }

    #[test]
    fn test_summarizer_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = LlmProviderConfig {
            provider: LlmProvider::Anthropic,
            ..Default::default()
        };
        provider.config.api_key = Some("test-key".to_string());
        let config = ImportConfig {
            database_path: dir.path().join("sheetlog.db"),
            summarizer: Some(provider),
            ..Default::default()
        };
        assert!(create_engine(&config).is_ok());
    }
}
