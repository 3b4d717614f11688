//! Server state management.

use std::sync::Arc;

use sheetlog_core::config::ImportConfig;
use sheetlog_core::error::SheetlogResult;
use sheetlog_core::import::ImportEngine;
use tokio_util::sync::CancellationToken;

use crate::factory::create_engine;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ImportEngine>,
    pub config: Arc<ImportConfig>,
    /// Cancelled on shutdown; imports run under a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create state around an existing engine.
    pub fn new(engine: ImportEngine, config: ImportConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Open the store and summarizer described by `config`.
    pub fn from_config(config: ImportConfig) -> SheetlogResult<Self> {
        let engine = create_engine(&config)?;
        Ok(Self::new(engine, config))
    }
}
