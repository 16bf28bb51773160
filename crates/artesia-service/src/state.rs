//! Application state.

use std::sync::Arc;
use std::time::Duration;

use artesia_core::StyleCatalog;
use artesia_ledger::{Ledger, LedgerOptions};
use artesia_store::Store;
use artesia_transform::{OpenAiTransformer, TransformationService};

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Style presets.
    pub catalog: Arc<StyleCatalog>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Conversion ledger; absent when no transformer is configured.
    pub ledger: Option<Ledger>,
}

impl AppState {
    /// Create application state, wiring the `OpenAI` transformer if a key is
    /// configured.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, catalog: Arc<StyleCatalog>, config: ServiceConfig) -> Self {
        let transformer = config.openai_api_key.as_ref().map(|key| {
            tracing::info!(
                base_url = %config.openai_base_url,
                model = %config.openai_model,
                "OpenAI transformer enabled"
            );
            Arc::new(OpenAiTransformer::new(
                &config.openai_base_url,
                key,
                &config.openai_model,
            )) as Arc<dyn TransformationService>
        });

        if transformer.is_none() {
            tracing::warn!("OpenAI not configured - conversions will not be available");
        }

        Self::with_transformer(store, catalog, config, transformer)
    }

    /// Create application state with an explicit transformer.
    #[must_use]
    pub fn with_transformer(
        store: Arc<dyn Store>,
        catalog: Arc<StyleCatalog>,
        config: ServiceConfig,
        transformer: Option<Arc<dyn TransformationService>>,
    ) -> Self {
        let ledger = transformer.map(|transformer| {
            Ledger::with_options(
                store.clone(),
                catalog.clone(),
                transformer,
                LedgerOptions {
                    transform_timeout: Duration::from_secs(config.transform_timeout_seconds),
                    ..LedgerOptions::default()
                },
            )
        });

        Self {
            store,
            catalog,
            config,
            ledger,
        }
    }

    /// Check if conversions can be served.
    #[must_use]
    pub fn has_ledger(&self) -> bool {
        self.ledger.is_some()
    }
}
