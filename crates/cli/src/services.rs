//! Wiring of the engine collaborators from configuration.

use std::sync::Arc;

use taxwise_engine::{
    AnthropicClient, CatalogPlanner, GenerativePlanner, HttpSearchClient, Planner,
    SearchService, SessionService, TaxEngine, TextGenerator,
};
use taxwise_storage::FileSessionStore;
use tracing::info;

use crate::config::{Config, PlannerKind};

/// Build the engine. Fails if the generation or search settings are missing.
pub(crate) fn build_engine(config: &Config) -> Result<TaxEngine, String> {
    let settings = config.service_settings().map_err(|e| format!("error: {e}"))?;

    let mut client = AnthropicClient::new(settings.api_key, config.model.clone());
    if let Some(url) = &config.anthropic_url {
        client = client.with_base_url(url.clone());
    }
    let generator: Arc<dyn TextGenerator> = Arc::new(client);
    let search: Arc<dyn SearchService> = Arc::new(HttpSearchClient::new(
        settings.search_url,
        config.search_api_key.clone(),
    ));
    let planner: Arc<dyn Planner> = match config.planner {
        PlannerKind::Generative => Arc::new(GenerativePlanner::new(generator.clone())),
        PlannerKind::Catalog => Arc::new(CatalogPlanner),
    };

    info!(model = %config.model, planner = ?config.planner, "engine configured");
    Ok(TaxEngine::new(planner, generator, search))
}

/// The engine over the file session store in `config.state_dir`.
pub(crate) async fn open_service(
    config: &Config,
) -> Result<SessionService<FileSessionStore>, String> {
    let engine = build_engine(config)?;
    let store = open_store(config).await?;
    Ok(SessionService::new(Arc::new(engine), Arc::new(store)))
}

/// The file session store alone, for commands that only read sessions.
pub(crate) async fn open_store(config: &Config) -> Result<FileSessionStore, String> {
    FileSessionStore::open(&config.state_dir).await.map_err(|e| {
        format!(
            "error: could not open session store '{}': {}",
            config.state_dir.display(),
            e
        )
    })
}
