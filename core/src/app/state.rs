use std::{sync::Arc, time::Duration};

use sqlx::PgPool;

use crate::{
    app::{
        extractors::builtin_registry,
        models::{OpenAiCompletion, OpenAiEmbedder},
        providers::BuiltinProviderFactory,
        repo::pg,
    },
    config::StartArgs,
    core::{
        completion::Completion,
        embedder::Embedder,
        extractor::ExtractorRegistry,
        provider::ProviderFactory,
        registry::ProviderRegistry,
        service::{
            chat::ChatPipeline,
            docsearch::DocSearchPipeline,
            indexer::{IndexerConfig, IndexerPipeline},
            query::QueryPipeline,
        },
        settings::Configuration,
        store::ChunkStore,
    },
    error::RagError,
};

/// Everything the two binaries share: one postgres pool plus the trait
/// objects built on top of it, and the two read-path pipelines the HTTP
/// server exposes directly. The indexer binary additionally
/// builds an [`IndexerPipeline`] per run via [`AppState::indexer_pipeline`],
/// since its tuning ([`IndexerConfig`]) varies per invocation.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub configuration: Arc<dyn Configuration>,
    pub registry: Arc<dyn ProviderRegistry>,
    pub store: Arc<dyn ChunkStore>,
    pub extractors: Arc<ExtractorRegistry>,
    pub embedder: Arc<dyn Embedder>,
    pub completion: Arc<dyn Completion>,
    pub provider_factory: Arc<dyn ProviderFactory>,
    pub query: Arc<QueryPipeline>,
    pub chat: Arc<ChatPipeline>,
    pub docsearch: Arc<DocSearchPipeline>,
}

impl AppState {
    pub async fn new(args: &StartArgs) -> Result<Self, RagError> {
        let request_timeout = Duration::from_secs(args.request_timeout_secs());

        let pool = pg::init(&args.database_url(), args.db_max_connections(), request_timeout).await?;
        pg::settings::seed_ai_settings_from_env(&pool).await?;
        pg::settings::seed_providers_from_env(&pool).await?;

        let configuration: Arc<dyn Configuration> = Arc::new(pg::settings::PgConfiguration::new(pool.clone()));
        let registry: Arc<dyn ProviderRegistry> = Arc::new(pool.clone());
        let store: Arc<dyn ChunkStore> = Arc::new(pool.clone());
        let extractors = Arc::new(builtin_registry());
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(configuration.clone(), request_timeout));
        let completion: Arc<dyn Completion> = Arc::new(OpenAiCompletion::new(configuration.clone(), request_timeout));
        let provider_factory: Arc<dyn ProviderFactory> = Arc::new(BuiltinProviderFactory::new(request_timeout));

        let query = Arc::new(QueryPipeline::new(
            configuration.clone(),
            store.clone(),
            embedder.clone(),
            completion.clone(),
        ));
        let chat = Arc::new(ChatPipeline::new(
            configuration.clone(),
            store.clone(),
            embedder.clone(),
            completion.clone(),
        ));
        let docsearch = Arc::new(DocSearchPipeline::new(configuration.clone(), store.clone(), embedder.clone()));

        Ok(Self {
            pool,
            configuration,
            registry,
            store,
            extractors,
            embedder,
            completion,
            provider_factory,
            query,
            chat,
            docsearch,
        })
    }

    /// Builds one [`IndexerPipeline`] for a single ingestion run.
    pub fn indexer_pipeline(&self, config: IndexerConfig) -> IndexerPipeline {
        IndexerPipeline::new(
            self.configuration.clone(),
            self.registry.clone(),
            self.store.clone(),
            self.extractors.clone(),
            self.embedder.clone(),
            self.provider_factory.clone(),
            config,
        )
    }
}
