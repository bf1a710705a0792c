//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Core services are generic over repository traits; AppState pins them to
//! the SQLite implementations from pmassist-infra.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pmassist_core::agent::engine::AgentEngine;
use pmassist_core::agent::runner::AgentRunner;
use pmassist_core::chat::service::ChatService;
use pmassist_core::llm::box_provider::BoxLlmProvider;
use pmassist_core::tool::ToolRegistry;
use pmassist_core::tool::memory::{ManageMemoryTool, SearchMemoryTool};
use pmassist_core::tool::prd::{GeneratePrdTool, PrdToolSettings, UpdatePrdTool};
use pmassist_core::tool::time::CurrentTimeTool;
use pmassist_core::tool::todo::WriteTodosTool;
use pmassist_infra::config::load_config;
use pmassist_infra::filesystem::{config_path, database_url, ensure_data_dir, resolve_data_dir};
use pmassist_infra::llm::create_provider;
use pmassist_infra::sqlite::checkpoint::SqliteCheckpointRepository;
use pmassist_infra::sqlite::memory::SqliteMemoryRepository;
use pmassist_infra::sqlite::pool::DatabasePool;
use pmassist_infra::sqlite::prd::SqlitePrdRepository;
use pmassist_infra::tool::http_request::HttpRequestTool;
use pmassist_types::config::AppConfig;

/// Chat service pinned to the SQLite repositories.
pub type ConcreteChatService = ChatService<SqliteCheckpointRepository, SqlitePrdRepository>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub config: Arc<AppConfig>,
    /// URL of the opened database, reported by `setup`.
    pub database_url: String,
}

impl AppState {
    /// Load configuration, open (and migrate) the database, wire services.
    pub async fn init(config_override: Option<&Path>) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        ensure_data_dir(&data_dir).await?;

        let config_file: PathBuf = config_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config_path(&data_dir));
        let config = load_config(&config_file).await;

        let db_url = config
            .database
            .url
            .clone()
            .unwrap_or_else(|| database_url(&data_dir));
        let db_pool = DatabasePool::new(&db_url).await?;

        let provider = create_provider(&config.llm);
        Self::from_parts(db_pool, db_url, config, provider)
    }

    /// Wire services from an open pool and a chosen provider.
    pub fn from_parts(
        db_pool: DatabasePool,
        database_url: String,
        config: AppConfig,
        provider: BoxLlmProvider,
    ) -> anyhow::Result<Self> {
        let checkpoints = Arc::new(SqliteCheckpointRepository::new(db_pool.clone()));
        let prds = Arc::new(SqlitePrdRepository::new(db_pool.clone()));
        let memories = Arc::new(SqliteMemoryRepository::new(db_pool));

        let engine = AgentEngine::new(provider);
        let prd_settings = PrdToolSettings {
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
        };

        let mut tools = ToolRegistry::new();
        tools
            .register(GeneratePrdTool::new(
                engine.clone(),
                prds.clone(),
                prd_settings.clone(),
            ))
            .register(UpdatePrdTool::new(engine.clone(), prds.clone(), prd_settings))
            .register(WriteTodosTool)
            .register(CurrentTimeTool)
            .register(ManageMemoryTool::new(memories.clone()))
            .register(SearchMemoryTool::new(memories));
        if config.tools.http_request {
            tools.register(HttpRequestTool::from_config(&config.tools)?);
        }
        tracing::debug!(tools = ?tools.names(), "Tool registry ready");

        let runner = AgentRunner::from_config(engine, Arc::new(tools), &config);
        let chat_service = ChatService::new(checkpoints, prds, Arc::new(runner));

        Ok(Self {
            chat_service: Arc::new(chat_service),
            config: Arc::new(config),
            database_url,
        })
    }
}
