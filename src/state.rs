use std::sync::Arc;

use crate::chat::ChatService;
use crate::core::config::{AppConfig, AppPaths};
use crate::core::db::open_pool;
use crate::documents::{DocumentService, DocumentStore};
use crate::embedding::EmbeddingService;
use crate::generation::RagGenerator;
use crate::history::HistoryStore;
use crate::llm::{LlmProvider, OpenAiCompatProvider};
use crate::rag::processor::DocumentProcessor;
use crate::rag::store::ChunkStore;
use crate::rag::{RagService, SqliteChunkStore};

/// Composition root. Everything the handlers need, wired once at startup.
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: AppConfig,
    pub provider: Arc<dyn LlmProvider>,
    pub history: HistoryStore,
    pub chunks: Arc<dyn ChunkStore>,
    pub documents: Arc<DocumentService>,
    pub rag: Arc<RagService>,
    pub chat: ChatService,
}

impl AppState {
    pub async fn initialize() -> anyhow::Result<Arc<Self>> {
        let paths = Arc::new(AppPaths::new());
        let config = AppConfig::load(&paths)?;

        let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatProvider::new(
            config.base_url.clone(),
            AppConfig::api_key(),
        ));
        let embeddings =
            EmbeddingService::new(provider.clone(), config.embedding_model.clone());

        // One pool for the whole application database.
        let pool = open_pool(&paths.db_path).await?;

        let chunks: Arc<dyn ChunkStore> =
            Arc::new(SqliteChunkStore::with_pool(pool.clone(), embeddings.clone()).await?);
        let document_store = DocumentStore::with_pool(pool.clone()).await?;
        let documents = Arc::new(DocumentService::new(
            document_store,
            chunks.clone(),
            DocumentProcessor::new(config.chunk_size, config.chunk_overlap),
        ));

        let generator = Arc::new(RagGenerator::new(
            provider.clone(),
            config.chat_model.clone(),
            config.temperature,
            config.max_tokens,
        ));
        let rag = Arc::new(RagService::new(
            embeddings,
            chunks.clone(),
            documents.clone(),
            generator,
        ));

        let history = HistoryStore::with_pool(pool).await?;
        let chat = ChatService::new(history.clone(), rag.clone());

        Ok(Arc::new(AppState {
            paths,
            config,
            provider,
            history,
            chunks,
            documents,
            rag,
            chat,
        }))
    }
}
