pub mod chunker;
pub mod memory;
pub mod processor;
pub mod service;
pub mod sqlite;
pub mod store;
pub mod types;

pub use memory::MemoryChunkStore;
pub use processor::DocumentProcessor;
pub use service::RagService;
pub use sqlite::SqliteChunkStore;
pub use store::ChunkStore;
pub use types::{Document, DocumentChunk, RagQuery, RagResult};
