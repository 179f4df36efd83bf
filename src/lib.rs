//! Retrieval-augmented chat backend: conversation-scoped document
//! ingestion, similarity search, and grounded response generation over an
//! OpenAI-compatible provider.

pub mod chat;
pub mod core;
pub mod documents;
pub mod embedding;
pub mod generation;
pub mod history;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
