//! Retrieval-augmented answering over book content.
//!
//! - `IngestionPipeline`: markdown files to embedded, stored chunks
//! - `RagEngine`: full-book and selected-text question answering
//! - `VectorStore`: Qdrant over REST, or an embedded SQLite store

pub mod engine;
pub mod grounding;
pub mod ingest;
pub mod qdrant;
pub mod sqlite;
pub mod store;
pub mod types;
pub mod vector_math;

#[cfg(test)]
mod tests;

pub use engine::RagEngine;
pub use grounding::SENTINEL_ANSWER;
pub use ingest::{DocumentReport, IngestOptions, IngestReport, IngestionPipeline};
pub use qdrant::QdrantStore;
pub use sqlite::SqliteVectorStore;
pub use store::{CollectionStatus, VectorStore};
pub use types::{ExperienceLevel, RagAnswer, SourceChunk, SourceKind, UserProfile};
