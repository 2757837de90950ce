//! Directory ingestion: extract, chunk, embed, upsert.
//!
//! Record ids are UUIDv5 of `(book_id, page, chunk)`, so a re-run overwrites
//! rather than duplicates, and chunks whose content hash is already stored
//! are not embedded again. Records past the new end of a page, or of the
//! book, are deleted so a shrunken source leaves nothing stale behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::store::{CollectionStatus, VectorStore};
use super::types::{Chunk, ChunkPayload, PayloadFilter, StoredRecord};
use crate::core::config::ChunkingSettings;
use crate::core::errors::ApiError;
use crate::llm::{is_zero_vector, EmbeddingProvider};
use crate::text::{chunk_text, document_title, extract_text, title_from_path, validate_chunk_params};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Wipe the collection before ingesting.
    #[serde(default)]
    pub recreate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub files_processed: usize,
    pub files_failed: usize,
    pub chunks_stored: usize,
    pub chunks_unchanged: usize,
    pub chunks_failed: usize,
    /// Stale records deleted because their source shrank or disappeared.
    pub chunks_removed: usize,
    pub collection_status: CollectionStatus,
}

impl IngestReport {
    fn new(collection_status: CollectionStatus) -> Self {
        Self {
            files_processed: 0,
            files_failed: 0,
            chunks_stored: 0,
            chunks_unchanged: 0,
            chunks_failed: 0,
            chunks_removed: 0,
            collection_status,
        }
    }

    fn absorb(&mut self, doc: DocumentReport) {
        self.files_processed += 1;
        self.chunks_stored += doc.chunks_stored;
        self.chunks_unchanged += doc.chunks_unchanged;
        self.chunks_failed += doc.chunks_failed;
        self.chunks_removed += doc.chunks_removed;
    }
}

/// Per-file counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub chunks_stored: usize,
    pub chunks_unchanged: usize,
    pub chunks_failed: usize,
    pub chunks_removed: usize,
}

#[derive(Clone)]
pub struct IngestionPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    collection: String,
    chunking: ChunkingSettings,
    extensions: Vec<String>,
}

impl IngestionPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        chunking: ChunkingSettings,
        extensions: Vec<String>,
    ) -> Result<Self, ApiError> {
        validate_chunk_params(chunking.chunk_size, chunking.chunk_overlap)?;
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        Ok(Self {
            embedder,
            store,
            collection: collection.into(),
            chunking,
            extensions,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Ingests every matching file under `dir`. Pages are numbered from 1 in
    /// path order. A failing file is logged and counted; the batch goes on.
    pub async fn ingest_directory(
        &self,
        dir: &Path,
        book_id: &str,
        options: IngestOptions,
    ) -> Result<IngestReport, ApiError> {
        let book_id = require_book_id(book_id)?;
        if !tokio::fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(ApiError::BadRequest(format!(
                "Directory {} does not exist",
                dir.display()
            )));
        }

        let status = self.prepare_collection(options).await?;
        let files = collect_files(dir, &self.extensions).await?;
        tracing::info!(
            "Ingesting {} files from {} into {} as book {}",
            files.len(),
            dir.display(),
            self.collection,
            book_id
        );

        let mut report = IngestReport::new(status);
        for (index, path) in files.iter().enumerate() {
            let page_number = (index + 1) as u32;
            let source = path.strip_prefix(dir).unwrap_or(path);
            match self.ingest_file(path, source, book_id, page_number).await {
                Ok(doc) => {
                    tracing::info!(
                        "Page {} ({}): {} stored, {} unchanged, {} failed, {} removed",
                        page_number,
                        source.display(),
                        doc.chunks_stored,
                        doc.chunks_unchanged,
                        doc.chunks_failed,
                        doc.chunks_removed
                    );
                    report.absorb(doc);
                }
                Err(err) => {
                    tracing::error!("Skipping {}: {}", path.display(), err);
                    report.files_failed += 1;
                }
            }
        }

        let past_last_page =
            PayloadFilter::book(book_id).at_least("page_number", files.len() as u64 + 1);
        report.chunks_removed += self.remove_stale(&past_last_page).await;

        tracing::info!(
            "Ingestion of {} finished: {} files, {} chunks stored, {} unchanged, {} failed, {} removed, {} files failed",
            book_id,
            report.files_processed,
            report.chunks_stored,
            report.chunks_unchanged,
            report.chunks_failed,
            report.chunks_removed,
            report.files_failed
        );
        Ok(report)
    }

    /// Ingests one file as `page_number` of `book_id`, creating the collection if needed.
    pub async fn ingest_document(
        &self,
        path: &Path,
        book_id: &str,
        page_number: u32,
    ) -> Result<DocumentReport, ApiError> {
        let book_id = require_book_id(book_id)?;
        self.prepare_collection(IngestOptions::default()).await?;
        self.ingest_file(path, path, book_id, page_number).await
    }

    async fn prepare_collection(&self, options: IngestOptions) -> Result<CollectionStatus, ApiError> {
        let size = self.embedder.dimension();
        if options.recreate {
            self.store.recreate_collection(&self.collection, size).await?;
            Ok(CollectionStatus::Recreated)
        } else {
            self.store.ensure_collection(&self.collection, size).await
        }
    }

    async fn ingest_file(
        &self,
        path: &Path,
        source: &Path,
        book_id: &str,
        page_number: u32,
    ) -> Result<DocumentReport, ApiError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", path.display(), e)))?;

        let chunks = build_chunks(&raw, path, source, book_id, page_number, self.chunking)?;
        let total = chunks.len() as u32;
        let mut report = DocumentReport::default();
        let mut records = Vec::with_capacity(chunks.len());
        let source_label = source.display().to_string();

        for chunk in chunks {
            let id = chunk_id(book_id, page_number, chunk.chunk_number);
            let hash = content_hash(&chunk.content);

            match self.store.get_payload(&self.collection, &id).await {
                Ok(Some(existing)) if existing.content_hash == hash => {
                    report.chunks_unchanged += 1;
                    continue;
                }
                Ok(_) => {}
                Err(err) => tracing::warn!("Could not look up stored chunk {}: {}", id, err),
            }

            let vector = self.embedder.embed(&chunk.content).await;
            if is_zero_vector(&vector) {
                tracing::warn!(
                    "Embedding failed for page {} chunk {} of {}; chunk skipped",
                    page_number,
                    chunk.chunk_number,
                    book_id
                );
                report.chunks_failed += 1;
                // the old record at this position no longer matches the source
                let position = PayloadFilter::book(book_id)
                    .with("page_number", page_number)
                    .with("chunk_number", chunk.chunk_number);
                report.chunks_removed += self.remove_stale(&position).await;
                continue;
            }

            records.push(StoredRecord {
                id,
                vector,
                payload: ChunkPayload::from_chunk(chunk, source_label.clone(), hash),
            });
        }

        report.chunks_stored = self.store.upsert(&self.collection, records).await?;
        report.chunks_removed += self
            .remove_stale(&PayloadFilter::page_tail(book_id, page_number, total))
            .await;
        Ok(report)
    }

    /// Deletes matching records. Failures are logged; the stored chunks stay valid.
    async fn remove_stale(&self, filter: &PayloadFilter) -> usize {
        match self.store.delete(&self.collection, filter).await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::debug!("Removed {} stale chunks from {}", removed, self.collection);
                }
                removed
            }
            Err(err) => {
                tracing::warn!("Could not remove stale chunks from {}: {}", self.collection, err);
                0
            }
        }
    }
}

fn require_book_id(book_id: &str) -> Result<&str, ApiError> {
    let trimmed = book_id.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request("book_id must not be empty"));
    }
    Ok(trimmed)
}

fn build_chunks(
    raw: &str,
    path: &Path,
    source: &Path,
    book_id: &str,
    page_number: u32,
    chunking: ChunkingSettings,
) -> Result<Vec<Chunk>, ApiError> {
    let text = extract_text(raw);
    let spans = chunk_text(&text, chunking.chunk_size, chunking.chunk_overlap)?;
    let section_title = document_title(raw).unwrap_or_else(|| title_from_path(path));
    let total = spans.len();

    Ok(spans
        .into_iter()
        .map(|span| {
            let mut metadata = Map::new();
            metadata.insert("source".to_string(), json!(source.display().to_string()));
            metadata.insert("total_chunks".to_string(), json!(total));
            Chunk {
                content: span.content,
                start_pos: span.start_pos,
                end_pos: span.end_pos,
                book_id: book_id.to_string(),
                section_title: section_title.clone(),
                page_number,
                chunk_number: span.index as u32,
                metadata,
            }
        })
        .collect())
}

/// Stable record id for a chunk position.
pub fn chunk_id(book_id: &str, page_number: u32, chunk_number: u32) -> String {
    let name = format!("{}_page_{}_chunk_{}", book_id, page_number, chunk_number);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Files under `dir` whose extension is in `extensions`, sorted by path.
pub async fn collect_files(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, ApiError> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await.map_err(ApiError::internal)?;
        while let Some(entry) = entries.next_entry().await.map_err(ApiError::internal)? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(ApiError::internal)?;
            if file_type.is_dir() {
                pending.push(path);
            } else if has_extension(&path, extensions) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.iter().any(|allowed| *allowed == ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_are_deterministic_uuids() {
        let a = chunk_id("physical-ai", 3, 7);
        assert_eq!(a, chunk_id("physical-ai", 3, 7));
        assert_ne!(a, chunk_id("physical-ai", 3, 8));
        assert_ne!(a, chunk_id("other-book", 3, 7));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn collects_matching_files_recursively_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("module-1");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("02-topics.md"), "# Topics").unwrap();
        std::fs::write(nested.join("01-nodes.MDX"), "# Nodes").unwrap();
        std::fs::write(dir.path().join("intro.md"), "# Intro").unwrap();
        std::fs::write(dir.path().join("diagram.png"), [0u8; 4]).unwrap();

        let extensions = vec!["md".to_string(), "mdx".to_string()];
        let files = collect_files(dir.path(), &extensions).await.unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "intro.md".to_string(),
                format!("module-1{}01-nodes.MDX", std::path::MAIN_SEPARATOR),
                format!("module-1{}02-topics.md", std::path::MAIN_SEPARATOR),
            ]
        );
    }

    #[test]
    fn chunks_carry_position_and_title() {
        let raw = "---\ntitle: Nodes\n---\nA node is a process. It publishes topics.";
        let chunks = build_chunks(
            raw,
            Path::new("docs/01-nodes.md"),
            Path::new("01-nodes.md"),
            "physical-ai",
            2,
            ChunkingSettings::default(),
        )
        .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section_title, "Nodes");
        assert_eq!(chunks[0].page_number, 2);
        assert_eq!(chunks[0].chunk_number, 0);
        assert_eq!(chunks[0].content, "A node is a process. It publishes topics.");
        assert_eq!(chunks[0].metadata["total_chunks"], 1);
    }
}
