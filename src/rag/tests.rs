//! Cross-component tests for the RAG pipeline.
//!
//! - `engine_tests`: short-circuits, selected-text isolation, prompt contents
//! - `ingest_tests`: idempotent re-runs, failure accounting, stale chunk removal,
//!   collection resets

#[cfg(test)]
mod doubles {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::core::errors::ApiError;
    use crate::llm::{EmbeddingProvider, GenerationProvider, ProviderError};
    use crate::rag::store::{CollectionStatus, VectorStore};
    use crate::rag::types::{ChunkPayload, PayloadFilter, QueryResult, StoredRecord};

    pub const FAIL_MARKER: &str = "EMBED_FAIL";

    /// Deterministic non-zero vectors; text containing `FAIL_MARKER` fails.
    pub struct CountingEmbedder {
        pub dimension: usize,
        pub calls: AtomicUsize,
        pub zero: bool,
    }

    impl CountingEmbedder {
        pub fn new(dimension: usize) -> Self {
            Self {
                dimension,
                calls: AtomicUsize::new(0),
                zero: false,
            }
        }

        pub fn broken(dimension: usize) -> Self {
            Self {
                zero: true,
                ..Self::new(dimension)
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        fn name(&self) -> &str {
            "counting"
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn try_embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.zero || text.contains(FAIL_MARKER) {
                return Err(ProviderError::EmptyResponse("counting"));
            }
            let seed = text.bytes().map(u32::from).sum::<u32>();
            Ok((0..self.dimension)
                .map(|i| ((seed + i as u32) % 7 + 1) as f32)
                .collect())
        }
    }

    pub struct RecordingGenerator {
        pub reply: String,
        pub calls: AtomicUsize,
        pub last: Mutex<Option<(String, String)>>,
    }

    impl RecordingGenerator {
        pub fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_call(&self) -> (String, String) {
            self.last.lock().unwrap().clone().expect("generator was not called")
        }
    }

    #[async_trait]
    impl GenerationProvider for RecordingGenerator {
        fn name(&self) -> &str {
            "recording"
        }

        async fn try_generate(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some((system.to_string(), prompt.to_string()));
            Ok(self.reply.clone())
        }
    }

    /// Returns canned search results and counts every call.
    pub struct StubStore {
        pub results: Vec<QueryResult>,
        pub fail: bool,
        pub calls: AtomicUsize,
        pub last_filter: Mutex<Option<PayloadFilter>>,
    }

    impl StubStore {
        pub fn new(results: Vec<QueryResult>) -> Self {
            Self {
                results,
                fail: false,
                calls: AtomicUsize::new(0),
                last_filter: Mutex::new(None),
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn touch(&self) -> Result<(), ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApiError::ServiceUnavailable);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl VectorStore for StubStore {
        fn name(&self) -> &str {
            "stub"
        }

        async fn ensure_collection(&self, _: &str, _: usize) -> Result<CollectionStatus, ApiError> {
            self.touch()?;
            Ok(CollectionStatus::Existing)
        }

        async fn recreate_collection(&self, _: &str, _: usize) -> Result<(), ApiError> {
            self.touch()
        }

        async fn upsert(&self, _: &str, records: Vec<StoredRecord>) -> Result<usize, ApiError> {
            self.touch()?;
            Ok(records.len())
        }

        async fn get_payload(&self, _: &str, _: &str) -> Result<Option<ChunkPayload>, ApiError> {
            self.touch()?;
            Ok(None)
        }

        async fn search(
            &self,
            _: &str,
            _: &[f32],
            top_k: usize,
            filter: Option<&PayloadFilter>,
        ) -> Result<Vec<QueryResult>, ApiError> {
            self.touch()?;
            *self.last_filter.lock().unwrap() = filter.cloned();
            Ok(self.results.iter().take(top_k).cloned().collect())
        }

        async fn count(&self, _: &str, _: Option<&PayloadFilter>) -> Result<usize, ApiError> {
            self.touch()?;
            Ok(self.results.len())
        }

        async fn delete(&self, _: &str, _: &PayloadFilter) -> Result<usize, ApiError> {
            self.touch()?;
            Ok(0)
        }
    }
}

#[cfg(test)]
mod engine_tests {
    use std::sync::Arc;

    use serde_json::Map;

    use super::doubles::{CountingEmbedder, RecordingGenerator, StubStore};
    use crate::core::config::RetrievalSettings;
    use crate::core::errors::ApiError;
    use crate::rag::engine::RagEngine;
    use crate::rag::grounding::SENTINEL_ANSWER;
    use crate::rag::types::{
        ChunkPayload, ExperienceLevel, PayloadFilter, QueryResult, SourceKind, UserProfile,
    };

    fn hit(section: &str, page: u32, content: &str, score: f32) -> QueryResult {
        QueryResult {
            id: format!("{}-{}", section, page),
            score,
            payload: ChunkPayload {
                content: content.to_string(),
                source: format!("{}.md", section.to_lowercase()),
                book_id: "X".to_string(),
                section_title: section.to_string(),
                page_number: page,
                chunk_number: 0,
                start_pos: 0,
                end_pos: content.chars().count(),
                content_hash: String::new(),
                metadata: Map::new(),
            },
        }
    }

    struct Harness {
        embedder: Arc<CountingEmbedder>,
        generator: Arc<RecordingGenerator>,
        store: Arc<StubStore>,
        engine: RagEngine,
    }

    fn harness(embedder: CountingEmbedder, store: StubStore, reply: &str, min_score: f32) -> Harness {
        let embedder = Arc::new(embedder);
        let generator = Arc::new(RecordingGenerator::new(reply));
        let store = Arc::new(store);
        let engine = RagEngine::new(
            embedder.clone(),
            generator.clone(),
            store.clone(),
            "book_docs",
            RetrievalSettings { top_k: 5, min_score },
        );
        Harness {
            embedder,
            generator,
            store,
            engine,
        }
    }

    // ---------------------------------------------------------------
    // full-book mode
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn zero_hits_return_sentinel_without_generation() {
        let h = harness(CountingEmbedder::new(8), StubStore::new(Vec::new()), "unused", 0.0);

        let answer = h.engine.query_full_book("What is ROS 2?", Some("X"), None).await.unwrap();

        assert_eq!(answer.answer, SENTINEL_ANSWER);
        assert!(answer.source_chunks.is_empty());
        assert_eq!(answer.book_id.as_deref(), Some("X"));
        assert_eq!(h.store.calls(), 1);
        assert_eq!(h.generator.calls(), 0);
        assert_eq!(
            h.store.last_filter.lock().unwrap().clone(),
            Some(PayloadFilter::book("X"))
        );
    }

    #[tokio::test]
    async fn store_failure_is_treated_as_no_hits() {
        let h = harness(CountingEmbedder::new(8), StubStore::failing(), "unused", 0.0);

        let answer = h.engine.query_full_book("What is ROS 2?", None, None).await.unwrap();

        assert_eq!(answer.answer, SENTINEL_ANSWER);
        assert_eq!(answer.book_id, None);
        assert_eq!(h.generator.calls(), 0);
    }

    #[tokio::test]
    async fn failed_query_embedding_skips_search_and_generation() {
        let store = StubStore::new(vec![hit("Nodes", 1, "A node is a process.", 0.9)]);
        let h = harness(CountingEmbedder::broken(8), store, "unused", 0.0);

        let answer = h.engine.query_full_book("What is a node?", Some("X"), None).await.unwrap();

        assert_eq!(answer.answer, SENTINEL_ANSWER);
        assert_eq!(h.store.calls(), 0);
        assert_eq!(h.generator.calls(), 0);
    }

    #[tokio::test]
    async fn empty_query_is_rejected_before_any_provider_call() {
        let h = harness(CountingEmbedder::new(8), StubStore::new(Vec::new()), "unused", 0.0);

        let result = h.engine.query_full_book("   ", Some("X"), None).await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert_eq!(h.embedder.calls(), 0);
        assert_eq!(h.store.calls(), 0);
    }

    #[tokio::test]
    async fn grounded_prompt_carries_context_and_sources() {
        let store = StubStore::new(vec![
            hit("Nodes", 1, "A node is a process that performs computation.", 0.92),
            hit("Topics", 2, "Topics are named buses.", 0.81),
        ]);
        let h = harness(CountingEmbedder::new(8), store, " A node is a process. ", 0.0);

        let answer = h.engine.query_full_book("What is a node?", Some("X"), None).await.unwrap();

        assert_eq!(answer.answer, "A node is a process.");
        assert_eq!(answer.source_chunks.len(), 2);
        assert_eq!(answer.source_chunks[0].kind, SourceKind::Retrieved);
        assert_eq!(answer.source_chunks[0].page_number, Some(1));
        assert_eq!(answer.source_chunks[1].score, Some(0.81));

        let (system, prompt) = h.generator.last_call();
        assert!(system.contains(SENTINEL_ANSWER));
        assert!(prompt.contains("[Section: Nodes | Page 1]\nA node is a process that performs computation."));
        assert!(prompt.contains("[Section: Topics | Page 2]"));
        assert!(prompt.contains("What is a node?"));
    }

    #[tokio::test]
    async fn results_below_min_score_are_dropped() {
        let store = StubStore::new(vec![hit("Nodes", 1, "Weak match.", 0.2)]);
        let h = harness(CountingEmbedder::new(8), store, "unused", 0.5);

        let answer = h.engine.query_full_book("What is a node?", None, None).await.unwrap();

        assert_eq!(answer.answer, SENTINEL_ANSWER);
        assert_eq!(h.generator.calls(), 0);
    }

    #[tokio::test]
    async fn beginner_profile_extends_system_message() {
        let store = StubStore::new(vec![hit("Nodes", 1, "A node is a process.", 0.9)]);
        let h = harness(CountingEmbedder::new(8), store, "It is a process.", 0.0);
        let profile = UserProfile {
            software_experience: ExperienceLevel::Beginner,
            hardware_experience: ExperienceLevel::Advanced,
        };

        h.engine
            .query_full_book("What is a node?", Some("X"), Some(&profile))
            .await
            .unwrap();

        let (system, _) = h.generator.last_call();
        assert!(system.contains("beginner-level experience in software"));
        assert!(!system.contains("advanced-level"));
    }

    #[tokio::test]
    async fn abstaining_model_answer_is_normalized() {
        let store = StubStore::new(vec![hit("Nodes", 1, "A node is a process.", 0.9)]);
        let h = harness(
            CountingEmbedder::new(8),
            store,
            "I don't know - it's not in the provided content.",
            0.0,
        );

        let answer = h.engine.query_full_book("Who won the cup?", None, None).await.unwrap();

        assert_eq!(answer.answer, SENTINEL_ANSWER);
        assert_eq!(h.generator.calls(), 1);
    }

    // ---------------------------------------------------------------
    // selected-text mode
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn selected_text_never_touches_store_or_embedder() {
        let h = harness(CountingEmbedder::new(8), StubStore::new(Vec::new()), "2A.", 0.0);

        let answer = h
            .engine
            .query_selected_text("What is the stall current?", "The motor draws 2A at stall.", None)
            .await
            .unwrap();

        assert_eq!(h.store.calls(), 0);
        assert_eq!(h.embedder.calls(), 0);
        assert_eq!(h.generator.calls(), 1);
        assert_eq!(answer.answer, "2A.");
        assert_eq!(answer.source_chunks.len(), 1);
        assert_eq!(answer.source_chunks[0].kind, SourceKind::SelectedText);
        assert_eq!(answer.source_chunks[0].content, "The motor draws 2A at stall.");

        let (system, prompt) = h.generator.last_call();
        assert!(system.contains("ONLY the provided selected text"));
        assert!(prompt.contains("The motor draws 2A at stall."));
        assert!(prompt.contains("What is the stall current?"));
    }

    #[tokio::test]
    async fn selected_text_requires_both_inputs() {
        let h = harness(CountingEmbedder::new(8), StubStore::new(Vec::new()), "x", 0.0);

        let no_text = h.engine.query_selected_text("Why?", " ", None).await;
        let no_query = h.engine.query_selected_text("", "Some text.", None).await;

        assert!(matches!(no_text, Err(ApiError::BadRequest(_))));
        assert!(matches!(no_query, Err(ApiError::BadRequest(_))));
        assert_eq!(h.generator.calls(), 0);
    }
}

#[cfg(test)]
mod ingest_tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::doubles::{CountingEmbedder, FAIL_MARKER};
    use crate::core::config::ChunkingSettings;
    use crate::core::errors::ApiError;
    use crate::rag::ingest::{chunk_id, IngestOptions, IngestionPipeline};
    use crate::rag::sqlite::SqliteVectorStore;
    use crate::rag::store::{CollectionStatus, VectorStore};
    use crate::rag::types::PayloadFilter;

    const COLLECTION: &str = "book_docs";

    async fn sqlite_store(dir: &Path) -> Arc<SqliteVectorStore> {
        Arc::new(SqliteVectorStore::with_path(dir.join("vectors.db")).await.unwrap())
    }

    fn pipeline(embedder: Arc<CountingEmbedder>, store: Arc<SqliteVectorStore>) -> IngestionPipeline {
        IngestionPipeline::new(
            embedder,
            store,
            COLLECTION,
            ChunkingSettings {
                chunk_size: 120,
                chunk_overlap: 20,
            },
            vec!["md".to_string(), ".mdx".to_string()],
        )
        .unwrap()
    }

    fn write_book(root: &Path) {
        let docs = root.join("docs");
        std::fs::create_dir_all(docs.join("module-1")).unwrap();
        std::fs::write(
            docs.join("intro.md"),
            "# Introduction\n\nPhysical AI joins software and hardware. Robots sense the world. \
             They plan motions. They act through motors and joints. Simulation helps testing.",
        )
        .unwrap();
        std::fs::write(
            docs.join("module-1").join("01-ros2.mdx"),
            "---\ntitle: ROS 2 Basics\n---\nimport Tabs from '@theme/Tabs';\n\nA node is a process. \
             Nodes exchange messages over topics.",
        )
        .unwrap();
        std::fs::write(docs.join("notes.txt"), "ignored").unwrap();
    }

    #[tokio::test]
    async fn reingesting_unchanged_content_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_book(dir.path());
        let embedder = Arc::new(CountingEmbedder::new(6));
        let store = sqlite_store(dir.path()).await;
        let pipeline = pipeline(embedder.clone(), store.clone());
        let docs = dir.path().join("docs");

        let first = pipeline
            .ingest_directory(&docs, "physical-ai", IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(first.collection_status, CollectionStatus::Created);
        assert_eq!(first.files_processed, 2);
        assert_eq!(first.files_failed, 0);
        assert!(first.chunks_stored >= 3);
        let stored = store.count(COLLECTION, None).await.unwrap();
        assert_eq!(stored, first.chunks_stored);
        let embeds_after_first = embedder.calls();

        let second = pipeline
            .ingest_directory(&docs, "physical-ai", IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(second.collection_status, CollectionStatus::Existing);
        assert_eq!(second.chunks_stored, 0);
        assert_eq!(second.chunks_unchanged, first.chunks_stored);
        assert_eq!(store.count(COLLECTION, None).await.unwrap(), stored);
        assert_eq!(embedder.calls(), embeds_after_first);
    }

    #[tokio::test]
    async fn pages_follow_sorted_path_order() {
        let dir = tempfile::tempdir().unwrap();
        write_book(dir.path());
        let store = sqlite_store(dir.path()).await;
        let pipeline = pipeline(Arc::new(CountingEmbedder::new(6)), store.clone());

        pipeline
            .ingest_directory(&dir.path().join("docs"), "physical-ai", IngestOptions::default())
            .await
            .unwrap();

        let intro = store
            .get_payload(COLLECTION, &chunk_id("physical-ai", 1, 0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(intro.section_title, "Introduction");
        assert_eq!(intro.source, "intro.md");

        let ros = store
            .get_payload(COLLECTION, &chunk_id("physical-ai", 2, 0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ros.section_title, "ROS 2 Basics");
        assert_eq!(ros.page_number, 2);
        assert!(!ros.content.contains("import Tabs"));
    }

    #[tokio::test]
    async fn changed_content_is_embedded_again() {
        let dir = tempfile::tempdir().unwrap();
        write_book(dir.path());
        let store = sqlite_store(dir.path()).await;
        let pipeline = pipeline(Arc::new(CountingEmbedder::new(6)), store.clone());
        let docs = dir.path().join("docs");
        pipeline
            .ingest_directory(&docs, "physical-ai", IngestOptions::default())
            .await
            .unwrap();

        std::fs::write(
            docs.join("module-1").join("01-ros2.mdx"),
            "# ROS 2 Basics\n\nA node is a process. Services are request and reply.",
        )
        .unwrap();
        let report = pipeline
            .ingest_directory(&docs, "physical-ai", IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(report.chunks_stored, 1);
        let payload = store
            .get_payload(COLLECTION, &chunk_id("physical-ai", 2, 0))
            .await
            .unwrap()
            .unwrap();
        assert!(payload.content.contains("Services are request and reply."));
    }

    #[tokio::test]
    async fn shrinking_a_file_removes_its_trailing_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        let long: String = (1..=40)
            .map(|i| format!("Actuator note number {} covers torque limits. ", i))
            .collect();
        std::fs::write(docs.join("a.md"), &long).unwrap();
        let store = sqlite_store(dir.path()).await;
        let pipeline = pipeline(Arc::new(CountingEmbedder::new(6)), store.clone());
        pipeline
            .ingest_document(&docs.join("a.md"), "other-book", 1)
            .await
            .unwrap();

        let first = pipeline
            .ingest_directory(&docs, "physical-ai", IngestOptions::default())
            .await
            .unwrap();
        assert!(first.chunks_stored > 3);
        let book = PayloadFilter::book("physical-ai");

        std::fs::write(docs.join("a.md"), "Only one short sentence remains.").unwrap();
        let second = pipeline
            .ingest_directory(&docs, "physical-ai", IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(second.chunks_stored, 1);
        assert_eq!(second.chunks_removed, first.chunks_stored - 1);
        assert_eq!(store.count(COLLECTION, Some(&book)).await.unwrap(), 1);
        assert!(store
            .get_payload(COLLECTION, &chunk_id("physical-ai", 1, 1))
            .await
            .unwrap()
            .is_none());
        let other = PayloadFilter::book("other-book");
        assert_eq!(store.count(COLLECTION, Some(&other)).await.unwrap(), first.chunks_stored);
    }

    #[tokio::test]
    async fn deleting_a_file_removes_its_page() {
        let dir = tempfile::tempdir().unwrap();
        write_book(dir.path());
        let docs = dir.path().join("docs");
        let store = sqlite_store(dir.path()).await;
        let pipeline = pipeline(Arc::new(CountingEmbedder::new(6)), store.clone());
        pipeline
            .ingest_directory(&docs, "physical-ai", IngestOptions::default())
            .await
            .unwrap();
        let page_two = PayloadFilter::book("physical-ai").with("page_number", 2);
        let page_two_chunks = store.count(COLLECTION, Some(&page_two)).await.unwrap();
        assert!(page_two_chunks > 0);

        std::fs::remove_file(docs.join("module-1").join("01-ros2.mdx")).unwrap();
        let report = pipeline
            .ingest_directory(&docs, "physical-ai", IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(report.files_processed, 1);
        assert_eq!(report.chunks_removed, page_two_chunks);
        assert_eq!(store.count(COLLECTION, Some(&page_two)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unreadable_file_is_counted_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_book(dir.path());
        let docs = dir.path().join("docs");
        std::fs::write(docs.join("broken.md"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        let store = sqlite_store(dir.path()).await;
        let pipeline = pipeline(Arc::new(CountingEmbedder::new(6)), store);

        let report = pipeline
            .ingest_directory(&docs, "physical-ai", IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(report.files_failed, 1);
        assert_eq!(report.files_processed, 2);
        assert!(report.chunks_stored > 0);
    }

    #[tokio::test]
    async fn failed_embedding_skips_only_that_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("a.md"), format!("Broken chunk {}.", FAIL_MARKER)).unwrap();
        std::fs::write(docs.join("b.md"), "Healthy chunk about servos.").unwrap();
        let store = sqlite_store(dir.path()).await;
        let pipeline = pipeline(Arc::new(CountingEmbedder::new(6)), store.clone());

        let report = pipeline
            .ingest_directory(&docs, "physical-ai", IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(report.files_processed, 2);
        assert_eq!(report.chunks_failed, 1);
        assert_eq!(report.chunks_stored, 1);
        assert!(store
            .get_payload(COLLECTION, &chunk_id("physical-ai", 1, 0))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn recreate_option_and_dimension_change_reset_collection() {
        let dir = tempfile::tempdir().unwrap();
        write_book(dir.path());
        let docs = dir.path().join("docs");
        let store = sqlite_store(dir.path()).await;
        pipeline(Arc::new(CountingEmbedder::new(6)), store.clone())
            .ingest_directory(&docs, "physical-ai", IngestOptions::default())
            .await
            .unwrap();

        let recreated = pipeline(Arc::new(CountingEmbedder::new(6)), store.clone())
            .ingest_directory(&docs, "physical-ai", IngestOptions { recreate: true })
            .await
            .unwrap();
        assert_eq!(recreated.collection_status, CollectionStatus::Recreated);
        assert_eq!(recreated.chunks_unchanged, 0);

        let resized = pipeline(Arc::new(CountingEmbedder::new(10)), store.clone())
            .ingest_directory(&docs, "physical-ai", IngestOptions::default())
            .await
            .unwrap();
        assert_eq!(resized.collection_status, CollectionStatus::Recreated);
        assert_eq!(
            store
                .count(COLLECTION, Some(&PayloadFilter::book("physical-ai")))
                .await
                .unwrap(),
            resized.chunks_stored
        );
    }

    #[tokio::test]
    async fn rejects_missing_directory_and_blank_book_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = sqlite_store(dir.path()).await;
        let pipeline = pipeline(Arc::new(CountingEmbedder::new(6)), store);

        let missing = pipeline
            .ingest_directory(&dir.path().join("nope"), "physical-ai", IngestOptions::default())
            .await;
        let blank = pipeline
            .ingest_directory(dir.path(), "  ", IngestOptions::default())
            .await;

        assert!(matches!(missing, Err(ApiError::BadRequest(_))));
        assert!(matches!(blank, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn single_document_ingest_creates_collection() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gait.md");
        std::fs::write(&file, "# Gait\n\nBipedal gait alternates stance and swing.").unwrap();
        let store = sqlite_store(dir.path()).await;
        let pipeline = pipeline(Arc::new(CountingEmbedder::new(6)), store.clone());

        let report = pipeline.ingest_document(&file, "physical-ai", 7).await.unwrap();

        assert_eq!(report.chunks_stored, 1);
        let payload = store
            .get_payload(COLLECTION, &chunk_id("physical-ai", 7, 0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payload.section_title, "Gait");
    }
}
