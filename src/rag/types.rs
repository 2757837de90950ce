use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A chunk of extracted book text, positioned within its source page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub start_pos: usize,
    pub end_pos: usize,
    pub book_id: String,
    pub section_title: String,
    pub page_number: u32,
    pub chunk_number: u32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// What the vector store keeps next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub content: String,
    pub source: String,
    pub book_id: String,
    pub section_title: String,
    pub page_number: u32,
    pub chunk_number: u32,
    pub start_pos: usize,
    pub end_pos: usize,
    /// SHA-256 of `content`, hex encoded.
    pub content_hash: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ChunkPayload {
    pub fn from_chunk(chunk: Chunk, source: String, content_hash: String) -> Self {
        Self {
            content: chunk.content,
            source,
            book_id: chunk.book_id,
            section_title: chunk.section_title,
            page_number: chunk.page_number,
            chunk_number: chunk.chunk_number,
            start_pos: chunk.start_pos,
            end_pos: chunk.end_pos,
            content_hash,
            metadata: chunk.metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    pub score: f32,
    pub payload: ChunkPayload,
}

/// One exact-match condition on a top-level payload field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMatch {
    pub key: String,
    pub value: Value,
}

/// Lower bound on an integer payload field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRange {
    pub key: String,
    pub gte: u64,
}

/// Conjunction of exact-match and lower-bound conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadFilter {
    pub must: Vec<FieldMatch>,
    #[serde(default)]
    pub at_least: Vec<FieldRange>,
}

impl PayloadFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.must.push(FieldMatch {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn at_least(mut self, key: impl Into<String>, gte: u64) -> Self {
        self.at_least.push(FieldRange {
            key: key.into(),
            gte,
        });
        self
    }

    pub fn book(book_id: &str) -> Self {
        Self::new().with("book_id", book_id)
    }

    /// Chunks of one page at or past `first_chunk`.
    pub fn page_tail(book_id: &str, page_number: u32, first_chunk: u32) -> Self {
        Self::book(book_id)
            .with("page_number", page_number)
            .at_least("chunk_number", u64::from(first_chunk))
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.at_least.is_empty()
    }

    pub fn matches(&self, payload: &Value) -> bool {
        self.must
            .iter()
            .all(|condition| payload.get(&condition.key) == Some(&condition.value))
            && self.at_least.iter().all(|range| {
                payload
                    .get(&range.key)
                    .and_then(Value::as_u64)
                    .is_some_and(|value| value >= range.gte)
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Retrieved,
    SelectedText,
}

/// A piece of evidence returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceChunk {
    pub content: String,
    pub source: String,
    pub kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl SourceChunk {
    pub fn retrieved(result: &QueryResult) -> Self {
        let payload = &result.payload;
        Self {
            content: payload.content.clone(),
            source: payload.source.clone(),
            kind: SourceKind::Retrieved,
            section_title: Some(payload.section_title.clone()),
            page_number: Some(payload.page_number),
            chunk_number: Some(payload.chunk_number),
            book_id: Some(payload.book_id.clone()),
            score: Some(result.score),
        }
    }

    pub fn selected_text(text: &str) -> Self {
        Self {
            content: text.to_string(),
            source: "selected_text".to_string(),
            kind: SourceKind::SelectedText,
            section_title: None,
            page_number: None,
            chunk_number: None,
            book_id: None,
            score: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    pub source_chunks: Vec<SourceChunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_id: Option<String>,
}

/// Self-reported familiarity with one domain. Unknown values read as
/// `Intermediate`; `expert` is accepted for `Advanced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ExperienceLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl From<String> for ExperienceLevel {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl ExperienceLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "beginner" => Self::Beginner,
            "advanced" | "expert" => Self::Advanced,
            _ => Self::Intermediate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub software_experience: ExperienceLevel,
    pub hardware_experience: ExperienceLevel,
}
