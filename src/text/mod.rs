//! Text preparation: markdown extraction and overlap chunking.

pub mod chunker;
pub mod extract;

pub use chunker::{chunk_text, validate_chunk_params, TextSpan};
pub use extract::{document_title, extract_text, normalize_whitespace, title_from_path};
