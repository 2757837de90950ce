//! Retrieval-augmented question answering over markdown book content.

pub mod auth;
pub mod core;
pub mod history;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
pub mod text;
