//! Pensum - question answering over course materials
//!
//! A retrieval-augmented backend that answers questions about a catalog of
//! course documents. A language model decides when to search the indexed
//! course content or fetch a course outline, and answers with citations.
//!
//! The name "Pensum" is the Scandinavian word for a syllabus.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt templates
//! - `course` - Course document parsing and chunking
//! - `indexer` - Loading course documents into the vector store
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction
//! - `search` - Course-aware semantic search
//! - `tools` - Tools the model can call, with citation tracking
//! - `llm` - Provider-neutral chat completions with tool use
//! - `rag` - The tool-use loop, sessions and the [`rag::RagSystem`] facade
//!
//! # Example
//!
//! ```rust,no_run
//! use pensum::config::Settings;
//! use pensum::rag::RagSystem;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let rag = RagSystem::new(&settings)?;
//!
//!     rag.add_course_folder(Path::new("docs"), false).await?;
//!
//!     let response = rag.query("What does lesson 2 cover?", None).await?;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod course;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod llm;
pub mod openai;
pub mod rag;
pub mod search;
pub mod tools;
pub mod vector_store;

pub use error::{PensumError, Result};
