//! Configuration module for Pensum.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts};
pub use settings::{
    ChunkingSettings, EmbeddingSettings, GeneralSettings, LlmProvider, LlmSettings,
    PromptSettings, ServerSettings, SessionSettings, Settings, VectorStoreSettings,
};
