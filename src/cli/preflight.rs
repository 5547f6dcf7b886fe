//! Pre-flight checks before expensive operations.
//!
//! Validates that API keys are available before starting operations that
//! would otherwise fail midway.

use crate::config::{LlmProvider, Settings};
use crate::error::{PensumError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Answering questions needs the LLM key and the embeddings key.
    Ask,
    /// Indexing needs the embeddings key.
    Index,
    /// Listing courses reads the local store only.
    Courses,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    check_with(operation, settings, |name| std::env::var(name).ok())
}

fn check_with(
    operation: Operation,
    settings: &Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    match operation {
        Operation::Ask => {
            check_api_key(&lookup, llm_key_name(settings.llm.provider))?;
            check_api_key(&lookup, "OPENAI_API_KEY")?;
        }
        Operation::Index => {
            check_api_key(&lookup, "OPENAI_API_KEY")?;
        }
        Operation::Courses => {}
    }
    Ok(())
}

fn llm_key_name(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        LlmProvider::OpenAI => "OPENAI_API_KEY",
    }
}

fn check_api_key(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<()> {
    match lookup(name) {
        Some(key) if !key.is_empty() => Ok(()),
        Some(_) => Err(PensumError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            name, name
        ))),
        None => Err(PensumError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            name, name
        ))),
    }
}
