//! Language model call interface.
//!
//! The conversation is a list of [`Turn`]s whose content is either plain text
//! or a list of [`ContentBlock`]s (text, tool invocations, tool results). A
//! [`LlmClient`] takes one [`CompletionRequest`] and returns one
//! [`Completion`]; backends translate to their own wire format.

mod anthropic;
mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

use crate::config::{LlmProvider, LlmSettings};
use crate::error::Result;
use crate::tools::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of structured turn content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// The model asks for a tool to be run.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Output of a tool run, correlated by invocation id.
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

/// Turn content: plain text or structured blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
}

impl Turn {
    /// A plain-text user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    /// An assistant turn replaying the blocks the model produced.
    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Blocks(blocks),
        }
    }

    /// A user turn bundling tool results, in invocation order.
    pub fn tool_results(outcomes: Vec<ToolOutcome>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Blocks(
                outcomes
                    .into_iter()
                    .map(|o| ContentBlock::ToolResult {
                        tool_use_id: o.tool_use_id,
                        content: o.content,
                    })
                    .collect(),
            ),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Result of running one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    /// Id of the invocation this answers.
    pub tool_use_id: String,
    pub content: String,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl From<&str> for StopReason {
    fn from(value: &str) -> Self {
        match value {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// How the model may use the offered tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    Auto,
}

/// A single model call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub turns: Vec<Turn>,
    /// Tools offered on this call. Empty means none.
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<ToolChoice>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn offers_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}

/// The model's reply to a [`CompletionRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub stop_reason: StopReason,
    pub content: Vec<ContentBlock>,
}

impl Completion {
    /// A text-only reply.
    pub fn text_reply(text: impl Into<String>) -> Self {
        Self {
            stop_reason: StopReason::EndTurn,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// First text block, or an empty string if there is none.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Tool invocations in the order the model issued them.
    pub fn tool_uses(&self) -> Vec<ToolInvocation> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolInvocation {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn wants_tools(&self) -> bool {
        self.stop_reason == StopReason::ToolUse
    }
}

/// A language model backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Perform one model call.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

/// Create the LLM client configured in settings.
pub fn create_llm_client(settings: &LlmSettings) -> Result<Arc<dyn LlmClient>> {
    match settings.provider {
        LlmProvider::Anthropic => Ok(Arc::new(AnthropicClient::from_settings(settings)?)),
        LlmProvider::OpenAI => Ok(Arc::new(OpenAiClient::from_settings(settings)?)),
    }
}
