//! Bounded tool-use loop around the language model.

use crate::config::LlmSettings;
use crate::error::Result;
use crate::llm::{Completion, CompletionRequest, LlmClient, ToolChoice, ToolOutcome, Turn};
use crate::tools::{ToolDefinition, ToolDispatcher};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Tool rounds allowed before the forced final answer.
pub const DEFAULT_MAX_ROUNDS: usize = 2;

/// Returned when a tool invocation fails outright.
pub const TOOL_FAILURE_MESSAGE: &str = "Error executing tools. Please try again.";

/// Drives a conversation with the model through at most `max_rounds` rounds
/// of tool use, then forces a text answer.
///
/// Each round is one model call followed by dispatch of every tool the model
/// asked for. Tools are offered on every round. When the model keeps asking
/// for tools past the budget, one extra call is made with no tools offered
/// and its text is returned.
pub struct Generator {
    client: Arc<dyn LlmClient>,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
    max_rounds: usize,
}

impl Generator {
    pub fn new(client: Arc<dyn LlmClient>, system_prompt: impl Into<String>) -> Self {
        let defaults = LlmSettings::default();
        Self {
            client,
            system_prompt: system_prompt.into(),
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn from_settings(
        client: Arc<dyn LlmClient>,
        settings: &LlmSettings,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self::new(client, system_prompt)
            .with_sampling(settings.max_tokens, settings.temperature)
            .with_max_rounds(settings.max_tool_rounds)
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Answer `query` using the configured round budget.
    pub async fn generate(
        &self,
        query: &str,
        history: Option<&str>,
        tools: &[ToolDefinition],
        dispatcher: Option<&dyn ToolDispatcher>,
    ) -> Result<String> {
        self.generate_with_rounds(query, history, tools, dispatcher, self.max_rounds)
            .await
    }

    /// Answer `query` with an explicit round budget.
    ///
    /// Errors from the model call propagate. Tool failures end the run with
    /// [`TOOL_FAILURE_MESSAGE`].
    #[instrument(skip(self, history, tools, dispatcher), fields(tool_count = tools.len()))]
    pub async fn generate_with_rounds(
        &self,
        query: &str,
        history: Option<&str>,
        tools: &[ToolDefinition],
        dispatcher: Option<&dyn ToolDispatcher>,
        max_rounds: usize,
    ) -> Result<String> {
        let system = self.system_context(history);
        let mut turns = vec![Turn::user(query)];
        let mut rounds = 0;

        while rounds < max_rounds {
            debug!("Tool round {} of {}", rounds + 1, max_rounds);

            let completion = self
                .client
                .complete(&self.request(&system, &turns, tools))
                .await?;

            if !completion.wants_tools() {
                return Ok(completion.text());
            }

            let Some(dispatcher) = dispatcher else {
                warn!("Model requested tools but no dispatcher is available");
                return Ok(completion.text());
            };

            let outcomes = match self.run_tools(&completion, dispatcher).await {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    error!("Tool execution failed: {}", e);
                    return Ok(TOOL_FAILURE_MESSAGE.to_string());
                }
            };

            turns.push(Turn::assistant(completion.content));
            turns.push(Turn::tool_results(outcomes));
            rounds += 1;
        }

        info!("Tool round budget exhausted, forcing final answer");
        self.synthesize(&system, &turns).await
    }

    /// One final call with no tools offered. Returns its text even if the
    /// model still asked for a tool.
    pub async fn synthesize(&self, system: &str, turns: &[Turn]) -> Result<String> {
        let completion = self.client.complete(&self.request(system, turns, &[])).await?;
        Ok(completion.text())
    }

    /// Dispatch every tool invocation in `completion`, in order.
    async fn run_tools(
        &self,
        completion: &Completion,
        dispatcher: &dyn ToolDispatcher,
    ) -> Result<Vec<ToolOutcome>> {
        let invocations = completion.tool_uses();
        if invocations.is_empty() {
            return Err(crate::error::PensumError::Llm(
                "Model stopped for tool use without invoking a tool".to_string(),
            ));
        }

        let mut outcomes = Vec::with_capacity(invocations.len());
        for invocation in &invocations {
            debug!("Dispatching tool {} ({})", invocation.name, invocation.id);
            outcomes.push(dispatcher.dispatch(invocation).await?);
        }
        Ok(outcomes)
    }

    fn system_context(&self, history: Option<&str>) -> String {
        match history {
            Some(history) if !history.is_empty() => format!(
                "{}\n\nPrevious conversation:\n{}",
                self.system_prompt, history
            ),
            _ => self.system_prompt.clone(),
        }
    }

    fn request(&self, system: &str, turns: &[Turn], tools: &[ToolDefinition]) -> CompletionRequest {
        CompletionRequest {
            system: system.to_string(),
            turns: turns.to_vec(),
            tools: tools.to_vec(),
            tool_choice: (!tools.is_empty()).then_some(ToolChoice::Auto),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}
