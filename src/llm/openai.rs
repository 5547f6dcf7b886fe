//! OpenAI chat completions backend.

use super::{
    Completion, CompletionRequest, ContentBlock, LlmClient, Role, StopReason, ToolChoice, Turn,
    TurnContent,
};
use crate::config::LlmSettings;
use crate::error::{PensumError, Result};
use crate::openai::create_client_with_config;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FinishReason, FunctionCall, FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// LLM client backed by OpenAI chat completions.
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClient {
    pub fn new(client: Client<OpenAIConfig>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Create a client from settings. The key comes from `OPENAI_API_KEY`.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let mut config = OpenAIConfig::default();
        if let Some(base) = &settings.base_url {
            config = config.with_api_base(base);
        }
        let client =
            create_client_with_config(config, Duration::from_secs(settings.timeout_seconds))?;
        Ok(Self::new(client, settings.model.clone()))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(to_messages(&request.system, &request.turns)?)
            .max_completion_tokens(request.max_tokens)
            .temperature(request.temperature);

        if request.offers_tools() {
            builder.tools(
                request
                    .tools
                    .iter()
                    .map(|def| ChatCompletionTool {
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionObject {
                            name: def.name.clone(),
                            description: Some(def.description.clone()),
                            parameters: Some(def.input_schema()),
                            strict: None,
                        },
                    })
                    .collect::<Vec<_>>(),
            );
            if let Some(ToolChoice::Auto) = request.tool_choice {
                builder.tool_choice(ChatCompletionToolChoiceOption::Auto);
            }
        }

        let chat_request = builder.build().map_err(|e| PensumError::Llm(e.to_string()))?;

        debug!("Requesting chat completion from {}", self.model);

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| PensumError::OpenAI(format!("Chat completion failed: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PensumError::Llm("No response from model".to_string()))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content {
            content.push(ContentBlock::Text { text });
        }

        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        let called_tools = !tool_calls.is_empty();
        for call in tool_calls {
            let input = serde_json::from_str(&call.function.arguments)
                .unwrap_or(serde_json::Value::String(call.function.arguments));
            content.push(ContentBlock::ToolUse {
                id: call.id,
                name: call.function.name,
                input,
            });
        }

        let stop_reason = match choice.finish_reason {
            _ if called_tools => StopReason::ToolUse,
            Some(FinishReason::ToolCalls) => StopReason::ToolUse,
            Some(FinishReason::Length) => StopReason::MaxTokens,
            Some(FinishReason::Stop) | None => StopReason::EndTurn,
            Some(other) => StopReason::Other(format!("{:?}", other)),
        };

        Ok(Completion {
            stop_reason,
            content,
        })
    }
}

/// Translate the system prompt and turns into chat messages.
///
/// Tool results become `tool` messages; assistant tool invocations become
/// `tool_calls` on the assistant message.
fn to_messages(system: &str, turns: &[Turn]) -> Result<Vec<ChatCompletionRequestMessage>> {
    let build_err = |e: async_openai::error::OpenAIError| PensumError::Llm(e.to_string());
    let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

    if !system.is_empty() {
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(build_err)?
                .into(),
        );
    }

    for turn in turns {
        match (&turn.role, &turn.content) {
            (Role::User, TurnContent::Text(text)) => messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(text.as_str())
                    .build()
                    .map_err(build_err)?
                    .into(),
            ),
            (Role::Assistant, TurnContent::Text(text)) => messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(text.as_str())
                    .build()
                    .map_err(build_err)?
                    .into(),
            ),
            (Role::Assistant, TurnContent::Blocks(blocks)) => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                let text: Vec<&str> = blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                if !text.is_empty() {
                    args.content(text.join("\n"));
                }

                let calls: Vec<ChatCompletionMessageToolCall> = blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::ToolUse { id, name, input } => {
                            Some(ChatCompletionMessageToolCall {
                                id: id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: name.clone(),
                                    arguments: input.to_string(),
                                },
                            })
                        }
                        _ => None,
                    })
                    .collect();
                if !calls.is_empty() {
                    args.tool_calls(calls);
                }

                messages.push(args.build().map_err(build_err)?.into());
            }
            (Role::User, TurnContent::Blocks(blocks)) => {
                for block in blocks {
                    match block {
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                        } => messages.push(
                            ChatCompletionRequestToolMessageArgs::default()
                                .tool_call_id(tool_use_id.as_str())
                                .content(content.as_str())
                                .build()
                                .map_err(build_err)?
                                .into(),
                        ),
                        ContentBlock::Text { text } => messages.push(
                            ChatCompletionRequestUserMessageArgs::default()
                                .content(text.as_str())
                                .build()
                                .map_err(build_err)?
                                .into(),
                        ),
                        ContentBlock::ToolUse { .. } => {}
                    }
                }
            }
        }
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolOutcome;
    use crate::tools::{ToolDefinition, ToolParameter};
    use serde_json::{json, Value};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> OpenAiClient {
        let config = OpenAIConfig::new()
            .with_api_key("test")
            .with_api_base(base_url);
        OpenAiClient::new(
            create_client_with_config(config, Duration::from_secs(5)).unwrap(),
            "gpt-4o-mini",
        )
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "You are helpful".to_string(),
            turns: vec![Turn::user("What is in lesson 1?")],
            tools: vec![ToolDefinition::new("search_course_content", "Search course materials")
                .with_parameter(ToolParameter::string("query", "What to search for", true))],
            tool_choice: Some(ToolChoice::Auto),
            max_tokens: 800,
            temperature: 0.0,
        }
    }

    fn chat_response(message: Value, finish_reason: &str) -> Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": message,
                "finish_reason": finish_reason
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        })
    }

    async fn mount(mock_server: &MockServer, body: Value) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "tools": [{"type": "function", "function": {"name": "search_course_content"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    #[test]
    fn test_tool_round_translates_to_tool_messages() {
        let turns = vec![
            Turn::user("What is in lesson 1?"),
            Turn::assistant(vec![ContentBlock::ToolUse {
                id: "call_1".to_string(),
                name: "search_course_content".to_string(),
                input: json!({"query": "lesson 1"}),
            }]),
            Turn::tool_results(vec![ToolOutcome {
                tool_use_id: "call_1".to_string(),
                content: "[Course - Lesson 1]\nIntro".to_string(),
            }]),
        ];

        let messages = to_messages("system", &turns).unwrap();
        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));

        match &messages[2] {
            ChatCompletionRequestMessage::Assistant(msg) => {
                let calls = msg.tool_calls.as_ref().unwrap();
                assert_eq!(calls[0].id, "call_1");
                assert_eq!(calls[0].function.name, "search_course_content");
            }
            other => panic!("expected assistant message, got {other:?}"),
        }

        match &messages[3] {
            ChatCompletionRequestMessage::Tool(msg) => assert_eq!(msg.tool_call_id, "call_1"),
            other => panic!("expected tool message, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_system_prompt_is_skipped() {
        let messages = to_messages("", &[Turn::user("hi")]).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_calls_mean_tool_use_whatever_the_finish_reason() {
        let mock_server = MockServer::start().await;
        mount(
            &mock_server,
            chat_response(
                json!({
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "search_course_content",
                            "arguments": "{\"query\": \"lesson 1\"}"
                        }
                    }]
                }),
                "stop",
            ),
        )
        .await;

        let completion = client(&mock_server.uri())
            .complete(&request())
            .await
            .unwrap();

        assert_eq!(completion.stop_reason, StopReason::ToolUse);
        let uses = completion.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].id, "call_1");
        assert_eq!(uses[0].name, "search_course_content");
        assert_eq!(uses[0].input, json!({"query": "lesson 1"}));
    }

    #[tokio::test]
    async fn test_unparseable_arguments_pass_through_as_string() {
        let mock_server = MockServer::start().await;
        mount(
            &mock_server,
            chat_response(
                json!({
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "search_course_content", "arguments": "{not json"}
                    }]
                }),
                "tool_calls",
            ),
        )
        .await;

        let completion = client(&mock_server.uri())
            .complete(&request())
            .await
            .unwrap();

        assert_eq!(completion.stop_reason, StopReason::ToolUse);
        assert_eq!(
            completion.tool_uses()[0].input,
            Value::String("{not json".to_string())
        );
    }

    #[tokio::test]
    async fn test_text_reply_ends_turn() {
        let mock_server = MockServer::start().await;
        mount(
            &mock_server,
            chat_response(
                json!({"role": "assistant", "content": "Lesson 1 covers setup."}),
                "stop",
            ),
        )
        .await;

        let completion = client(&mock_server.uri())
            .complete(&request())
            .await
            .unwrap();

        assert_eq!(completion.stop_reason, StopReason::EndTurn);
        assert_eq!(completion.text(), "Lesson 1 covers setup.");
        assert!(completion.tool_uses().is_empty());
    }
}
