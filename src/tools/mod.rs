//! Tools the model can call, and the registry that dispatches them.
//!
//! A [`Tool`] advertises a [`ToolDefinition`] and runs with JSON arguments,
//! returning text for the model. Tools that cite material keep the
//! [`Source`]s of their latest run until the registry clears them.

mod outline;
mod search;

pub use outline::CourseOutlineTool;
pub use search::CourseSearchTool;

use crate::error::{PensumError, Result};
use crate::llm::{ToolInvocation, ToolOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    String,
    Integer,
}

impl ParameterKind {
    fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::String => "string",
            ParameterKind::Integer => "integer",
        }
    }
}

/// A single named tool parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    pub kind: ParameterKind,
    pub description: String,
    pub required: bool,
}

impl ToolParameter {
    pub fn string(name: &str, description: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: ParameterKind::String,
            description: description.to_string(),
            required,
        }
    }

    pub fn integer(name: &str, description: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: ParameterKind::Integer,
            description: description.to_string(),
            required,
        }
    }
}

/// Name, description and parameters the model sees for a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolDefinition {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// JSON schema of the parameters object.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.kind.as_str(),
                    "description": param.description,
                }),
            );
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// A citation for material a tool retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Display label, e.g. `"Course - Lesson 2"`.
    pub text: String,
    /// Link to the lesson or course, when known.
    pub url: Option<String>,
}

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. Recoverable conditions (no results, unknown course)
    /// are reported as text; `Err` means the invocation itself failed.
    async fn execute(&self, args: &Value) -> Result<String>;

    /// Citations gathered by the latest run.
    fn sources(&self) -> Vec<Source> {
        Vec::new()
    }

    fn reset_sources(&self) {}
}

/// Something that can run tool invocations for the orchestration loop.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    /// Definitions offered to the model, in registration order.
    fn definitions(&self) -> Vec<ToolDefinition>;

    async fn dispatch(&self, invocation: &ToolInvocation) -> Result<ToolOutcome>;
}

/// Registry of named tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<()> {
        let name = tool.definition().name;
        if name.is_empty() {
            return Err(PensumError::InvalidInput(
                "Tool definition must have a name".to_string(),
            ));
        }
        if self.get(&name).is_some() {
            return Err(PensumError::DuplicateTool(name));
        }

        debug!("Registered tool: {}", name);
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.definition().name == name)
            .map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool by name. An unknown name is reported as text.
    pub async fn execute(&self, name: &str, args: &Value) -> Result<String> {
        match self.get(name) {
            Some(tool) => {
                info!("Executing tool: {}", name);
                tool.execute(args).await
            }
            None => {
                warn!("Model requested unknown tool: {}", name);
                Ok(format!("Tool '{}' not found", name))
            }
        }
    }

    /// Citations held by every tool, in registration order.
    pub fn last_sources(&self) -> Vec<Source> {
        self.tools.iter().flat_map(|t| t.sources()).collect()
    }

    /// Clear citations held by every tool.
    pub fn reset_sources(&self) {
        for tool in &self.tools {
            tool.reset_sources();
        }
    }
}

#[async_trait]
impl ToolDispatcher for ToolRegistry {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    async fn dispatch(&self, invocation: &ToolInvocation) -> Result<ToolOutcome> {
        let content = self.execute(&invocation.name, &invocation.input).await?;
        Ok(ToolOutcome {
            tool_use_id: invocation.id.clone(),
            content,
        })
    }
}

/// Read an optional string argument.
pub(crate) fn optional_str<'a>(tool: &str, args: &'a Value, key: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(PensumError::ToolArguments {
            tool: tool.to_string(),
            message: format!("'{}' must be a string, got {}", key, other),
        }),
    }
}

/// Read a required string argument.
pub(crate) fn required_str<'a>(tool: &str, args: &'a Value, key: &str) -> Result<&'a str> {
    optional_str(tool, args, key)?.ok_or_else(|| PensumError::ToolArguments {
        tool: tool.to_string(),
        message: format!("missing required argument '{}'", key),
    })
}

/// Read an optional non-negative integer argument. Numeric strings are accepted.
pub(crate) fn optional_u32(tool: &str, args: &Value, key: &str) -> Result<Option<u32>> {
    let invalid = |value: &Value| PensumError::ToolArguments {
        tool: tool.to_string(),
        message: format!("'{}' must be a non-negative integer, got {}", key, value),
    };

    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid(value)),
        Some(value @ Value::String(s)) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| invalid(value)),
        Some(other) => Err(invalid(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct EchoTool {
        name: &'static str,
        sources: Mutex<Vec<Source>>,
    }

    impl EchoTool {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                sources: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(self.name, "Echo the input")
                .with_parameter(ToolParameter::string("text", "Text to echo", true))
        }

        async fn execute(&self, args: &Value) -> Result<String> {
            let text = required_str(self.name, args, "text")?;
            *self.sources.lock().unwrap() = vec![Source {
                text: text.to_string(),
                url: None,
            }];
            Ok(format!("{}: {}", self.name, text))
        }

        fn sources(&self) -> Vec<Source> {
            self.sources.lock().unwrap().clone()
        }

        fn reset_sources(&self) {
            self.sources.lock().unwrap().clear();
        }
    }

    #[test]
    fn test_input_schema() {
        let def = ToolDefinition::new("search_course_content", "Search")
            .with_parameter(ToolParameter::string("query", "What to search for", true))
            .with_parameter(ToolParameter::integer("lesson_number", "Lesson", false));

        assert_eq!(
            def.input_schema(),
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "What to search for"},
                    "lesson_number": {"type": "integer", "description": "Lesson"}
                },
                "required": ["query"]
            })
        );
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool::new("echo"))).unwrap();

        let err = registry.register(Box::new(EchoTool::new("echo"))).unwrap_err();
        assert!(matches!(err, PensumError::DuplicateTool(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_definitions_in_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool::new("b"))).unwrap();
        registry.register(Box::new(EchoTool::new("a"))).unwrap();

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_reported_as_text() {
        let registry = ToolRegistry::new();
        let result = registry.execute("missing", &json!({})).await.unwrap();
        assert_eq!(result, "Tool 'missing' not found");
    }

    #[tokio::test]
    async fn test_dispatch_correlates_invocation_id() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool::new("echo"))).unwrap();

        let outcome = registry
            .dispatch(&ToolInvocation {
                id: "toolu_7".to_string(),
                name: "echo".to_string(),
                input: json!({"text": "hello"}),
            })
            .await
            .unwrap();

        assert_eq!(outcome.tool_use_id, "toolu_7");
        assert_eq!(outcome.content, "echo: hello");
    }

    #[tokio::test]
    async fn test_bad_arguments_are_errors() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool::new("echo"))).unwrap();

        let err = registry.execute("echo", &json!({})).await.unwrap_err();
        assert!(matches!(err, PensumError::ToolArguments { .. }));
    }

    #[tokio::test]
    async fn test_sources_lifecycle() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool::new("first"))).unwrap();
        registry.register(Box::new(EchoTool::new("second"))).unwrap();
        assert!(registry.last_sources().is_empty());

        registry.execute("second", &json!({"text": "cited"})).await.unwrap();
        assert_eq!(registry.last_sources()[0].text, "cited");

        registry.execute("first", &json!({"text": "also"})).await.unwrap();
        let texts: Vec<String> = registry.last_sources().into_iter().map(|s| s.text).collect();
        assert_eq!(texts, vec!["also", "cited"]);

        registry.reset_sources();
        assert!(registry.last_sources().is_empty());
    }

    #[test]
    fn test_argument_helpers() {
        let args = json!({"query": "x", "lesson_number": 3, "as_text": "4", "bad": -1});
        assert_eq!(required_str("t", &args, "query").unwrap(), "x");
        assert_eq!(optional_str("t", &args, "course_name").unwrap(), None);
        assert_eq!(optional_u32("t", &args, "lesson_number").unwrap(), Some(3));
        assert_eq!(optional_u32("t", &args, "as_text").unwrap(), Some(4));
        assert!(optional_u32("t", &args, "bad").is_err());
        assert!(required_str("t", &args, "lesson_number").is_err());
    }
}
