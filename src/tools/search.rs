//! `search_course_content`: semantic search over course materials.

use super::{optional_str, optional_u32, required_str, Source, Tool, ToolDefinition, ToolParameter};
use crate::error::Result;
use crate::search::{SearchProvider, SearchResults};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const NAME: &str = "search_course_content";

/// Search tool with per-instance citation state.
///
/// Each run replaces the stored citations with those of its own results.
/// Concurrent runs against one instance must be serialised by the caller.
pub struct CourseSearchTool {
    provider: Arc<dyn SearchProvider>,
    last_sources: Mutex<Vec<Source>>,
}

impl CourseSearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self {
            provider,
            last_sources: Mutex::new(Vec::new()),
        }
    }

    /// Run a search and format the results for the model.
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> Result<String> {
        let results = self
            .provider
            .search(query, course_name, lesson_number)
            .await;

        if let Some(error) = &results.error {
            self.store_sources(Vec::new());
            return Ok(error.clone());
        }

        if results.is_empty() {
            self.store_sources(Vec::new());
            return Ok(no_results_message(course_name, lesson_number));
        }

        let (text, sources) = self.format_results(&results).await;
        debug!("Search returned {} results", sources.len());
        self.store_sources(sources);
        Ok(text)
    }

    async fn format_results(&self, results: &SearchResults) -> (String, Vec<Source>) {
        let mut blocks = Vec::with_capacity(results.len());
        let mut sources = Vec::with_capacity(results.len());

        for hit in &results.hits {
            let course = &hit.metadata.course_title;
            let label = match hit.metadata.lesson_number {
                Some(n) => format!("{} - Lesson {}", course, n),
                None => course.clone(),
            };

            let url = match hit.metadata.lesson_number {
                Some(n) => match self.provider.lesson_link(course, n).await {
                    Some(link) => Some(link),
                    None => self.provider.course_link(course).await,
                },
                None => self.provider.course_link(course).await,
            };

            blocks.push(format!("[{}]\n{}", label, hit.content));
            sources.push(Source { text: label, url });
        }

        (blocks.join("\n\n"), sources)
    }

    fn citations(&self) -> MutexGuard<'_, Vec<Source>> {
        self.last_sources.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn store_sources(&self, sources: Vec<Source>) {
        *self.citations() = sources;
    }
}

fn no_results_message(course_name: Option<&str>, lesson_number: Option<u32>) -> String {
    let mut message = String::from("No relevant content found");
    if let Some(course) = course_name {
        message.push_str(&format!(" in course '{}'", course));
    }
    if let Some(n) = lesson_number {
        message.push_str(&format!(" in lesson {}", n));
    }
    message.push('.');
    message
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            NAME,
            "Search course materials with smart course name matching and lesson filtering",
        )
        .with_parameter(ToolParameter::string(
            "query",
            "What to search for in the course content",
            true,
        ))
        .with_parameter(ToolParameter::string(
            "course_name",
            "Course title (partial matches work, e.g. 'MCP', 'Introduction')",
            false,
        ))
        .with_parameter(ToolParameter::integer(
            "lesson_number",
            "Specific lesson number to search within (e.g. 1, 2, 3)",
            false,
        ))
    }

    async fn execute(&self, args: &Value) -> Result<String> {
        let query = required_str(NAME, args, "query")?;
        let course_name = optional_str(NAME, args, "course_name")?;
        let lesson_number = optional_u32(NAME, args, "lesson_number")?;

        self.search(query, course_name, lesson_number).await
    }

    fn sources(&self) -> Vec<Source> {
        self.citations().clone()
    }

    fn reset_sources(&self) {
        self.citations().clear();
    }
}
