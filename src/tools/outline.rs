//! `get_course_outline`: course title, link, instructor and lesson list.

use super::{required_str, Tool, ToolDefinition, ToolParameter};
use crate::course::Course;
use crate::error::Result;
use crate::search::SearchProvider;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const NAME: &str = "get_course_outline";

pub struct CourseOutlineTool {
    provider: Arc<dyn SearchProvider>,
}

impl CourseOutlineTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

fn format_outline(course: &Course) -> String {
    let mut lines = vec![format!("Course: {}", course.title)];
    if let Some(link) = &course.course_link {
        lines.push(format!("Link: {}", link));
    }
    if let Some(instructor) = &course.instructor {
        lines.push(format!("Instructor: {}", instructor));
    }

    if course.lessons.is_empty() {
        lines.push("No lessons available.".to_string());
    } else {
        lines.push(format!("Lessons ({}):", course.lessons.len()));
        for lesson in &course.lessons {
            lines.push(format!("Lesson {}: {}", lesson.lesson_number, lesson.title));
        }
    }

    lines.join("\n")
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            NAME,
            "Get a course outline: title, link, instructor and the complete lesson list",
        )
        .with_parameter(ToolParameter::string(
            "course_name",
            "Course title (partial matches work, e.g. 'MCP', 'Introduction')",
            true,
        ))
    }

    async fn execute(&self, args: &Value) -> Result<String> {
        let course_name = required_str(NAME, args, "course_name")?;

        Ok(match self.provider.course_outline(course_name).await {
            Ok(Some(course)) => format_outline(&course),
            Ok(None) => format!("No course found matching '{}'", course_name),
            Err(e) => format!("Search error: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::Lesson;
    use crate::search::testing::{BrokenEmbedder, LetterEmbedder};
    use crate::search::CourseSearch;
    use crate::vector_store::{CourseEntry, MemoryVectorStore, VectorStore};
    use serde_json::json;

    async fn tool_with(courses: Vec<Course>) -> CourseOutlineTool {
        let store = Arc::new(MemoryVectorStore::new());
        for course in courses {
            store
                .upsert_course(&CourseEntry::new(course, vec![1.0; 26]))
                .await
                .unwrap();
        }
        CourseOutlineTool::new(Arc::new(CourseSearch::new(store, Arc::new(LetterEmbedder), 5)))
    }

    #[tokio::test]
    async fn test_outline_lists_lessons() {
        let course = Course {
            title: "MCP Introduction".to_string(),
            course_link: Some("https://example.com/mcp".to_string()),
            instructor: Some("Elie Schoppik".to_string()),
            lessons: vec![
                Lesson {
                    lesson_number: 0,
                    title: "Welcome".to_string(),
                    lesson_link: None,
                },
                Lesson {
                    lesson_number: 1,
                    title: "Why MCP".to_string(),
                    lesson_link: None,
                },
            ],
        };
        let tool = tool_with(vec![course]).await;

        let text = tool.execute(&json!({"course_name": "mcp"})).await.unwrap();
        assert_eq!(
            text,
            "Course: MCP Introduction\n\
             Link: https://example.com/mcp\n\
             Instructor: Elie Schoppik\n\
             Lessons (2):\n\
             Lesson 0: Welcome\n\
             Lesson 1: Why MCP"
        );
        assert!(tool.sources().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_course_on_empty_catalog() {
        let tool = tool_with(vec![]).await;
        let text = tool.execute(&json!({"course_name": "Rust"})).await.unwrap();
        assert_eq!(text, "No course found matching 'Rust'");
    }

    #[tokio::test]
    async fn test_course_name_required() {
        let tool = tool_with(vec![]).await;
        assert!(tool.execute(&json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_provider_fault_is_reported_as_text() {
        let store = Arc::new(MemoryVectorStore::new());
        let course = Course {
            title: "MCP Introduction".to_string(),
            course_link: None,
            instructor: None,
            lessons: vec![],
        };
        store
            .upsert_course(&CourseEntry::new(course, vec![1.0; 26]))
            .await
            .unwrap();
        let tool = CourseOutlineTool::new(Arc::new(CourseSearch::new(
            store,
            Arc::new(BrokenEmbedder),
            5,
        )));

        let text = tool
            .execute(&json!({"course_name": "model context"}))
            .await
            .unwrap();
        assert!(text.starts_with("Search error:"));
        assert!(text.contains("connection refused"));
    }
}
