//! Semantic search over course content.
//!
//! [`SearchProvider`] is the boundary the tools talk to. [`CourseSearch`] is
//! the production implementation backed by an [`Embedder`] and a
//! [`VectorStore`].

use crate::course::Course;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::{ChunkFilter, VectorStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Metadata attached to each search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub chunk_index: u32,
}

/// A single ranked search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Lower is closer.
    pub distance: f32,
}

/// Outcome of a search: ranked hits, or an error message.
///
/// No hits and no error is a plain "nothing matched" result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub error: Option<String>,
}

impl SearchResults {
    pub fn from_hits(hits: Vec<SearchHit>) -> Self {
        Self { hits, error: None }
    }

    /// An error outcome carrying a message meant for the model.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }
}

/// Source of course search results and course metadata.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search course content, optionally restricted to a course and lesson.
    ///
    /// Never fails: problems are reported through [`SearchResults::error`].
    async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> SearchResults;

    /// Resolve a partial or approximate course name to a catalog title.
    async fn resolve_course(&self, course_name: &str) -> Result<Option<String>>;

    /// Full course metadata for a (possibly approximate) course name.
    async fn course_outline(&self, course_name: &str) -> Result<Option<Course>>;

    /// Link to a specific lesson, if known.
    async fn lesson_link(&self, _course_title: &str, _lesson_number: u32) -> Option<String> {
        None
    }

    /// Link to a course, if known.
    async fn course_link(&self, _course_title: &str) -> Option<String> {
        None
    }
}

/// Vector-store-backed course search.
pub struct CourseSearch {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
}

impl CourseSearch {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        max_results: usize,
    ) -> Self {
        Self {
            vector_store,
            embedder,
            max_results,
        }
    }

    async fn search_inner(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> Result<SearchResults> {
        let course_title = match course_name {
            Some(name) => match self.resolve_course(name).await? {
                Some(title) => Some(title),
                None => {
                    return Ok(SearchResults::failed(format!(
                        "No course found matching '{}'",
                        name
                    )))
                }
            },
            None => None,
        };

        let filter = ChunkFilter {
            course_title,
            lesson_number,
        };

        let embedding = self.embedder.embed(query).await?;
        let scored = self
            .vector_store
            .search(&embedding, &filter, self.max_results)
            .await?;

        let hits = scored
            .into_iter()
            .map(|r| SearchHit {
                metadata: ChunkMetadata {
                    course_title: r.document.course_title,
                    lesson_number: r.document.lesson_number,
                    chunk_index: r.document.chunk_index,
                },
                content: r.document.content,
                distance: 1.0 - r.score,
            })
            .collect::<Vec<_>>();

        debug!("Search returned {} hits for filter {:?}", hits.len(), filter);
        Ok(SearchResults::from_hits(hits))
    }
}

#[async_trait]
impl SearchProvider for CourseSearch {
    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> SearchResults {
        match self.search_inner(query, course_name, lesson_number).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Search failed: {}", e);
                SearchResults::failed(format!("Search error: {}", e))
            }
        }
    }

    async fn resolve_course(&self, course_name: &str) -> Result<Option<String>> {
        let wanted = course_name.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(None);
        }

        let titles = self.vector_store.course_titles().await?;
        if titles.is_empty() {
            return Ok(None);
        }

        if let Some(exact) = titles.iter().find(|t| t.to_lowercase() == wanted) {
            return Ok(Some(exact.clone()));
        }
        if let Some(partial) = titles.iter().find(|t| t.to_lowercase().contains(&wanted)) {
            return Ok(Some(partial.clone()));
        }

        // Fall back to the semantically closest title
        let embedding = self.embedder.embed(course_name).await?;
        let nearest = self.vector_store.nearest_course(&embedding).await?;
        debug!("Resolved '{}' semantically to {:?}", course_name, nearest);
        Ok(nearest.map(|(title, _)| title))
    }

    async fn course_outline(&self, course_name: &str) -> Result<Option<Course>> {
        match self.resolve_course(course_name).await? {
            Some(title) => self.vector_store.get_course(&title).await,
            None => Ok(None),
        }
    }

    async fn lesson_link(&self, course_title: &str, lesson_number: u32) -> Option<String> {
        match self.vector_store.get_course(course_title).await {
            Ok(Some(course)) => course
                .lesson(lesson_number)
                .and_then(|l| l.lesson_link.clone()),
            Ok(None) => None,
            Err(e) => {
                warn!("Lesson link lookup failed: {}", e);
                None
            }
        }
    }

    async fn course_link(&self, course_title: &str) -> Option<String> {
        match self.vector_store.get_course(course_title).await {
            Ok(course) => course.and_then(|c| c.course_link),
            Err(e) => {
                warn!("Course link lookup failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic fakes shared by tests across modules.

    use super::*;
    use crate::error::PensumError;

    /// Embeds text as letter-frequency vectors; close enough for ranking tests.
    pub struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0; 26];
            for c in text.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                v[(c as u8 - b'a') as usize] += 1.0;
            }
            Ok(v)
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            26
        }
    }

    /// Embedder that always fails.
    pub struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(PensumError::Embedding("connection refused".to_string()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(PensumError::Embedding("connection refused".to_string()))
        }

        fn dimensions(&self) -> usize {
            26
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{BrokenEmbedder, LetterEmbedder};
    use super::*;
    use crate::course::{CourseChunk, Lesson};
    use crate::vector_store::{CourseEntry, Document, MemoryVectorStore};

    async fn seeded_store() -> Arc<dyn VectorStore> {
        let store = MemoryVectorStore::new();
        let embedder = LetterEmbedder;

        let courses = vec![
            Course {
                title: "Python Testing Course".to_string(),
                course_link: Some("https://example.com/python".to_string()),
                instructor: None,
                lessons: vec![Lesson {
                    lesson_number: 1,
                    title: "Intro".to_string(),
                    lesson_link: Some("https://example.com/python/1".to_string()),
                }],
            },
            Course::new("MCP Introduction"),
        ];
        for course in courses {
            let embedding = embedder.embed(&course.title).await.unwrap();
            store.upsert_course(&CourseEntry::new(course, embedding)).await.unwrap();
        }

        let chunks = [
            ("Python Testing Course", Some(1), "pytest fixtures and assertions"),
            ("Python Testing Course", Some(2), "mocking external services"),
            ("MCP Introduction", Some(1), "model context protocol servers"),
        ];
        let mut docs = Vec::new();
        for (i, (course, lesson, text)) in chunks.iter().enumerate() {
            let chunk = CourseChunk {
                content: text.to_string(),
                course_title: course.to_string(),
                lesson_number: *lesson,
                chunk_index: i as u32,
            };
            docs.push(Document::new(&chunk, embedder.embed(text).await.unwrap()));
        }
        store.upsert_batch(&docs).await.unwrap();

        Arc::new(store)
    }

    #[tokio::test]
    async fn test_search_ranks_by_distance() {
        let search = CourseSearch::new(seeded_store().await, Arc::new(LetterEmbedder), 5);
        let results = search.search("pytest fixtures", None, None).await;

        assert!(results.error.is_none());
        assert_eq!(results.len(), 3);
        assert_eq!(results.hits[0].content, "pytest fixtures and assertions");
        assert!(results.hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_search_respects_max_results_and_filters() {
        let search = CourseSearch::new(seeded_store().await, Arc::new(LetterEmbedder), 1);
        let results = search.search("servers", Some("python"), Some(2)).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results.hits[0].metadata.course_title, "Python Testing Course");
        assert_eq!(results.hits[0].metadata.lesson_number, Some(2));
    }

    #[tokio::test]
    async fn test_resolve_course_by_substring_and_case() {
        let search = CourseSearch::new(seeded_store().await, Arc::new(LetterEmbedder), 5);
        assert_eq!(
            search.resolve_course("mcp introduction").await.unwrap().as_deref(),
            Some("MCP Introduction")
        );
        assert_eq!(
            search.resolve_course("Testing").await.unwrap().as_deref(),
            Some("Python Testing Course")
        );
    }

    #[tokio::test]
    async fn test_unknown_course_on_empty_catalog_is_error_marker() {
        let search = CourseSearch::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(LetterEmbedder),
            5,
        );
        let results = search.search("anything", Some("Rust"), None).await;

        assert!(results.is_empty());
        assert_eq!(results.error.as_deref(), Some("No course found matching 'Rust'"));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_reported_not_raised() {
        let search = CourseSearch::new(seeded_store().await, Arc::new(BrokenEmbedder), 5);
        let results = search.search("anything", None, None).await;

        assert!(results.is_empty());
        let error = results.error.unwrap();
        assert!(error.starts_with("Search error:"));
        assert!(error.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_links_and_outline() {
        let search = CourseSearch::new(seeded_store().await, Arc::new(LetterEmbedder), 5);

        assert_eq!(
            search.lesson_link("Python Testing Course", 1).await.as_deref(),
            Some("https://example.com/python/1")
        );
        assert!(search.lesson_link("Python Testing Course", 9).await.is_none());
        assert_eq!(
            search.course_link("Python Testing Course").await.as_deref(),
            Some("https://example.com/python")
        );

        let outline = search.course_outline("python").await.unwrap().unwrap();
        assert_eq!(outline.lessons.len(), 1);
    }
}
