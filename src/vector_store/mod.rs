//! Vector store abstraction for Pensum.
//!
//! Stores two collections: the course catalog (one entry per course, embedded
//! by title for course-name resolution) and the course content chunks.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::config::Settings;
use crate::course::{Course, CourseChunk};
use crate::error::{PensumError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A content chunk stored in the vector database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID.
    pub id: Uuid,
    /// Title of the course this chunk belongs to.
    pub course_title: String,
    /// Lesson number, when the chunk came from a lesson section.
    pub lesson_number: Option<u32>,
    /// Position of the chunk within the course.
    pub chunk_index: u32,
    /// Text content of this chunk.
    pub content: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this document was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Document {
    /// Create a document from a chunk and its embedding.
    pub fn new(chunk: &CourseChunk, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            course_title: chunk.course_title.clone(),
            lesson_number: chunk.lesson_number,
            chunk_index: chunk.chunk_index,
            content: chunk.content.clone(),
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A catalog entry: course metadata plus the embedding of its title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseEntry {
    pub course: Course,
    pub embedding: Vec<f32>,
    pub indexed_at: DateTime<Utc>,
}

impl CourseEntry {
    pub fn new(course: Course, embedding: Vec<f32>) -> Self {
        Self {
            course,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// Metadata filter applied to content search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkFilter {
    /// Exact (already resolved) course title.
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

impl ChunkFilter {
    /// Whether a document passes this filter.
    pub fn matches(&self, doc: &Document) -> bool {
        let course_ok = match &self.course_title {
            Some(title) => &doc.course_title == title,
            None => true,
        };
        let lesson_ok = match self.lesson_number {
            Some(n) => doc.lesson_number == Some(n),
            None => true,
        };
        course_ok && lesson_ok
    }
}

/// A search hit with score.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    /// The matched document.
    pub document: Document,
    /// Cosine similarity (higher is better).
    pub score: f32,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store or replace a course catalog entry.
    async fn upsert_course(&self, entry: &CourseEntry) -> Result<()>;

    /// Bulk upsert content documents.
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize>;

    /// Search content documents, best match first.
    async fn search(
        &self,
        query_embedding: &[f32],
        filter: &ChunkFilter,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>>;

    /// Find the catalog course whose title embedding is closest to the query.
    async fn nearest_course(&self, query_embedding: &[f32]) -> Result<Option<(String, f32)>>;

    /// Get a course by exact title.
    async fn get_course(&self, title: &str) -> Result<Option<Course>>;

    /// All course titles, sorted.
    async fn course_titles(&self) -> Result<Vec<String>>;

    /// Check if a course is in the catalog.
    async fn is_course_indexed(&self, title: &str) -> Result<bool>;

    /// Delete a course and its documents. Returns the number of documents removed.
    async fn delete_course(&self, title: &str) -> Result<usize>;

    /// Remove every course and document.
    async fn clear(&self) -> Result<()>;

    /// Get total document count.
    async fn document_count(&self) -> Result<usize>;

    /// Number of courses in the catalog.
    async fn course_count(&self) -> Result<usize> {
        Ok(self.course_titles().await?.len())
    }
}

/// Create the vector store configured in settings.
pub fn create_vector_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    match settings.vector_store.provider.as_str() {
        "sqlite" => Ok(Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?)),
        "memory" => Ok(Arc::new(MemoryVectorStore::new())),
        other => Err(PensumError::Config(format!(
            "Unknown vector store provider: {}",
            other
        ))),
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(course: &str, lesson: Option<u32>) -> Document {
        Document::new(
            &CourseChunk {
                content: "content".to_string(),
                course_title: course.to_string(),
                lesson_number: lesson,
                chunk_index: 0,
            },
            vec![1.0],
        )
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_chunk_filter() {
        let any = ChunkFilter::default();
        assert!(any.matches(&doc("A", None)));

        let course = ChunkFilter {
            course_title: Some("A".to_string()),
            lesson_number: None,
        };
        assert!(course.matches(&doc("A", Some(3))));
        assert!(!course.matches(&doc("B", Some(3))));

        let lesson = ChunkFilter {
            course_title: Some("A".to_string()),
            lesson_number: Some(3),
        };
        assert!(lesson.matches(&doc("A", Some(3))));
        assert!(!lesson.matches(&doc("A", Some(4))));
        assert!(!lesson.matches(&doc("A", None)));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut settings = Settings::default();
        settings.vector_store.provider = "chroma".to_string();
        assert!(create_vector_store(&settings).is_err());
    }
}
