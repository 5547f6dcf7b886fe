//! In-memory vector store implementation.
//!
//! Useful for testing and small course sets.

use super::{cosine_similarity, ChunkFilter, CourseEntry, Document, ScoredDocument, VectorStore};
use crate::course::Course;
use crate::error::{PensumError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// In-memory vector store.
pub struct MemoryVectorStore {
    courses: RwLock<BTreeMap<String, CourseEntry>>,
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            courses: RwLock::new(BTreeMap::new()),
            documents: RwLock::new(HashMap::new()),
        }
    }

    fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
        lock.read()
            .map_err(|e| PensumError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
        lock.write()
            .map_err(|e| PensumError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_course(&self, entry: &CourseEntry) -> Result<()> {
        let mut courses = Self::write(&self.courses)?;
        courses.insert(entry.course.title.clone(), entry.clone());
        Ok(())
    }

    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
        let mut store = Self::write(&self.documents)?;
        for doc in docs {
            store.insert(doc.id, doc.clone());
        }
        Ok(docs.len())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        filter: &ChunkFilter,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let docs = Self::read(&self.documents)?;

        let mut results: Vec<ScoredDocument> = docs
            .values()
            .filter(|doc| filter.matches(doc))
            .map(|doc| ScoredDocument {
                document: doc.clone(),
                score: cosine_similarity(query_embedding, &doc.embedding),
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);

        Ok(results)
    }

    async fn nearest_course(&self, query_embedding: &[f32]) -> Result<Option<(String, f32)>> {
        let courses = Self::read(&self.courses)?;

        Ok(courses
            .values()
            .map(|entry| {
                (
                    entry.course.title.clone(),
                    cosine_similarity(query_embedding, &entry.embedding),
                )
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)))
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let courses = Self::read(&self.courses)?;
        Ok(courses.get(title).map(|entry| entry.course.clone()))
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        let courses = Self::read(&self.courses)?;
        Ok(courses.keys().cloned().collect())
    }

    async fn is_course_indexed(&self, title: &str) -> Result<bool> {
        let courses = Self::read(&self.courses)?;
        Ok(courses.contains_key(title))
    }

    async fn delete_course(&self, title: &str) -> Result<usize> {
        Self::write(&self.courses)?.remove(title);

        let mut docs = Self::write(&self.documents)?;
        let initial_len = docs.len();
        docs.retain(|_, doc| doc.course_title != title);
        Ok(initial_len - docs.len())
    }

    async fn clear(&self) -> Result<()> {
        Self::write(&self.courses)?.clear();
        Self::write(&self.documents)?.clear();
        Ok(())
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(Self::read(&self.documents)?.len())
    }
}
