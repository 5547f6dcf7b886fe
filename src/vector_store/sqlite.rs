//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! Course catalogs are small enough that a full scan per query is fine.

use super::{cosine_similarity, ChunkFilter, CourseEntry, Document, ScoredDocument, VectorStore};
use crate::course::{Course, Lesson};
use crate::error::{PensumError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS courses (
    title TEXT PRIMARY KEY,
    course_link TEXT,
    instructor TEXT,
    lessons_json TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    course_title TEXT NOT NULL,
    lesson_number INTEGER,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_course ON documents(course_title);
CREATE INDEX IF NOT EXISTS idx_documents_lesson ON documents(course_title, lesson_number);
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) a SQLite vector store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PensumError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_course(
        title: String,
        course_link: Option<String>,
        instructor: Option<String>,
        lessons_json: &str,
    ) -> Result<Course> {
        let lessons: Vec<Lesson> = serde_json::from_str(lessons_json)?;
        Ok(Course {
            title,
            course_link,
            instructor,
            lessons,
        })
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, entry), fields(title = %entry.course.title))]
    async fn upsert_course(&self, entry: &CourseEntry) -> Result<()> {
        let conn = self.lock()?;
        let lessons_json = serde_json::to_string(&entry.course.lessons)?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO courses
            (title, course_link, instructor, lessons_json, embedding, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.course.title,
                entry.course.course_link,
                entry.course.instructor,
                lessons_json,
                Self::embedding_to_bytes(&entry.embedding),
                entry.indexed_at.to_rfc3339(),
            ],
        )?;

        debug!("Upserted course {}", entry.course.title);
        Ok(())
    }

    #[instrument(skip(self, docs))]
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for doc in docs {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO documents
                (id, course_title, lesson_number, chunk_index, content, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    doc.id.to_string(),
                    doc.course_title,
                    doc.lesson_number,
                    doc.chunk_index,
                    doc.content,
                    Self::embedding_to_bytes(&doc.embedding),
                    doc.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Batch upserted {} documents", docs.len());
        Ok(docs.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        query_embedding: &[f32],
        filter: &ChunkFilter,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, course_title, lesson_number, chunk_index, content, embedding, indexed_at
            FROM documents
            WHERE (?1 IS NULL OR course_title = ?1)
              AND (?2 IS NULL OR lesson_number = ?2)
            "#,
        )?;

        let docs = stmt.query_map(params![filter.course_title, filter.lesson_number], |row| {
            let id_str: String = row.get(0)?;
            let embedding_bytes: Vec<u8> = row.get(5)?;
            let indexed_at_str: String = row.get(6)?;

            Ok(Document {
                id: uuid::Uuid::parse_str(&id_str).unwrap_or_default(),
                course_title: row.get(1)?,
                lesson_number: row.get(2)?,
                chunk_index: row.get(3)?,
                content: row.get(4)?,
                embedding: Self::bytes_to_embedding(&embedding_bytes),
                indexed_at: Self::parse_timestamp(&indexed_at_str),
            })
        })?;

        let mut results = Vec::new();
        for doc in docs {
            let document = doc?;
            let score = cosine_similarity(query_embedding, &document.embedding);
            results.push(ScoredDocument { document, score });
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);

        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    #[instrument(skip(self, query_embedding))]
    async fn nearest_course(&self, query_embedding: &[f32]) -> Result<Option<(String, f32)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT title, embedding FROM courses")?;

        let rows = stmt.query_map([], |row| {
            let title: String = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            Ok((title, Self::bytes_to_embedding(&bytes)))
        })?;

        let mut best: Option<(String, f32)> = None;
        for row in rows {
            let (title, embedding) = row?;
            let score = cosine_similarity(query_embedding, &embedding);
            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((title, score));
            }
        }

        Ok(best)
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT title, course_link, instructor, lessons_json FROM courses WHERE title = ?1",
                params![title],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(title, link, instructor, lessons_json)| {
            Self::row_to_course(title, link, instructor, &lessons_json)
        })
        .transpose()
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT title FROM courses ORDER BY title")?;
        let titles = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(titles)
    }

    async fn is_course_indexed(&self, title: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM courses WHERE title = ?1",
            params![title],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    #[instrument(skip(self))]
    async fn delete_course(&self, title: &str) -> Result<usize> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM courses WHERE title = ?1", params![title])?;
        let deleted = conn.execute("DELETE FROM documents WHERE course_title = ?1", params![title])?;
        info!("Deleted course {} ({} documents)", title, deleted);
        Ok(deleted)
    }

    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM documents; DELETE FROM courses;")?;
        info!("Cleared all course data");
        Ok(())
    }

    async fn document_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::CourseChunk;

    fn sample_course() -> Course {
        Course {
            title: "Python Testing Course".to_string(),
            course_link: Some("https://example.com/course".to_string()),
            instructor: Some("Test Instructor".to_string()),
            lessons: vec![
                Lesson {
                    lesson_number: 1,
                    title: "Introduction to Testing".to_string(),
                    lesson_link: Some("https://example.com/course/lesson1".to_string()),
                },
                Lesson {
                    lesson_number: 2,
                    title: "Unit Testing Basics".to_string(),
                    lesson_link: None,
                },
            ],
        }
    }

    fn doc(lesson: Option<u32>, index: u32, text: &str, embedding: Vec<f32>) -> Document {
        Document::new(
            &CourseChunk {
                content: text.to_string(),
                course_title: "Python Testing Course".to_string(),
                lesson_number: lesson,
                chunk_index: index,
            },
            embedding,
        )
    }

    #[tokio::test]
    async fn test_sqlite_vector_store() {
        let store = SqliteVectorStore::in_memory().unwrap();

        store
            .upsert_course(&CourseEntry::new(sample_course(), vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert_batch(&[
                doc(Some(1), 0, "Testing basics", vec![1.0, 0.0, 0.0]),
                doc(Some(2), 1, "Unit tests", vec![0.0, 1.0, 0.0]),
                doc(None, 2, "Appendix", vec![0.5, 0.5, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.document_count().await.unwrap(), 3);
        assert!(store.is_course_indexed("Python Testing Course").await.unwrap());
        assert_eq!(store.course_count().await.unwrap(), 1);

        let course = store.get_course("Python Testing Course").await.unwrap().unwrap();
        assert_eq!(course, sample_course());
        assert!(store.get_course("Missing").await.unwrap().is_none());

        let results = store
            .search(&[1.0, 0.0, 0.0], &ChunkFilter::default(), 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.content, "Testing basics");
        assert_eq!(results[0].document.lesson_number, Some(1));

        let lesson_two = store
            .search(
                &[1.0, 0.0, 0.0],
                &ChunkFilter {
                    course_title: None,
                    lesson_number: Some(2),
                },
                5,
            )
            .await
            .unwrap();
        assert_eq!(lesson_two.len(), 1);
        assert_eq!(lesson_two[0].document.content, "Unit tests");

        let (title, score) = store.nearest_course(&[0.9, 0.1]).await.unwrap().unwrap();
        assert_eq!(title, "Python Testing Course");
        assert!(score > 0.9);

        assert_eq!(store.delete_course("Python Testing Course").await.unwrap(), 3);
        assert_eq!(store.course_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_store_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("courses.db");

        {
            let store = SqliteVectorStore::new(&path).unwrap();
            store
                .upsert_course(&CourseEntry::new(sample_course(), vec![1.0]))
                .await
                .unwrap();
        }

        let reopened = SqliteVectorStore::new(&path).unwrap();
        assert_eq!(reopened.course_titles().await.unwrap(), vec!["Python Testing Course"]);
    }
}
