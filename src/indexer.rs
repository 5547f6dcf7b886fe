//! Course ingestion pipeline.
//!
//! Parses course documents, embeds their chunks and writes both the catalog
//! entry and the content chunks to the vector store.

use crate::config::Settings;
use crate::course::{CourseDocument, CourseParser};
use crate::embedding::Embedder;
use crate::error::{PensumError, Result};
use crate::vector_store::{CourseEntry, Document, VectorStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md"];

/// Loads course documents into the vector store.
pub struct Indexer {
    parser: CourseParser,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
}

/// Result of indexing one course document.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexResult {
    pub title: String,
    pub chunks_indexed: usize,
    /// The course was already in the catalog and left untouched.
    pub skipped: bool,
}

impl Indexer {
    pub fn new(
        settings: &Settings,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            parser: CourseParser::new(
                settings.chunking.chunk_size,
                settings.chunking.chunk_overlap,
            ),
            embedder,
            vector_store,
        }
    }

    /// Index a single course file, replacing any course with the same title.
    #[instrument(skip(self))]
    pub async fn add_course_document(&self, path: &Path) -> Result<IndexResult> {
        let document = self.parser.parse_file(path)?;
        self.index_document(document, true).await
    }

    /// Index every supported file in `dir`. Courses already in the catalog
    /// are skipped. Returns `(courses_added, chunks_added)`.
    #[instrument(skip(self))]
    pub async fn add_course_folder(&self, dir: &Path, clear_existing: bool) -> Result<(usize, usize)> {
        if !dir.is_dir() {
            return Err(PensumError::InvalidInput(format!(
                "Course folder does not exist: {}",
                dir.display()
            )));
        }

        if clear_existing {
            info!("Clearing existing course data");
            self.vector_store.clear().await?;
        }

        let mut courses_added = 0;
        let mut chunks_added = 0;

        for path in course_files(dir)? {
            let document = match self.parser.parse_file(&path) {
                Ok(document) => document,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            let result = self.index_document(document, false).await?;
            if result.skipped {
                info!("Course already indexed, skipping: {}", result.title);
                continue;
            }

            courses_added += 1;
            chunks_added += result.chunks_indexed;
        }

        info!(
            "Indexed {} courses ({} chunks) from {}",
            courses_added,
            chunks_added,
            dir.display()
        );
        Ok((courses_added, chunks_added))
    }

    async fn index_document(&self, document: CourseDocument, replace: bool) -> Result<IndexResult> {
        let CourseDocument { course, chunks } = document;
        let title = course.title.clone();

        let indexed = self.vector_store.is_course_indexed(&title).await?;
        if indexed && !replace {
            return Ok(IndexResult {
                title,
                chunks_indexed: 0,
                skipped: true,
            });
        }

        info!("Indexing '{}' ({} chunks)", title, chunks.len());

        // Embed everything before touching the store so a failed run leaves
        // the catalog as it was.
        let title_embedding = self.embedder.embed(&title).await?;
        let embeddings = if chunks.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
            self.embedder.embed_batch(&texts).await?
        };
        if embeddings.len() != chunks.len() {
            return Err(PensumError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        if indexed {
            self.vector_store.delete_course(&title).await?;
        }
        self.vector_store
            .upsert_course(&CourseEntry::new(course, title_embedding))
            .await?;

        let documents: Vec<Document> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| Document::new(chunk, embedding))
            .collect();

        let count = if documents.is_empty() {
            0
        } else {
            self.vector_store.upsert_batch(&documents).await?
        };

        Ok(IndexResult {
            title,
            chunks_indexed: count,
            skipped: false,
        })
    }
}

/// Supported course files in `dir`, sorted by name.
fn course_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_supported(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
