//! Course data model, document parsing and text chunking.
//!
//! Course documents are plain text files with a small metadata header followed
//! by `Lesson N: Title` sections. They are parsed into a [`Course`] and split
//! into [`CourseChunk`]s ready for embedding.

mod chunker;
mod parser;

pub use chunker::TextChunker;
pub use parser::{CourseDocument, CourseParser};

use serde::{Deserialize, Serialize};

/// A single lesson within a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: u32,
    pub title: String,
    pub lesson_link: Option<String>,
}

/// Course metadata and its lesson outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Course title, unique across the catalog.
    pub title: String,
    pub course_link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

impl Course {
    /// Create a course with no lessons.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            course_link: None,
            instructor: None,
            lessons: Vec::new(),
        }
    }

    /// Look up a lesson by number.
    pub fn lesson(&self, lesson_number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.lesson_number == lesson_number)
    }
}

/// A piece of course text ready to be embedded and indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseChunk {
    pub content: String,
    pub course_title: String,
    /// Lesson this text came from, if the document had lesson markers.
    pub lesson_number: Option<u32>,
    /// Position of this chunk within the whole course.
    pub chunk_index: u32,
}
