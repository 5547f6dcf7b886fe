//! Course document parsing.
//!
//! Expected layout:
//!
//! ```text
//! Course Title: <title>
//! Course Link: <url>
//! Course Instructor: <name>
//!
//! Lesson 1: <lesson title>
//! Lesson Link: <lesson url>
//! <lesson text...>
//! ```
//!
//! The short field names `Course:`, `Link:` and `Instructor:` are accepted too.

use super::{Course, CourseChunk, Lesson, TextChunker};
use crate::error::{PensumError, Result};
use regex::Regex;
use std::path::Path;
use tracing::{debug, instrument};

/// A parsed course with its chunked content.
#[derive(Debug, Clone)]
pub struct CourseDocument {
    pub course: Course,
    pub chunks: Vec<CourseChunk>,
}

/// Parses course documents into courses and chunks.
pub struct CourseParser {
    chunker: TextChunker,
    lesson_header: Regex,
}

impl CourseParser {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunker: TextChunker::new(chunk_size, chunk_overlap),
            lesson_header: Regex::new(r"(?i)^lesson\s+(\d+)\s*:\s*(.*)$").expect("Invalid regex"),
        }
    }

    /// Read and parse a course document from disk.
    ///
    /// The file stem is used as the course title when the header has none.
    #[instrument(skip(self))]
    pub fn parse_file(&self, path: &Path) -> Result<CourseDocument> {
        let text = std::fs::read_to_string(path)?;
        let fallback_title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| PensumError::Document(format!("No file name in {:?}", path)))?;
        self.parse(&text, &fallback_title)
    }

    /// Parse course document text.
    pub fn parse(&self, text: &str, fallback_title: &str) -> Result<CourseDocument> {
        let lines: Vec<&str> = text.lines().collect();
        let mut course = Course::new(fallback_title.trim());
        let mut cursor = 0;

        // Header: metadata lines until the first lesson marker
        while cursor < lines.len() {
            let line = lines[cursor].trim();
            if self.lesson_header.is_match(line) {
                break;
            }
            if let Some(value) = strip_field(line, &["Course Title", "Course"]) {
                course.title = value.to_string();
            } else if let Some(value) = strip_field(line, &["Course Link", "Link"]) {
                course.course_link = Some(value.to_string());
            } else if let Some(value) = strip_field(line, &["Course Instructor", "Instructor"]) {
                course.instructor = Some(value.to_string());
            } else if !line.is_empty() {
                // Free text before any lesson marker is body content
                break;
            }
            cursor += 1;
        }

        if course.title.is_empty() {
            return Err(PensumError::Document("Course document has no title".to_string()));
        }

        let mut chunks = Vec::new();
        let mut current_lesson: Option<Lesson> = None;
        let mut body: Vec<&str> = Vec::new();

        while cursor < lines.len() {
            let line = lines[cursor];
            if let Some(caps) = self.lesson_header.captures(line.trim()) {
                self.flush(&mut course, current_lesson.take(), &body, &mut chunks);
                body.clear();

                let lesson_number = caps[1]
                    .parse::<u32>()
                    .map_err(|e| PensumError::Document(format!("Bad lesson number: {}", e)))?;
                let mut lesson = Lesson {
                    lesson_number,
                    title: caps[2].trim().to_string(),
                    lesson_link: None,
                };

                if let Some(link) = lines
                    .get(cursor + 1)
                    .and_then(|next| strip_field(next.trim(), &["Lesson Link", "Link"]))
                {
                    lesson.lesson_link = Some(link.to_string());
                    cursor += 1;
                }
                current_lesson = Some(lesson);
            } else {
                body.push(line);
            }
            cursor += 1;
        }
        self.flush(&mut course, current_lesson, &body, &mut chunks);

        debug!(
            "Parsed course '{}' with {} lessons into {} chunks",
            course.title,
            course.lessons.len(),
            chunks.len()
        );

        Ok(CourseDocument { course, chunks })
    }

    /// Chunk the accumulated body text and attach it to the current lesson.
    fn flush(
        &self,
        course: &mut Course,
        lesson: Option<Lesson>,
        body: &[&str],
        chunks: &mut Vec<CourseChunk>,
    ) {
        let text = body.join("\n");
        let lesson_number = lesson.as_ref().map(|l| l.lesson_number);

        for (i, piece) in self.chunker.chunk(&text).into_iter().enumerate() {
            let content = match lesson_number {
                Some(n) if i == 0 => format!("Lesson {} content: {}", n, piece),
                _ => piece,
            };
            chunks.push(CourseChunk {
                content,
                course_title: course.title.clone(),
                lesson_number,
                chunk_index: chunks.len() as u32,
            });
        }

        if let Some(lesson) = lesson {
            course.lessons.push(lesson);
        }
    }
}

/// Return the value of a `Name: value` line whose name is one of `names`.
fn strip_field<'a>(line: &'a str, names: &[&str]) -> Option<&'a str> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if names.iter().any(|name| key.eq_ignore_ascii_case(name)) {
        Some(value.trim())
    } else {
        None
    }
}
