//! Sentence-based text chunking with overlap.

use regex::Regex;

/// Splits text into chunks of whole sentences.
///
/// Each chunk holds at most `chunk_size` characters unless a single sentence is
/// longer than that. Consecutive chunks share trailing sentences whose combined
/// length fits in `chunk_overlap`.
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    sentence_end: Regex,
    whitespace: Regex,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            sentence_end: Regex::new(r"[.!?]+\s+").expect("Invalid regex"),
            whitespace: Regex::new(r"\s+").expect("Invalid regex"),
        }
    }

    /// Split text into sentences, collapsing runs of whitespace.
    pub fn sentences(&self, text: &str) -> Vec<String> {
        let normalized = self.whitespace.replace_all(text.trim(), " ");
        let mut sentences = Vec::new();
        let mut start = 0;

        for m in self.sentence_end.find_iter(&normalized) {
            let end = m.start() + m.as_str().trim_end().len();
            let sentence = normalized[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = m.end();
        }

        let tail = normalized[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }

        sentences
    }

    /// Split text into overlapping chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let sentences = self.sentences(text);
        let mut chunks = Vec::new();
        let mut i = 0;

        while i < sentences.len() {
            let mut current: Vec<&str> = Vec::new();
            let mut current_size = 0;

            for sentence in &sentences[i..] {
                let separator = usize::from(!current.is_empty());
                let len = sentence.chars().count() + separator;
                if current_size + len > self.chunk_size && !current.is_empty() {
                    break;
                }
                current.push(sentence);
                current_size += len;
            }

            chunks.push(current.join(" "));

            let overlap = self.overlap_sentences(&current);
            i = (i + current.len() - overlap).max(i + 1);
        }

        chunks
    }

    /// Number of trailing sentences of `chunk` that fit in the overlap budget.
    fn overlap_sentences(&self, chunk: &[&str]) -> usize {
        if self.chunk_overlap == 0 {
            return 0;
        }

        let mut size = 0;
        let mut count = 0;
        for (k, sentence) in chunk.iter().enumerate().rev() {
            let separator = usize::from(k + 1 < chunk.len());
            let len = sentence.chars().count() + separator;
            if size + len > self.chunk_overlap {
                break;
            }
            size += len;
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_split() {
        let chunker = TextChunker::new(800, 100);
        let sentences = chunker.sentences("First one.  Second\none! Third? tail without stop");
        assert_eq!(
            sentences,
            vec!["First one.", "Second one!", "Third?", "tail without stop"]
        );
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = TextChunker::new(800, 100);
        let chunks = chunker.chunk("Testing is essential. We cover several approaches.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "Testing is essential. We cover several approaches.");
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        // Each sentence is 10 chars ("Sentence0."), joined with spaces.
        let text = (0..10).map(|i| format!("Sentence{}.", i)).collect::<Vec<_>>().join(" ");
        let chunker = TextChunker::new(32, 11);
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 32);
        }
        // The last sentence of a chunk opens the next one
        assert!(chunks[0].ends_with("Sentence2."));
        assert!(chunks[1].starts_with("Sentence2."));
        assert!(chunks.last().unwrap().ends_with("Sentence9."));
    }

    #[test]
    fn test_oversized_sentence_still_progresses() {
        let chunker = TextChunker::new(5, 100);
        let chunks = chunker.chunk("A very long sentence here. Another long one.");
        assert_eq!(chunks, vec!["A very long sentence here.", "Another long one."]);
    }

    #[test]
    fn test_empty_text() {
        let chunker = TextChunker::new(800, 100);
        assert!(chunker.chunk("   ").is_empty());
    }
}
