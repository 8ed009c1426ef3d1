//! Fixed-size overlapping text chunker.
//!
//! Splits page text into [`Chunk`]s of at most `chunk_size` characters. Each
//! chunk after the first starts `overlap` characters before the end of the
//! previous one. There is no sentence or paragraph detection: windows may
//! split mid-word.
//!
//! Lengths are counted in `char`s so a window never splits a UTF-8 sequence.
//! Each chunk receives a deterministic UUID derived from its document ID and
//! index, plus a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, Document};

/// Split one page into windows. Returns chunks with contiguous indices
/// starting at 0, or nothing for blank text.
pub fn chunk_text(document: &Document, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let text = &document.text;
    if chunk_size == 0 || text.trim().is_empty() {
        return Vec::new();
    }
    // A window must advance, otherwise the loop below never ends.
    let overlap = overlap.min(chunk_size - 1);

    // Byte offset of every char boundary, plus the end of the string.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_index: i64 = 0;

    loop {
        let end = (start + chunk_size).min(char_len);
        let piece = &text[boundaries[start]..boundaries[end]];
        chunks.push(make_chunk(document, chunk_index, start, piece));
        chunk_index += 1;

        if end == char_len {
            break;
        }
        start = end - overlap;
    }

    chunks
}

/// Chunk every page in order.
pub fn chunk_documents(documents: &[Document], chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| chunk_text(doc, chunk_size, overlap))
        .collect()
}

fn make_chunk(document: &Document, index: i64, start: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let id = Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{}:{}", document.id, index).as_bytes(),
    )
    .to_string();

    Chunk {
        id,
        document_id: document.id.clone(),
        source: document.source.clone(),
        page: document.page,
        chunk_index: index,
        start,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("test.pdf", 0, text)
    }

    fn char_len(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text(&doc("Hello, world!"), 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text(&doc(""), 1000, 200).is_empty());
        assert!(chunk_text(&doc("  \n\t "), 1000, 200).is_empty());
    }

    #[test]
    fn test_windows_overlap_exactly() {
        let text: String = (0..500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = chunk_text(&doc(&text), 100, 20);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(char_len(&c.text) <= 100);
        }
        for pair in chunks.windows(2) {
            let prev = &pair[0];
            let next = &pair[1];
            assert_eq!(next.start, prev.start + char_len(&prev.text) - 20);
            let tail: String = prev.text.chars().skip(char_len(&prev.text) - 20).collect();
            let head: String = next.text.chars().take(20).collect();
            assert_eq!(tail, head);
        }
        let last = chunks.last().unwrap();
        assert_eq!(last.start + char_len(&last.text), 500);
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_sliver() {
        // 180 chars, size 100, overlap 20: [0,100) then [80,180).
        let text = "x".repeat(180);
        let chunks = chunk_text(&doc(&text), 100, 20);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].start, 80);
        assert_eq!(char_len(&chunks[1].text), 100);
    }

    #[test]
    fn test_multibyte_text_not_split() {
        let text = "é".repeat(250);
        let chunks = chunk_text(&doc(&text), 100, 10);
        for c in &chunks {
            assert!(char_len(&c.text) <= 100);
            assert!(c.text.chars().all(|ch| ch == 'é'));
        }
    }

    #[test]
    fn test_chunk_indices_contiguous() {
        let text = "word ".repeat(400);
        let chunks = chunk_text(&doc(&text), 50, 10);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64, "Index mismatch at position {}", i);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta. ".repeat(30);
        let c1 = chunk_text(&doc(&text), 64, 16);
        let c2 = chunk_text(&doc(&text), 64, 16);
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_chunks_reference_their_page() {
        let pages = vec![
            Document::new("a.pdf", 0, "first page text"),
            Document::new("a.pdf", 1, "second page text"),
        ];
        let chunks = chunk_documents(&pages, 1000, 200);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].document_id, pages[0].id);
        assert_eq!(chunks[1].document_id, pages[1].id);
        assert_eq!(chunks[1].page, 1);
    }
}
