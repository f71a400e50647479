/// Split extracted text into chunks for embedding.
///
/// Words (whitespace-delimited) are accumulated and joined with single
/// spaces; a chunk is flushed as soon as its joined length reaches
/// `chunk_size`. Every chunk except possibly the last is therefore at
/// least `chunk_size` characters, no word is dropped or duplicated, and
/// word order is preserved. Empty or whitespace-only input produces no
/// chunks.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        if !current.is_empty() {
            current_len += 1; // joining space
        }
        current.push(word);
        current_len += word.len();

        if current_len >= chunk_size {
            chunks.push(current.join(" "));
            current.clear();
            current_len = 0;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_produces_no_chunks() {
        assert!(chunk_text("", 100).is_empty());
        assert!(chunk_text("   \n\t  ", 100).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("hello world", 100);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_no_words_dropped_or_duplicated() {
        let text = "the quick brown fox jumps over the lazy dog ".repeat(50);
        let chunks = chunk_text(&text, 120);

        let original: Vec<&str> = text.split_whitespace().collect();
        let rejoined: Vec<&str> = chunks
            .iter()
            .flat_map(|c| c.split_whitespace())
            .collect();
        assert_eq!(original, rejoined);
    }

    #[test]
    fn test_non_final_chunks_reach_threshold() {
        let text = "alpha beta gamma delta epsilon zeta eta theta ".repeat(40);
        let chunk_size = 97;
        let chunks = chunk_text(&text, chunk_size);
        assert!(chunks.len() > 1);

        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.len() >= chunk_size,
                "chunk of {} chars below threshold {}",
                chunk.len(),
                chunk_size
            );
        }
    }

    #[test]
    fn test_word_longer_than_threshold() {
        let chunks = chunk_text("supercalifragilistic expialidocious tiny", 10);
        assert_eq!(
            chunks,
            vec![
                "supercalifragilistic".to_string(),
                "expialidocious".to_string(),
                "tiny".to_string(),
            ]
        );
    }

    #[test]
    fn test_collapses_internal_whitespace() {
        let chunks = chunk_text("one\n\ntwo\t three", 100);
        assert_eq!(chunks, vec!["one two three".to_string()]);
    }
}
