//! Word-bounded, overlapping chunking under a character budget.

/// Splits `text` into chunks of whole words.
///
/// Each word costs its character count plus one separator against
/// `max_size`. When a word does not fit, the current chunk is closed and the
/// next one starts with up to `overlap / (word_len + 1)` trailing words of
/// the closed chunk followed by that word. The overlap is therefore an
/// approximation measured against the triggering word's length, not an
/// exact character count.
pub fn chunk_text(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len + word_len + 1 <= max_size {
            current.push(word);
            current_len += word_len + 1;
            continue;
        }

        // An oversized word arriving with nothing buffered must not emit an empty chunk.
        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        let overlap_words = if word_len == 0 {
            0
        } else {
            overlap / (word_len + 1)
        };
        let start = current.len().saturating_sub(overlap_words);

        let mut next: Vec<&str> = current.split_off(start);
        next.push(word);
        current = next;
        current_len = current.iter().map(|w| w.chars().count()).sum::<usize>() + current.len() - 1;
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}
