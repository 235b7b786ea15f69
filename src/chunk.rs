use crate::util::TokenCounter;
use anyhow::{bail, Result};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    /// Sum of the per-text estimates packed into this chunk.
    pub tokens: usize,
}

/// Greedily packs `texts` into chunks whose estimate stays strictly below `ceiling`.
///
/// Texts keep their input order and are joined with newlines. There is no
/// backtracking: a text that does not fit closes the running chunk and opens
/// the next one. A text that alone reaches the ceiling is truncated from the end.
pub fn pack_texts<C: TokenCounter + ?Sized>(texts: &[String], counter: &C, ceiling: usize) -> Result<Vec<Chunk>> {
    if ceiling == 0 {
        bail!("invalid budget: chunk ceiling must be positive");
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;
    let mut current_len = 0usize;

    for text in texts {
        let mut text = text.as_str();
        let mut tokens = counter.count(text);
        let truncated;
        if tokens >= ceiling {
            truncated = truncate_to_fit(text, counter, ceiling);
            warn!("text of {} tokens exceeds the chunk ceiling {}; truncated", tokens, ceiling);
            text = truncated.as_str();
            tokens = counter.count(text);
        }

        if current_len > 0 && current_tokens + tokens >= ceiling {
            push_chunk(&mut chunks, &current, current_tokens);
            current.clear();
            current_tokens = 0;
            current_len = 0;
        }
        current.push_str(text);
        current.push('\n');
        current_tokens += tokens;
        current_len += 1;
    }
    if current_len > 0 {
        push_chunk(&mut chunks, &current, current_tokens);
    }
    Ok(chunks)
}

fn push_chunk(chunks: &mut Vec<Chunk>, text: &str, tokens: usize) {
    let index = chunks.len();
    chunks.push(Chunk { index, text: text.trim().to_string(), tokens });
}

/// Longest char-aligned prefix whose estimate is below `ceiling`, found by
/// binary search over the prefix ends (estimates grow with the prefix).
fn truncate_to_fit<C: TokenCounter + ?Sized>(text: &str, counter: &C, ceiling: usize) -> String {
    let ends: Vec<usize> = text.char_indices().map(|(i, c)| i + c.len_utf8()).collect();
    let fitting = ends.partition_point(|&end| counter.count(&text[..end]) < ceiling);
    let cut = if fitting == 0 { 0 } else { ends[fitting - 1] };
    text[..cut].to_string()
}
