pub fn estimate_tokens_for_text(text: &str) -> usize {
    // Simple heuristic: 1 token ~ 4 characters
    let chars = text.chars().count();
    chars.div_ceil(4)
}

/// Per-text token estimate used to bound request size.
pub trait TokenCounter {
    fn count(&self, text: &str) -> usize;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> usize { estimate_tokens_for_text(text) }
}

impl<F: Fn(&str) -> usize> TokenCounter for F {
    fn count(&self, text: &str) -> usize { self(text) }
}
