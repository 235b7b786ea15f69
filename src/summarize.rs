use crate::chunk::Chunk;
use crate::llm::{LlmRequest, ModelProviderAdapter};
use crate::prompts;
use anyhow::{Context, Result};
use std::time::Instant;
use tracing::{debug, info};

/// Running count of API-reported token usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenLedger {
    pub total_tokens: u64,
    pub api_calls: u64,
}

impl TokenLedger {
    pub fn record(&mut self, tokens: Option<u32>) {
        self.api_calls += 1;
        self.total_tokens += u64::from(tokens.unwrap_or(0));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub label: String,
    pub chunk_summaries: Vec<String>,
    pub summary: String,
}

pub struct Summarizer<'a> {
    adapter: &'a dyn ModelProviderAdapter,
    model: String,
    temperature: f32,
    api_base: Option<String>,
    ledger: TokenLedger,
}

impl<'a> Summarizer<'a> {
    pub fn new(adapter: &'a dyn ModelProviderAdapter, model: &str, temperature: f32, api_base: Option<String>) -> Self {
        Self { adapter, model: model.to_string(), temperature, api_base, ledger: TokenLedger::default() }
    }

    pub fn ledger(&self) -> TokenLedger { self.ledger }

    /// One blocking round trip; the answer comes back trimmed.
    pub async fn complete(&mut self, prompt: String) -> Result<String> {
        let start = Instant::now();
        debug!("LLM call starting - prompt_length={} chars", prompt.len());
        let req = LlmRequest::user_prompt(&self.model, self.temperature, self.api_base.clone(), prompt);
        let res = self.adapter.send(req).await?;
        let tokens = res.usage.as_ref().and_then(|u| u.total_tokens);
        self.ledger.record(tokens);
        info!(
            "LLM call completed - duration={:.2}s, response_length={} chars, tokens={}",
            start.elapsed().as_secs_f32(),
            res.content.len(),
            tokens.unwrap_or(0)
        );
        Ok(res.content.trim().to_string())
    }

    pub async fn summarize_chunk(&mut self, chunk: &Chunk) -> Result<String> {
        self.complete(prompts::user_chunk_analysis(&chunk.text)).await
    }

    pub async fn merge_summaries(&mut self, summaries: &[String]) -> Result<String> {
        self.complete(prompts::user_merge_analyses(&summaries.join("\n\n"))).await
    }

    /// Summarizes every chunk in order, then merges the partial analyses.
    pub async fn summarize_segment(&mut self, label: &str, chunks: &[Chunk]) -> Result<SegmentSummary> {
        let mut chunk_summaries = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            info!("summarizing {} chunk {}/{} ({} tokens)", label, chunk.index + 1, chunks.len(), chunk.tokens);
            let s = self
                .summarize_chunk(chunk)
                .await
                .with_context(|| format!("summarizing chunk {} of segment {}", chunk.index + 1, label))?;
            chunk_summaries.push(s);
        }
        let summary = self
            .merge_summaries(&chunk_summaries)
            .await
            .with_context(|| format!("merging summaries of segment {}", label))?;
        Ok(SegmentSummary { label: label.to_string(), chunk_summaries, summary })
    }
}
