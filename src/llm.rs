use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use tracing::debug;

use crate::util;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub api_base: Option<String>,
}

impl LlmRequest {
    pub fn user_prompt(model: &str, temperature: f32, api_base: Option<String>, prompt: String) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage { role: "user".into(), content: prompt }],
            temperature,
            api_base,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

pub struct LlmClient {
    http: Client,
}

impl LlmClient {
    /// Requests block until the server answers unless a timeout is given.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self { http: builder.build()? })
    }

    async fn send_openai(&self, req: LlmRequest) -> Result<LlmResponse> {
        let base = req.api_base.unwrap_or_else(|| OPENAI_API_BASE.to_string());
        let url = format!("{}/chat/completions", base);
        let (api_key_opt, require_key) = api_key_for_base(&base);
        if require_key && api_key_opt.is_none() {
            return Err(anyhow!("missing API key for base {}", base)).context("missing OPENAI_API_KEY");
        }

        #[derive(Serialize)]
        struct OpenAiRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct OpenAiChoiceMessage {
            content: Option<String>,
        }

        #[derive(Deserialize)]
        struct OpenAiChoice {
            message: Option<OpenAiChoiceMessage>,
        }

        #[derive(Deserialize)]
        struct OpenAiUsage {
            prompt_tokens: Option<u32>,
            completion_tokens: Option<u32>,
            total_tokens: Option<u32>,
        }

        #[derive(Deserialize)]
        struct OpenAiResponse {
            choices: Vec<OpenAiChoice>,
            usage: Option<OpenAiUsage>,
        }

        let body = OpenAiRequest {
            model: &req.model,
            messages: &req.messages,
            temperature: req.temperature,
        };

        let mut rb = self.http.post(&url).json(&body);
        if let Some(key) = api_key_opt.as_ref() { rb = rb.bearer_auth(key); }
        let res = rb.send().await.with_context(|| format!("network request to {} failed", url))?;
        if res.status() != StatusCode::OK {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            bail!("openai error {}: {}", status, text);
        }
        let parsed: OpenAiResponse = res.json().await.context("failed to parse chat completion response")?;
        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.clone())
            .context("failed to parse chat completion response: no message content")?;
        let usage = parsed.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        Ok(LlmResponse { content, usage })
    }
}

/// Which key a base URL needs, and whether a missing key is fatal.
fn api_key_for_base(base: &str) -> (Option<String>, bool) {
    if base.contains("api.groq.com") {
        (env::var("GROQ_API_KEY").ok(), true)
    } else if base.contains("127.0.0.1") || base.contains("localhost") {
        (env::var("LMSTUDIO_API_KEY").ok(), false)
    } else {
        (env::var("OPENAI_API_KEY").ok(), true)
    }
}

pub fn resolve_api_base_for_provider(provider: &str) -> Option<String> {
    match provider.to_lowercase().as_str() {
        "groq" => Some("https://api.groq.com/openai/v1".to_string()),
        "lmstudio" => env::var("LMSTUDIO_API_BASE").ok().or_else(|| Some("http://127.0.0.1:1234/v1".to_string())),
        _ => env::var("OPENAI_API_BASE").ok(),
    }
}

// Provider adapter trait + registry
#[async_trait::async_trait]
pub trait ModelProviderAdapter: Send + Sync {
    async fn send(&self, req: LlmRequest) -> Result<LlmResponse>;
}

pub struct OpenAiAdapter {
    client: LlmClient,
}

impl OpenAiAdapter {
    pub fn new(timeout: Option<Duration>) -> Result<Self> { Ok(Self { client: LlmClient::new(timeout)? }) }
}

#[async_trait::async_trait]
impl ModelProviderAdapter for OpenAiAdapter {
    async fn send(&self, req: LlmRequest) -> Result<LlmResponse> { self.client.send_openai(req).await }
}

/// Offline provider: echoes the fenced payload of the prompt (or the whole
/// prompt) and reports the heuristic token count as usage.
pub struct MockAdapter;

impl MockAdapter {
    pub fn answer_for(prompt: &str) -> String {
        let payload = fenced_payload(prompt).unwrap_or(prompt);
        payload.trim().to_string()
    }
}

fn fenced_payload(prompt: &str) -> Option<&str> {
    let start = prompt.find("```")? + 3;
    let rest = &prompt[start..];
    let end = rest.find("```")?;
    Some(&rest[..end])
}

#[async_trait::async_trait]
impl ModelProviderAdapter for MockAdapter {
    async fn send(&self, req: LlmRequest) -> Result<LlmResponse> {
        let prompt = req.messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n");
        let content = Self::answer_for(&prompt);
        let prompt_tokens = util::estimate_tokens_for_text(&prompt) as u32;
        let completion_tokens = util::estimate_tokens_for_text(&content) as u32;
        debug!("mock provider answering {} prompt tokens", prompt_tokens);
        Ok(LlmResponse {
            content,
            usage: Some(Usage {
                prompt_tokens: Some(prompt_tokens),
                completion_tokens: Some(completion_tokens),
                total_tokens: Some(prompt_tokens + completion_tokens),
            }),
        })
    }
}

pub struct ProviderRegistry {
    map: HashMap<String, Box<dyn ModelProviderAdapter>>, // keyed by provider name (lowercase)
}

impl ProviderRegistry {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut map: HashMap<String, Box<dyn ModelProviderAdapter>> = HashMap::new();
        // groq and lmstudio speak the same protocol on a different base
        for name in ["openai", "groq", "lmstudio"] {
            map.insert(name.to_string(), Box::new(OpenAiAdapter::new(timeout)?));
        }
        map.insert("mock".to_string(), Box::new(MockAdapter));
        Ok(Self { map })
    }

    pub fn get(&self, name: &str) -> Option<&dyn ModelProviderAdapter> {
        self.map.get(&name.to_lowercase()).map(|b| &**b)
    }
}

// Minimal credential validation helper used by `init --validate`
pub async fn validate_provider_credentials(provider: &str, timeout_secs: Option<u64>) -> Result<()> {
    if provider.eq_ignore_ascii_case("mock") {
        return Ok(());
    }
    let base = resolve_api_base_for_provider(provider).unwrap_or_else(|| OPENAI_API_BASE.to_string());
    let (key, require_key) = api_key_for_base(&base);
    if require_key && key.as_deref().is_none_or(|k| k.trim().is_empty()) {
        bail!("missing OPENAI_API_KEY for provider {}", provider);
    }
    let http = Client::builder().timeout(Duration::from_secs(timeout_secs.unwrap_or(10))).build()?;
    // Use a cheap GET to models endpoint
    let url = format!("{}/models", base);
    let mut rb = http.get(&url);
    if let Some(k) = key.as_ref() { rb = rb.bearer_auth(k); }
    let resp = rb.send().await.with_context(|| format!("network request to {} failed", url))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        bail!("credential validation failed {}: {}", status, text);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_echoes_fenced_payload() {
        assert_eq!(MockAdapter::answer_for("Analise:\n```\nA\nB\n```\n"), "A\nB");
        assert_eq!(MockAdapter::answer_for("  plain prompt "), "plain prompt");
    }

    #[test]
    fn registry_is_case_insensitive() {
        let reg = ProviderRegistry::new(None).unwrap();
        assert!(reg.get("OpenAI").is_some());
        assert!(reg.get("mock").is_some());
        assert!(reg.get("anthropic").is_none());
    }

    #[tokio::test]
    async fn mock_reports_usage() {
        let req = LlmRequest::user_prompt("m", 0.5, None, "```\nhello world\n```".into());
        let res = MockAdapter.send(req).await.unwrap();
        assert_eq!(res.content, "hello world");
        let usage = res.usage.unwrap();
        // "```\nhello world\n```" is 19 chars, "hello world" 11
        assert_eq!(usage.prompt_tokens, Some(5));
        assert_eq!(usage.completion_tokens, Some(3));
        assert_eq!(usage.total_tokens, Some(8));
    }
}
