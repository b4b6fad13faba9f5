use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Verdict;

/// Instructions sent with every evaluation. The JSON keys here are the wire
/// names `Verdict` decodes.
pub const SYSTEM_PROMPT: &str = "\
Role: Act as a Strategic Career Coach & Technical Recruiter specializing in US immigration for tech.
Context: The candidate's resume is given under RESUME. The candidate is an international student \
and cannot take roles restricted to citizens or clearance holders.
Task: Analyze the JOB DESCRIPTION against the resume.
Return a JSON object with exactly these keys:
1. \"verdict\": one of \"APPLY (Long-Term)\", \"APPLY (Resume Builder)\", \"STOP\".
2. \"reasoning\": brief explanation.
3. \"compatibility_score\": integer 0-100.
4. \"optimized_summary\": rewritten professional summary for this role.
5. \"tailored_bullets\": array of 3 rewritten resume bullets.
6. \"cover_letter_hook\": 2-sentence LinkedIn message to the hiring team.
7. \"company_name\": the hiring company's name.
Output Format: JSON ONLY.";

/// Some creativity for the generated content; determinism is not required.
pub const TEMPERATURE: f64 = 0.7;
/// Descriptions shorter than this are scraper failures, not postings.
pub const MIN_DESCRIPTION_LEN: usize = 50;
const MAX_TOKENS: u32 = 2048;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Response is not valid verdict JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Verdict failed validation: {0}")]
    Schema(String),

    #[error("Model returned empty content")]
    EmptyContent,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Ask the provider for a JSON object, where it supports that.
    pub json_output: bool,
}

// --- Provider trait ---

pub trait AIProvider {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, EvaluationError>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAI,
}

impl ProviderKind {
    pub fn api_key_var(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAI => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    let (provider, model_id, short_name) = match name {
        // OpenAI (requires OPENAI_API_KEY)
        "gpt-4-turbo" | "gpt4" => (ProviderKind::OpenAI, "gpt-4-turbo", "gpt-4-turbo"),
        "gpt-4o" => (ProviderKind::OpenAI, "gpt-4o", "gpt-4o"),
        "gpt-4o-mini" => (ProviderKind::OpenAI, "gpt-4o-mini", "gpt-4o-mini"),
        // Anthropic (requires ANTHROPIC_API_KEY)
        "api-sonnet" | "sonnet" => (
            ProviderKind::Anthropic,
            "claude-sonnet-4-5-20250929",
            "api-sonnet",
        ),
        "api-haiku" | "haiku" => (
            ProviderKind::Anthropic,
            "claude-haiku-4-5-20251001",
            "api-haiku",
        ),
        _ => {
            return Err(anyhow!(
                "Unknown model '{}'. Available: gpt-4-turbo (default), gpt-4o, gpt-4o-mini, \
                 api-sonnet, api-haiku",
                name
            ));
        }
    };

    Ok(ModelSpec {
        provider,
        model_id: model_id.to_string(),
        short_name: short_name.to_string(),
    })
}

pub fn create_provider(spec: &ModelSpec, api_key: &str) -> Box<dyn AIProvider> {
    match spec.provider {
        ProviderKind::Anthropic => Box::new(AnthropicProvider::new(
            api_key.to_string(),
            spec.model_id.clone(),
        )),
        ProviderKind::OpenAI => Box::new(OpenAIProvider::new(
            api_key.to_string(),
            spec.model_id.clone(),
        )),
    }
}

/// Turns a non-2xx response into an `Api` error, keeping the body for the log.
fn api_error(response: reqwest::blocking::Response) -> EvaluationError {
    let status = response.status().as_u16();
    let message = response.text().unwrap_or_default();
    EvaluationError::Api { status, message }
}

// --- Anthropic provider ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug)]
pub struct AnthropicProvider {
    api_key: String,
    model_id: String,
    base_url: String,
    client: reqwest::blocking::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model_id: String) -> Self {
        let client = reqwest::blocking::Client::new();
        Self {
            api_key,
            model_id,
            base_url: ANTHROPIC_API_URL.to_string(),
            client,
        }
    }

    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

impl AIProvider for AnthropicProvider {
    // The messages API has no JSON mode; the system prompt carries the format.
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, EvaluationError> {
        let body = AnthropicRequest {
            model: &self.model_id,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: request.user,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()?;

        if !response.status().is_success() {
            return Err(api_error(response));
        }

        let api_response: AnthropicResponse = response.json()?;

        api_response
            .content
            .into_iter()
            .find(|block| block.content_type == "text")
            .and_then(|block| block.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(EvaluationError::EmptyContent)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com";

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<OpenAIMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug)]
pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    base_url: String,
    client: reqwest::blocking::Client,
}

impl OpenAIProvider {
    pub fn new(api_key: String, model_id: String) -> Self {
        let client = reqwest::blocking::Client::new();
        Self {
            api_key,
            model_id,
            base_url: OPENAI_API_URL.to_string(),
            client,
        }
    }

    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

impl AIProvider for OpenAIProvider {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, EvaluationError> {
        let body = OpenAIRequest {
            model: &self.model_id,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![
                OpenAIMessage {
                    role: "system",
                    content: request.system,
                },
                OpenAIMessage {
                    role: "user",
                    content: request.user,
                },
            ],
            response_format: request.json_output.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()?;

        if !response.status().is_success() {
            return Err(api_error(response));
        }

        let api_response: OpenAIResponse = response.json()?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(EvaluationError::EmptyContent)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Evaluation ---

/// False for the placeholders scrapers produce when a site hides the posting
/// body: nothing, the literal `nan`, or a stub under `MIN_DESCRIPTION_LEN` chars.
pub fn has_usable_text(description: &str) -> bool {
    let text = description.trim();
    !(text.is_empty()
        || text.eq_ignore_ascii_case("nan")
        || text.chars().count() < MIN_DESCRIPTION_LEN)
}

/// Scores one posting against the resume.
///
/// Unusable descriptions short-circuit to a STOP verdict without a model call.
/// Anything that goes wrong talking to the model, or decoding what it said,
/// comes back as an `EvaluationError` so callers can tell it apart from a STOP.
pub fn evaluate(
    provider: &dyn AIProvider,
    resume: &str,
    description: &str,
) -> Result<Verdict, EvaluationError> {
    if !has_usable_text(description) {
        return Ok(Verdict::insufficient_text());
    }

    let user = format!("RESUME:\n{}\n\nJOB DESCRIPTION:\n{}", resume, description);
    let request = CompletionRequest {
        system: SYSTEM_PROMPT,
        user: &user,
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
        json_output: true,
    };

    debug!(model = provider.model_name(), "requesting verdict");
    let raw = provider.complete(&request)?;
    parse_verdict(&raw)
}

/// Decodes model output into a `Verdict`, tolerating a surrounding code fence.
pub fn parse_verdict(raw: &str) -> Result<Verdict, EvaluationError> {
    let body = json_body(raw);
    if body.is_empty() {
        return Err(EvaluationError::EmptyContent);
    }

    let verdict: Verdict = serde_json::from_str(body)?;

    if verdict.compatibility_score > 100 {
        return Err(EvaluationError::Schema(format!(
            "compatibility_score {} is outside 0-100",
            verdict.compatibility_score
        )));
    }
    if verdict.decision.is_apply() && verdict.tailored_bullets.len() != 3 {
        warn!(
            bullets = verdict.tailored_bullets.len(),
            "expected 3 tailored bullets"
        );
    }

    Ok(verdict)
}

fn json_body(raw: &str) -> &str {
    let trimmed = raw.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}
