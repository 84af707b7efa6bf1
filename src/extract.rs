//! Task extraction: free-form notes in, task drafts out.
//!
//! The [`Extractor`] trait is the seam the board depends on. The one real
//! implementation, [`OpenAiExtractor`], asks an OpenAI model to pull
//! action items out of meeting notes and parses its JSON reply.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::model::Draft;

const SYSTEM_PROMPT: &str = "Read the notes below and extract a to-do list. \
    Treat any sentence that commits someone to a future action (\"I'll check\", \
    \"we should\", \"I need to\", ...) as a task. Reply with a JSON object \
    holding a `tasks` array. Each task has:\n\
    * `description`: a short summary\n\
    * `priority`: one of high, medium, low\n\
    * `assignee`: the person responsible, when the notes name one\n\n\
    Reply with JSON only.";

/// Errors that can occur while extracting tasks.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("no API key: set OPENAI_API_KEY or `api-key` under [extractor] in the config")]
    MissingApiKey,

    #[error("extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extraction service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("extraction service returned no text")]
    EmptyResponse,

    #[error("malformed extraction output: {0}")]
    Malformed(String),
}

/// Turns raw text into task drafts.
///
/// Blank input must yield an empty list. Failures must not have side
/// effects: callers treat any error as "nothing was extracted".
pub trait Extractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<Vec<Draft>, ExtractionError>;
}

/// Settings for [`OpenAiExtractor`].
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub api_key: String,
    /// Defaults to `https://api.openai.com`.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    /// Bound on the whole request, connect to last byte.
    pub timeout: Duration,
    /// Ask the service to retain the response on its side.
    pub store: bool,
}

impl ExtractorConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";
    pub const DEFAULT_MODEL: &'static str = "gpt-4.1-mini";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.into(),
            model: Self::DEFAULT_MODEL.into(),
            temperature: 1.0,
            top_p: 1.0,
            max_output_tokens: 2048,
            timeout: Self::DEFAULT_TIMEOUT,
            store: true,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_store(mut self, store: bool) -> Self {
        self.store = store;
        self
    }
}

/// Extractor backed by the OpenAI Responses API.
pub struct OpenAiExtractor {
    config: ExtractorConfig,
    client: reqwest::blocking::Client,
}

impl OpenAiExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, ExtractionError> {
        if config.api_key.trim().is_empty() {
            return Err(ExtractionError::MissingApiKey);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("todo-ai/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/responses", self.config.base_url.trim_end_matches('/'))
    }

    fn request(&self, text: &str) -> Result<String, ExtractionError> {
        let body = json!({
            "model": self.config.model,
            "input": [
                {
                    "role": "system",
                    "content": [{ "type": "input_text", "text": SYSTEM_PROMPT }],
                },
                {
                    "role": "user",
                    "content": [{ "type": "input_text", "text": text }],
                },
            ],
            "text": { "format": { "type": "text" } },
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "max_output_tokens": self.config.max_output_tokens,
            "reasoning": {},
            "tools": [],
            "store": self.config.store,
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().map_err(|e| self.classify(e))?;
        if !status.is_success() {
            return Err(ExtractionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn classify(&self, err: reqwest::Error) -> ExtractionError {
        if err.is_timeout() {
            ExtractionError::Timeout(self.config.timeout)
        } else {
            ExtractionError::Http(err)
        }
    }
}

impl Extractor for OpenAiExtractor {
    fn extract(&self, text: &str) -> Result<Vec<Draft>, ExtractionError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.config.model, chars = text.len(), "requesting extraction");
        let body = self.request(text)?;
        let reply = assistant_text(&body)?;
        let drafts = parse_drafts(&reply).inspect_err(|e| {
            warn!(error = %e, "model reply was not a task list");
        })?;
        debug!(count = drafts.len(), "extracted drafts");
        Ok(drafts)
    }
}

// ── Response unwrapping ──

/// The parts of a Responses API (or Chat Completions) reply we read.
#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the assistant's text out of a raw API reply.
///
/// Joins every `output[].content[].text`; falls back to
/// `choices[0].message.content` for chat-completions shaped replies.
fn assistant_text(body: &str) -> Result<String, ExtractionError> {
    let response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| ExtractionError::Malformed(format!("unexpected response shape: {e}")))?;

    let chunks: Vec<&str> = response
        .output
        .iter()
        .flat_map(|item| &item.content)
        .filter_map(|part| part.text.as_deref())
        .collect();

    let text = if chunks.is_empty() {
        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or(ExtractionError::EmptyResponse)?
    } else {
        chunks.join("\n")
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }
    Ok(text.to_string())
}

// ── Payload parsing ──

#[derive(Deserialize)]
#[serde(untagged)]
enum TaskList {
    Bare(Vec<Draft>),
    Wrapped { tasks: Vec<Draft> },
}

/// Parse a model reply into drafts.
///
/// Accepts a bare JSON array or an object with a `tasks` array, optionally
/// wrapped in a Markdown code fence.
pub fn parse_drafts(reply: &str) -> Result<Vec<Draft>, ExtractionError> {
    let cleaned = strip_fences(reply);
    if cleaned.is_empty() {
        return Err(ExtractionError::Malformed("empty reply".into()));
    }

    match serde_json::from_str(cleaned) {
        Ok(TaskList::Bare(drafts) | TaskList::Wrapped { tasks: drafts }) => Ok(drafts),
        Err(_) => Err(ExtractionError::Malformed(format!(
            "expected a JSON array of tasks or an object with a `tasks` array, got: {}",
            preview(cleaned)
        ))),
    }
}

/// Remove a surrounding ```` ``` ```` or ```` ```json ```` fence.
fn strip_fences(reply: &str) -> &str {
    let mut s = reply.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

fn preview(s: &str) -> String {
    const MAX: usize = 80;
    match s.char_indices().nth(MAX) {
        Some((end, _)) => format!("{}…", &s[..end]),
        None => s.to_string(),
    }
}
