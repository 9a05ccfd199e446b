//! Ollama client for the text-completion calls behind every lookup.
//!
//! The model is used for:
//! - Concept extraction from the project description
//! - Survey, seminal-work, ranking, relevance and foundational-topic lookups
//! - Wikipedia article analysis
//!
//! Everything downstream only sees the [`TextModel`] trait, so tests swap in
//! scripted models without a server.

use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the LLM subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("Ollama is not available at {url}")]
    #[diagnostic(
        code(prereq::llm::unavailable),
        help("Start Ollama with `ollama serve`, or point `[model] base_url` at a running server.")
    )]
    Unavailable { url: String },

    #[error("Ollama request failed: {message}")]
    #[diagnostic(
        code(prereq::llm::request_failed),
        help("Check that Ollama is running and the model is pulled.")
    )]
    RequestFailed { message: String },

    #[error("Failed to parse Ollama response: {message}")]
    #[diagnostic(
        code(prereq::llm::parse_error),
        help("The server returned an unexpected response format.")
    )]
    ParseError { message: String },

    #[error("Ollama request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(prereq::llm::timeout),
        help("Increase `[model] timeout_secs` or use a smaller model.")
    )]
    Timeout { timeout_secs: u64 },
}

/// Anything that turns a system prompt plus a user prompt into text.
///
/// Implementations must be shareable across the worker pool.
pub trait TextModel: Send + Sync {
    fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

impl<T: TextModel + ?Sized> TextModel for &T {
    fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        (**self).complete(system, prompt)
    }
}

impl<T: TextModel + ?Sized> TextModel for std::sync::Arc<T> {
    fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        (**self).complete(system, prompt)
    }
}

/// Configuration for the Ollama client (`[model]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL for the Ollama API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name to use.
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f64,
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "llama3.2".into()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            temperature: 0.0,
        }
    }
}

/// Client for the Ollama REST API.
pub struct OllamaClient {
    config: ModelConfig,
    agent: ureq::Agent,
    available: bool,
    /// Models available locally after `probe()`.
    available_models: Vec<String>,
}

impl OllamaClient {
    /// Create a new Ollama client with the given configuration.
    pub fn new(config: ModelConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            config,
            agent,
            available: false,
            available_models: Vec::new(),
        }
    }

    /// Probe the Ollama server to check availability.
    ///
    /// Sends a lightweight request to the `/api/tags` endpoint and
    /// parses the list of locally available models.
    pub fn probe(&mut self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();

        match agent.get(&url).call() {
            Ok(resp) => {
                if resp.status() != 200 {
                    self.available = false;
                    return false;
                }
                self.available = true;

                if let Ok(body) = resp.into_string() {
                    if let Ok(json) = serde_json::from_str::<serde_json::Value>(&body) {
                        self.available_models = json["models"]
                            .as_array()
                            .map(|arr| {
                                arr.iter()
                                    .filter_map(|m| m["name"].as_str().map(|s| s.to_string()))
                                    .collect()
                            })
                            .unwrap_or_default();
                    }
                }

                true
            }
            Err(_) => {
                self.available = false;
                self.available_models.clear();
                false
            }
        }
    }

    /// Whether the configured model is locally available.
    pub fn has_model(&self) -> bool {
        let target = &self.config.model;
        self.available_models
            .iter()
            .any(|m| m == target || m.split(':').next() == Some(target))
    }

    /// Whether the Ollama server answered the last probe.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Generate a completion from a prompt.
    pub fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, LlmError> {
        if !self.available {
            return Err(LlmError::Unavailable {
                url: self.config.base_url.clone(),
            });
        }

        let url = format!("{}/api/generate", self.config.base_url);

        let mut body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.config.temperature },
        });

        if let Some(sys) = system {
            body["system"] = serde_json::Value::String(sys.to_string());
        }

        let resp = self
            .agent
            .post(&url)
            .send_json(body)
            .map_err(|e| send_error(e, self.config.timeout_secs))?;

        let json: serde_json::Value = resp.into_json().map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;

        json["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::ParseError {
                message: "missing 'response' field".into(),
            })
    }

    /// Get the model name being used.
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

impl TextModel for OllamaClient {
    fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        self.generate(prompt, Some(system))
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("available", &self.available)
            .finish()
    }
}

/// Only an I/O error that is actually a timeout becomes [`LlmError::Timeout`].
fn send_error(err: ureq::Error, timeout_secs: u64) -> LlmError {
    match &err {
        ureq::Error::Transport(t)
            if t.kind() == ureq::ErrorKind::Io && io_kind(t).is_some_and(is_timeout_kind) =>
        {
            LlmError::Timeout { timeout_secs }
        }
        _ => LlmError::RequestFailed {
            message: err.to_string(),
        },
    }
}

fn io_kind(transport: &ureq::Transport) -> Option<std::io::ErrorKind> {
    std::error::Error::source(transport)?
        .downcast_ref::<std::io::Error>()
        .map(std::io::Error::kind)
}

// Socket read timeouts surface as WouldBlock on Unix.
fn is_timeout_kind(kind: std::io::ErrorKind) -> bool {
    matches!(kind, std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock)
}

/// Locate the JSON object inside a free-text model reply.
///
/// Models are told to answer with bare JSON but regularly wrap it in code
/// fences or a sentence of preamble.
pub fn extract_json_object(reply: &str) -> Option<&str> {
    let trimmed = reply.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_unreachable_returns_false() {
        let config = ModelConfig {
            base_url: "http://127.0.0.1:1".into(), // unreachable port
            ..Default::default()
        };
        let mut client = OllamaClient::new(config);
        assert!(!client.probe());
        assert!(!client.is_available());
    }

    #[test]
    fn generate_when_unavailable_returns_error() {
        let client = OllamaClient::new(ModelConfig::default());
        let result = client.complete("You are a helpful assistant.", "test");
        assert!(matches!(result, Err(LlmError::Unavailable { .. })));
    }

    /// A client that skips the probe and talks to a local listener.
    fn client_for(listener: &std::net::TcpListener, timeout_secs: u64) -> OllamaClient {
        let config = ModelConfig {
            base_url: format!("http://{}", listener.local_addr().unwrap()),
            timeout_secs,
            ..Default::default()
        };
        OllamaClient {
            available: true,
            ..OllamaClient::new(config)
        }
    }

    #[test]
    fn dropped_connection_is_not_a_timeout() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = client_for(&listener, 30);
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });
        let result = client.complete("system", "prompt");
        server.join().unwrap();
        assert!(matches!(result, Err(LlmError::RequestFailed { .. })));
    }

    #[test]
    fn silent_server_is_a_timeout() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = client_for(&listener, 1);
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            std::thread::sleep(Duration::from_secs(3));
            drop(stream);
        });
        let result = client.complete("system", "prompt");
        server.join().unwrap();
        assert!(matches!(result, Err(LlmError::Timeout { timeout_secs: 1 })));
    }

    #[test]
    fn only_timeout_kinds_count_as_timeouts() {
        assert!(is_timeout_kind(std::io::ErrorKind::TimedOut));
        assert!(is_timeout_kind(std::io::ErrorKind::WouldBlock));
        assert!(!is_timeout_kind(std::io::ErrorKind::ConnectionReset));
        assert!(!is_timeout_kind(std::io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn default_config_values() {
        let config = ModelConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.temperature, 0.0);
    }

    #[test]
    fn extract_json_from_fenced_reply() {
        let reply = "```json\n{\"papers\": []}\n```";
        assert_eq!(extract_json_object(reply), Some("{\"papers\": []}"));
    }

    #[test]
    fn extract_json_rejects_plain_text() {
        assert_eq!(extract_json_object("no"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }
}
