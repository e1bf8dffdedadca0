use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::ProviderOutput;

/// Errors that can occur while calling a model provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to spawn provider process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Provider not found at path: {0}")]
    NotFound(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider rate limited the request: {0}")]
    RateLimited(String),

    #[error("Network error talking to provider: {0}")]
    Network(String),

    #[error("Provider returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider execution failed: {0}")]
    ExecutionFailed(String),
}

impl ProviderError {
    /// Classify a failed call from whatever the provider printed on stderr.
    pub fn classify(exit_code: i32, stderr: &str) -> Self {
        let lower = stderr.to_lowercase();
        let detail = if stderr.trim().is_empty() {
            format!("exited with code {}", exit_code)
        } else {
            stderr.trim().lines().last().unwrap_or_default().to_string()
        };

        if lower.contains("rate limit") || lower.contains("429") || lower.contains("too many requests") {
            ProviderError::RateLimited(detail)
        } else if lower.contains("connection")
            || lower.contains("network")
            || lower.contains("dns")
            || lower.contains("unreachable")
        {
            ProviderError::Network(detail)
        } else {
            ProviderError::ExecutionFailed(detail)
        }
    }
}

/// Configuration for a provider call
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Working directory for the provider process
    pub working_dir: PathBuf,
    /// Per-call timeout (None = no limit)
    pub timeout: Option<Duration>,
    /// Model to use (if provider supports it)
    pub model: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout: None,
            model: None,
        }
    }
}

impl ProviderConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }
}

/// A chat-style request: system instructions plus one user turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub system: String,
    pub user: String,
}

impl PromptContext {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Flatten into a single prompt for providers without a system channel
    pub fn render(&self) -> String {
        if self.system.is_empty() {
            self.user.clone()
        } else {
            format!("{}\n\n---\n\n{}", self.system, self.user)
        }
    }
}

/// Supported provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    ClaudeCode,
    OpenCode,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::ClaudeCode => write!(f, "claude-code"),
            ProviderType::OpenCode => write!(f, "opencode"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "claude-code" | "claudecode" => Ok(ProviderType::ClaudeCode),
            "opencode" | "open-code" => Ok(ProviderType::OpenCode),
            _ => Err(format!("Unknown provider type: {}", s)),
        }
    }
}

/// The model-calling seam shared by the extraction agent and the mentor
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable name of the provider (e.g., "Claude Code")
    fn name(&self) -> &str;

    /// The provider type
    fn provider_type(&self) -> ProviderType;

    /// Send one request and return the raw reply text
    async fn call(
        &self,
        context: &PromptContext,
        config: &ProviderConfig,
    ) -> Result<ProviderOutput, ProviderError>;

    /// Check if the provider is usable on this system
    async fn is_available(&self) -> bool;

    /// Get the path to the provider binary
    fn binary_path(&self) -> &Path;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_from_str() {
        assert_eq!("claude".parse::<ProviderType>(), Ok(ProviderType::ClaudeCode));
        assert_eq!("Claude-Code".parse::<ProviderType>(), Ok(ProviderType::ClaudeCode));
        assert_eq!("opencode".parse::<ProviderType>(), Ok(ProviderType::OpenCode));
        assert!("gemini".parse::<ProviderType>().is_err());
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = ProviderError::classify(1, "Error: 429 Too Many Requests");
        assert!(matches!(err, ProviderError::RateLimited(_)));
    }

    #[test]
    fn test_classify_network() {
        let err = ProviderError::classify(1, "request failed: connection reset by peer");
        assert!(matches!(err, ProviderError::Network(_)));
    }

    #[test]
    fn test_classify_generic_failure_uses_exit_code() {
        match ProviderError::classify(7, "  ") {
            ProviderError::ExecutionFailed(msg) => assert!(msg.contains('7')),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_prompt_context_render() {
        let ctx = PromptContext::new("be precise", "extract this");
        let rendered = ctx.render();
        assert!(rendered.starts_with("be precise"));
        assert!(rendered.ends_with("extract this"));

        let bare = PromptContext::new("", "only user");
        assert_eq!(bare.render(), "only user");
    }
}
