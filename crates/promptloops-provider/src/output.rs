use std::time::Duration;

/// Raw reply captured from a provider call
#[derive(Debug, Clone)]
pub struct ProviderOutput {
    /// Reply text
    pub text: String,
    /// Diagnostic output, if any
    pub stderr: String,
    /// Duration of the call
    pub duration: Duration,
}

impl ProviderOutput {
    pub fn new(text: String, stderr: String, duration: Duration) -> Self {
        Self {
            text,
            stderr,
            duration,
        }
    }

    /// Convenience for in-memory providers
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(text.into(), String::new(), Duration::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
