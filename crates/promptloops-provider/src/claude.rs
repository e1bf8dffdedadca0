use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::{
    ProcessSpawner, PromptContext, Provider, ProviderConfig, ProviderError, ProviderOutput,
    ProviderType,
};

/// Claude Code CLI used as a plain completion endpoint
pub struct ClaudeCodeProvider {
    binary_path: PathBuf,
}

impl ClaudeCodeProvider {
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from("claude"),
        }
    }

    pub fn with_binary_path(path: PathBuf) -> Self {
        Self { binary_path: path }
    }
}

impl Default for ClaudeCodeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for ClaudeCodeProvider {
    fn name(&self) -> &str {
        "Claude Code"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::ClaudeCode
    }

    fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn call(
        &self,
        context: &PromptContext,
        config: &ProviderConfig,
    ) -> Result<ProviderOutput, ProviderError> {
        debug!(
            provider = self.name(),
            system_len = context.system.len(),
            user_len = context.user.len(),
            "Calling provider"
        );

        // Print mode, no tools: the reply is the completion text
        let mut args = vec!["--print", "--output-format", "text"];

        if !context.system.is_empty() {
            args.push("--system-prompt");
            args.push(&context.system);
        }

        let model_arg;
        if let Some(ref model) = config.model {
            args.push("--model");
            model_arg = model.clone();
            args.push(&model_arg);
        }

        // -- keeps a user turn starting with '-' from being read as an option
        args.push("--");
        args.push(&context.user);

        let output = ProcessSpawner::spawn(&self.binary_path, &args, config).await?;
        if output.is_empty() {
            return Err(ProviderError::InvalidResponse("empty reply".into()));
        }
        Ok(output)
    }
}
