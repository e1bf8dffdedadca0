use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::{
    ProcessSpawner, PromptContext, Provider, ProviderConfig, ProviderError, ProviderOutput,
    ProviderType,
};

/// OpenCode CLI used as a plain completion endpoint
pub struct OpenCodeProvider {
    binary_path: PathBuf,
}

impl OpenCodeProvider {
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from("opencode"),
        }
    }

    pub fn with_binary_path(path: PathBuf) -> Self {
        Self { binary_path: path }
    }
}

impl Default for OpenCodeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for OpenCodeProvider {
    fn name(&self) -> &str {
        "OpenCode"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenCode
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
            prompt_len = context.system.len() + context.user.len(),
            "Calling provider"
        );

        // No system channel on `run`; send the flattened conversation
        let prompt = context.render();
        let args = run_args(&prompt, config.model.as_deref());

        let output = ProcessSpawner::spawn(&self.binary_path, &args, config).await?;
        if output.is_empty() {
            return Err(ProviderError::InvalidResponse("empty reply".into()));
        }
        Ok(output)
    }
}

/// The prompt always goes through `--prompt` so leading dashes stay literal
fn run_args<'a>(prompt: &'a str, model: Option<&'a str>) -> Vec<&'a str> {
    let mut args = vec!["run"];
    if let Some(model) = model {
        args.push("--model");
        args.push(model);
    }
    args.push("--prompt");
    args.push(prompt);
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_pass_prompt_as_option_value() {
        assert_eq!(
            run_args("- extract the name", None),
            vec!["run", "--prompt", "- extract the name"]
        );
        assert_eq!(
            run_args("hi", Some("gpt-5")),
            vec!["run", "--model", "gpt-5", "--prompt", "hi"]
        );
    }
}
