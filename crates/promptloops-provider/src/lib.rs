mod claude;
mod opencode;
mod output;
mod spawner;
mod traits;

pub use claude::ClaudeCodeProvider;
pub use opencode::OpenCodeProvider;
pub use output::ProviderOutput;
pub use spawner::ProcessSpawner;
pub use traits::{PromptContext, Provider, ProviderConfig, ProviderError, ProviderType};

/// Create a provider by type
pub fn create_provider(provider_type: ProviderType) -> Box<dyn Provider> {
    match provider_type {
        ProviderType::ClaudeCode => Box::new(ClaudeCodeProvider::new()),
        ProviderType::OpenCode => Box::new(OpenCodeProvider::new()),
    }
}
