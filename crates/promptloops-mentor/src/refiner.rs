use promptloops_eval::{ErrorSummary, HistoryWindow, SchemaDescriptor};
use promptloops_provider::{PromptContext, Provider, ProviderConfig};
use tracing::{debug, info, warn};

use crate::{MentorPrompts, PromptProposal, ProposalParseError};

/// Inputs required to propose the next prompt.
#[derive(Clone, Copy)]
pub struct RefinementInput<'a> {
    pub current_prompt: &'a str,
    pub history: &'a HistoryWindow,
    pub summary: &'a ErrorSummary,
    pub schema: &'a SchemaDescriptor,
    /// Field errors shown per history entry
    pub top_errors: usize,
    /// Iteration that produced `summary`
    pub iteration: usize,
}

/// Refinement invoker backed by a model provider
pub struct Mentor<'a> {
    provider: &'a dyn Provider,
}

impl<'a> Mentor<'a> {
    pub fn new(provider: &'a dyn Provider) -> Self {
        Self { provider }
    }

    /// Ask the mentor for a revised prompt. Field notes for fields outside the
    /// schema are dropped.
    pub async fn refine(
        &self,
        input: RefinementInput<'_>,
        config: &ProviderConfig,
    ) -> Result<PromptProposal, RefinementError> {
        let context = PromptContext::new(
            MentorPrompts::build_system_message(input.schema),
            MentorPrompts::build_refinement_prompt(
                input.current_prompt,
                input.history,
                input.summary,
                input.top_errors,
                input.iteration,
            ),
        );

        debug!(
            prompt_len = context.user.len(),
            iteration = input.iteration,
            window = input.history.len(),
            "Running mentor refinement"
        );

        let output = self
            .provider
            .call(&context, config)
            .await
            .map_err(|e| RefinementError::Unavailable(e.to_string()))?;

        info!(
            duration_secs = output.duration.as_secs_f64(),
            provider = self.provider.name(),
            "Mentor completed"
        );

        let mut proposal = PromptProposal::parse(&output.text)?;
        proposal.field_descriptions.retain(|field, _| {
            let known = input.schema.field(field).is_some();
            if !known {
                warn!(field = %field, "Dropping mentor note for unknown field");
            }
            known
        });

        Ok(proposal)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RefinementError {
    #[error("Mentor unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to parse mentor proposal: {0}")]
    InvalidProposal(#[from] ProposalParseError),
}
