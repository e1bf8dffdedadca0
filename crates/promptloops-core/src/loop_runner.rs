use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use promptloops_eval::{
    estimate_tokens, ErrorSummary, Evaluator, ExtractionResult, IterationRecord, Sample,
    SchemaDescriptor,
};
use promptloops_logging::{LogEvent, Logger, RunWriter};
use promptloops_mentor::{Mentor, PromptProposal, RefinementError, RefinementInput};
use promptloops_provider::{Provider, ProviderConfig};

use crate::error::LoopError;
use crate::outcome::{OptimizationOutcome, Termination};
use crate::{ExtractionAgent, LoopContext, OptimizerConfig};

/// Orchestrates extract → score → refine until the budget is spent
pub struct LoopRunner<'a> {
    agent: ExtractionAgent<'a>,
    mentor: Mentor<'a>,
    schema: &'a SchemaDescriptor,
    config: OptimizerConfig,
    agent_config: ProviderConfig,
    mentor_config: ProviderConfig,
    logger: Arc<Logger>,
    journal: Option<&'a RunWriter>,
}

impl<'a> LoopRunner<'a> {
    pub fn new(
        agent_provider: &'a dyn Provider,
        mentor_provider: &'a dyn Provider,
        schema: &'a SchemaDescriptor,
        config: OptimizerConfig,
        logger: Arc<Logger>,
    ) -> Result<Self, LoopError> {
        config.validate()?;
        Ok(Self {
            agent: ExtractionAgent::new(agent_provider, schema)?,
            mentor: Mentor::new(mentor_provider),
            schema,
            config,
            agent_config: ProviderConfig::default(),
            mentor_config: ProviderConfig::default(),
            logger,
            journal: None,
        })
    }

    pub fn with_agent_config(mut self, config: ProviderConfig) -> Self {
        self.agent_config = config;
        self
    }

    pub fn with_mentor_config(mut self, config: ProviderConfig) -> Self {
        self.mentor_config = config;
        self
    }

    /// Append each iteration to a run journal as soon as it is scored
    pub fn with_journal(mut self, journal: &'a RunWriter) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Run the loop. Without an initial prompt one is synthesized from the schema.
    pub async fn run(
        &self,
        samples: &[Sample],
        initial_prompt: Option<String>,
    ) -> Result<OptimizationOutcome, LoopError> {
        if samples.is_empty() {
            return Err(LoopError::EmptyDataset);
        }

        let prompt = initial_prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| self.schema.synthesize_prompt());
        let mut context = LoopContext::new(prompt, self.config.window_size);
        let evaluator = self.config.evaluator();

        self.logger.log(&LogEvent::RunStarted {
            samples: samples.len(),
            loop_count: self.config.loop_count,
            window_size: self.config.window_size,
            prompt_preview: context.current_prompt.chars().take(100).collect(),
        });

        let termination = loop {
            let iteration = context.iteration;
            let (record, provider_failures) =
                self.run_iteration(&context, samples, &evaluator).await;
            let accuracy = record.accuracy;
            if let Some(journal) = self.journal {
                journal.write_iteration(&record);
            }
            context.push_record(record);

            if provider_failures == samples.len() {
                self.logger.log(&LogEvent::ProviderUnavailable {
                    iteration,
                    failed_samples: provider_failures,
                });
                break Termination::ProviderUnavailable { iteration };
            }

            if accuracy >= 1.0 {
                info!(iteration, "Perfect accuracy reached");
                break Termination::PerfectScore;
            }

            if iteration >= self.config.loop_count {
                break Termination::Completed;
            }

            match self.refine(&context, iteration).await {
                Ok(proposal) => {
                    context.merge_notes(proposal.field_descriptions);
                    context.advance(proposal.prompt);
                }
                Err(error) => {
                    let error = error.to_string();
                    warn!(iteration, error = %error, "Refinement failed, stopping early");
                    self.logger.log(&LogEvent::RefinementFailed {
                        iteration,
                        error: error.clone(),
                    });
                    break Termination::RefinementUnavailable { iteration, error };
                }
            }
        };

        let duration = context.total_duration();
        let outcome = OptimizationOutcome::new(context.history, termination, duration);

        if let Some(journal) = self.journal {
            journal.write_end(
                outcome.termination.label(),
                outcome.iterations(),
                outcome.best().map(|r| (r.iteration, r.accuracy)),
                outcome.total_duration_secs,
            );
        }

        if let Some(best) = outcome.best() {
            self.logger.log(&LogEvent::RunCompleted {
                iterations: outcome.iterations(),
                best_iteration: best.iteration,
                best_accuracy: best.accuracy,
                termination: outcome.termination.label().to_string(),
                duration_secs: outcome.total_duration_secs,
            });
        }

        Ok(outcome)
    }

    /// Extract every sample with the current prompt and score the results.
    /// Also returns how many samples failed at the provider.
    async fn run_iteration(
        &self,
        context: &LoopContext,
        samples: &[Sample],
        evaluator: &Evaluator,
    ) -> (IterationRecord, usize) {
        let iteration = context.iteration;
        let prompt = context.current_prompt.as_str();
        let notes = &context.field_notes;
        let started = Instant::now();

        self.logger.log(&LogEvent::IterationStarted {
            iteration,
            loop_count: self.config.loop_count,
            prompt_tokens: estimate_tokens(prompt),
        });

        debug!(iteration, samples = samples.len(), "Running extraction");
        let mut results: Vec<(usize, ExtractionResult)> = stream::iter(samples.iter().enumerate())
            .map(|(position, sample)| async move {
                let result = self
                    .agent
                    .extract(prompt, notes, &sample.input, &self.agent_config)
                    .await;
                (position, result)
            })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;
        results.sort_by_key(|(position, _)| *position);

        let mut provider_failures = 0;
        let mut failed = 0;
        for (position, result) in &results {
            if let Err(error) = result {
                failed += 1;
                if error.is_provider_failure() {
                    provider_failures += 1;
                }
                self.logger.log(&LogEvent::SampleFailed {
                    iteration,
                    sample_index: samples[*position].index,
                    error: error.to_string(),
                });
            }
        }

        self.logger.log(&LogEvent::ExtractionCompleted {
            iteration,
            succeeded: results.len() - failed,
            failed,
            duration_secs: started.elapsed().as_secs_f64(),
        });

        let evaluation = evaluator.score(
            results
                .iter()
                .map(|(position, result)| (result, &samples[*position])),
        );

        self.logger.log(&LogEvent::IterationScored {
            iteration,
            accuracy: evaluation.accuracy,
            correct_fields: evaluation.correct_fields,
            total_fields: evaluation.total_fields,
            top_errors: evaluation
                .summary
                .top_fields(self.config.top_errors)
                .into_iter()
                .map(|(field, count)| (field.to_string(), count))
                .collect(),
        });

        let record = IterationRecord {
            iteration,
            prompt: prompt.to_string(),
            accuracy: evaluation.accuracy,
            correct_fields: evaluation.correct_fields,
            total_fields: evaluation.total_fields,
            prompt_tokens: estimate_tokens(prompt),
            errors: evaluation.summary,
            field_notes: notes.clone(),
            duration_secs: started.elapsed().as_secs_f64(),
            timestamp: Utc::now(),
        };

        (record, provider_failures)
    }

    /// Ask the mentor for the next prompt and its field notes
    async fn refine(
        &self,
        context: &LoopContext,
        iteration: usize,
    ) -> Result<PromptProposal, RefinementError> {
        let no_errors = ErrorSummary::default();
        let summary = context
            .history
            .last()
            .map(|record| &record.errors)
            .unwrap_or(&no_errors);

        self.logger.log(&LogEvent::MentorStarted { iteration });
        let started = Instant::now();

        let input = RefinementInput {
            current_prompt: &context.current_prompt,
            history: &context.window,
            summary,
            schema: self.schema,
            top_errors: self.config.top_errors,
            iteration,
        };
        let proposal = self.mentor.refine(input, &self.mentor_config).await?;

        self.logger.log(&LogEvent::MentorCompleted {
            iteration,
            summary: proposal.short_description(),
            duration_secs: started.elapsed().as_secs_f64(),
        });
        if !proposal.reasoning.is_empty() {
            debug!(iteration, reasoning = %proposal.reasoning, "Mentor reasoning");
        }

        Ok(proposal)
    }
}
