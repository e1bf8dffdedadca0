mod config;
mod context;
mod error;
mod extractor;
mod loop_runner;
mod outcome;

pub use config::OptimizerConfig;
pub use context::LoopContext;
pub use error::LoopError;
pub use extractor::ExtractionAgent;
pub use loop_runner::LoopRunner;
pub use outcome::{OptimizationOutcome, RunMetrics, Termination};
