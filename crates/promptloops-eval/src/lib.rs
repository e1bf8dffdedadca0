//! # promptloops-eval
//!
//! Scoring side of the prompt optimization loop.
//!
//! ## Key Types
//!
//! - [`Sample`] - An input with its ground-truth field mapping
//! - [`SchemaDescriptor`] - Caller-supplied target fields
//! - [`Evaluator`] - Field-level accuracy and error aggregation
//! - [`ErrorSummary`] - Per-field mismatch counts plus a bounded set of examples
//! - [`IterationRecord`] / [`HistoryWindow`] - What the mentor sees of past iterations
//!
//! Nothing in this crate calls a model; scoring is a pure function of the
//! extraction results it is handed.

mod dataset;
mod error;
mod evaluator;
mod history;
mod matching;
mod reply;
mod sample;
mod schema;
mod summary;
mod tokens;

pub use dataset::{load_samples, DatasetError};
pub use error::{ExtractionError, ExtractionResult};
pub use evaluator::{Evaluation, Evaluator};
pub use history::{select_best, HistoryWindow, IterationRecord};
pub use matching::MatchPolicy;
pub use reply::extract_json_object;
pub use sample::{FieldMap, Sample};
pub use schema::{FieldKind, FieldSpec, SchemaDescriptor, SchemaError, SchemaValidator};
pub use summary::{ErrorSummary, FieldError, FieldErrorKind};
pub use tokens::estimate_tokens;
