use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Schema error: {0}")]
    Schema(#[from] promptloops_eval::SchemaError),
}
