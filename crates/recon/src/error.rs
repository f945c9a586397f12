use thiserror::Error;

use crate::pipeline::Stage;

#[derive(Debug, Error)]
pub enum LinkError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty signature, unknown encoding, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Required column missing or misnamed in an input table.
    #[error("table '{table}': missing column '{column}'")]
    Schema { table: String, column: String },
    /// Pipeline step invoked out of order.
    #[error("pipeline step out of order: expected stage {expected}, pipeline is at {actual}")]
    Sequence { expected: Stage, actual: Stage },
}

impl LinkError {
    pub fn schema(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            column: column.into(),
        }
    }
}
