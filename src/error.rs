pub type Result<T> = std::result::Result<T, KpiError>;

#[derive(Debug, thiserror::Error)]
pub enum KpiError {
    #[error("not a number: {input:?}")]
    InvalidNumericInput { input: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl KpiError {
    pub(crate) fn invalid_numeric(input: &str) -> Self {
        KpiError::InvalidNumericInput {
            input: input.to_string(),
        }
    }
}
