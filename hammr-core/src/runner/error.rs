pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`vus` must be a positive integer")]
    InvalidVus,

    #[error("`iterations` must be a positive integer")]
    InvalidIterations,

    #[error("think time range is invalid: min must not exceed max")]
    InvalidThinkTime,

    #[error("either `duration` or `iterations` must bound the run")]
    MissingStopCondition,

    #[error("virtual user task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
