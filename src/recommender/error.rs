use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecommenderError {
    #[error("Similarity training failed: {0:#}")]
    Training(anyhow::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
