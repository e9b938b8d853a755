use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Flat file error: {0}")]
    FlatFile(#[from] csv::Error),

    #[error("Matrix shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Clustering error: {0}")]
    Clustering(#[from] linfa_clustering::KMeansError),

    #[error("Matrix of order {order} is singular")]
    SingularMatrix { order: usize },

    #[error("Factor fit diverged: non-finite log-likelihood at iteration {iteration}")]
    NonFiniteLikelihood { iteration: usize },

    #[error("Shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Run '{run_id}' not found")]
    UnknownRun { run_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SegResult<T> = Result<T, SegError>;
