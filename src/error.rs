use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForensicsError {
    #[error("Image loading error: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Dimension mismatch: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Degenerate line (theta = {theta}, length = {length}) cannot normalise a distance")]
    DegenerateLine { theta: f64, length: f64 },

    #[error("Point ({x}, {y}) is not an endpoint of its line")]
    PointNotInLine { x: i32, y: i32 },
}

pub type Result<T> = std::result::Result<T, ForensicsError>;
