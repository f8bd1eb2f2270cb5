// error.rs — 错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("failed to read tour source: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid tour source: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no scene with id `{0}`")]
    SceneNotFound(String),

    #[error("tour source contains no scenes")]
    EmptyTour,

    #[error("no scene is currently attached")]
    NoActiveScene,

    #[error("picking ray has no direction")]
    DegenerateRay,

    #[error("viewport has zero area")]
    EmptyViewport,

    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, ViewerError>;
