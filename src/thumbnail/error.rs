/// Error taxonomy for the thumbnail pipeline
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThumbnailError {
    #[error("URL is empty")]
    InvalidUrl,

    #[error("capture surface returned no image data for {0}")]
    CaptureFailed(String),

    #[error("capture surface did not open and load within {0} ms")]
    LoadTimedOut(u32),

    #[error("capture was cancelled")]
    Cancelled,

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("storage error: {0}")]
    Store(String),

    #[error("host error: {0}")]
    Host(String),
}

impl From<image::ImageError> for ThumbnailError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Encoding(e) => ThumbnailError::Encode(e.to_string()),
            other => ThumbnailError::Decode(other.to_string()),
        }
    }
}

impl From<base64::DecodeError> for ThumbnailError {
    fn from(err: base64::DecodeError) -> Self {
        ThumbnailError::Decode(err.to_string())
    }
}
