/// Thumbnail capture-and-cache pipeline
pub mod compress;
pub mod error;
pub mod favicon;
pub mod pipeline;

pub use compress::{CompressionPolicy, Compressed, StopReason};
pub use error::ThumbnailError;
pub use pipeline::{
    CaptureOutcome, CaptureSource, KeyValueStore, SurfaceHandle, ThumbnailConfig, ThumbnailPipeline, Timer,
};
