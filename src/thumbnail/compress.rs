/// JPEG re-encoding to a byte-size target
///
/// The search starts at maximum quality and steps quality down until the
/// encoded payload fits the target (plus tolerance), quality hits the floor,
/// or the encoded size stops shrinking. It assumes size falls monotonically
/// with quality and stops as soon as that assumption breaks.
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

use super::error::ThumbnailError;

pub const JPEG_MIME: &str = "image/jpeg";

/// Size policy for the quality search. Qualities are integer percents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionPolicy {
    pub target_bytes: usize,
    pub tolerance_bytes: usize,
    pub start_quality: u8,
    pub quality_step: u8,
    pub min_quality: u8,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        CompressionPolicy {
            target_bytes: 100 * 1024,
            tolerance_bytes: 1024,
            start_quality: 100,
            quality_step: 5,
            min_quality: 10,
        }
    }
}

impl CompressionPolicy {
    /// Clamp a user-supplied policy into something the encoder accepts
    pub fn normalized(&self) -> CompressionPolicy {
        let min_quality = self.min_quality.clamp(1, 100);
        CompressionPolicy {
            start_quality: self.start_quality.clamp(min_quality, 100),
            quality_step: self.quality_step.max(1),
            min_quality,
            ..*self
        }
    }

    /// Upper bound on encoder invocations for this policy
    pub fn max_attempts(&self) -> usize {
        let p = self.normalized();
        let span = (p.start_quality - p.min_quality) as usize;
        span.div_ceil(p.quality_step as usize) + 1
    }

    pub fn size_limit(&self) -> usize {
        self.target_bytes.saturating_add(self.tolerance_bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    WithinTarget,
    QualityFloor,
    SizeIncreased,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    pub quality: u8,
    pub attempts: usize,
    pub reason: StopReason,
}

/// Something that can produce an encoded payload at a given quality
pub trait QualityEncoder {
    fn encode(&self, quality: u8) -> Result<Vec<u8>, ThumbnailError>;
}

/// Run the bounded quality search against `encoder`
pub fn compress<E>(encoder: &E, policy: &CompressionPolicy) -> Result<Compressed, ThumbnailError>
where
    E: QualityEncoder + ?Sized,
{
    let policy = policy.normalized();
    let limit = policy.size_limit();
    let max_attempts = policy.max_attempts();

    let mut quality = policy.start_quality;
    let mut previous: Option<(Vec<u8>, u8)> = None;

    for attempt in 1..=max_attempts {
        let bytes = encoder.encode(quality)?;
        log::debug!("quality {} -> {} bytes", quality, bytes.len());

        if let Some((prev_bytes, prev_quality)) = previous.take() {
            if bytes.len() >= prev_bytes.len() {
                return Ok(Compressed {
                    bytes: prev_bytes,
                    quality: prev_quality,
                    attempts: attempt,
                    reason: StopReason::SizeIncreased,
                });
            }
        }

        if bytes.len() <= limit {
            return Ok(Compressed {
                bytes,
                quality,
                attempts: attempt,
                reason: StopReason::WithinTarget,
            });
        }

        if quality <= policy.min_quality || attempt == max_attempts {
            return Ok(Compressed {
                bytes,
                quality,
                attempts: attempt,
                reason: StopReason::QualityFloor,
            });
        }

        previous = Some((bytes, quality));
        quality = quality
            .saturating_sub(policy.quality_step)
            .max(policy.min_quality);
    }

    Err(ThumbnailError::Encode("compression search made no attempts".to_string()))
}

/// A capture scaled onto the fixed thumbnail canvas, ready for JPEG encoding
pub struct JpegCanvas {
    canvas: RgbImage,
}

impl JpegCanvas {
    /// Decode raw capture bytes (PNG or any supported format) onto the canvas
    pub fn from_capture(raw: &[u8], width: u32, height: u32) -> Result<JpegCanvas, ThumbnailError> {
        let decoded = image::load_from_memory(raw)?;
        Ok(JpegCanvas::from_image(&decoded, width, height))
    }

    pub fn from_image(image: &DynamicImage, width: u32, height: u32) -> JpegCanvas {
        let rgb = image.to_rgb8();
        let canvas = if rgb.width() == width && rgb.height() == height {
            rgb
        } else {
            image::imageops::resize(&rgb, width, height, FilterType::Triangle)
        };
        JpegCanvas { canvas }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }
}

impl QualityEncoder for JpegCanvas {
    fn encode(&self, quality: u8) -> Result<Vec<u8>, ThumbnailError> {
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
        encoder.encode_image(&self.canvas)?;
        Ok(buf)
    }
}

pub fn to_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split a base64 `data:` URL into its mime type and decoded bytes
pub fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>), ThumbnailError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| ThumbnailError::Decode("not a data URL".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ThumbnailError::Decode("data URL has no payload".to_string()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| ThumbnailError::Decode("data URL is not base64".to_string()))?;

    Ok((mime.to_string(), STANDARD.decode(payload)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder, Rgb};
    use std::cell::RefCell;

    /// Encoder whose output size is a lookup on quality
    struct SizedEncoder {
        size_at: fn(u8) -> usize,
        calls: RefCell<Vec<u8>>,
    }

    impl SizedEncoder {
        fn new(size_at: fn(u8) -> usize) -> Self {
            SizedEncoder {
                size_at,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl QualityEncoder for SizedEncoder {
        fn encode(&self, quality: u8) -> Result<Vec<u8>, ThumbnailError> {
            self.calls.borrow_mut().push(quality);
            Ok(vec![0; (self.size_at)(quality)])
        }
    }

    fn noisy_image(width: u32, height: u32) -> RgbImage {
        let mut state: u32 = 0x9e37_79b9;
        RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [r, g, b, _] = state.to_le_bytes();
            Rgb([r, g, b])
        })
    }

    fn png_bytes(image: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8)
            .unwrap();
        buf
    }

    #[test]
    fn test_default_policy() {
        let policy = CompressionPolicy::default();
        assert_eq!(policy.target_bytes, 102_400);
        assert_eq!(policy.size_limit(), 103_424);
        assert_eq!(policy.max_attempts(), 19);
    }

    #[test]
    fn test_stops_immediately_when_small() {
        let encoder = SizedEncoder::new(|_| 10_000);
        let result = compress(&encoder, &CompressionPolicy::default()).unwrap();

        assert_eq!(result.reason, StopReason::WithinTarget);
        assert_eq!(result.quality, 100);
        assert_eq!(result.attempts, 1);
        assert_eq!(*encoder.calls.borrow(), vec![100]);
    }

    #[test]
    fn test_steps_down_until_within_target() {
        // 100 -> 300k, 95 -> 250k, 90 -> 200k, 85 -> 150k, 80 -> 100k
        let encoder = SizedEncoder::new(|q| (q as usize - 50) * 10_000 - 200_000);
        let result = compress(&encoder, &CompressionPolicy::default()).unwrap();

        assert_eq!(result.reason, StopReason::WithinTarget);
        assert_eq!(result.quality, 80);
        assert_eq!(result.bytes.len(), 100_000);
        assert_eq!(*encoder.calls.borrow(), vec![100, 95, 90, 85, 80]);
    }

    #[test]
    fn test_tolerance_counts_as_within_target() {
        let encoder = SizedEncoder::new(|_| 102_400 + 1000);
        let result = compress(&encoder, &CompressionPolicy::default()).unwrap();
        assert_eq!(result.reason, StopReason::WithinTarget);
        assert_eq!(result.attempts, 1);
    }

    #[test]
    fn test_bottoms_out_at_quality_floor() {
        let encoder = SizedEncoder::new(|q| 500_000 + q as usize * 1000);
        let policy = CompressionPolicy::default();
        let result = compress(&encoder, &policy).unwrap();

        assert_eq!(result.reason, StopReason::QualityFloor);
        assert_eq!(result.quality, 10);
        assert_eq!(result.attempts, policy.max_attempts());
    }

    #[test]
    fn test_size_increase_returns_previous_payload() {
        // Shrinks until 90, then grows again at 85
        let encoder = SizedEncoder::new(|q| if q >= 90 { q as usize * 3000 } else { 400_000 });
        let result = compress(&encoder, &CompressionPolicy::default()).unwrap();

        assert_eq!(result.reason, StopReason::SizeIncreased);
        assert_eq!(result.quality, 90);
        assert_eq!(result.bytes.len(), 270_000);
        assert_eq!(result.attempts, 4);
    }

    #[test]
    fn test_equal_size_counts_as_increase() {
        let encoder = SizedEncoder::new(|_| 200_000);
        let result = compress(&encoder, &CompressionPolicy::default()).unwrap();
        assert_eq!(result.reason, StopReason::SizeIncreased);
        assert_eq!(result.quality, 100);
        assert_eq!(result.attempts, 2);
    }

    #[test]
    fn test_uneven_step_still_reaches_floor() {
        let policy = CompressionPolicy {
            quality_step: 20,
            ..CompressionPolicy::default()
        };
        let encoder = SizedEncoder::new(|q| 300_000 + q as usize);
        let result = compress(&encoder, &policy).unwrap();

        assert_eq!(*encoder.calls.borrow(), vec![100, 80, 60, 40, 20, 10]);
        assert_eq!(result.quality, 10);
        assert_eq!(result.attempts, policy.max_attempts());
    }

    #[test]
    fn test_normalized_policy_fixes_zero_step() {
        let policy = CompressionPolicy {
            quality_step: 0,
            min_quality: 0,
            start_quality: 120,
            ..CompressionPolicy::default()
        }
        .normalized();

        assert_eq!(policy.quality_step, 1);
        assert_eq!(policy.min_quality, 1);
        assert_eq!(policy.start_quality, 100);
    }

    #[test]
    fn test_encoder_error_propagates() {
        struct Broken;
        impl QualityEncoder for Broken {
            fn encode(&self, _quality: u8) -> Result<Vec<u8>, ThumbnailError> {
                Err(ThumbnailError::Encode("boom".to_string()))
            }
        }

        let result = compress(&Broken, &CompressionPolicy::default());
        assert_eq!(result, Err(ThumbnailError::Encode("boom".to_string())));
    }

    #[test]
    fn test_large_png_capture_meets_policy() {
        let raw = png_bytes(&noisy_image(1024, 683));
        assert!(raw.len() > 2_000_000);

        let canvas = JpegCanvas::from_capture(&raw, 1024, 683).unwrap();
        let policy = CompressionPolicy::default();
        let result = compress(&canvas, &policy).unwrap();

        assert!(result.bytes.len() <= policy.size_limit() || result.quality == policy.min_quality);
        assert!(result.attempts <= policy.max_attempts());
        assert_eq!(&result.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_canvas_resizes_capture() {
        let raw = png_bytes(&noisy_image(200, 100));
        let canvas = JpegCanvas::from_capture(&raw, 1024, 683).unwrap();
        assert_eq!(canvas.dimensions(), (1024, 683));
    }

    #[test]
    fn test_canvas_rejects_garbage() {
        let result = JpegCanvas::from_capture(b"not an image", 1024, 683);
        assert!(matches!(result, Err(ThumbnailError::Decode(_))));
    }

    #[test]
    fn test_data_url_helpers() {
        let url = to_data_url(&[1, 2, 3, 250], JPEG_MIME);
        assert!(url.starts_with("data:image/jpeg;base64,"));

        let (mime, bytes) = decode_data_url(&url).unwrap();
        assert_eq!(mime, "image/jpeg");
        assert_eq!(bytes, vec![1, 2, 3, 250]);
    }

    #[test]
    fn test_decode_data_url_rejects_plain_urls() {
        assert!(decode_data_url("https://example.com/a.png").is_err());
        assert!(decode_data_url("data:image/png,rawtext").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
    }
}
