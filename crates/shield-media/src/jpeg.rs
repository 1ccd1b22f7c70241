//! JPEG compression for telemetry and inference requests.

use image::codecs::jpeg::JpegEncoder;
use image::ColorType;

use shield_models::Frame;

use crate::error::MediaResult;

/// Default JPEG quality for live telemetry.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Compress a frame to JPEG.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> MediaResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(frame.data().len() / 8);
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder.encode(frame.data(), frame.width(), frame.height(), ColorType::Rgb8)?;
    Ok(buf)
}
