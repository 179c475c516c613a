// frame.rs — On-demand snapshot of the live camera feed: downscale,
// JPEG-encode, base64-encode into a self-describing data-URI payload.
//
// Capture is strictly best-effort. A missing source, a zero-sized frame,
// or an encoder failure degrades to `None`; the chat turn proceeds
// text-only and the send path never sees a capture error.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, GenericImageView, RgbaImage};
use std::sync::Arc;

/// Whatever is producing live video frames. Injected explicitly — the
/// capture path never goes looking for an ambient video element.
pub trait FrameSource: Send + Sync {
    /// The current frame, or `None` when no video source is attached.
    fn current_frame(&self) -> Option<RgbaImage>;
}

pub struct ImageCapture {
    source: Arc<dyn FrameSource>,
    /// JPEG compression quality (1–100).
    jpeg_quality: u8,
    /// Frames wider than this are downscaled before encoding.
    max_width: u32,
}

impl ImageCapture {
    pub fn new(source: Arc<dyn FrameSource>, jpeg_quality: u8, max_width: u32) -> Self {
        Self {
            source,
            jpeg_quality,
            max_width,
        }
    }

    /// Snapshot the current frame as a `data:image/jpeg;base64,…` payload.
    ///
    /// Returns `None` without raising on any failure. Repeatable; does not
    /// pause or otherwise alter the source.
    pub fn capture(&self) -> Option<String> {
        let frame = match self.source.current_frame() {
            Some(f) => f,
            None => {
                log::debug!("Capture skipped: no video source attached");
                return None;
            }
        };
        if frame.width() == 0 || frame.height() == 0 {
            log::warn!("Capture skipped: source reports zero dimensions");
            return None;
        }

        let img = DynamicImage::ImageRgba8(frame);
        let img = if img.width() > self.max_width {
            let ratio = self.max_width as f64 / img.width() as f64;
            let new_h = (img.height() as f64 * ratio).round().max(1.0) as u32;
            img.resize_exact(self.max_width, new_h, imageops::FilterType::Triangle)
        } else {
            img
        };
        let (w, h) = img.dimensions();

        let mut jpeg_buf: Vec<u8> = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_buf, self.jpeg_quality);
            if let Err(e) =
                encoder.encode(img.to_rgb8().as_raw(), w, h, image::ExtendedColorType::Rgb8)
            {
                log::warn!("Capture skipped: jpeg encode failed: {e}");
                return None;
            }
        }

        log::debug!("Captured frame {w}x{h}, {} bytes jpeg", jpeg_buf.len());
        Some(format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg_buf)))
    }
}
