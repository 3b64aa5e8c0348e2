//! Software JPEG encoding of captured frames.

use std::sync::Mutex;

use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder as Jpeg;
use image::{RgbImage, RgbaImage};

pub const DEFAULT_QUALITY: u8 = 60;
const MIN_QUALITY: i64 = 1;
const MAX_QUALITY: i64 = 100;

/// JPEG encoder with a runtime-adjustable quality setting.
pub struct JpegEncoder {
    quality: Mutex<u8>,
}

impl JpegEncoder {
    pub fn new(quality: u8) -> Self {
        let quality = if quality == 0 { DEFAULT_QUALITY } else { quality };
        Self {
            quality: Mutex::new(quality),
        }
    }

    /// Update the quality. Values outside [1, 100] are ignored.
    pub fn set_quality(&self, quality: i64) {
        if (MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
            *self.quality.lock().unwrap() = quality as u8;
        }
    }

    pub fn quality(&self) -> u8 {
        *self.quality.lock().unwrap()
    }

    /// Encode one RGBA frame to a JPEG byte blob.
    pub fn encode(&self, frame: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
        let quality = self.quality();
        // The JPEG codec has no alpha channel; drop it before encoding.
        let rgb: RgbImage = frame.convert();
        let mut out = Vec::new();
        let mut encoder = Jpeg::new_with_quality(&mut out, quality);
        encoder.encode_image(&rgb)?;
        Ok(out)
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY)
    }
}
