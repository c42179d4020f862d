//! Encoder capability probes
//!
//! WebP export must fail up front when the encoder is unavailable rather
//! than silently producing a mislabeled PNG, so the probe encodes a tiny
//! surface and checks the container magic before any artifact work happens.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, RgbImage, RgbaImage};

/// Reports which export encoders the current environment supports
pub trait EncoderCapabilities: Send + Sync {
    fn webp_supported(&self) -> bool;
    fn jpeg_supported(&self) -> bool;
}

/// Probes by encoding a 1x1 surface and verifying the output magic
pub struct ProbeEncoders;

impl EncoderCapabilities for ProbeEncoders {
    fn webp_supported(&self) -> bool {
        let img = RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255]));
        let mut buf = Vec::new();
        let ok = WebPEncoder::new_lossless(&mut buf)
            .encode(img.as_raw(), 1, 1, ExtendedColorType::Rgba8)
            .is_ok();
        ok && buf.len() >= 12 && &buf[0..4] == b"RIFF" && &buf[8..12] == b"WEBP"
    }

    fn jpeg_supported(&self) -> bool {
        // JPEG has no alpha channel; probe with an opaque RGB pixel.
        let img = RgbImage::from_pixel(1, 1, image::Rgb([0, 0, 0]));
        let mut buf = Vec::new();
        let ok = JpegEncoder::new_with_quality(&mut buf, 90)
            .encode(img.as_raw(), 1, 1, ExtendedColorType::Rgb8)
            .is_ok();
        ok && buf.len() >= 2 && buf[0] == 0xff && buf[1] == 0xd8
    }
}

/// Test double reporting every encoder as unsupported
pub struct DisabledEncoders;

impl EncoderCapabilities for DisabledEncoders {
    fn webp_supported(&self) -> bool {
        false
    }

    fn jpeg_supported(&self) -> bool {
        false
    }
}
