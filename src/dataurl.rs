//! Data URL encoding/decoding
//!
//! Images move between pipeline stages as `data:` URLs so stages stay
//! decoupled from any I/O. This module handles the base64 wrapping, MIME
//! extraction, and decoding back to raster surfaces.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use crate::error::{Error, Result};

/// Wrap raw bytes in a base64 data URL with the given MIME type
pub fn encode(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

/// Split a data URL into its MIME type and decoded bytes
pub fn decode(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| Error::ArtifactDecodeError("not a data URL".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::ArtifactDecodeError("malformed data URL".to_string()))?;
    let mime = header
        .split(';')
        .next()
        .unwrap_or_default()
        .to_string();
    if !header.ends_with(";base64") {
        return Err(Error::ArtifactDecodeError(
            "only base64 data URLs are supported".to_string(),
        ));
    }
    let bytes = BASE64
        .decode(payload)
        .map_err(|e| Error::ArtifactDecodeError(format!("invalid base64 payload: {e}")))?;
    Ok((mime, bytes))
}

/// MIME type of a data URL, if it is one
pub fn mime(url: &str) -> Option<&str> {
    let rest = url.strip_prefix("data:")?;
    let header = rest.split(',').next()?;
    Some(header.split(';').next().unwrap_or(header))
}

/// Decode a data URL into an RGBA surface
pub fn decode_image(url: &str) -> Result<RgbaImage> {
    let (_, bytes) = decode(url)?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| Error::ArtifactDecodeError(format!("image decode failed: {e}")))?;
    Ok(img.to_rgba8())
}

/// Encode an RGBA surface as PNG bytes
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
        .map_err(|e| Error::Other(format!("PNG encode failed: {e}")))?;
    Ok(buf)
}

/// Encode an RGBA surface as a PNG data URL
pub fn encode_png_url(img: &RgbaImage) -> Result<String> {
    Ok(encode("image/png", &encode_png(img)?))
}
