//! Format export adapters
//!
//! Each adapter turns a composited artifact into an [`ExportFile`] ready for
//! a download sink, or writes to the clipboard. Adapters are independent and
//! individually retryable; one format failing never corrupts another. The
//! WebP adapter probes encoder support before touching the artifact so an
//! unsupported environment fails early instead of mislabeling a PNG.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::color;
use crate::compose::{ArtifactKind, CompositedArtifact};
use crate::dataurl;
use crate::error::{Error, Result};
use crate::platform::{Clipboard, EncoderCapabilities};
use crate::svg::escape;
use crate::RenderRequest;

/// Requestable export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportFormat {
    Png,
    Jpeg,
    Webp,
    Svg,
    Pdf,
    Html,
    DataUrl,
    Clipboard,
}

impl ExportFormat {
    /// Default output file name; `None` for clipboard delivery
    pub fn file_name(&self) -> Option<&'static str> {
        match self {
            ExportFormat::Png => Some("qrcode.png"),
            ExportFormat::Jpeg => Some("qrcode.jpg"),
            ExportFormat::Webp => Some("qrcode.webp"),
            ExportFormat::Svg => Some("qrcode.svg"),
            ExportFormat::Pdf => Some("qrcode-print.html"),
            ExportFormat::Html => Some("qrcode-embed.html"),
            ExportFormat::DataUrl => Some("qrcode-dataurl.txt"),
            ExportFormat::Clipboard => None,
        }
    }

    /// Whether this format consumes a vector artifact
    pub fn wants_vector(&self) -> bool {
        matches!(self, ExportFormat::Svg)
    }
}

/// Per-export tuning knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    /// JPEG quality, 0-100
    pub jpeg_quality: u8,
    /// WebP quality, 0-100. Accepted for API parity; the bundled WebP
    /// encoder is lossless and ignores it.
    pub webp_quality: u8,
    /// Optional caption under the image in HTML and print outputs
    pub caption: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: 90,
            webp_quality: 80,
            caption: None,
        }
    }
}

/// An encoded file ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Stages of one export invocation, tracked by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Idle,
    Compositing,
    Encoding,
    Downloading,
}

fn require_raster(artifact: &CompositedArtifact) -> Result<&str> {
    match artifact.kind {
        ArtifactKind::Raster => Ok(&artifact.payload),
        ArtifactKind::Vector => Err(Error::ConfigError(
            "this export format requires a raster artifact".to_string(),
        )),
    }
}

fn require_vector(artifact: &CompositedArtifact) -> Result<&str> {
    match artifact.kind {
        ArtifactKind::Vector => Ok(&artifact.payload),
        ArtifactKind::Raster => Err(Error::ConfigError(
            "this export format requires a vector artifact".to_string(),
        )),
    }
}

/// PNG: the raster payload saved as-is (re-encoded only if the data URL
/// carries another MIME type)
pub fn export_png(artifact: &CompositedArtifact) -> Result<ExportFile> {
    let payload = require_raster(artifact)?;
    let (mime, bytes) = dataurl::decode(payload)?;
    let bytes = if mime == "image/png" {
        bytes
    } else {
        dataurl::encode_png(&dataurl::decode_image(payload)?)?
    };
    Ok(ExportFile {
        file_name: "qrcode.png".to_string(),
        mime: "image/png".to_string(),
        bytes,
    })
}

/// JPEG: flatten onto the opaque request background (JPEG has no alpha),
/// then re-encode at the configured quality
pub fn export_jpeg(
    artifact: &CompositedArtifact,
    request: &RenderRequest,
    caps: &dyn EncoderCapabilities,
    options: &ExportOptions,
) -> Result<ExportFile> {
    if !caps.jpeg_supported() {
        return Err(Error::UnsupportedFormatError(
            "JPEG encoder unavailable".to_string(),
        ));
    }
    let payload = require_raster(artifact)?;
    let img = dataurl::decode_image(payload)?;
    let flat = flatten(&img, request)?;
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, options.jpeg_quality)
        .encode(flat.as_raw(), flat.width(), flat.height(), ExtendedColorType::Rgb8)
        .map_err(|e| Error::Other(format!("JPEG encode failed: {e}")))?;
    Ok(ExportFile {
        file_name: "qrcode.jpg".to_string(),
        mime: "image/jpeg".to_string(),
        bytes,
    })
}

/// WebP: capability probe first, then re-encode
pub fn export_webp(
    artifact: &CompositedArtifact,
    caps: &dyn EncoderCapabilities,
    _options: &ExportOptions,
) -> Result<ExportFile> {
    if !caps.webp_supported() {
        return Err(Error::UnsupportedFormatError(
            "WebP encoder unavailable in this environment".to_string(),
        ));
    }
    let payload = require_raster(artifact)?;
    let img = dataurl::decode_image(payload)?;
    let mut bytes = Vec::new();
    WebPEncoder::new_lossless(&mut bytes)
        .encode(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
        .map_err(|e| Error::Other(format!("WebP encode failed: {e}")))?;
    Ok(ExportFile {
        file_name: "qrcode.webp".to_string(),
        mime: "image/webp".to_string(),
        bytes,
    })
}

/// SVG: the serialized vector markup saved directly
pub fn export_svg(artifact: &CompositedArtifact) -> Result<ExportFile> {
    let markup = require_vector(artifact)?;
    Ok(ExportFile {
        file_name: "qrcode.svg".to_string(),
        mime: "image/svg+xml".to_string(),
        bytes: markup.as_bytes().to_vec(),
    })
}

/// PDF path: a print-formatted standalone HTML document embedding the image,
/// for the host to hand to a print dialog. Best-effort export, not a true
/// embedded PDF.
pub fn export_print_document(
    artifact: &CompositedArtifact,
    request: &RenderRequest,
    options: &ExportOptions,
) -> Result<ExportFile> {
    let payload = require_raster(artifact)?;
    let caption = options.caption.as_deref().unwrap_or(&request.content);
    let html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<title>QR Code - {title}</title>\n<style>\n\
         body {{ display: flex; flex-direction: column; align-items: center; \
         justify-content: center; height: 100vh; margin: 0; \
         font-family: system-ui, sans-serif; }}\n\
         img {{ max-width: 80%; max-height: 70vh; }}\n\
         p {{ margin-top: 20px; text-align: center; max-width: 80%; }}\n\
         @media print {{ .no-print {{ display: none; }} }}\n\
         </style>\n</head>\n<body>\n\
         <img src=\"{src}\" alt=\"QR Code\"/>\n<p>{caption}</p>\n\
         <div class=\"no-print\"><button onclick=\"window.print()\">Print as PDF</button></div>\n\
         </body>\n</html>\n",
        title = escape(caption),
        src = payload,
        caption = escape(caption),
    );
    Ok(ExportFile {
        file_name: "qrcode-print.html".to_string(),
        mime: "text/html".to_string(),
        bytes: html.into_bytes(),
    })
}

/// HTML: a minimal copy-pasteable embed fragment around the data URL
pub fn export_html_snippet(
    artifact: &CompositedArtifact,
    request: &RenderRequest,
    options: &ExportOptions,
) -> Result<ExportFile> {
    let payload = require_raster(artifact)?;
    let caption = match options.caption.as_deref() {
        Some(text) => format!(
            "\n  <p style=\"margin-top: 10px; font-size: 14px;\">{}</p>",
            escape(text)
        ),
        None => String::new(),
    };
    let html = format!(
        "<!-- QR code embed -->\n<div style=\"text-align: center; margin: 20px 0;\">\n  \
         <img src=\"{src}\" alt=\"QR Code\" \
         style=\"max-width: 100%; width: {size}px; height: {size}px;\"/>{caption}\n</div>\n\
         <!-- End QR code embed -->\n",
        src = payload,
        size = request.size,
        caption = caption,
    );
    Ok(ExportFile {
        file_name: "qrcode-embed.html".to_string(),
        mime: "text/html".to_string(),
        bytes: html.into_bytes(),
    })
}

/// Data URL: the literal string saved as a text file
pub fn export_data_url(artifact: &CompositedArtifact) -> Result<ExportFile> {
    let payload = require_raster(artifact)?;
    Ok(ExportFile {
        file_name: "qrcode-dataurl.txt".to_string(),
        mime: "text/plain".to_string(),
        bytes: payload.as_bytes().to_vec(),
    })
}

/// Clipboard: the data URL string as text, never binary image data
pub fn copy_to_clipboard(artifact: &CompositedArtifact, clipboard: &dyn Clipboard) -> Result<()> {
    let payload = require_raster(artifact)?;
    clipboard.write_text(payload)
}

/// Composite the image over an opaque background for alpha-free codecs
fn flatten(img: &RgbaImage, request: &RenderRequest) -> Result<RgbImage> {
    let bg = color::parse_color(&request.background)?;
    let mut out = RgbImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let a = pixel[3] as f64 / 255.0;
        let mut rgb = [0u8; 3];
        for c in 0..3 {
            rgb[c] = (pixel[c] as f64 * a + bg[c] as f64 * (1.0 - a)).round() as u8;
        }
        out.put_pixel(x, y, image::Rgb(rgb));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{DisabledEncoders, MemoryClipboard, ProbeEncoders};
    use image::Rgba;

    fn raster_artifact() -> CompositedArtifact {
        let img = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        CompositedArtifact {
            kind: ArtifactKind::Raster,
            payload: dataurl::encode_png_url(&img).unwrap(),
        }
    }

    fn vector_artifact() -> CompositedArtifact {
        CompositedArtifact {
            kind: ArtifactKind::Vector,
            payload: "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 8 8\"/>".to_string(),
        }
    }

    fn request() -> RenderRequest {
        RenderRequest::new("test", 8)
    }

    #[test]
    fn png_export_passes_bytes_through() {
        let file = export_png(&raster_artifact()).unwrap();
        assert_eq!(file.file_name, "qrcode.png");
        assert_eq!(&file.bytes[1..4], b"PNG");
    }

    #[test]
    fn jpeg_export_produces_jfif_bytes() {
        let file = export_jpeg(
            &raster_artifact(),
            &request(),
            &ProbeEncoders,
            &ExportOptions::default(),
        )
        .unwrap();
        assert_eq!(file.mime, "image/jpeg");
        assert_eq!(&file.bytes[0..2], &[0xff, 0xd8]);
    }

    #[test]
    fn jpeg_flattens_transparency_onto_request_background() {
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        let req = request().with_colors("#000000", "#ff0000");
        let flat = flatten(&img, &req).unwrap();
        assert_eq!(flat.get_pixel(0, 0), &image::Rgb([255, 0, 0]));
        assert_eq!(flat.get_pixel(1, 1), &image::Rgb([0, 0, 0]));
    }

    #[test]
    fn webp_probe_short_circuits_before_decoding() {
        // Artifact payload is garbage: if the probe fired first, we never
        // reach the decode and must see UnsupportedFormatError.
        let artifact = CompositedArtifact {
            kind: ArtifactKind::Raster,
            payload: "data:image/png;base64,!!!".to_string(),
        };
        let err = export_webp(&artifact, &DisabledEncoders, &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormatError(_)));
    }

    #[test]
    fn webp_export_emits_riff_container() {
        let file = export_webp(&raster_artifact(), &ProbeEncoders, &ExportOptions::default()).unwrap();
        assert_eq!(&file.bytes[0..4], b"RIFF");
        assert_eq!(&file.bytes[8..12], b"WEBP");
    }

    #[test]
    fn svg_export_requires_vector_artifact() {
        assert!(export_svg(&raster_artifact()).is_err());
        let file = export_svg(&vector_artifact()).unwrap();
        assert_eq!(file.file_name, "qrcode.svg");
        assert!(std::str::from_utf8(&file.bytes).unwrap().starts_with("<svg"));
    }

    #[test]
    fn html_snippet_escapes_caption() {
        let options = ExportOptions {
            caption: Some("scan <this> & win".to_string()),
            ..Default::default()
        };
        let file = export_html_snippet(&raster_artifact(), &request(), &options).unwrap();
        let html = String::from_utf8(file.bytes).unwrap();
        assert!(html.contains("scan &lt;this&gt; &amp; win"));
        assert!(!html.contains("<this>"));
    }

    #[test]
    fn print_document_is_standalone_html() {
        let file =
            export_print_document(&raster_artifact(), &request(), &ExportOptions::default())
                .unwrap();
        let html = String::from_utf8(file.bytes).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("@media print"));
        assert!(html.contains("data:image/png;base64,"));
    }

    #[test]
    fn data_url_export_saves_literal_string() {
        let artifact = raster_artifact();
        let file = export_data_url(&artifact).unwrap();
        assert_eq!(file.bytes, artifact.payload.as_bytes());
        assert_eq!(file.file_name, "qrcode-dataurl.txt");
    }

    #[test]
    fn clipboard_copy_writes_text_payload() {
        let clipboard = MemoryClipboard::new();
        let artifact = raster_artifact();
        copy_to_clipboard(&artifact, &clipboard).unwrap();
        assert_eq!(clipboard.read_text().unwrap(), artifact.payload);
    }

    #[test]
    fn format_metadata_is_stable() {
        assert_eq!(ExportFormat::Png.file_name(), Some("qrcode.png"));
        assert_eq!(ExportFormat::Clipboard.file_name(), None);
        assert!(ExportFormat::Svg.wants_vector());
        assert!(!ExportFormat::Png.wants_vector());
    }
}
