//! End-to-end render scenarios through the default provider

use std::sync::Mutex;

use image::{Rgba, RgbaImage};
use qrforge::{
    dataurl, ErrorCorrection, LogoShape, LogoSpec, QrcodeProvider, RenderRequest, SymbolOptions,
    SymbolProvider,
};

/// Wraps the real provider and records the options each encode received
struct RecordingProvider {
    inner: QrcodeProvider,
    seen: Mutex<Vec<ErrorCorrection>>,
}

impl RecordingProvider {
    fn new() -> Self {
        Self {
            inner: QrcodeProvider::new(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn levels(&self) -> Vec<ErrorCorrection> {
        self.seen.lock().unwrap().clone()
    }
}

impl SymbolProvider for RecordingProvider {
    fn encode_raster(&self, content: &str, opts: &SymbolOptions) -> qrforge::Result<String> {
        self.seen.lock().unwrap().push(opts.ec_level);
        self.inner.encode_raster(content, opts)
    }

    fn encode_vector(&self, content: &str, opts: &SymbolOptions) -> qrforge::Result<String> {
        self.seen.lock().unwrap().push(opts.ec_level);
        self.inner.encode_vector(content, opts)
    }
}

fn red_logo_url() -> String {
    let img = RgbaImage::from_pixel(24, 24, Rgba([220, 20, 20, 255]));
    dataurl::encode_png_url(&img).unwrap()
}

#[tokio::test]
async fn plain_url_renders_at_requested_size_and_level() {
    let provider = RecordingProvider::new();
    let request = RenderRequest::new("https://example.com", 200).with_ec_level(ErrorCorrection::M);

    let out = qrforge::render_raster(&provider, &request, None).await.unwrap();
    let img = dataurl::decode_image(&out.artifact.payload).unwrap();
    assert_eq!(img.dimensions(), (200, 200));
    assert_eq!(provider.levels(), vec![ErrorCorrection::M]);
    assert!(out.warnings.is_empty());
}

#[tokio::test]
async fn render_is_deterministic_across_runs() {
    let provider = QrcodeProvider::new();
    let request = RenderRequest::new("https://example.com", 200);
    let logo = LogoSpec::raster(red_logo_url()).with_shape(LogoShape::Circle);

    let a = qrforge::render_raster(&provider, &request, Some(&logo)).await.unwrap();
    let b = qrforge::render_raster(&provider, &request, Some(&logo)).await.unwrap();
    assert_eq!(a.artifact.payload, b.artifact.payload);
}

#[tokio::test]
async fn logo_render_forces_level_h_and_covers_center() {
    let provider = RecordingProvider::new();
    let request = RenderRequest::new("https://example.com", 200).with_ec_level(ErrorCorrection::M);
    let logo = LogoSpec::raster(red_logo_url())
        .with_shape(LogoShape::Circle)
        .with_size_fraction(0.20)
        .with_background("#ffffff");

    let out = qrforge::render_raster(&provider, &request, Some(&logo)).await.unwrap();
    assert_eq!(provider.levels(), vec![ErrorCorrection::H]);

    // The central region shows logo pixels, not QR modules.
    let img = dataurl::decode_image(&out.artifact.payload).unwrap();
    assert_eq!(img.get_pixel(100, 100), &Rgba([220, 20, 20, 255]));
}

#[tokio::test]
async fn vector_render_preserves_provider_view_box() {
    let provider = QrcodeProvider::new();
    let request = RenderRequest::new("https://example.com", 200);
    let logo = LogoSpec::raster(red_logo_url()).with_shape(LogoShape::Circle);

    // The logo forces level H, which changes the module count; the expected
    // viewBox must come from a plain render at that same level.
    let plain_request = request.clone().with_ec_level(ErrorCorrection::H);
    let plain = qrforge::render_vector(&provider, &plain_request, None).unwrap();
    let view_box = {
        let svg = &plain.artifact.payload;
        let start = svg.find("viewBox=\"").unwrap() + 9;
        svg[start..start + svg[start..].find('"').unwrap()].to_string()
    };

    let composed = qrforge::render_vector(&provider, &request, Some(&logo)).unwrap();
    let svg = &composed.artifact.payload;
    assert!(svg.contains(&format!("viewBox=\"{view_box}\"")));
    assert!(svg.contains("<mask id="));
    assert!(svg.contains("xmlns=\"http://www.w3.org/2000/svg\""));
    assert!(svg.contains("width=\"200\""));
}

#[tokio::test]
async fn invalid_request_is_rejected_before_encoding() {
    let provider = RecordingProvider::new();
    let request = RenderRequest::new("", 200);
    let err = qrforge::render_raster(&provider, &request, None).await.unwrap_err();
    assert!(matches!(err, qrforge::Error::ConfigError(_)));
    assert!(provider.levels().is_empty());
}

#[tokio::test]
async fn oversized_payload_surfaces_encode_error() {
    let provider = QrcodeProvider::new();
    let request = RenderRequest::new("x".repeat(8000), 200);
    let err = qrforge::render_raster(&provider, &request, None).await.unwrap_err();
    assert!(matches!(err, qrforge::Error::EncodeError(_)));
}
