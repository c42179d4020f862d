//! Raster compositor
//!
//! Draws the QR raster onto a fresh off-screen surface, paints the logo
//! background shape (with a soft shadow for non-square shapes), clips the
//! logo to the shape, and re-encodes the surface as a PNG data URL. The
//! surface lives for exactly one call. All math is f64 and free of any
//! randomness or timestamps, so output is byte-identical across runs.

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use log::{debug, warn};

use crate::color;
use crate::compose::{ArtifactKind, CompositeOutput, CompositedArtifact, RenderWarning};
use crate::dataurl;
use crate::error::{Error, Result};
use crate::geometry::{LogoBox, LogoShape};
use crate::{LogoSpec, RenderRequest};

/// Shadow tuning for non-square background shapes. Visual polish only.
const SHADOW_ALPHA: f64 = 0.1;
const SHADOW_BLUR: f64 = 5.0;

/// Composite a logo onto a QR raster data URL
///
/// Without a logo the input passes through unchanged after a decode check.
/// With one, the QR and logo images are decoded in parallel; a failed logo
/// decode degrades to a QR-only output with a [`RenderWarning::LogoDropped`]
/// warning, while a failed QR decode is fatal for the render.
pub async fn composite(
    qr_data_url: &str,
    request: &RenderRequest,
    logo: Option<&LogoSpec>,
) -> Result<CompositeOutput> {
    let Some(logo) = logo else {
        let url = qr_data_url.to_string();
        let img = spawn_decode(url).await?;
        if img.dimensions() != (request.size, request.size) {
            debug!(
                "QR raster is {:?}, expected {}x{}; passing through unchanged",
                img.dimensions(),
                request.size,
                request.size
            );
        }
        return Ok(CompositeOutput {
            artifact: raster_artifact(qr_data_url),
            warnings: Vec::new(),
        });
    };

    let (qr_res, logo_res) = futures::join!(
        tokio::task::spawn_blocking({
            let url = qr_data_url.to_string();
            move || dataurl::decode_image(&url)
        }),
        tokio::task::spawn_blocking({
            let url = logo.raster_data_url.clone();
            move || dataurl::decode_image(&url)
        }),
    );

    let qr_img = flatten_join(qr_res)?;
    let logo_img = match flatten_join_soft(logo_res) {
        Ok(img) => img,
        Err(e) => {
            warn!("logo failed to decode, rendering QR without it: {e}");
            return Ok(CompositeOutput {
                artifact: raster_artifact(qr_data_url),
                warnings: vec![RenderWarning::LogoDropped {
                    reason: e.to_string(),
                }],
            });
        }
    };

    composite_loaded(&qr_img, request, logo, &logo_img)
}

/// Synchronous core: composite already-decoded images
///
/// Split out so determinism and clipping can be unit-tested without any
/// decode round trip.
pub fn composite_loaded(
    qr: &RgbaImage,
    request: &RenderRequest,
    logo: &LogoSpec,
    logo_img: &RgbaImage,
) -> Result<CompositeOutput> {
    let size = request.size;
    let mut surface = stretch_to(qr, size);

    let b = LogoBox::centered(size as f64, logo.size_fraction);
    let radius = b.corner_radius();

    if logo.use_background && !color::is_transparent(&logo.background) {
        let fill = color::parse_color(&logo.background)?;
        let outer = b.expanded(b.padding());
        if logo.shape != LogoShape::Square {
            draw_shadow(&mut surface, logo.shape, &outer, radius);
        }
        fill_shape(&mut surface, logo.shape, &outer, radius, fill);
    }

    draw_logo(&mut surface, logo.shape, &b, radius, logo_img);

    let mut warnings = Vec::new();
    if logo.readability_risk() {
        warnings.push(RenderWarning::ReadabilityRisk {
            size_fraction: logo.size_fraction,
        });
    }

    Ok(CompositeOutput {
        artifact: CompositedArtifact {
            kind: ArtifactKind::Raster,
            payload: dataurl::encode_png_url(&surface)?,
        },
        warnings,
    })
}

fn raster_artifact(payload: &str) -> CompositedArtifact {
    CompositedArtifact {
        kind: ArtifactKind::Raster,
        payload: payload.to_string(),
    }
}

fn flatten_join(
    res: std::result::Result<Result<RgbaImage>, tokio::task::JoinError>,
) -> Result<RgbaImage> {
    res.map_err(|e| Error::Other(format!("decode task failed: {e}")))?
}

/// Logo decode failures are recoverable; normalize them to `LogoLoadError`
/// so the warning carries the taxonomy's name for this condition.
fn flatten_join_soft(
    res: std::result::Result<Result<RgbaImage>, tokio::task::JoinError>,
) -> Result<RgbaImage> {
    match res {
        Ok(Ok(img)) => Ok(img),
        Ok(Err(e)) => Err(Error::LogoLoadError(e.to_string())),
        Err(e) => Err(Error::LogoLoadError(format!("decode task failed: {e}"))),
    }
}

async fn spawn_decode(url: String) -> Result<RgbaImage> {
    flatten_join(tokio::task::spawn_blocking(move || dataurl::decode_image(&url)).await)
}

/// Stretch the QR image to fill the surface exactly (nearest sampling; the
/// symbol is always square so there is no aspect distortion)
fn stretch_to(qr: &RgbaImage, size: u32) -> RgbaImage {
    if qr.dimensions() == (size, size) {
        return qr.clone();
    }
    let (qw, qh) = qr.dimensions();
    let mut out = RgbaImage::new(size, size);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let sx = (x as u64 * qw as u64 / size as u64) as u32;
        let sy = (y as u64 * qh as u64 / size as u64) as u32;
        *pixel = *qr.get_pixel(sx.min(qw - 1), sy.min(qh - 1));
    }
    out
}

/// Blend `src` (straight alpha in [0, 1]) over the destination pixel
fn blend(dst: &mut Rgba<u8>, r: f64, g: f64, b: f64, alpha: f64) {
    if alpha <= 0.0 {
        return;
    }
    let inv = 1.0 - alpha;
    dst[0] = (r * alpha + dst[0] as f64 * inv).round() as u8;
    dst[1] = (g * alpha + dst[1] as f64 * inv).round() as u8;
    dst[2] = (b * alpha + dst[2] as f64 * inv).round() as u8;
    let da = dst[3] as f64 / 255.0;
    dst[3] = ((alpha + da * inv) * 255.0).round() as u8;
}

/// Iterate the pixels of a bounding region around a box, clamped to the
/// surface, handing each pixel center to the callback
fn for_region(
    surface: &mut RgbaImage,
    b: &LogoBox,
    margin: f64,
    mut visit: impl FnMut(&mut Rgba<u8>, f64, f64),
) {
    let size = surface.width();
    let x0 = ((b.x - margin).floor().max(0.0)) as u32;
    let y0 = ((b.y - margin).floor().max(0.0)) as u32;
    let x1 = ((b.right() + margin).ceil().min(size as f64)) as u32;
    let y1 = ((b.bottom() + margin).ceil().min(size as f64)) as u32;
    for y in y0..y1 {
        for x in x0..x1 {
            visit(surface.get_pixel_mut(x, y), x as f64 + 0.5, y as f64 + 0.5);
        }
    }
}

fn draw_shadow(surface: &mut RgbaImage, shape: LogoShape, outer: &LogoBox, radius: f64) {
    for_region(surface, outer, SHADOW_BLUR + 1.0, |pixel, px, py| {
        let sd = shape.signed_distance(outer, radius, px, py);
        let falloff = (1.0 - sd / SHADOW_BLUR).clamp(0.0, 1.0);
        blend(pixel, 0.0, 0.0, 0.0, SHADOW_ALPHA * falloff);
    });
}

fn fill_shape(surface: &mut RgbaImage, shape: LogoShape, outer: &LogoBox, radius: f64, fill: Rgba<u8>) {
    let alpha = fill[3] as f64 / 255.0;
    for_region(surface, outer, 1.0, |pixel, px, py| {
        let cov = shape.coverage(outer, radius, px, py);
        blend(pixel, fill[0] as f64, fill[1] as f64, fill[2] as f64, alpha * cov);
    });
}

/// Resize the logo into the box and draw it clipped to the shape (no padding)
fn draw_logo(surface: &mut RgbaImage, shape: LogoShape, b: &LogoBox, radius: f64, logo_img: &RgbaImage) {
    let dest = (b.width.round().max(1.0)) as u32;
    let resized = image::imageops::resize(logo_img, dest, dest, FilterType::Lanczos3);
    let size = surface.width() as i64;
    let ox = b.x.round() as i64;
    let oy = b.y.round() as i64;
    for (px, py, pixel) in resized.enumerate_pixels() {
        let gx = ox + px as i64;
        let gy = oy + py as i64;
        if gx < 0 || gy < 0 || gx >= size || gy >= size {
            continue;
        }
        let cov = shape.coverage(b, radius, gx as f64 + 0.5, gy as f64 + 0.5);
        let alpha = pixel[3] as f64 / 255.0 * cov;
        if alpha <= 0.0 {
            continue;
        }
        blend(
            surface.get_pixel_mut(gx as u32, gy as u32),
            pixel[0] as f64,
            pixel[1] as f64,
            pixel[2] as f64,
            alpha,
        );
    }
}
