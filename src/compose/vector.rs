//! Vector compositor
//!
//! Rebuilds the provider's QR SVG around a logo. The output document keeps
//! the original viewBox, so logo geometry is computed in viewBox units and
//! the result stays correct under arbitrary scaling. A `<mask>` punches a
//! true geometric hole in the module markup where the logo sits instead of
//! stacking an opaque logo over live modules.

use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use sha2::{Digest, Sha256};

use crate::color;
use crate::compose::{ArtifactKind, CompositeOutput, CompositedArtifact, RenderWarning};
use crate::error::{Error, Result};
use crate::geometry::{LogoBox, LogoShape};
use crate::svg::{fmt_num, SvgNode};
use crate::{LogoSource, LogoSpec, RenderRequest};

const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// Monotonic component of generated ids; keeps two composites of identical
/// input distinguishable when both land on the same page.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Composite a logo into QR SVG markup
///
/// Invoked only when a logo is present. A malformed QR SVG is fatal
/// ([`Error::ArtifactDecodeError`]); a malformed vector logo degrades to the
/// raster `<image>` embedding with a warning.
pub fn composite_svg(
    qr_svg: &str,
    request: &RenderRequest,
    logo: &LogoSpec,
) -> Result<CompositeOutput> {
    let scanned = scan_qr_svg(qr_svg, request.size)?;
    let (vx, vy, vw, vh) = scanned.view_box;

    // All logo geometry below is in viewBox units.
    let factor = vw / request.size as f64;
    let b = LogoBox::centered(request.size as f64, logo.size_fraction).scaled(factor);
    let radius = b.corner_radius();

    let suffix = unique_suffix(qr_svg);
    let mask_id = format!("qr-hole-{suffix}");
    let clip_id = format!("logo-clip-{suffix}");

    let mut warnings = Vec::new();
    if logo.readability_risk() {
        warnings.push(RenderWarning::ReadabilityRisk {
            size_fraction: logo.size_fraction,
        });
    }

    let with_background = logo.use_background && !color::is_transparent(&logo.background);
    // The mask hole covers the padded background extent when a background is
    // drawn, the bare logo box otherwise.
    let hole = if with_background { b.expanded(b.padding()) } else { b };

    let mask = SvgNode::new("mask")
        .attr("id", &mask_id)
        .child(
            SvgNode::new("rect")
                .attr_f("x", vx)
                .attr_f("y", vy)
                .attr_f("width", vw)
                .attr_f("height", vh)
                .attr("fill", "#fff"),
        )
        .child(shape_node(logo.shape, &hole, radius, "#000"));
    let mut defs = SvgNode::new("defs").child(mask);

    let mut layer = SvgNode::new("g");
    if with_background {
        layer = layer.child(shape_node(logo.shape, &hole, radius, &logo.background));
    }

    let logo_node = match &logo.source {
        LogoSource::Vector { markup } => match embed_vector_logo(markup, &b) {
            Ok(node) => node,
            Err(e) => {
                warn!("vector logo could not be embedded, falling back to raster: {e}");
                warnings.push(RenderWarning::VectorLogoFallback {
                    reason: e.to_string(),
                });
                let (image, clip) = raster_logo(logo, &b, radius, &clip_id);
                if let Some(clip) = clip {
                    defs = defs.child(clip);
                }
                image
            }
        },
        LogoSource::Raster => {
            let (image, clip) = raster_logo(logo, &b, radius, &clip_id);
            if let Some(clip) = clip {
                defs = defs.child(clip);
            }
            image
        }
    };
    layer = layer.child(logo_node);

    let background_fill = scanned
        .background_fill
        .unwrap_or_else(|| request.background.clone());

    let doc = SvgNode::new("svg")
        .attr("xmlns", SVG_NS)
        .attr("width", request.size.to_string())
        .attr("height", request.size.to_string())
        .attr(
            "viewBox",
            format!("{} {} {} {}", fmt_num(vx), fmt_num(vy), fmt_num(vw), fmt_num(vh)),
        )
        .child(defs)
        .child(
            SvgNode::new("rect")
                .attr_f("x", vx)
                .attr_f("y", vy)
                .attr_f("width", vw)
                .attr_f("height", vh)
                .attr("fill", background_fill),
        )
        .child(
            SvgNode::new("g")
                .attr("mask", format!("url(#{mask_id})"))
                .raw(scanned.modules),
        )
        .child(layer);

    Ok(CompositeOutput {
        artifact: CompositedArtifact {
            kind: ArtifactKind::Vector,
            payload: doc.to_markup(),
        },
        warnings,
    })
}

/// One of the three logo container shapes as an SVG element
fn shape_node(shape: LogoShape, b: &LogoBox, corner_radius: f64, fill: &str) -> SvgNode {
    match shape {
        LogoShape::Circle => {
            let (cx, cy) = b.center();
            SvgNode::new("circle")
                .attr_f("cx", cx)
                .attr_f("cy", cy)
                .attr_f("r", b.width / 2.0)
                .attr("fill", fill)
        }
        LogoShape::RoundedSquare => SvgNode::new("rect")
            .attr_f("x", b.x)
            .attr_f("y", b.y)
            .attr_f("width", b.width)
            .attr_f("height", b.width)
            .attr_f("rx", corner_radius)
            .attr_f("ry", corner_radius)
            .attr("fill", fill),
        LogoShape::Square => SvgNode::new("rect")
            .attr_f("x", b.x)
            .attr_f("y", b.y)
            .attr_f("width", b.width)
            .attr_f("height", b.width)
            .attr("fill", fill),
    }
}

/// Raster logo embedding: an `<image>` plus a clip shape for non-square
/// containers
fn raster_logo(
    logo: &LogoSpec,
    b: &LogoBox,
    radius: f64,
    clip_id: &str,
) -> (SvgNode, Option<SvgNode>) {
    let mut image = SvgNode::new("image")
        .attr_f("x", b.x)
        .attr_f("y", b.y)
        .attr_f("width", b.width)
        .attr_f("height", b.width)
        .attr("href", &logo.raster_data_url);
    let clip = match logo.shape {
        LogoShape::Square => None,
        shape => Some(
            SvgNode::new("clipPath")
                .attr("id", clip_id)
                .child(shape_node(shape, b, radius, "#000")),
        ),
    };
    if clip.is_some() {
        image = image.attr("clip-path", format!("url(#{clip_id})"));
    }
    (image, clip)
}

/// Vector logo embedding: a nested `<svg>` carrying the logo's own viewBox
/// so its internal coordinate system survives the reposition
fn embed_vector_logo(markup: &str, b: &LogoBox) -> Result<SvgNode> {
    let scanned = scan_logo_svg(markup)?;
    Ok(SvgNode::new("svg")
        .attr_f("x", b.x)
        .attr_f("y", b.y)
        .attr_f("width", b.width)
        .attr_f("height", b.width)
        .attr("viewBox", scanned.view_box)
        .raw(scanned.inner))
}

fn unique_suffix(seed: &str) -> String {
    let n = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let digest = Sha256::digest(seed.as_bytes());
    format!("{}{n:x}", hex::encode(&digest[..4]))
}

struct ScannedQr {
    view_box: (f64, f64, f64, f64),
    background_fill: Option<String>,
    /// Top-level QR content minus stripped background rects, verbatim
    modules: String,
}

/// Scan the provider's QR SVG: root viewBox, stripped background rect, and
/// the remaining top-level markup preserved verbatim
fn scan_qr_svg(qr_svg: &str, size: u32) -> Result<ScannedQr> {
    let mut reader = Reader::from_str(qr_svg);
    let mut depth = 0usize;
    let mut view_box: Option<(f64, f64, f64, f64)> = None;
    let mut saw_root = false;
    let mut background_fill: Option<String> = None;
    let mut modules = String::new();
    let mut capture_start: Option<usize> = None;
    let mut skipping_background = false;

    loop {
        let pos = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| Error::ArtifactDecodeError(format!("invalid QR SVG: {e}")))?;
        match event {
            Event::Eof => break,
            Event::Start(e) => {
                if depth == 0 {
                    if e.local_name().as_ref() != b"svg" {
                        return Err(Error::ArtifactDecodeError(
                            "QR SVG root element is not <svg>".to_string(),
                        ));
                    }
                    saw_root = true;
                    view_box = read_view_box(&e)?;
                } else if depth == 1 {
                    let vb_width = view_box.map(|(_, _, w, _)| w).unwrap_or(size as f64);
                    if is_background_rect(&e, vb_width)? {
                        skipping_background = true;
                        if background_fill.is_none() {
                            background_fill = attr_value(&e, b"fill")?;
                        }
                    } else {
                        capture_start = Some(pos);
                    }
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    if e.local_name().as_ref() != b"svg" {
                        return Err(Error::ArtifactDecodeError(
                            "QR SVG root element is not <svg>".to_string(),
                        ));
                    }
                    saw_root = true;
                    view_box = read_view_box(&e)?;
                } else if depth == 1 {
                    let vb_width = view_box.map(|(_, _, w, _)| w).unwrap_or(size as f64);
                    if is_background_rect(&e, vb_width)? {
                        if background_fill.is_none() {
                            background_fill = attr_value(&e, b"fill")?;
                        }
                    } else {
                        let end = reader.buffer_position() as usize;
                        modules.push_str(&qr_svg[pos..end]);
                    }
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 1 {
                    if skipping_background {
                        skipping_background = false;
                    } else if let Some(start) = capture_start.take() {
                        let end = reader.buffer_position() as usize;
                        modules.push_str(&qr_svg[start..end]);
                    }
                }
            }
            // Declarations, comments, and inter-element whitespace carry no
            // module content.
            _ => {}
        }
    }

    if !saw_root {
        return Err(Error::ArtifactDecodeError(
            "QR SVG contains no root element".to_string(),
        ));
    }

    Ok(ScannedQr {
        view_box: view_box.unwrap_or((0.0, 0.0, size as f64, size as f64)),
        background_fill,
        modules,
    })
}

struct ScannedLogo {
    view_box: String,
    inner: String,
}

/// Scan an uploaded SVG logo: its viewBox (or one synthesized from declared
/// width/height) and its inner markup verbatim
fn scan_logo_svg(markup: &str) -> Result<ScannedLogo> {
    let mut reader = Reader::from_str(markup);
    let mut depth = 0usize;
    let mut inner_start: Option<usize> = None;
    let mut inner = String::new();
    let mut view_box: Option<String> = None;

    loop {
        let pos = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| Error::LogoLoadError(format!("invalid SVG logo: {e}")))?;
        match event {
            Event::Eof => {
                if depth != 0 || inner_start.is_some() {
                    return Err(Error::LogoLoadError("unclosed SVG logo markup".to_string()));
                }
                break;
            }
            Event::Start(e) => {
                if depth == 0 {
                    if e.local_name().as_ref() != b"svg" {
                        return Err(Error::LogoLoadError(
                            "logo root element is not <svg>".to_string(),
                        ));
                    }
                    view_box = logo_view_box(&e)?;
                    inner_start = Some(reader.buffer_position() as usize);
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    if e.local_name().as_ref() != b"svg" {
                        return Err(Error::LogoLoadError(
                            "logo root element is not <svg>".to_string(),
                        ));
                    }
                    view_box = logo_view_box(&e)?;
                    // Self-closing root: no inner content to capture.
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(start) = inner_start.take() {
                        inner = markup[start..pos].to_string();
                    }
                }
            }
            _ => {}
        }
    }

    if view_box.is_none() && inner.is_empty() {
        return Err(Error::LogoLoadError("empty SVG logo markup".to_string()));
    }

    Ok(ScannedLogo {
        view_box: view_box.unwrap_or_else(|| "0 0 100 100".to_string()),
        inner,
    })
}

fn attr_value(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::ArtifactDecodeError(format!("bad attribute: {e}")))?;
        if attr.key.as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::ArtifactDecodeError(format!("bad attribute value: {e}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn read_view_box(e: &BytesStart<'_>) -> Result<Option<(f64, f64, f64, f64)>> {
    let Some(raw) = attr_value(e, b"viewBox")? else {
        return Ok(None);
    };
    let parts: Vec<f64> = raw
        .split_whitespace()
        .filter_map(|p| p.parse().ok())
        .collect();
    if parts.len() != 4 || parts[2] <= 0.0 || parts[3] <= 0.0 {
        return Err(Error::ArtifactDecodeError(format!("invalid viewBox: {raw}")));
    }
    Ok(Some((parts[0], parts[1], parts[2], parts[3])))
}

/// The logo's own viewBox, or one synthesized from its width/height
fn logo_view_box(e: &BytesStart<'_>) -> Result<Option<String>> {
    if let Some(vb) = attr_value(e, b"viewBox")? {
        return Ok(Some(vb));
    }
    let width = parse_length(attr_value(e, b"width")?);
    let height = parse_length(attr_value(e, b"height")?);
    match (width, height) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => {
            Ok(Some(format!("0 0 {} {}", fmt_num(w), fmt_num(h))))
        }
        _ => Ok(None),
    }
}

fn parse_length(value: Option<String>) -> Option<f64> {
    value?.trim().trim_end_matches("px").parse().ok()
}

/// Heuristic from the provider contract: the background is a `rect` whose
/// width is `100%` or numerically equals the viewBox width
fn is_background_rect(e: &BytesStart<'_>, vb_width: f64) -> Result<bool> {
    if e.local_name().as_ref() != b"rect" {
        return Ok(false);
    }
    let Some(width) = attr_value(e, b"width")? else {
        return Ok(false);
    };
    if width.trim() == "100%" {
        return Ok(true);
    }
    match width.trim().parse::<f64>() {
        Ok(w) => Ok((w - vb_width).abs() < 1e-6),
        Err(_) => Ok(false),
    }
}
