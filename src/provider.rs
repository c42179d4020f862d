//! Default symbol provider backed by the `qrcode` crate
//!
//! The provider owns the only dependency on QR matrix mathematics. Its
//! vector output follows a documented shape the vector compositor relies on:
//! the first child is a single full-canvas `<rect width="100%">` carrying
//! the background, followed by one `<path>` of module runs, with a viewBox
//! of `0 0 D D` where `D = module_count + 2 * quiet_zone`.

use std::fmt::Write;

use image::RgbaImage;
use qrcode::{EcLevel, QrCode};

use crate::color::parse_color;
use crate::error::{Error, Result};
use crate::svg::SvgNode;
use crate::{dataurl, ErrorCorrection, SymbolOptions, SymbolProvider};

const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// Symbol provider over `qrcode::QrCode`
#[derive(Debug, Clone, Default)]
pub struct QrcodeProvider;

impl QrcodeProvider {
    pub fn new() -> Self {
        QrcodeProvider
    }

    fn encode_matrix(&self, content: &str, level: ErrorCorrection) -> Result<QrCode> {
        let ec = match level {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        };
        QrCode::with_error_correction_level(content, ec)
            .map_err(|e| Error::EncodeError(e.to_string()))
    }
}

impl SymbolProvider for QrcodeProvider {
    fn encode_raster(&self, content: &str, opts: &SymbolOptions) -> Result<String> {
        let code = self.encode_matrix(content, opts.ec_level)?;
        let fg = parse_color(&opts.foreground)?;
        let bg = parse_color(&opts.background)?;

        let modules = code.to_colors();
        let module_count = code.width() as u32;
        let total = module_count + opts.quiet_zone * 2;
        let size = opts.size;

        // Exact-size output: nearest-module sampling over the padded grid.
        let mut img: RgbaImage = RgbaImage::from_pixel(size, size, bg);
        for py in 0..size {
            let my = (py as u64 * total as u64 / size as u64) as u32;
            for px in 0..size {
                let mx = (px as u64 * total as u64 / size as u64) as u32;
                if dark_at(&modules, module_count, opts.quiet_zone, mx, my) {
                    img.put_pixel(px, py, fg);
                }
            }
        }
        dataurl::encode_png_url(&img)
    }

    fn encode_vector(&self, content: &str, opts: &SymbolOptions) -> Result<String> {
        let code = self.encode_matrix(content, opts.ec_level)?;
        let modules = code.to_colors();
        let module_count = code.width() as u32;
        let total = module_count + opts.quiet_zone * 2;

        let mut d = String::new();
        for (i, module) in modules.iter().enumerate() {
            if *module == qrcode::Color::Dark {
                let x = i as u32 % module_count + opts.quiet_zone;
                let y = i as u32 / module_count + opts.quiet_zone;
                let _ = write!(d, "M{x},{y}h1v1h-1z");
            }
        }

        let doc = SvgNode::new("svg")
            .attr("xmlns", SVG_NS)
            .attr("width", opts.size.to_string())
            .attr("height", opts.size.to_string())
            .attr("viewBox", format!("0 0 {total} {total}"))
            .child(
                SvgNode::new("rect")
                    .attr("width", "100%")
                    .attr("height", "100%")
                    .attr("fill", &opts.background),
            )
            .child(SvgNode::new("path").attr("fill", &opts.foreground).attr("d", d));
        Ok(doc.to_markup())
    }
}

fn dark_at(modules: &[qrcode::Color], module_count: u32, quiet_zone: u32, x: u32, y: u32) -> bool {
    if x < quiet_zone || y < quiet_zone {
        return false;
    }
    let (mx, my) = (x - quiet_zone, y - quiet_zone);
    if mx >= module_count || my >= module_count {
        return false;
    }
    modules[(my * module_count + mx) as usize] == qrcode::Color::Dark
}
