//! Color parsing shared by the provider, compositors, and export adapters
//!
//! Accepts `#rgb`, `#rrggbb`, `#rrggbbaa` hex notation and a small table of
//! CSS named colors. `"transparent"` parses to a fully transparent pixel; the
//! request layer decides where transparency is allowed.

use image::Rgba;

use crate::error::{Error, Result};

/// Named colors accepted alongside hex notation
const NAMED: &[(&str, [u8; 4])] = &[
    ("black", [0x00, 0x00, 0x00, 0xff]),
    ("white", [0xff, 0xff, 0xff, 0xff]),
    ("red", [0xff, 0x00, 0x00, 0xff]),
    ("green", [0x00, 0x80, 0x00, 0xff]),
    ("blue", [0x00, 0x00, 0xff, 0xff]),
    ("yellow", [0xff, 0xff, 0x00, 0xff]),
    ("cyan", [0x00, 0xff, 0xff, 0xff]),
    ("magenta", [0xff, 0x00, 0xff, 0xff]),
    ("orange", [0xff, 0xa5, 0x00, 0xff]),
    ("purple", [0x80, 0x00, 0x80, 0xff]),
    ("gray", [0x80, 0x80, 0x80, 0xff]),
    ("grey", [0x80, 0x80, 0x80, 0xff]),
    ("transparent", [0x00, 0x00, 0x00, 0x00]),
];

/// Whether a color string denotes full transparency
pub fn is_transparent(color: &str) -> bool {
    color.trim().eq_ignore_ascii_case("transparent")
}

/// Parse a color string to an RGBA pixel
pub fn parse_color(color: &str) -> Result<Rgba<u8>> {
    let trimmed = color.trim();
    if let Some(hex) = trimmed.strip_prefix('#') {
        return parse_hex(hex)
            .ok_or_else(|| Error::ConfigError(format!("invalid hex color: {trimmed}")));
    }
    let lower = trimmed.to_ascii_lowercase();
    NAMED
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, rgba)| Rgba(*rgba))
        .ok_or_else(|| Error::ConfigError(format!("unknown color: {trimmed}")))
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    match hex.len() {
        3 => {
            let mut out = [0u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v << 4 | v;
            }
            out[3] = 0xff;
            Some(Rgba(out))
        }
        6 | 8 => {
            let mut out = [0u8, 0, 0, 0xff];
            for i in 0..hex.len() / 2 {
                out[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
            }
            Some(Rgba(out))
        }
        _ => None,
    }
}
