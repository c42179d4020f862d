//! Theme-aware default-color overrides
//!
//! Dark mode substitutes colors only through an explicit table of default
//! pairs; a request whose colors differ from a listed pair (even by case or
//! shorthand) passes through untouched. No "did the user edit this field"
//! detection happens here.

use crate::RenderRequest;

/// UI theme the render is destined for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

/// `(light foreground, light background) -> (dark foreground, dark background)`
const DARK_OVERRIDES: &[((&str, &str), (&str, &str))] =
    &[(("#000000", "#ffffff"), ("#ffffff", "#2e2e2e"))];

/// Apply the theme's override table to a request
///
/// Returns a new request; the input is never mutated. Only exact matches
/// (case-insensitive) against a listed default pair are substituted.
pub fn apply_theme(request: &RenderRequest, theme: Theme) -> RenderRequest {
    if theme == Theme::Light {
        return request.clone();
    }
    let mut out = request.clone();
    for ((light_fg, light_bg), (dark_fg, dark_bg)) in DARK_OVERRIDES {
        if request.foreground.eq_ignore_ascii_case(light_fg)
            && request.background.eq_ignore_ascii_case(light_bg)
        {
            out.foreground = dark_fg.to_string();
            out.background = dark_bg.to_string();
            break;
        }
    }
    out
}
