//! Compositing output types shared by the raster and vector paths

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod raster;
pub mod vector;

/// Which kind of payload an artifact carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    Raster,
    Vector,
}

/// The composited result of one render
///
/// Raster payloads are data URLs; vector payloads are standalone SVG
/// documents (valid viewBox, `xmlns`, no external references). The session
/// keeps only the last successful artifact and replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositedArtifact {
    pub kind: ArtifactKind,
    pub payload: String,
}

/// Non-fatal conditions surfaced alongside a successful composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenderWarning {
    /// The logo failed to decode; the QR was rendered without it
    LogoDropped { reason: String },
    /// Vector logo markup could not be embedded; the raster fallback was used
    VectorLogoFallback { reason: String },
    /// Logo covers enough of the symbol to threaten scans even at level H
    ReadabilityRisk { size_fraction: f64 },
}

impl fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderWarning::LogoDropped { reason } => {
                write!(f, "logo dropped: {reason}")
            }
            RenderWarning::VectorLogoFallback { reason } => {
                write!(f, "vector logo fell back to raster embedding: {reason}")
            }
            RenderWarning::ReadabilityRisk { size_fraction } => {
                write!(f, "logo covers {:.0}% of the symbol; scans may fail", size_fraction * 100.0)
            }
        }
    }
}

/// A composited artifact plus any warnings raised while producing it
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeOutput {
    pub artifact: CompositedArtifact,
    pub warnings: Vec<RenderWarning>,
}
