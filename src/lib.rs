//! QRForge
//!
//! A QR code logo-compositing and export pipeline. The crate takes a QR
//! symbol produced by a pluggable [`SymbolProvider`], overlays an optional
//! logo (raster or vector) with a chosen shape/background/padding, and
//! serializes the result across several image, vector, and text formats.
//!
//! # Features
//!
//! - **Raster and vector compositing**: off-screen RGBA surfaces for
//!   PNG/JPEG/WebP, a pure SVG rebuild (mask + embedded logo) for SVG export
//! - **Pluggable symbol backend**: the default `qrcode`-crate provider can be
//!   swapped for anything implementing [`SymbolProvider`]
//! - **Session facade**: debounced, generation-guarded rendering with
//!   queue-behind-render export semantics
//!
//! # Example
//!
//! ```no_run
//! use qrforge::{ErrorCorrection, QrcodeProvider, RenderRequest};
//!
//! # #[tokio::main]
//! # async fn main() -> qrforge::Result<()> {
//! let provider = QrcodeProvider::new();
//! let request = RenderRequest::new("https://example.com", 200)
//!     .with_ec_level(ErrorCorrection::M);
//! let output = qrforge::render_raster(&provider, &request, None).await?;
//! println!("rendered {} bytes", output.artifact.payload.len());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod color;
pub mod dataurl;
pub mod geometry;
pub mod svg;

pub mod compose;
pub mod export;

// Platform delivery surfaces (download sink, clipboard, encoder probes)
pub mod platform;

// Debounced render/export session (async facade over the pipeline)
pub mod session;

pub mod theme;

// Default symbol provider backend over the `qrcode` crate
#[cfg(feature = "provider-qrcode")]
pub mod provider;

pub use compose::{ArtifactKind, CompositeOutput, CompositedArtifact, RenderWarning};
pub use export::{ExportFile, ExportFormat, ExportOptions};
pub use geometry::{LogoBox, LogoShape};
#[cfg(feature = "provider-qrcode")]
pub use provider::QrcodeProvider;
pub use session::RenderSession;

/// QR error-correction level
///
/// Higher levels tolerate more obscured modules at the cost of symbol
/// density; `H` survives up to 30% damage, which is why a logo overlay
/// forces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCorrection {
    L,
    M,
    Q,
    H,
}

impl Default for ErrorCorrection {
    fn default() -> Self {
        ErrorCorrection::M
    }
}

/// Immutable description of one QR render
///
/// A fresh request is constructed per user edit; requests are never mutated
/// in place. `size` is the pixel edge length of the raster output and the
/// declared width/height of vector output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    /// Encoded payload, already template-formatted (e.g. `WIFI:S:...;;`)
    pub content: String,
    /// Output edge length in pixels
    pub size: u32,
    /// Module (dark) color
    pub foreground: String,
    /// Canvas (light) color; `"transparent"` is not allowed here
    pub background: String,
    /// Caller-selected error-correction level
    #[serde(default)]
    pub ec_level: ErrorCorrection,
}

impl RenderRequest {
    pub fn new(content: impl Into<String>, size: u32) -> Self {
        Self {
            content: content.into(),
            size,
            foreground: "#000000".to_string(),
            background: "#ffffff".to_string(),
            ec_level: ErrorCorrection::default(),
        }
    }

    pub fn with_colors(mut self, foreground: impl Into<String>, background: impl Into<String>) -> Self {
        self.foreground = foreground.into();
        self.background = background.into();
        self
    }

    pub fn with_ec_level(mut self, level: ErrorCorrection) -> Self {
        self.ec_level = level;
        self
    }

    /// The level actually passed downstream: forced to `H` whenever a logo
    /// is present, since the logo obscures modules.
    pub fn effective_ec_level(&self, logo: Option<&LogoSpec>) -> ErrorCorrection {
        if logo.is_some() {
            ErrorCorrection::H
        } else {
            self.ec_level
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.content.is_empty() {
            return Err(Error::ConfigError("content must not be empty".to_string()));
        }
        if self.size == 0 {
            return Err(Error::ConfigError("size must be positive".to_string()));
        }
        if color::is_transparent(&self.background) {
            return Err(Error::ConfigError(
                "QR background must not be transparent".to_string(),
            ));
        }
        color::parse_color(&self.foreground)?;
        color::parse_color(&self.background)?;
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::ConfigError(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Other(e.to_string()))
    }
}

/// Where the logo pixels come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LogoSource {
    Raster,
    Vector {
        /// Original markup of the uploaded SVG logo
        markup: String,
    },
}

/// Optional overlay drawn over the QR center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoSpec {
    pub source: LogoSource,
    /// Rasterized form of the logo; populated for vector logos too, as the
    /// fallback when the markup cannot be embedded
    pub raster_data_url: String,
    /// Logo width as a fraction of the QR size, in `[0.10, 0.40]`
    pub size_fraction: f64,
    pub shape: LogoShape,
    /// Container fill color, or `"transparent"`
    pub background: String,
    /// When false, no background fill or shadow is drawn at all
    pub use_background: bool,
}

impl LogoSpec {
    pub fn raster(data_url: impl Into<String>) -> Self {
        Self {
            source: LogoSource::Raster,
            raster_data_url: data_url.into(),
            size_fraction: 0.20,
            shape: LogoShape::Square,
            background: "#ffffff".to_string(),
            use_background: true,
        }
    }

    pub fn vector(markup: impl Into<String>, raster_fallback: impl Into<String>) -> Self {
        Self {
            source: LogoSource::Vector {
                markup: markup.into(),
            },
            ..Self::raster(raster_fallback)
        }
    }

    pub fn with_size_fraction(mut self, fraction: f64) -> Self {
        self.size_fraction = fraction;
        self
    }

    pub fn with_shape(mut self, shape: LogoShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = background.into();
        self.use_background = true;
        self
    }

    pub fn without_background(mut self) -> Self {
        self.use_background = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.10..=0.40).contains(&self.size_fraction) {
            return Err(Error::ConfigError(format!(
                "logo size fraction {} outside [0.10, 0.40]",
                self.size_fraction
            )));
        }
        if self.raster_data_url.is_empty() {
            return Err(Error::ConfigError(
                "logo raster data URL must be populated".to_string(),
            ));
        }
        Ok(())
    }

    /// Fractions above 0.30 obscure enough modules to threaten scans even at
    /// level H; flagged, never rejected.
    pub fn readability_risk(&self) -> bool {
        self.size_fraction > 0.30
    }
}

/// Options handed to a [`SymbolProvider`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolOptions {
    pub size: u32,
    pub foreground: String,
    pub background: String,
    pub ec_level: ErrorCorrection,
    /// Quiet-zone width in modules
    #[serde(default = "default_quiet_zone")]
    pub quiet_zone: u32,
}

fn default_quiet_zone() -> u32 {
    1
}

impl SymbolOptions {
    /// Provider options for a request, with the forced-H invariant applied
    pub fn for_request(request: &RenderRequest, logo: Option<&LogoSpec>) -> Self {
        Self {
            size: request.size,
            foreground: request.foreground.clone(),
            background: request.background.clone(),
            ec_level: request.effective_ec_level(logo),
            quiet_zone: default_quiet_zone(),
        }
    }
}

/// A QR symbol encoder backend
///
/// The pipeline never re-implements QR matrix generation; it consumes one of
/// these. Implementations must be deterministic: same inputs, same output.
pub trait SymbolProvider: Send + Sync {
    /// Encode the content as a raster image data URL of exactly
    /// `opts.size × opts.size` pixels
    fn encode_raster(&self, content: &str, opts: &SymbolOptions) -> Result<String>;

    /// Encode the content as standalone SVG markup with a `viewBox` in
    /// module units
    fn encode_vector(&self, content: &str, opts: &SymbolOptions) -> Result<String>;
}

/// Render a raster artifact: encode the symbol, then composite the logo
/// (if any) onto an off-screen surface.
pub async fn render_raster(
    provider: &dyn SymbolProvider,
    request: &RenderRequest,
    logo: Option<&LogoSpec>,
) -> Result<CompositeOutput> {
    request.validate()?;
    if let Some(logo) = logo {
        logo.validate()?;
    }
    let opts = SymbolOptions::for_request(request, logo);
    let qr_data_url = provider.encode_raster(&request.content, &opts)?;
    compose::raster::composite(&qr_data_url, request, logo).await
}

/// Render a vector artifact: encode the symbol as SVG, then rebuild the
/// document around the logo (if any).
pub fn render_vector(
    provider: &dyn SymbolProvider,
    request: &RenderRequest,
    logo: Option<&LogoSpec>,
) -> Result<CompositeOutput> {
    request.validate()?;
    if let Some(logo) = logo {
        logo.validate()?;
    }
    let opts = SymbolOptions::for_request(request, logo);
    let qr_svg = provider.encode_vector(&request.content, &opts)?;
    match logo {
        Some(logo) => compose::vector::composite_svg(&qr_svg, request, logo),
        None => Ok(CompositeOutput {
            artifact: CompositedArtifact {
                kind: ArtifactKind::Vector,
                payload: qr_svg,
            },
            warnings: Vec::new(),
        }),
    }
}
