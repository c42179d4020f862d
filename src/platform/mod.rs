//! Platform delivery surfaces: download sink, clipboard, encoder probes
//!
//! Each surface is a trait with a real implementation and an in-memory or
//! always-failing double, so export behavior (atomic file writes, clipboard
//! denial, missing encoders) is testable without a host environment.

use std::path::Path;
use std::sync::Arc;

pub mod clipboard;
pub mod downloads;
pub mod encoders;

pub use clipboard::{Clipboard, DeniedClipboard, MemoryClipboard};
pub use downloads::{Delivery, DownloadSink, FsDownloads, MemoryDownloads};
pub use encoders::{DisabledEncoders, EncoderCapabilities, ProbeEncoders};

/// Bundle of the three surfaces a render session delivers through
#[derive(Clone)]
pub struct Platform {
    pub downloads: Arc<dyn DownloadSink>,
    pub clipboard: Arc<dyn Clipboard>,
    pub encoders: Arc<dyn EncoderCapabilities>,
}

impl Platform {
    /// Deliver files into a directory, with real encoder probes
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            downloads: Arc::new(FsDownloads::new(dir)),
            clipboard: Arc::new(MemoryClipboard::new()),
            encoders: Arc::new(ProbeEncoders),
        }
    }

    /// Fully in-memory platform for tests
    pub fn in_memory() -> Self {
        Self {
            downloads: Arc::new(MemoryDownloads::new()),
            clipboard: Arc::new(MemoryClipboard::new()),
            encoders: Arc::new(ProbeEncoders),
        }
    }
}
