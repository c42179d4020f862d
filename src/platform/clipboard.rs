//! Clipboard surface (text MIME only)

use std::sync::Mutex;

use crate::error::{Error, Result};

/// Platform clipboard, text writes only
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<()>;
    fn read_text(&self) -> Result<String>;
}

/// In-memory clipboard
#[derive(Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        *self
            .contents
            .lock()
            .map_err(|_| Error::Other("clipboard lock poisoned".to_string()))? =
            Some(text.to_string());
        Ok(())
    }

    fn read_text(&self) -> Result<String> {
        self.contents
            .lock()
            .map_err(|_| Error::Other("clipboard lock poisoned".to_string()))?
            .clone()
            .ok_or_else(|| Error::Other("clipboard is empty".to_string()))
    }
}

/// Simulates a platform that denies clipboard access
pub struct DeniedClipboard;

impl Clipboard for DeniedClipboard {
    fn write_text(&self, _text: &str) -> Result<()> {
        Err(Error::ClipboardPermissionError(
            "write access denied by platform".to_string(),
        ))
    }

    fn read_text(&self) -> Result<String> {
        Err(Error::ClipboardPermissionError(
            "read access denied by platform".to_string(),
        ))
    }
}
