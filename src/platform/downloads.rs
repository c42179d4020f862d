//! Download sinks
//!
//! The filesystem sink writes through a `.part` staging file and renames on
//! success, so a failed export never leaves a partial file behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;

use crate::error::{Error, Result};
use crate::export::ExportFile;

/// Outcome of a delivered download
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub file_name: String,
    pub bytes_written: u64,
    /// Final path for filesystem sinks; `None` for in-memory sinks
    pub path: Option<PathBuf>,
}

/// Destination for exported files
pub trait DownloadSink: Send + Sync {
    fn deliver(&self, file: &ExportFile) -> Result<Delivery>;
}

/// Writes exports into a directory atomically
pub struct FsDownloads {
    dir: PathBuf,
}

impl FsDownloads {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl DownloadSink for FsDownloads {
    fn deliver(&self, file: &ExportFile) -> Result<Delivery> {
        fs::create_dir_all(&self.dir)?;
        let final_path = self.dir.join(&file.file_name);
        let part_path = self.dir.join(format!("{}.part", file.file_name));

        let write = || -> std::io::Result<()> {
            let mut f = fs::File::create(&part_path)?;
            f.write_all(&file.bytes)?;
            f.sync_all()?;
            Ok(())
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&part_path);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&part_path, &final_path) {
            let _ = fs::remove_file(&part_path);
            return Err(e.into());
        }

        debug!("delivered {} ({} bytes)", final_path.display(), file.bytes.len());
        Ok(Delivery {
            file_name: file.file_name.clone(),
            bytes_written: file.bytes.len() as u64,
            path: Some(final_path),
        })
    }
}

/// Records deliveries for tests
#[derive(Default)]
pub struct MemoryDownloads {
    files: Mutex<Vec<ExportFile>>,
}

impl MemoryDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> Vec<ExportFile> {
        self.files.lock().expect("downloads lock poisoned").clone()
    }
}

impl DownloadSink for MemoryDownloads {
    fn deliver(&self, file: &ExportFile) -> Result<Delivery> {
        self.files
            .lock()
            .map_err(|_| Error::Other("downloads lock poisoned".to_string()))?
            .push(file.clone());
        Ok(Delivery {
            file_name: file.file_name.clone(),
            bytes_written: file.bytes.len() as u64,
            path: None,
        })
    }
}
