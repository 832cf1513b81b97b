//! File discovery and validation helpers

use crate::vcf::VCF_SUFFIX;
use crate::{RepopError, RepopResult};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Check if a file is gzip compressed
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> RepopResult<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0; 2];

    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1f, 0x8b]),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(RepopError::Io(e)),
    }
}

/// All `.vcf.gz` files directly inside `dir`, in sorted name order so runs
/// are reproducible.
pub fn discover_inputs(dir: &Path) -> RepopResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_input = path.is_file()
            && path
                .file_name()
                .and_then(|s| s.to_str())
                .map(|name| name.ends_with(VCF_SUFFIX))
                .unwrap_or(false);
        if is_input {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Validate file paths and check if they exist
pub fn validate_file_exists<P: AsRef<Path>>(path: P) -> RepopResult<()> {
    if !path.as_ref().exists() {
        return Err(RepopError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("file not found: {}", path.as_ref().display()),
        )));
    }
    Ok(())
}

/// Timer utility for measuring execution time
pub struct Timer {
    start: std::time::Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::info!("Starting timer: {}", name);
        Timer {
            start: std::time::Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    pub fn log_elapsed(&self) {
        let duration = self.elapsed();
        log::info!("Timer '{}' elapsed: {:.2?}", self.name, duration);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.log_elapsed();
    }
}
