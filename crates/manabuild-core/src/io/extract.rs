//! Archive extraction module
//!
//! manatee-open is distributed as `.tar.gz`; that is the only format handled.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use thiserror::Error;

/// Extraction failed.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Reading the archive or writing an entry failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The file is not a gzip-compressed tarball
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),
}

/// Whether `path` names a gzip-compressed tarball.
pub fn is_tar_gz(path: &Path) -> bool {
    let name = path.to_string_lossy().to_lowercase();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Extract a `.tar.gz` archive into `dest_dir`, keeping file modes so that
/// scripts such as `configure` stay executable.
///
/// # Errors
///
/// Returns [`ExtractError`] if the archive is not a tarball, cannot be
/// read, or contains entries that escape `dest_dir`.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
    if !is_tar_gz(archive_path) {
        return Err(ExtractError::UnsupportedFormat(
            archive_path.display().to_string(),
        ));
    }

    fs::create_dir_all(dest_dir)?;
    let file = File::open(archive_path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.set_preserve_permissions(true);
    archive.unpack(dest_dir)?;
    Ok(())
}
