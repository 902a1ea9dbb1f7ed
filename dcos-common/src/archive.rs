//! Plugin package handling: zip detection and extraction, file modes.

use std::fs;
use std::io::{self, Cursor};
use std::path::Path;

use zip::ZipArchive;

use crate::error::CommonError;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Whether `data` starts with a zip local file header. Packages are sniffed
/// rather than trusted by extension since download URLs rarely carry one.
pub fn is_zip(data: &[u8]) -> bool {
    data.starts_with(ZIP_MAGIC)
}

/// Unpack a zip package under `target_dir`, returning the number of files
/// written.
///
/// Entries whose path would escape `target_dir` fail the whole extraction.
/// Unix permission bits stored in the archive are restored.
pub fn extract_zip(data: &[u8], target_dir: &Path) -> Result<usize, CommonError> {
    fs::create_dir_all(target_dir)?;
    let mut archive =
        ZipArchive::new(Cursor::new(data)).map_err(|err| CommonError::Archive(err.to_string()))?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| CommonError::Archive(err.to_string()))?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(CommonError::UnsafePath(entry.name().to_string()));
        };
        let path = target_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&path)?;
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        io::copy(&mut entry, &mut fs::File::create(&path)?)?;
        written += 1;

        if let Some(mode) = entry.unix_mode() {
            set_mode(&path, mode & 0o777)?;
        }
    }
    Ok(written)
}

/// Set unix permission bits. A no-op elsewhere.
pub fn set_mode(path: &Path, mode: u32) -> Result<(), CommonError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}
