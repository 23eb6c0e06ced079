//! Image file I/O service
//!
//! Keeps file-system access out of the pipeline and client so both stay testable
//! with in-memory buffers.

use crate::error::{Result, StudioError};
use std::path::{Path, PathBuf};

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Read an input file, returning its bytes
    ///
    /// # Errors
    /// - File missing or unreadable
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(StudioError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        std::fs::read(path_ref).map_err(|e| StudioError::file_io_error("read image file", path_ref, &e))
    }

    /// Write encoded bytes to `path`, creating parent directories as needed
    ///
    /// # Errors
    /// - Failed to create the parent directory or write the file
    pub fn write_file<P: AsRef<Path>>(bytes: &[u8], path: P) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StudioError::file_io_error("create output directory", parent, &e))?;
        }

        std::fs::write(path_ref, bytes)
            .map_err(|e| StudioError::file_io_error("write output file", path_ref, &e))?;

        log::debug!("Wrote {} bytes to {}", bytes.len(), path_ref.display());
        Ok(())
    }

    /// Resolve where an output lands: an explicit file path, or `file_name` inside a directory
    #[must_use]
    pub fn resolve_output_path(output: Option<&Path>, file_name: &str) -> PathBuf {
        match output {
            Some(path) if path.is_dir() || path.to_string_lossy().ends_with('/') => {
                path.join(file_name)
            },
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(file_name),
        }
    }

    /// File name component of a path as a string
    #[must_use]
    pub fn file_name(path: &Path) -> String {
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_file_is_io_error() {
        let err = ImageIOService::read_file("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, StudioError::Io(_)));
        assert!(err.to_string().contains("not/here.png"));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out/result.png");
        ImageIOService::write_file(b"png-bytes", &target).unwrap();
        assert_eq!(ImageIOService::read_file(&target).unwrap(), b"png-bytes");
    }

    #[test]
    fn test_resolve_output_path() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            ImageIOService::resolve_output_path(Some(dir.path()), "a_no_bg.png"),
            dir.path().join("a_no_bg.png")
        );
        assert_eq!(
            ImageIOService::resolve_output_path(Some(Path::new("x/custom.png")), "a_no_bg.png"),
            PathBuf::from("x/custom.png")
        );
        assert_eq!(
            ImageIOService::resolve_output_path(None, "a_no_bg.png"),
            PathBuf::from("a_no_bg.png")
        );
    }
}
