//! File utilities for reading project sources and rewriting test files.
//!
//! Scanning reads tolerate non-UTF-8 content (lossy conversion) and binary
//! files are refused. Files that will be rewritten must be valid UTF-8.
//! Writes go through a sibling temp file and a rename so a crash never leaves
//! a half-written test file behind.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::errors::{Result, TestgapError};

/// Prefix of the placeholder text substituted for unreadable files
pub const READ_ERROR_PREFIX: &str = "Error reading file:";

/// Safe file reading with UTF-8 validation and fallback handling
pub struct FileReader;

impl FileReader {
    /// Read a file to string, handling non-UTF-8 files gracefully
    pub fn read_to_string(file_path: &Path) -> Result<String> {
        if Self::is_likely_binary(file_path)? {
            return Err(TestgapError::validation(format!(
                "File appears to be binary: {}",
                file_path.display()
            )));
        }

        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                let bytes = fs::read(file_path)
                    .map_err(|err| TestgapError::io("Failed to read file as bytes", err))?;

                warn!(
                    "File contained invalid UTF-8, converted with lossy encoding: {}",
                    file_path.display()
                );
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            Err(e) => Err(TestgapError::io(
                format!("Failed to read file: {}", file_path.display()),
                e,
            )),
        }
    }

    /// Read a file, substituting a descriptive placeholder when it cannot be read.
    ///
    /// Scanning keeps going over unreadable files; the placeholder contains no
    /// definition lines, so it contributes no functions.
    pub fn read_or_placeholder(file_path: &Path) -> String {
        match Self::read_to_string(file_path) {
            Ok(content) => content,
            Err(err) => {
                warn!("Skipping unreadable file {}: {}", file_path.display(), err);
                format!("{READ_ERROR_PREFIX} {err}")
            }
        }
    }

    /// Read a file if it exists, returning an empty string otherwise
    pub fn read_if_exists(file_path: &Path) -> Result<String> {
        if file_path.exists() {
            Self::read_to_string(file_path)
        } else {
            Ok(String::new())
        }
    }

    /// Read a file that is about to be rewritten, returning an empty string if
    /// it does not exist.
    ///
    /// Unlike [`FileReader::read_to_string`] there is no lossy fallback: a file
    /// that is not valid UTF-8 is an error, so rewriting it cannot mangle bytes.
    pub fn read_for_rewrite(file_path: &Path) -> Result<String> {
        if !file_path.exists() {
            return Ok(String::new());
        }

        fs::read_to_string(file_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                TestgapError::validation(format!(
                    "Refusing to rewrite {}: file is not valid UTF-8",
                    file_path.display()
                ))
            } else {
                TestgapError::io(format!("Failed to read file: {}", file_path.display()), e)
            }
        })
    }

    /// Check if a file is likely to be binary based on extension and content sampling
    pub fn is_likely_binary(file_path: &Path) -> Result<bool> {
        if let Some(extension) = file_path.extension().and_then(|ext| ext.to_str()) {
            let binary_extensions = [
                "zip", "tar", "gz", "bz2", "xz", "7z", "png", "jpg", "jpeg", "gif", "pdf", "exe",
                "dll", "so", "dylib", "bin", "pyc", "pyo", "sqlite", "db",
            ];

            if binary_extensions
                .iter()
                .any(|&ext| extension.eq_ignore_ascii_case(ext))
            {
                return Ok(true);
            }
        }

        let metadata = fs::metadata(file_path)
            .map_err(|e| TestgapError::io("Failed to read file metadata", e))?;

        if metadata.len() > 10 * 1024 * 1024 {
            return Ok(true);
        }

        let sample_size = std::cmp::min(1024, metadata.len() as usize);
        if sample_size == 0 {
            return Ok(false);
        }

        let mut buffer = vec![0u8; sample_size];
        let mut file = fs::File::open(file_path)
            .map_err(|e| TestgapError::io("Failed to open file for sampling", e))?;
        file.read_exact(&mut buffer)
            .map_err(|e| TestgapError::io("Failed to read file sample", e))?;

        let null_bytes = buffer.iter().filter(|&&b| b == 0).count();
        let null_percentage = (null_bytes as f64 / buffer.len() as f64) * 100.0;

        Ok(null_percentage > 1.0)
    }
}

/// Replace the contents of `path` in a single step.
///
/// The new content is written to a temp file next to the target and renamed
/// over it, so readers see either the old or the new file.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&parent).map_err(|e| {
        TestgapError::io(format!("Failed to create directory {}", parent.display()), e)
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| TestgapError::validation(format!("Not a file path: {}", path.display())))?;
    let temp_path = parent.join(format!(".{file_name}.testgap.tmp"));

    fs::write(&temp_path, content).map_err(|e| {
        TestgapError::io(format!("Failed to write {}", temp_path.display()), e)
    })?;

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(TestgapError::io(
            format!("Failed to replace {}", path.display()),
            e,
        ));
    }

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_valid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("calculator.py");
        fs::write(&file_path, "def add(a, b):\n    return a + b\n").unwrap();

        let content = FileReader::read_to_string(&file_path).unwrap();
        assert!(content.starts_with("def add"));
    }

    #[test]
    fn test_invalid_utf8_is_converted_lossily() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("latin1.py");
        fs::write(&file_path, b"# caf\xe9\ndef f():\n    pass\n").unwrap();

        let content = FileReader::read_to_string(&file_path).unwrap();
        assert!(content.contains("def f():"));
    }

    #[test]
    fn test_binary_detection_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        let binary_file = temp_dir.path().join("module.pyc");
        fs::write(&binary_file, b"\x42\x0d\x0d\x0a").unwrap();

        assert!(FileReader::is_likely_binary(&binary_file).unwrap());
    }

    #[test]
    fn test_empty_file_is_not_binary() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("__init__.py");
        fs::write(&file_path, "").unwrap();

        assert!(!FileReader::is_likely_binary(&file_path).unwrap());
        assert_eq!(FileReader::read_to_string(&file_path).unwrap(), "");
    }

    #[test]
    fn test_missing_file_becomes_placeholder() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("gone.py");

        let content = FileReader::read_or_placeholder(&missing);
        assert!(content.starts_with(READ_ERROR_PREFIX));
    }

    #[test]
    fn test_read_if_exists_defaults_to_empty() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("test_calculator.py");
        assert_eq!(FileReader::read_if_exists(&missing).unwrap(), "");
    }

    #[test]
    fn test_read_for_rewrite_rejects_invalid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test_calculator.py");
        fs::write(&file_path, b"# caf\xe9\ndef test_add():\n    pass\n").unwrap();

        let err = FileReader::read_for_rewrite(&file_path).unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));

        let missing = temp_dir.path().join("test_missing.py");
        assert_eq!(FileReader::read_for_rewrite(&missing).unwrap(), "");
    }

    #[test]
    fn test_write_atomic_replaces_content_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("test_calculator.py");
        fs::write(&target, "old").unwrap();

        write_atomic(&target, "new content").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "new content");
        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_write_atomic_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("reports/nested/out.md");

        write_atomic(&target, "# Report\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "# Report\n");
    }
}
