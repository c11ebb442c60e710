//! Project walking and source snapshotting.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::config::ProjectConfig;
use crate::core::errors::Result;
use crate::core::file_utils::FileReader;
use crate::lang::python::FunctionExtractor;

/// A scanned file: its project-relative path, its text at scan time and the
/// functions found in it.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFile {
    /// Path relative to the project root
    pub path: PathBuf,
    /// Raw text, or a read-error placeholder
    #[serde(skip)]
    pub text: String,
    /// Function names in definition order
    pub functions: Vec<String>,
}

/// Walks a project tree and loads candidate source files
#[derive(Debug, Clone)]
pub struct SourceScanner {
    config: ProjectConfig,
}

impl SourceScanner {
    /// Create a scanner for the given project layout
    pub fn new(config: ProjectConfig) -> Self {
        Self { config }
    }

    /// Relative paths of every candidate source file, sorted by walk order.
    ///
    /// Directories named in `skip_dirs` are pruned, and the orchestrator's
    /// own file is never returned. Entries the walk cannot read are skipped.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        let root = &self.config.root;
        let skip_dirs = &self.config.skip_dirs;

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                !skip_dirs.iter().any(|d| name == d.as_str())
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable path under {}: {}", root.display(), err);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if !name.ends_with(&self.config.source_extension) || name == self.config.self_file {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();
            files.push(relative);
        }

        debug!("Scanned {} source files under {}", files.len(), root.display());
        Ok(files)
    }

    /// Whether a path names a test file (its file name carries the test prefix)
    pub fn is_test_file(&self, path: &Path) -> bool {
        path.file_name()
            .map(|n| n.to_string_lossy().starts_with(&self.config.test_prefix))
            .unwrap_or(false)
    }

    /// Snapshot one file and extract its functions.
    ///
    /// Unreadable files become placeholders rather than errors.
    pub fn load(&self, relative: &Path, extractor: &mut FunctionExtractor) -> Result<SourceFile> {
        let text = FileReader::read_or_placeholder(&self.config.resolve(relative));
        let functions = extractor.functions(&text)?;

        Ok(SourceFile {
            path: relative.to_path_buf(),
            text,
            functions,
        })
    }

    /// Scan and load every file, split into (sources, tests)
    pub fn load_all(
        &self,
        extractor: &mut FunctionExtractor,
    ) -> Result<(Vec<SourceFile>, Vec<SourceFile>)> {
        let paths = self.scan()?;
        self.load_paths(&paths, extractor)
    }

    /// Load already-scanned paths, split into (sources, tests)
    pub fn load_paths(
        &self,
        paths: &[PathBuf],
        extractor: &mut FunctionExtractor,
    ) -> Result<(Vec<SourceFile>, Vec<SourceFile>)> {
        let mut sources = Vec::new();
        let mut tests = Vec::new();

        for relative in paths {
            let file = self.load(relative, extractor)?;
            if self.is_test_file(relative) {
                tests.push(file);
            } else {
                sources.push(file);
            }
        }

        Ok((sources, tests))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn project(root: &Path) -> ProjectConfig {
        ProjectConfig {
            root: root.to_path_buf(),
            ..ProjectConfig::default()
        }
    }

    #[test]
    fn scan_prunes_skip_dirs_and_self_file() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("calculator.py"), "def add(a, b):\n    return a + b\n").unwrap();
        fs::write(root.join("test_agent.py"), "def run():\n    pass\n").unwrap();
        fs::write(root.join("notes.txt"), "def nope():").unwrap();
        for skipped in [".venv", "venv", "__pycache__", ".pytest_cache", ".git"] {
            fs::create_dir_all(root.join(skipped)).unwrap();
            fs::write(root.join(skipped).join("hidden.py"), "def hidden():\n").unwrap();
        }
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::write(root.join("pkg/util.py"), "def helper():\n    pass\n").unwrap();

        let scanner = SourceScanner::new(project(root));
        let files = scanner.scan().unwrap();

        assert_eq!(
            files,
            vec![PathBuf::from("calculator.py"), PathBuf::from("pkg/util.py")]
        );
    }

    #[test]
    fn test_files_are_recognised_by_file_name() {
        let scanner = SourceScanner::new(ProjectConfig::default());
        assert!(scanner.is_test_file(Path::new("test_calculator.py")));
        assert!(scanner.is_test_file(Path::new("tests/test_math.py")));
        assert!(!scanner.is_test_file(Path::new("calculator.py")));
        assert!(!scanner.is_test_file(Path::new("contest_entry.py")));
    }

    #[test]
    fn load_all_splits_sources_from_tests() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("calculator.py"), "def add(a, b):\n    return a + b\n").unwrap();
        fs::write(root.join("test_calculator.py"), "def test_add():\n    assert True\n").unwrap();

        let scanner = SourceScanner::new(project(root));
        let mut extractor = FunctionExtractor::LinePrefix;
        let (sources, tests) = scanner.load_all(&mut extractor).unwrap();

        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].functions, vec!["add"]);
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].functions, vec!["test_add"]);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("calculator.py"), "def add(a, b):\n    return a + b\n").unwrap();
        let locked = root.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("secret.py"), "def hidden():\n    pass\n").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // privileged users read through mode 000, so there is nothing to skip
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let scanned = SourceScanner::new(project(root)).scan();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(scanned.unwrap(), vec![PathBuf::from("calculator.py")]);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_does_not_abort_loading() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("calculator.py"), "def add(a, b):\n    return a + b\n").unwrap();
        symlink(root.join("missing_target.py"), root.join("broken.py")).unwrap();

        let scanner = SourceScanner::new(project(root));
        let mut extractor = FunctionExtractor::LinePrefix;
        let broken = scanner.load(Path::new("broken.py"), &mut extractor).unwrap();

        assert!(broken.text.starts_with("Error reading file:"));
        assert!(broken.functions.is_empty());
    }
}
