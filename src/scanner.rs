use crate::error::{Error, Result};
use crate::source::SymbolSource;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory names that never hold packages of their own.
const SKIPPED_DIRS: &[&str] = &["vendor", "testdata", "target", "node_modules"];

/// Package scanner for discovering sub-packages below an entry package.
///
/// The `PackageScanner` walks the directory of an entry package and reports every directory
/// below it as a package id relative to the entry id. Hidden directories, directories starting
/// with `_`, vendored code and test data are skipped.
///
/// # Example
///
/// ```no_run
/// use swagger_from_comments::scanner::PackageScanner;
/// use std::path::PathBuf;
///
/// let scanner = PackageScanner::new(PathBuf::from("/go/src/github.com/acme/shop"));
/// let result = scanner.scan("github.com/acme/shop").unwrap();
/// println!("Found {} packages", result.packages.len());
/// ```
pub struct PackageScanner {
    root_path: PathBuf,
}

/// Result of a package discovery walk.
pub struct ScanResult {
    /// Package ids, entry package first, then in walk order
    pub packages: Vec<String>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl PackageScanner {
    /// Creates a new `PackageScanner` for the directory of an entry package.
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Walks the directory tree and returns the entry package plus all sub-packages.
    ///
    /// Sub-package ids are `<root_id>/<relative path>` with `/` separators on every platform.
    /// Directories that cannot be read are recorded as warnings and scanning continues.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory does not exist.
    pub fn scan(&self, root_id: &str) -> Result<ScanResult> {
        if !self.root_path.is_dir() {
            return Err(Error::io(
                &self.root_path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "package directory not found"),
            ));
        }

        let mut packages = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                // Don't filter the root directory itself
                if e.path() == self.root_path {
                    return true;
                }
                if !e.file_type().is_dir() {
                    return false;
                }

                let file_name = e.file_name().to_string_lossy();
                let is_hidden = file_name.starts_with('.') || file_name.starts_with('_');
                let is_skipped = SKIPPED_DIRS.contains(&file_name.as_ref());

                !is_hidden && !is_skipped
            })
        {
            match entry {
                Ok(entry) => {
                    let Ok(relative) = entry.path().strip_prefix(&self.root_path) else {
                        continue;
                    };
                    let relative: Vec<String> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();

                    let package = if relative.is_empty() {
                        root_id.to_string()
                    } else {
                        format!("{}/{}", root_id.trim_end_matches('/'), relative.join("/"))
                    };
                    debug!("Discovered package {}", package);
                    packages.push(package);
                }
                Err(e) => {
                    // Record warning for inaccessible directories
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(ScanResult { packages, warnings })
    }
}

/// Lists the source files of one package directory, sorted by file name.
///
/// Only the directory itself is read; sub-directories are separate packages.
pub fn list_source_files(dir: &Path, source: &dyn SymbolSource) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && source.is_source_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
