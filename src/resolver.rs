//! Package resolution.
//!
//! The [`PackageResolver`] maps package ids to directories, parses packages once and keeps the
//! import alias table of every package it has seen. All three caches live for the whole run.

use crate::error::{Error, Result};
use crate::scanner::{list_source_files, PackageScanner};
use crate::source::{FunctionDecl, ImportDecl, SourceUnit, SymbolSource, TypeDecl};
use log::{debug, warn};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Search settings for package lookup.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// Module search path; packages live under `<root>/src/<id>`
    pub search_path: Vec<PathBuf>,
    /// Standard library root; packages live under `<root>/src/<id>` or `<root>/src/pkg/<id>`
    pub std_root: Option<PathBuf>,
    pub vendoring_path: Option<PathBuf>,
    pub disable_vendoring: bool,
    pub entry_packages: Vec<String>,
    /// Directory whose `vendor/` is searched first
    pub working_dir: PathBuf,
    pub ignore: Option<Regex>,
}

/// All parsed source files of one package directory.
#[derive(Debug)]
pub struct Package {
    pub location: PathBuf,
    pub units: Vec<SourceUnit>,
}

impl Package {
    pub fn types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.units.iter().flat_map(|unit| unit.types.iter())
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.units.iter().flat_map(|unit| unit.functions.iter())
    }

    pub fn imports(&self) -> impl Iterator<Item = &ImportDecl> {
        self.units.iter().flat_map(|unit| unit.imports.iter())
    }

    pub fn comments(&self) -> impl Iterator<Item = &String> {
        self.units.iter().flat_map(|unit| unit.comments.iter())
    }
}

/// Alias → candidate package ids, in first-seen order.
pub type ImportTable = BTreeMap<String, Vec<String>>;

pub struct PackageResolver {
    config: ResolverConfig,
    source: Box<dyn SymbolSource>,
    locations: HashMap<String, Option<PathBuf>>,
    packages: HashMap<PathBuf, Rc<Package>>,
    imports: HashMap<PathBuf, ImportTable>,
}

impl PackageResolver {
    pub fn new(config: ResolverConfig, source: Box<dyn SymbolSource>) -> Self {
        Self {
            config,
            source,
            locations: HashMap::new(),
            packages: HashMap::new(),
            imports: HashMap::new(),
        }
    }

    pub fn source(&self) -> &dyn SymbolSource {
        self.source.as_ref()
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns true if the package id matches the ignore pattern.
    pub fn is_ignored(&self, package: &str) -> bool {
        self.config
            .ignore
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(package))
    }

    /// Resolves a package id to its directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PackageNotFound`] if no search root holds the package.
    pub fn resolve(&mut self, package: &str) -> Result<PathBuf> {
        self.try_resolve(package)
            .ok_or_else(|| Error::PackageNotFound {
                package: package.to_string(),
            })
    }

    /// Resolves a package id, caching the answer either way.
    pub fn try_resolve(&mut self, package: &str) -> Option<PathBuf> {
        if let Some(cached) = self.locations.get(package) {
            return cached.clone();
        }

        let found = self.search(package);
        match &found {
            Some(location) => debug!("Resolved package {} to {}", package, location.display()),
            None => debug!("Package {} not found on any search root", package),
        }
        self.locations.insert(package.to_string(), found.clone());
        found
    }

    fn search(&mut self, package: &str) -> Option<PathBuf> {
        let relative = Path::new(package.trim_matches('/'));

        if let Some(vendoring_path) = &self.config.vendoring_path {
            if let Some(found) = existing_dir(&vendoring_path.join(relative)) {
                return Some(found);
            }
        }

        if let Some(found) = existing_dir(&self.config.working_dir.join("vendor").join(relative)) {
            return Some(found);
        }

        let is_entry = self.config.entry_packages.iter().any(|e| e == package);
        if !self.config.disable_vendoring && !is_entry {
            let entries = self.config.entry_packages.clone();
            for entry in entries {
                let Some(entry_location) = self.try_resolve(&entry) else {
                    continue;
                };
                if let Some(found) = existing_dir(&entry_location.join("vendor").join(relative)) {
                    return Some(found);
                }
            }
        }

        for root in &self.config.search_path {
            if let Some(found) = existing_dir(&root.join("src").join(relative)) {
                return Some(found);
            }
        }

        if let Some(std_root) = &self.config.std_root {
            if let Some(found) = existing_dir(&std_root.join("src").join(relative)) {
                return Some(found);
            }
            if let Some(found) = existing_dir(&std_root.join("src").join("pkg").join(relative)) {
                return Some(found);
            }
        }

        None
    }

    /// Resolves an entry package and lists it together with all its sub-packages.
    ///
    /// Packages matching the ignore pattern are left out.
    pub fn discover(&mut self, package: &str) -> Result<Vec<String>> {
        let location = self.resolve(package)?;
        let result = PackageScanner::new(location).scan(package)?;
        Ok(result
            .packages
            .into_iter()
            .filter(|p| {
                let ignored = self.is_ignored(p);
                if ignored {
                    debug!("Ignoring package {}", p);
                }
                !ignored
            })
            .collect())
    }

    /// Parses every source file of a package directory, once per location.
    ///
    /// Files that fail to parse are logged and skipped.
    pub fn load_package(&mut self, location: &Path) -> Result<Rc<Package>> {
        if let Some(package) = self.packages.get(location) {
            return Ok(Rc::clone(package));
        }

        let files = list_source_files(location, self.source.as_ref())?;
        let mut units = Vec::with_capacity(files.len());
        for file in &files {
            match self.source.parse_file(file) {
                Ok(unit) => units.push(unit),
                Err(e) => warn!("Failed to parse {}: {}", file.display(), e),
            }
        }
        debug!(
            "Loaded {} of {} files from {}",
            units.len(),
            files.len(),
            location.display()
        );

        let package = Rc::new(Package {
            location: location.to_path_buf(),
            units,
        });
        self.packages
            .insert(location.to_path_buf(), Rc::clone(&package));
        Ok(package)
    }

    /// Builds the import alias table of a package.
    ///
    /// Returns the imported package ids that are not ignored, in declaration order. Calling it
    /// again for the same location returns an empty list.
    pub fn record_imports(&mut self, location: &Path) -> Result<Vec<String>> {
        if self.imports.contains_key(location) {
            return Ok(Vec::new());
        }

        let package = self.load_package(location)?;
        let mut table = ImportTable::new();
        let mut imported = Vec::new();

        for import in package.imports() {
            if self.is_ignored(&import.path) {
                debug!("Ignoring import {}", import.path);
                continue;
            }
            let candidates = table.entry(import.local_name().to_string()).or_default();
            if !candidates.contains(&import.path) {
                candidates.push(import.path.clone());
            }
            if !imported.contains(&import.path) {
                imported.push(import.path.clone());
            }
        }

        self.imports.insert(location.to_path_buf(), table);
        Ok(imported)
    }

    /// Candidate package ids for an alias used inside the package at `location`.
    pub fn import_candidates(&self, location: &Path, alias: &str) -> Option<&[String]> {
        self.imports
            .get(location)
            .and_then(|table| table.get(alias))
            .map(Vec::as_slice)
    }

    pub fn import_table(&self, location: &Path) -> Option<&ImportTable> {
        self.imports.get(location)
    }
}

fn existing_dir(path: &Path) -> Option<PathBuf> {
    let canonical = path.canonicalize().ok()?;
    canonical.is_dir().then_some(canonical)
}
