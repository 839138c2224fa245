//! The generation driver.
//!
//! [`Generator`] runs the batch pipeline: discover the packages below every entry package,
//! register the type declarations of those packages and everything they import, then parse
//! the annotated functions of each package into operations and fold them into the document.
//!
//! The driver owns the error policy. An entry package that cannot be found aborts the run.
//! A resolution error raised by an operation of an entry package aborts the run too, while the
//! same error in a discovered sub-package only skips that operation unless `strict` is set.

use crate::config::GeneratorConfig;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::model_builder::{ModelBuilder, TypeRegistry};
use crate::operation::Operation;
use crate::resolver::{PackageResolver, ResolverConfig};
use crate::source::{FunctionDecl, SymbolSource};
use log::{debug, info, warn};
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// A package found while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPackage {
    pub id: String,
    /// Explicitly requested through the configuration
    pub entry: bool,
}

pub struct Generator {
    config: GeneratorConfig,
    resolver: PackageResolver,
    registry: TypeRegistry,
    document: Document,
    controller: Option<Regex>,
    scanned: Vec<ScannedPackage>,
}

impl Generator {
    /// Creates a generator reading sources of the configured language.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the ignore or controller pattern is not a valid
    /// regular expression.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let source = config.language.symbol_source();
        Self::with_source(config, source)
    }

    /// Creates a generator reading sources through a caller-supplied symbol source.
    pub fn with_source(config: GeneratorConfig, source: Box<dyn SymbolSource>) -> Result<Self> {
        let ignore = Regex::new(&config.ignore)?;
        let controller = config
            .controller_class
            .as_deref()
            .map(Regex::new)
            .transpose()?;

        let resolver = PackageResolver::new(
            ResolverConfig {
                search_path: config.search_path.clone(),
                std_root: config.std_root.clone(),
                vendoring_path: config.vendoring_path.clone(),
                disable_vendoring: config.disable_vendoring,
                entry_packages: config.api_packages.clone(),
                working_dir: config.working_dir.clone(),
                ignore: Some(ignore),
            },
            source,
        );
        let document = Document::new(&config.base_path);

        Ok(Self {
            config,
            resolver,
            registry: TypeRegistry::new(),
            document,
            controller,
            scanned: Vec::new(),
        })
    }

    /// Runs the whole pipeline and returns the assembled document.
    pub fn run(mut self) -> Result<Document> {
        match self.locate_main_api_file() {
            Some(path) => self.parse_general_api_info(&path)?,
            None => debug!("No general API info file found"),
        }
        self.parse_api()?;
        Ok(self.into_document())
    }

    /// The configured main API file, or the default entry file of the first entry package.
    pub fn locate_main_api_file(&mut self) -> Option<PathBuf> {
        if let Some(path) = &self.config.main_api_file {
            return Some(if path.is_absolute() {
                path.clone()
            } else {
                self.config.working_dir.join(path)
            });
        }

        let entry = self.config.api_packages.first()?.clone();
        let candidate = self
            .resolver
            .try_resolve(&entry)?
            .join(self.resolver.source().default_entry_file());
        candidate.is_file().then_some(candidate)
    }

    /// Reads the document-level directives of one file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub fn parse_general_api_info(&mut self, path: &Path) -> Result<()> {
        info!("Parsing general API info from {}", path.display());
        let unit = self.resolver.source().parse_file(path)?;

        for line in &unit.comments {
            if line.starts_with("@SubApi") {
                if let Err(e) = self.document.parse_sub_api(line) {
                    warn!("Skipping directive: {}", e);
                }
            } else {
                self.document.parse_general_info(line);
            }
        }
        Ok(())
    }

    /// Scans, registers and parses every configured package.
    pub fn parse_api(&mut self) -> Result<()> {
        self.scan_packages()?;
        info!("Scanned {} packages", self.scanned.len());

        let scanned = self.scanned.clone();
        for package in &scanned {
            self.register_types(&package.id)?;
        }
        for package in &scanned {
            self.parse_api_description(package)?;
        }
        Ok(())
    }

    /// Lists every entry package and the sub-packages below it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PackageNotFound`] for an entry package that does not resolve.
    pub fn scan_packages(&mut self) -> Result<&[ScannedPackage]> {
        for entry in self.config.api_packages.clone() {
            if self.resolver.is_ignored(&entry) {
                warn!("Entry package {} matches the ignore pattern", entry);
                continue;
            }
            for id in self.resolver.discover(&entry)? {
                if self.scanned.iter().any(|p| p.id == id) {
                    continue;
                }
                let is_entry = self.config.api_packages.contains(&id);
                self.scanned.push(ScannedPackage { id, entry: is_entry });
            }
        }
        Ok(&self.scanned)
    }

    /// Registers the type declarations of a package and of every package it imports,
    /// transitively. Imports that do not resolve are skipped.
    pub fn register_types(&mut self, package: &str) -> Result<()> {
        let mut queue = VecDeque::from([package.to_string()]);

        while let Some(next) = queue.pop_front() {
            if next != package && self.resolver.try_resolve(&next).is_none() {
                debug!("Skipping unresolvable import {}", next);
                continue;
            }
            let imports = self.registry.register(&mut self.resolver, &next)?;
            queue.extend(imports);
        }
        Ok(())
    }

    /// Parses the annotated functions of one package into operations.
    pub fn parse_api_description(&mut self, package: &ScannedPackage) -> Result<()> {
        let location = self.resolver.resolve(&package.id)?;
        let parsed = self.resolver.load_package(&location)?;
        let mut added = 0;

        for function in parsed.functions() {
            if !self.is_controller(function) {
                continue;
            }

            let mut op = Operation::new(&package.id);
            let result = {
                let mut builder = ModelBuilder::new(
                    &mut self.resolver,
                    &mut self.registry,
                    &self.config.marshal_overrides,
                );
                op.parse_comment(&function.doc, &mut builder)
            };

            match result {
                Ok(()) => {}
                Err(Error::EmptyAnnotation) => continue,
                Err(e) => {
                    let e = Error::InFunction {
                        function: function.name.clone(),
                        package: package.id.clone(),
                        source: Box::new(e),
                    };
                    if self.config.strict || package.entry || !e.is_resolution() {
                        return Err(e);
                    }
                    warn!("Skipping operation: {}", e);
                    continue;
                }
            }

            if op.path.is_empty() {
                debug!("{}.{} has no route, skipping", package.id, function.name);
                continue;
            }
            match self.document.add_operation(op) {
                Ok(()) => added += 1,
                Err(e) => warn!("Skipping {}.{}: {}", package.id, function.name, e),
            }
        }

        for line in parsed.comments() {
            if !line.starts_with("@SubApi") {
                continue;
            }
            if let Err(e) = self.document.parse_sub_api(line) {
                warn!("Skipping directive: {}", e);
            }
        }

        debug!("Added {} operations from {}", added, package.id);
        Ok(())
    }

    /// Whether a function is a candidate for annotation parsing.
    ///
    /// Without a controller pattern every function is a candidate; otherwise only methods
    /// whose receiver type matches.
    pub fn is_controller(&self, function: &FunctionDecl) -> bool {
        match &self.controller {
            None => true,
            Some(pattern) => function
                .receiver
                .as_deref()
                .is_some_and(|receiver| pattern.is_match(receiver)),
        }
    }

    pub fn scanned(&self) -> &[ScannedPackage] {
        &self.scanned
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}
