//! Language-specific symbol sources.
//!
//! The engine never looks at syntax trees directly. A [`SymbolSource`] turns one source file into
//! a [`SourceUnit`]: the type declarations, function declarations (with their doc comment lines),
//! imports and free comment lines of that file. Everything downstream works on those records.
//!
//! Two sources are provided:
//!
//! - [`go::GoSource`] reads Go files through the tree-sitter Go grammar
//! - [`rust::RustSource`] reads Rust files through `syn`

pub mod go;
pub mod rust;

use crate::error::{Error, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Capability of turning source files of one language into [`SourceUnit`]s.
pub trait SymbolSource {
    /// Short language name used in log messages.
    fn language(&self) -> &'static str;

    /// Returns true if `path` is a source file that belongs to a package.
    ///
    /// Test files and hidden files are rejected here.
    fn is_source_file(&self, path: &Path) -> bool;

    /// File holding document-level directives when none is configured.
    fn default_entry_file(&self) -> &'static str;

    /// Parses the contents of one file.
    fn parse_source(&self, path: &Path, source: &str) -> Result<SourceUnit>;

    /// Reads and parses one file.
    fn parse_file(&self, path: &Path) -> Result<SourceUnit> {
        debug!("Parsing {} file: {}", self.language(), path.display());
        let source = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        self.parse_source(path, &source)
    }
}

/// Selects a symbol source by language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Go,
    Rust,
}

impl Language {
    pub fn symbol_source(self) -> Box<dyn SymbolSource> {
        match self {
            Language::Go => Box::new(go::GoSource),
            Language::Rust => Box::new(rust::RustSource),
        }
    }
}

/// The declarations of one parsed source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub types: Vec<TypeDecl>,
    pub functions: Vec<FunctionDecl>,
    pub imports: Vec<ImportDecl>,
    /// Every comment line of the file with markers stripped, in source order
    pub comments: Vec<String>,
}

impl SourceUnit {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub kind: TypeDeclKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDeclKind {
    Struct(Vec<FieldDecl>),
    /// A named type defined in terms of another type expression
    Alias(TypeExpr),
    Interface,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    /// `None` for embedded (flattened) fields
    pub name: Option<String>,
    pub ty: TypeExpr,
    pub annotations: FieldAnnotations,
}

/// Serialization hints attached to a field (struct tags, serde attributes, doc comments).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldAnnotations {
    pub rename: Option<String>,
    pub required: bool,
    pub description: Option<String>,
    pub skip: bool,
}

/// A declared type reference with pointers and other transparent wrappers removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Named {
        qualifier: Option<String>,
        name: String,
    },
    Array(Box<TypeExpr>),
    /// Map with the given value type
    Map(Box<TypeExpr>),
    Interface,
    Unsupported(String),
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named {
            qualifier: None,
            name: name.into(),
        }
    }

    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        TypeExpr::Named {
            qualifier: Some(qualifier.into()),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    /// Type name of the method receiver, pointers stripped
    pub receiver: Option<String>,
    pub doc: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    /// Fully qualified package id, `/`-separated
    pub path: String,
    pub alias: Option<String>,
}

impl ImportDecl {
    /// Name the importing file uses for this package.
    ///
    /// Blank and dot imports fall back to the last path segment.
    pub fn local_name(&self) -> &str {
        match self.alias.as_deref() {
            Some(alias) if alias != "_" && alias != "." && !alias.is_empty() => alias,
            _ => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}
