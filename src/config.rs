//! Generator configuration.

use crate::source::Language;
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

/// Default package ignore pattern; matches nothing but the empty id.
pub const DEFAULT_IGNORE: &str = "^$";

/// Settings for one generation run.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Root package ids to scan
    pub api_packages: Vec<String>,
    /// File holding the document-level directives
    pub main_api_file: Option<PathBuf>,
    /// Receiver type pattern selecting controller methods; `None` accepts every function
    pub controller_class: Option<String>,
    /// Package id pattern of packages to skip
    pub ignore: String,
    pub vendoring_path: Option<PathBuf>,
    pub disable_vendoring: bool,
    /// Module search path (GOPATH entries)
    pub search_path: Vec<PathBuf>,
    /// Standard library root (GOROOT)
    pub std_root: Option<PathBuf>,
    pub working_dir: PathBuf,
    pub base_path: String,
    /// Type name to primitive kind, applied before model resolution
    pub marshal_overrides: BTreeMap<String, String>,
    /// Treat every resolution error as fatal
    pub strict: bool,
    pub language: Language,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_packages: Vec::new(),
            main_api_file: None,
            controller_class: None,
            ignore: DEFAULT_IGNORE.to_string(),
            vendoring_path: None,
            disable_vendoring: false,
            search_path: Vec::new(),
            std_root: None,
            working_dir: PathBuf::from("."),
            base_path: String::new(),
            marshal_overrides: default_marshal_overrides(),
            strict: false,
            language: Language::Go,
        }
    }
}

impl GeneratorConfig {
    /// Default configuration with the search path taken from `GOPATH` and the standard
    /// library root from `GOROOT`.
    pub fn from_env() -> Self {
        let search_path = env::var_os("GOPATH")
            .map(|value| env::split_paths(&value).collect())
            .unwrap_or_default();
        let std_root = env::var_os("GOROOT")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        let working_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        Self {
            search_path,
            std_root,
            working_dir,
            ..Self::default()
        }
    }
}

/// Database wrapper types that marshal as plain primitives.
pub fn default_marshal_overrides() -> BTreeMap<String, String> {
    [
        ("NullString", "string"),
        ("NullInt64", "int"),
        ("NullFloat64", "float"),
        ("NullBool", "bool"),
    ]
    .into_iter()
    .map(|(name, kind)| (name.to_string(), kind.to_string()))
    .collect()
}
