use crate::config::{default_marshal_overrides, GeneratorConfig, DEFAULT_IGNORE};
use crate::generator::Generator;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use crate::source::Language;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use std::env;
use std::path::PathBuf;

/// Swagger from comments - Generate Swagger 1.2 documents from annotated source comments
#[derive(Parser, Debug)]
#[command(name = "swagger-from-comments")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Packages to scan, together with all their sub-packages (comma separated)
    #[arg(long = "api-package", value_name = "PACKAGE", value_delimiter = ',', required = true)]
    pub api_packages: Vec<String>,

    /// File holding the general API info (defaults to main.go / lib.rs of the first package)
    #[arg(long = "main-api-file", value_name = "FILE")]
    pub main_api_file: Option<PathBuf>,

    /// Only parse methods whose receiver type matches this regular expression
    #[arg(long = "controller-class", value_name = "REGEX")]
    pub controller_class: Option<String>,

    /// Skip packages whose id matches this regular expression
    #[arg(long = "ignore", value_name = "REGEX", default_value = DEFAULT_IGNORE)]
    pub ignore: String,

    /// Directory searched for vendored packages before anything else
    #[arg(long = "vendoring-path", value_name = "DIR")]
    pub vendoring_path: Option<PathBuf>,

    /// Do not look into the vendor directories of the entry packages
    #[arg(long = "disable-vendoring")]
    pub disable_vendoring: bool,

    /// Module search path
    #[arg(long = "gopath", env = "GOPATH", value_name = "PATHS")]
    pub gopath: Option<String>,

    /// Standard library root
    #[arg(long = "goroot", env = "GOROOT", value_name = "DIR")]
    pub goroot: Option<PathBuf>,

    /// Base path written to the resource listing
    #[arg(long = "base-path", value_name = "URL", default_value = "")]
    pub base_path: String,

    /// Treat a type as a primitive kind, e.g. NullTime=string (repeatable)
    #[arg(long = "marshal-override", value_name = "NAME=KIND", value_parser = parse_override)]
    pub marshal_overrides: Vec<(String, String)>,

    /// Fail on any unresolvable type, also in discovered sub-packages
    #[arg(long = "strict")]
    pub strict: bool,

    /// Language of the scanned sources
    #[arg(short = 'l', long = "language", value_enum, default_value = "go")]
    pub language: SourceLanguage,

    /// Output format (json or yaml)
    #[arg(short = 'f', long = "format", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Source languages
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum SourceLanguage {
    Go,
    Rust,
}

impl From<SourceLanguage> for Language {
    fn from(language: SourceLanguage) -> Self {
        match language {
            SourceLanguage::Go => Language::Go,
            SourceLanguage::Rust => Language::Rust,
        }
    }
}

fn parse_override(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, kind)) if !name.trim().is_empty() && !kind.trim().is_empty() => {
            Ok((name.trim().to_string(), kind.trim().to_string()))
        }
        _ => Err(format!("expected NAME=KIND, got '{}'", value)),
    }
}

impl CliArgs {
    /// Builds the generator configuration from the parsed arguments.
    pub fn to_config(&self) -> Result<GeneratorConfig> {
        let mut marshal_overrides = default_marshal_overrides();
        marshal_overrides.extend(self.marshal_overrides.iter().cloned());

        let search_path = self
            .gopath
            .as_deref()
            .map(|paths| env::split_paths(paths).collect())
            .unwrap_or_default();
        let working_dir = env::current_dir().context("Failed to read the working directory")?;

        Ok(GeneratorConfig {
            api_packages: self.api_packages.clone(),
            main_api_file: self.main_api_file.clone(),
            controller_class: self.controller_class.clone(),
            ignore: self.ignore.clone(),
            vendoring_path: self.vendoring_path.clone(),
            disable_vendoring: self.disable_vendoring,
            search_path,
            std_root: self.goroot.clone().filter(|root| !root.as_os_str().is_empty()),
            working_dir,
            base_path: self.base_path.clone(),
            marshal_overrides,
            strict: self.strict,
            language: self.language.into(),
        })
    }
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if args.api_packages.iter().all(|p| p.trim().is_empty()) {
        anyhow::bail!("At least one API package is required");
    }

    if let Some(ref main_api_file) = args.main_api_file {
        if !main_api_file.is_file() {
            anyhow::bail!(
                "Main API file does not exist: {}",
                main_api_file.display()
            );
        }
    }

    info!("API packages: {}", args.api_packages.join(", "));
    info!("Language: {:?}", args.language);
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }
    if args.gopath.is_none() {
        info!("No module search path given; only vendor directories are searched");
    }

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting Swagger document generation...");

    // Step 1: Configure the generator
    let config = args.to_config()?;
    let strict = config.strict;
    let mut generator = Generator::new(config).context("Invalid configuration")?;

    // Step 2: Document-level directives
    match generator.locate_main_api_file() {
        Some(path) => generator
            .parse_general_api_info(&path)
            .with_context(|| format!("Failed to read general API info from {}", path.display()))?,
        None => info!("No general API info file found"),
    }

    // Step 3: Scan packages, register types and parse annotations
    info!("Parsing API packages (strict: {})...", strict);
    generator
        .parse_api()
        .context("Failed to generate the API document")?;

    let packages = generator.scanned().len();
    let document = generator.into_document();

    // Step 4: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Json => serialize_json(&document)?,
        OutputFormat::Yaml => serialize_yaml(&document)?,
    };

    // Step 5: Output to file or stdout
    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
        info!("Successfully wrote Swagger document to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    // Step 6: Display summary
    let operations: usize = document
        .apis()
        .values()
        .flat_map(|declaration| declaration.apis.iter())
        .map(|api| api.operations.len())
        .sum();
    let models: usize = document.apis().values().map(|d| d.models.len()).sum();

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Packages scanned: {}", packages);
    info!("  - Resources: {}", document.apis().len());
    info!("  - Operations: {}", operations);
    info!("  - Models: {}", models);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_args() {
        let args = CliArgs::try_parse_from([
            "swagger-from-comments",
            "--api-package",
            "shop/api,shop/admin",
            "--gopath",
            "/go",
        ])
        .unwrap();

        assert_eq!(args.api_packages, vec!["shop/api", "shop/admin"]);
        assert_eq!(args.ignore, DEFAULT_IGNORE);
        assert_eq!(args.language, SourceLanguage::Go);
        assert!(matches!(args.output_format, OutputFormat::Json));
        assert!(!args.strict);
    }

    #[test]
    fn test_api_package_is_required() {
        assert!(CliArgs::try_parse_from(["swagger-from-comments"]).is_err());
    }

    #[test]
    fn test_marshal_overrides_extend_defaults() {
        let args = CliArgs::try_parse_from([
            "swagger-from-comments",
            "--api-package",
            "shop",
            "--marshal-override",
            "NullTime=string",
            "--marshal-override",
            "NullString=text",
            "--language",
            "rust",
            "--strict",
        ])
        .unwrap();

        let config = args.to_config().unwrap();
        assert_eq!(config.marshal_overrides["NullTime"], "string");
        assert_eq!(config.marshal_overrides["NullString"], "text");
        assert_eq!(config.marshal_overrides["NullBool"], "bool");
        assert_eq!(config.language, Language::Rust);
        assert!(config.strict);
    }

    #[test]
    fn test_invalid_marshal_override() {
        let result = CliArgs::try_parse_from([
            "swagger-from-comments",
            "--api-package",
            "shop",
            "--marshal-override",
            "NullTime",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_main_api_file_is_rejected() {
        let args = CliArgs::try_parse_from([
            "swagger-from-comments",
            "--api-package",
            "shop",
            "--main-api-file",
            "/definitely/not/here/main.go",
        ])
        .unwrap();

        assert!(parse_args_from_parsed(args).is_err());
    }
}
