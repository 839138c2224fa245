//! Swagger from comments - Swagger 1.2 documents from annotated source comments.
//!
//! This library reads structured comments attached to functions, resolves the types those
//! comments mention across package boundaries and assembles a Swagger 1.2 resource listing
//! with one API declaration per resource.
//!
//! # Architecture
//!
//! 1. [`source`] - Turns source files into declaration records (Go via tree-sitter, Rust via `syn`)
//! 2. [`scanner`] - Discovers the sub-packages below an entry package
//! 3. [`resolver`] - Maps package ids to directories and caches parsed packages and imports
//! 4. [`model_builder`] - Resolves type names into deduplicated model graphs
//! 5. [`operation`] - The directive grammar (`@Router`, `@Param`, `@Success`, ...)
//! 6. [`document`] - Groups operations by resource and path
//! 7. [`generator`] - Drives the pipeline and applies the error policy
//! 8. [`serializer`] - Serializes the document to JSON or YAML
//!
//! # Example Usage
//!
//! ```no_run
//! use swagger_from_comments::config::GeneratorConfig;
//! use swagger_from_comments::generator::Generator;
//! use swagger_from_comments::serializer::serialize_json;
//!
//! let config = GeneratorConfig {
//!     api_packages: vec!["github.com/acme/shop/api".to_string()],
//!     ..GeneratorConfig::from_env()
//! };
//! let document = Generator::new(config).unwrap().run().unwrap();
//! println!("{}", serialize_json(&document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod generator;
pub mod model;
pub mod model_builder;
pub mod operation;
pub mod resolver;
pub mod scanner;
pub mod serializer;
pub mod source;
