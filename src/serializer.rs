//! Serialization of the assembled document to YAML or JSON.

use crate::document::Document;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes a document to YAML.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml(doc: &Document) -> Result<String> {
    debug!("Serializing document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize document to YAML")
}

/// Serializes a document to pretty-printed JSON.
///
/// The resource listing is under `resourceListing` and the declarations, keyed by resource
/// name, under `apis`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json(doc: &Document) -> Result<String> {
    debug!("Serializing document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize document to JSON")
}

/// Writes string content to a file.
///
/// Creates the file if it doesn't exist, or overwrites it if it does. Missing parent
/// directories are created.
///
/// # Arguments
///
/// * `content` - The string content to write
/// * `path` - The file path to write to
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
