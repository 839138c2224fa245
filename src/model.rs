//! Data model types shared by the graph builder and the document.
//!
//! A [`Model`] is the resolved shape of one named type. Its [`Model::id`] is derived from the
//! owning package and the type name and is the deduplication key everywhere a model is stored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type names that are never resolved as models.
const BASIC_TYPES: &[&str] = &[
    "bool",
    "uint",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "int",
    "int8",
    "int16",
    "int32",
    "int64",
    "float32",
    "float64",
    "string",
    "complex64",
    "complex128",
    "byte",
    "rune",
    "uintptr",
    "error",
    "Time",
];

/// Returns true when `name` is a primitive that never needs model resolution.
///
/// `time.Time` is accepted in its qualified form and anything naming an interface is treated
/// as basic as well.
pub fn is_basic_type(name: &str) -> bool {
    BASIC_TYPES.contains(&name) || name == "time.Time" || is_interface_type(name)
}

/// Returns true for names that denote an untyped interface value.
pub fn is_interface_type(name: &str) -> bool {
    name == "any" || name.contains("interface")
}

/// Canonical spelling of a basic type name.
pub fn normalize_basic_type(name: &str) -> &str {
    match name {
        "time.Time" => "Time",
        other => other,
    }
}

/// Builds the model Id for `type_name` declared in `package`.
///
/// ```
/// use swagger_from_comments::model::model_id;
///
/// assert_eq!(model_id("github.com/acme/shop/models", "Order"), "github.com.acme.shop.models.Order");
/// ```
pub fn model_id(package: &str, type_name: &str) -> String {
    let prefix = package.trim_matches('/').replace('/', ".");
    if prefix.is_empty() {
        type_name.to_string()
    } else {
        format!("{}.{}", prefix, type_name)
    }
}

/// Element type of an array-valued property or operation.
///
/// Exactly one of the two forms is present, so the serialized object carries either
/// `"type"` or `"$ref"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Items {
    #[serde(rename = "type")]
    Type(String),
    #[serde(rename = "$ref")]
    Ref(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelProperty {
    /// Primitive name, `array`, `interface` or a model Id
    #[serde(rename = "type")]
    pub property_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Items>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
}

impl ModelProperty {
    pub fn new(property_type: impl Into<String>) -> Self {
        Self {
            property_type: property_type.into(),
            ..Self::default()
        }
    }

    pub fn array(items: Items) -> Self {
        Self {
            property_type: "array".to_string(),
            items: Some(items),
            ..Self::default()
        }
    }
}

/// The resolved shape of a named type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    pub properties: BTreeMap<String, ModelProperty>,
}

impl Model {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            required: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn mark_required(&mut self, name: &str) {
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
    }

    /// Merges the properties of an embedded model into this one.
    ///
    /// Properties already present win, so explicit fields (inserted before any embedded model
    /// is merged) shadow flattened ones and earlier embedded models shadow later ones. A
    /// required name is carried over only together with the property it belongs to.
    pub fn merge_flattened(&mut self, child: Model) {
        let Model {
            required,
            properties,
            ..
        } = child;

        for (name, property) in properties {
            if self.properties.contains_key(&name) {
                continue;
            }
            if required.contains(&name) {
                self.mark_required(&name);
            }
            self.properties.insert(name, property);
        }
    }
}

/// Removes models whose Id was already seen, keeping the first occurrence.
pub fn dedup_models(models: &mut Vec<Model>) {
    let mut seen = std::collections::HashSet::new();
    models.retain(|model| seen.insert(model.id.clone()));
}
