//! The assembled Swagger 1.2 document.
//!
//! A [`Document`] holds the resource listing and one [`ApiDeclaration`] per resource. Operations
//! are folded in as they are parsed; a resource comes into existence with its first operation.

use crate::error::{Error, Result};
use crate::model::Model;
use crate::operation::{split_directive, Operation};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SWAGGER_VERSION: &str = "1.2";

/// `@SubApi <label> [<path>]`
static SUB_API: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@SubApi\s+([^\[]+)\[([\w\-/]+)\]").expect("sub-api pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceListing {
    pub api_version: String,
    pub swagger_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_path: String,
    pub apis: Vec<ApiRef>,
    pub info: Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiRef {
    pub path: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub contact: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub terms_of_service_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub license: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub license_url: String,
}

/// Everything known about one resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDeclaration {
    pub api_version: String,
    pub swagger_version: String,
    pub base_path: String,
    pub resource_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apis: Vec<Api>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub models: BTreeMap<String, Model>,
}

/// Operations sharing one route path.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Api {
    pub path: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "resourceListing")]
    listing: ResourceListing,
    apis: BTreeMap<String, ApiDeclaration>,
}

impl Document {
    pub fn new(base_path: &str) -> Self {
        Self {
            listing: ResourceListing {
                swagger_version: SWAGGER_VERSION.to_string(),
                base_path: base_path.to_string(),
                ..ResourceListing::default()
            },
            apis: BTreeMap::new(),
        }
    }

    pub fn listing(&self) -> &ResourceListing {
        &self.listing
    }

    /// Resource name → declaration.
    pub fn apis(&self) -> &BTreeMap<String, ApiDeclaration> {
        &self.apis
    }

    pub fn resource(&self, name: &str) -> Option<&ApiDeclaration> {
        self.apis.get(name)
    }

    /// Folds a parsed operation into the declaration of its resource.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedDirective`] if the operation names no resource, either
    /// through `@Resource` or through the first segment of its route.
    pub fn add_operation(&mut self, mut op: Operation) -> Result<()> {
        let resource = match &op.force_resource {
            Some(resource) => resource.clone(),
            None => op
                .path
                .split('/')
                .find(|segment| !segment.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::malformed(&format!("@Router {}", op.path), "route has no resource")
                })?,
        };
        let resource_path = format!("/{}", resource);

        if !self.apis.contains_key(&resource) {
            debug!("New resource {}", resource_path);
            self.apis.insert(
                resource.clone(),
                ApiDeclaration {
                    api_version: self.listing.api_version.clone(),
                    swagger_version: SWAGGER_VERSION.to_string(),
                    base_path: self.listing.base_path.clone(),
                    resource_path: resource_path.clone(),
                    ..ApiDeclaration::default()
                },
            );
        }
        if !self.listing.apis.iter().any(|r| r.path == resource_path) {
            self.listing.apis.push(ApiRef {
                path: resource_path,
                description: op.summary.clone(),
            });
        }

        let Some(declaration) = self.apis.get_mut(&resource) else {
            return Ok(());
        };

        for content_type in &op.consumes {
            if !declaration.consumes.contains(content_type) {
                declaration.consumes.push(content_type.clone());
            }
        }
        for content_type in &op.produces {
            if !declaration.produces.contains(content_type) {
                declaration.produces.push(content_type.clone());
            }
        }
        for model in std::mem::take(&mut op.models) {
            declaration.models.entry(model.id.clone()).or_insert(model);
        }

        let api = match declaration.apis.iter().position(|api| api.path == op.path) {
            Some(index) => &mut declaration.apis[index],
            None => {
                declaration.apis.push(Api {
                    path: op.path.clone(),
                    ..Api::default()
                });
                let last = declaration.apis.len() - 1;
                &mut declaration.apis[last]
            }
        };

        if api
            .operations
            .iter()
            .any(|existing| existing.http_method == op.http_method)
        {
            warn!(
                "Skipping duplicate {} operation on {} ({})",
                op.http_method, op.path, op.nickname
            );
            return Ok(());
        }
        api.operations.push(op);
        Ok(())
    }

    /// Applies an `@SubApi <label> [<path>]` line to the listing.
    ///
    /// The label becomes the description of the listed resource with that path, which is
    /// appended when not yet listed.
    pub fn parse_sub_api(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        let captures = SUB_API
            .captures(line)
            .ok_or_else(|| Error::malformed(line, "expected a label and a [path]"))?;
        let description = captures[1].trim().to_string();
        let path = format!("/{}", captures[2].trim().trim_start_matches('/'));

        match self.listing.apis.iter_mut().find(|r| r.path == path) {
            Some(existing) => existing.description = description,
            None => self.listing.apis.push(ApiRef { path, description }),
        }
        Ok(())
    }

    /// Applies one document-level directive. Other lines are ignored.
    pub fn parse_general_info(&mut self, line: &str) {
        let Some((tag, value)) = split_directive(line.trim()) else {
            return;
        };
        let value = value.to_string();
        let info = &mut self.listing.info;

        match tag {
            "@APIVersion" => self.listing.api_version = value,
            "@APITitle" | "@Title" => info.title = value,
            "@APIDescription" | "@Description" => info.description = value,
            "@TermsOfServiceUrl" => info.terms_of_service_url = value,
            "@Contact" => info.contact = value,
            "@License" => info.license = value,
            "@LicenseUrl" => info.license_url = value,
            "@BasePath" => self.listing.base_path = value,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{CONTENT_TYPE_JSON, CONTENT_TYPE_XML};
    use pretty_assertions::assert_eq;

    fn operation(method: &str, path: &str) -> Operation {
        Operation {
            http_method: method.to_string(),
            path: path.to_string(),
            ..Operation::new("shop/api")
        }
    }

    #[test]
    fn test_operations_grouped_by_resource_and_path() {
        let mut document = Document::new("http://localhost");
        document.add_operation(operation("GET", "/orders/get")).unwrap();
        document.add_operation(operation("GET", "/orders/list")).unwrap();
        document.add_operation(operation("POST", "/orders/list")).unwrap();

        assert_eq!(document.apis().len(), 1);
        let orders = document.resource("orders").unwrap();
        assert_eq!(orders.resource_path, "/orders");
        assert_eq!(orders.base_path, "http://localhost");

        let paths: Vec<&str> = orders.apis.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["/orders/get", "/orders/list"]);
        assert_eq!(orders.apis[1].operations.len(), 2);

        assert_eq!(
            document.listing().apis,
            vec![ApiRef {
                path: "/orders".to_string(),
                description: String::new(),
            }]
        );
    }

    #[test]
    fn test_duplicate_method_keeps_first() {
        let mut document = Document::new("");
        let mut first = operation("GET", "/orders/{id}");
        first.nickname = "first".to_string();
        let mut second = operation("GET", "/orders/{id}");
        second.nickname = "second".to_string();

        document.add_operation(first).unwrap();
        document.add_operation(second).unwrap();

        let api = &document.resource("orders").unwrap().apis[0];
        assert_eq!(api.operations.len(), 1);
        assert_eq!(api.operations[0].nickname, "first");
    }

    #[test]
    fn test_forced_resource() {
        let mut document = Document::new("");
        let mut op = operation("GET", "/v1/customers/{id}");
        op.force_resource = Some("customers".to_string());
        document.add_operation(op).unwrap();

        assert!(document.resource("v1").is_none());
        assert_eq!(
            document.resource("customers").unwrap().apis[0].path,
            "/v1/customers/{id}"
        );
    }

    #[test]
    fn test_route_without_resource_is_rejected() {
        let mut document = Document::new("");
        let err = document.add_operation(operation("GET", "/")).unwrap_err();
        assert!(err.is_malformed());
        assert!(document.apis().is_empty());
    }

    #[test]
    fn test_content_types_and_models_merged() {
        let mut document = Document::new("");

        let mut first = operation("GET", "/orders/get");
        first.consumes = vec![CONTENT_TYPE_JSON.to_string()];
        first.produces = vec![CONTENT_TYPE_JSON.to_string(), CONTENT_TYPE_XML.to_string()];
        let mut order = Model::new("shop.models.Order");
        order.mark_required("id");
        first.models = vec![order.clone()];

        let mut second = operation("POST", "/orders/create");
        second.consumes = vec![CONTENT_TYPE_XML.to_string(), CONTENT_TYPE_JSON.to_string()];
        second.models = vec![
            Model::new("shop.models.Order"),
            Model::new("shop.models.Line"),
        ];

        document.add_operation(first).unwrap();
        document.add_operation(second).unwrap();

        let orders = document.resource("orders").unwrap();
        assert_eq!(
            orders.consumes,
            vec![CONTENT_TYPE_JSON.to_string(), CONTENT_TYPE_XML.to_string()]
        );
        assert_eq!(
            orders.produces,
            vec![CONTENT_TYPE_JSON.to_string(), CONTENT_TYPE_XML.to_string()]
        );
        assert_eq!(orders.models.len(), 2);
        assert_eq!(orders.models["shop.models.Order"], order);
    }

    #[test]
    fn test_resource_inherits_listing_version() {
        let mut document = Document::new("");
        document.parse_general_info("@APIVersion 2.0.1");
        document.add_operation(operation("GET", "/orders")).unwrap();

        let orders = document.resource("orders").unwrap();
        assert_eq!(orders.api_version, "2.0.1");
        assert_eq!(orders.swagger_version, SWAGGER_VERSION);
    }

    #[test]
    fn test_sub_api_updates_or_appends() {
        let mut document = Document::new("");
        document.add_operation(operation("GET", "/orders/list")).unwrap();

        document
            .parse_sub_api("@SubApi Order management API [/orders]")
            .unwrap();
        document
            .parse_sub_api("@SubApi Customer lookups [/customers]")
            .unwrap();

        assert_eq!(
            document.listing().apis,
            vec![
                ApiRef {
                    path: "/orders".to_string(),
                    description: "Order management API".to_string(),
                },
                ApiRef {
                    path: "/customers".to_string(),
                    description: "Customer lookups".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_sub_api_path_without_leading_slash() {
        let mut document = Document::new("");
        document.add_operation(operation("GET", "/orders/list")).unwrap();
        document.parse_sub_api("@SubApi Order management [orders]").unwrap();

        assert_eq!(
            document.listing().apis,
            vec![ApiRef {
                path: "/orders".to_string(),
                description: "Order management".to_string(),
            }]
        );
    }

    #[test]
    fn test_malformed_sub_api() {
        let mut document = Document::new("");
        let err = document.parse_sub_api("@SubApi no path here").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_general_info_exact_tags() {
        let mut document = Document::new("");
        for line in [
            "@APIVersion 1.0.0",
            "@APITitle Shop API",
            "@APIDescription Orders and customers",
            "@Contact api@example.com",
            "@TermsOfServiceUrl http://example.com/terms",
            "@License BSD",
            "@LicenseUrl http://opensource.org/licenses/BSD-2-Clause",
            "@BasePath http://127.0.0.1:3000/api",
            "package main",
        ] {
            document.parse_general_info(line);
        }

        let listing = document.listing();
        assert_eq!(listing.api_version, "1.0.0");
        assert_eq!(listing.base_path, "http://127.0.0.1:3000/api");
        assert_eq!(
            listing.info,
            Info {
                title: "Shop API".to_string(),
                description: "Orders and customers".to_string(),
                contact: "api@example.com".to_string(),
                terms_of_service_url: "http://example.com/terms".to_string(),
                license: "BSD".to_string(),
                license_url: "http://opensource.org/licenses/BSD-2-Clause".to_string(),
            }
        );
    }

    #[test]
    fn test_document_json_shape() {
        let mut document = Document::new("");
        document.parse_general_info("@APIVersion 1.0");
        document.parse_general_info("@Title Shop");
        let value = serde_json::to_value(&document).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "resourceListing": {
                    "apiVersion": "1.0",
                    "swaggerVersion": "1.2",
                    "apis": [],
                    "info": {"title": "Shop"}
                },
                "apis": {}
            })
        );
    }
}
