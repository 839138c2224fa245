//! Operations and the directive grammar that builds them.
//!
//! Every candidate function gets a fresh [`Operation`]. Each of its doc comment lines that
//! starts with a tag such as `@Router` or `@Param` is a directive and mutates the operation.
//! Type names mentioned by directives are resolved through a [`TypeLookup`], and the models
//! they pull in travel with the operation until the document merges them into its resource.

use crate::error::{Error, Result};
use crate::model::{dedup_models, is_basic_type, Items, Model};
use crate::model_builder::{ResolvedType, TypeLookup};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_XML: &str = "application/xml";
pub const CONTENT_TYPE_PLAIN: &str = "text/plain";
pub const CONTENT_TYPE_HTML: &str = "text/html";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub http_method: String,
    pub nickname: String,
    #[serde(rename = "type")]
    pub response_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Items>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_messages: Vec<ResponseMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<String>,
    pub path: String,
    /// Models referenced by this operation, unique by Id
    #[serde(skip)]
    pub models: Vec<Model>,
    /// Resource named by `@Resource`, overriding the first path segment
    #[serde(skip)]
    pub force_resource: Option<String>,
    /// Package whose imports qualify the type names in directives
    #[serde(skip)]
    pub package: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub param_type: String,
    pub name: String,
    pub description: String,
    pub data_type: String,
    #[serde(rename = "type")]
    pub value_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
    pub allow_multiple: bool,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMessage {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub response_model: String,
}

/// A type named by a directive after registration.
enum TypeRef {
    Primitive(String),
    Model(String),
}

impl Operation {
    pub fn new(package: &str) -> Self {
        Self {
            package: package.to_string(),
            ..Self::default()
        }
    }

    /// Applies every directive found in the doc comment lines of one function.
    ///
    /// Malformed directives are logged and skipped. Resolution errors stop parsing and are
    /// returned wrapped with the offending directive.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyAnnotation`] if none of the lines is a directive
    /// - [`Error::InDirective`] if a type named by a directive cannot be resolved
    pub fn parse_comment(&mut self, lines: &[String], types: &mut dyn TypeLookup) -> Result<()> {
        let mut directives = 0;

        for line in lines {
            let line = line.trim();
            if split_directive(line).is_none() {
                continue;
            }
            directives += 1;

            match self.parse_directive(line, types) {
                Ok(()) => {}
                Err(e) if e.is_malformed() => warn!("Skipping directive: {}", e),
                Err(e) => {
                    return Err(Error::InDirective {
                        directive: line.to_string(),
                        source: Box::new(e),
                    })
                }
            }
        }

        if directives == 0 {
            return Err(Error::EmptyAnnotation);
        }
        Ok(())
    }

    /// Applies one directive line. Lines that are not directives are ignored.
    pub fn parse_directive(&mut self, line: &str, types: &mut dyn TypeLookup) -> Result<()> {
        let line = line.trim();
        let Some((tag, rest)) = split_directive(line) else {
            return Ok(());
        };

        match tag {
            "@Router" | "@router" => self.parse_router(line, rest)?,
            "@Title" => self.nickname = rest.to_string(),
            "@Description" => self.summary = rest.to_string(),
            "@Notes" => self.notes = rest.to_string(),
            "@Resource" => self.parse_resource(line, rest)?,
            "@Param" => self.parse_param(line, rest, types)?,
            "@Accept" => self.parse_content_types(line, rest, true, true)?,
            "@Consume" => self.parse_content_types(line, rest, true, false)?,
            "@Produce" => self.parse_content_types(line, rest, false, true)?,
            "@Success" | "@Failure" => self.parse_response(line, rest, types)?,
            _ => debug!("Ignoring unknown directive {}", tag),
        }

        dedup_models(&mut self.models);
        Ok(())
    }

    fn parse_router(&mut self, line: &str, rest: &str) -> Result<()> {
        let mut tokens = rest.split_whitespace();
        let Some(path) = tokens.next() else {
            return Err(Error::malformed(line, "route path is missing"));
        };

        self.path = path.to_string();
        self.http_method = tokens
            .next()
            .map(|method| method.trim_matches(|c| c == '[' || c == ']').to_uppercase())
            .filter(|method| !method.is_empty())
            .unwrap_or_else(|| "GET".to_string());
        Ok(())
    }

    fn parse_resource(&mut self, line: &str, rest: &str) -> Result<()> {
        let resource = rest.trim_start_matches('/');
        if resource.is_empty() {
            return Err(Error::malformed(line, "resource name is missing"));
        }
        self.force_resource = Some(resource.to_string());
        Ok(())
    }

    fn parse_param(&mut self, line: &str, rest: &str, types: &mut dyn TypeLookup) -> Result<()> {
        let (tokens, remainder) = leading_tokens(rest, 4);
        let [name, location, type_name, required] = tokens[..] else {
            return Err(Error::malformed(
                line,
                "expected a name, a location, a type and a required flag",
            ));
        };

        let value_type = self.register_type(type_name, types)?.into_name();
        self.parameters.push(Parameter {
            param_type: location.to_string(),
            name: name.to_string(),
            description: unquote(remainder).to_string(),
            data_type: value_type.clone(),
            value_type,
            required: matches!(required.to_ascii_lowercase().as_str(), "true" | "required"),
            ..Parameter::default()
        });
        Ok(())
    }

    fn parse_content_types(
        &mut self,
        line: &str,
        rest: &str,
        consumes: bool,
        produces: bool,
    ) -> Result<()> {
        let tokens: Vec<&str> = rest
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .collect();
        if tokens.is_empty() {
            return Err(Error::malformed(line, "content type list is empty"));
        }

        for token in tokens {
            let Some(content_type) = content_type(token) else {
                debug!("Ignoring unknown content type {}", token);
                continue;
            };
            if consumes {
                push_unique(&mut self.consumes, content_type);
            }
            if produces {
                push_unique(&mut self.produces, content_type);
            }
        }
        Ok(())
    }

    fn parse_response(&mut self, line: &str, rest: &str, types: &mut dyn TypeLookup) -> Result<()> {
        let (tokens, remainder) = leading_tokens(rest, 3);
        let Some(code_text) = tokens.first() else {
            return Err(Error::malformed(line, "status code is missing"));
        };
        let code: i32 = code_text.parse().map_err(|_| {
            Error::malformed(line, format!("status code '{}' is not an integer", code_text))
        })?;
        let [_, marker, type_name] = tokens[..] else {
            return Err(Error::malformed(line, "expected a {marker} and a type name"));
        };

        let mut response = ResponseMessage {
            code,
            message: unquote(remainder).to_string(),
            response_model: String::new(),
        };

        // Only the success payload describes the operation's result type
        if code == 200 {
            let resolvable = matches!(marker, "{object}" | "{array}")
                && type_name != "error"
                && !is_basic_type(type_name);
            let registered = if resolvable {
                self.register_type(type_name, types)?
            } else {
                TypeRef::Primitive(type_name.to_string())
            };

            if let TypeRef::Model(id) = &registered {
                response.response_model = id.clone();
            }
            if marker == "{array}" {
                self.response_type = "array".to_string();
                self.items = Some(match registered {
                    TypeRef::Model(id) => Items::Ref(id),
                    TypeRef::Primitive(primitive) => Items::Type(primitive),
                });
            } else {
                self.response_type = registered.into_name();
                self.items = None;
            }
        }

        self.response_messages.push(response);
        Ok(())
    }

    /// Resolves a type named by a directive, collecting the models it needs.
    fn register_type(&mut self, type_name: &str, types: &mut dyn TypeLookup) -> Result<TypeRef> {
        if type_name == "error" || is_basic_type(type_name) {
            return Ok(TypeRef::Primitive(type_name.to_string()));
        }

        match types.resolve_type(type_name, &self.package)? {
            ResolvedType::Primitive(primitive) => Ok(TypeRef::Primitive(primitive)),
            ResolvedType::Model { model, inner } => {
                let id = model.id.clone();
                self.models.push(model);
                self.models.extend(inner);
                Ok(TypeRef::Model(id))
            }
        }
    }
}

impl TypeRef {
    fn into_name(self) -> String {
        match self {
            TypeRef::Primitive(name) | TypeRef::Model(name) => name,
        }
    }
}

/// Splits a directive into its tag and the trimmed remainder.
pub(crate) fn split_directive(line: &str) -> Option<(&str, &str)> {
    if !line.starts_with('@') {
        return None;
    }
    let (tag, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    Some((tag, rest.trim()))
}

/// Splits off up to `count` whitespace-delimited tokens and returns the untouched remainder.
fn leading_tokens(text: &str, count: usize) -> (Vec<&str>, &str) {
    let mut tokens = Vec::with_capacity(count);
    let mut rest = text.trim_start();
    while tokens.len() < count && !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        tokens.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    (tokens, rest)
}

/// Text of a quoted message; text before the first quote is dropped.
fn unquote(text: &str) -> &str {
    let text = text.trim();
    match text.find('"') {
        Some(start) => text[start..].trim_matches('"'),
        None => text,
    }
}

fn content_type(token: &str) -> Option<&'static str> {
    match token {
        "json" | CONTENT_TYPE_JSON => Some(CONTENT_TYPE_JSON),
        "xml" | CONTENT_TYPE_XML => Some(CONTENT_TYPE_XML),
        "plain" | CONTENT_TYPE_PLAIN => Some(CONTENT_TYPE_PLAIN),
        "html" | CONTENT_TYPE_HTML => Some(CONTENT_TYPE_HTML),
        _ => None,
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelProperty;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// Type lookup backed by a fixed table of models.
    #[derive(Default)]
    struct FakeTypes {
        models: HashMap<String, (Model, Vec<Model>)>,
        primitives: HashMap<String, String>,
        calls: Vec<String>,
    }

    impl FakeTypes {
        fn with_model(mut self, name: &str, id: &str, inner: &[&str]) -> Self {
            let mut model = Model::new(id);
            model
                .properties
                .insert("name".to_string(), ModelProperty::new("string"));
            let inner = inner.iter().map(|inner_id| Model::new(*inner_id)).collect();
            self.models.insert(name.to_string(), (model, inner));
            self
        }
    }

    impl TypeLookup for FakeTypes {
        fn resolve_type(&mut self, type_name: &str, current_package: &str) -> Result<ResolvedType> {
            self.calls.push(type_name.to_string());
            if let Some(primitive) = self.primitives.get(type_name) {
                return Ok(ResolvedType::Primitive(primitive.clone()));
            }
            match self.models.get(type_name) {
                Some((model, inner)) => Ok(ResolvedType::Model {
                    model: model.clone(),
                    inner: inner.clone(),
                }),
                None => Err(Error::ModelNotFound {
                    model: type_name.to_string(),
                    package: current_package.to_string(),
                }),
            }
        }
    }

    fn parse(lines: &[&str], types: &mut FakeTypes) -> Result<Operation> {
        let mut op = Operation::new("shop/api");
        let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        op.parse_comment(&lines, types)?;
        Ok(op)
    }

    #[test]
    fn test_router_with_method() {
        let op = parse(&["@Router /customer/get-wishlist/{id} [POST]"], &mut FakeTypes::default()).unwrap();
        assert_eq!(op.path, "/customer/get-wishlist/{id}");
        assert_eq!(op.http_method, "POST");
    }

    #[test]
    fn test_router_defaults_to_get() {
        let op = parse(&["@Router /orders"], &mut FakeTypes::default()).unwrap();
        assert_eq!(op.http_method, "GET");

        let op = parse(&["@router /orders [delete]"], &mut FakeTypes::default()).unwrap();
        assert_eq!(op.http_method, "DELETE");
    }

    #[test]
    fn test_param_directive() {
        let op = parse(
            &[r#"@Param order_nr path string true "Order number""#],
            &mut FakeTypes::default(),
        )
        .unwrap();

        assert_eq!(
            op.parameters,
            vec![Parameter {
                param_type: "path".to_string(),
                name: "order_nr".to_string(),
                description: "Order number".to_string(),
                data_type: "string".to_string(),
                value_type: "string".to_string(),
                required: true,
                ..Parameter::default()
            }]
        );
    }

    #[test]
    fn test_param_required_flags() {
        let op = parse(
            &[
                r#"@Param a query int required "a""#,
                r#"@Param b query int false "b""#,
                r#"@Param c query int TRUE "c""#,
            ],
            &mut FakeTypes::default(),
        )
        .unwrap();

        let flags: Vec<bool> = op.parameters.iter().map(|p| p.required).collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn test_param_with_model_type() {
        let mut types = FakeTypes::default().with_model("models.Order", "shop.models.Order", &[]);
        let op = parse(&[r#"@Param body body models.Order true "the order""#], &mut types).unwrap();

        assert_eq!(op.parameters[0].value_type, "shop.models.Order");
        assert_eq!(op.parameters[0].data_type, "shop.models.Order");
        assert_eq!(op.models.len(), 1);
    }

    #[test]
    fn test_malformed_param_is_skipped() {
        let op = parse(
            &[
                "@Param id path string",
                "@Router /orders/{id} [get]",
            ],
            &mut FakeTypes::default(),
        )
        .unwrap();

        assert!(op.parameters.is_empty());
        assert_eq!(op.path, "/orders/{id}");
    }

    #[test]
    fn test_success_array_of_primitive() {
        let mut types = FakeTypes::default();
        let op = parse(&["@Success 200 {array} int"], &mut types).unwrap();

        assert_eq!(op.response_type, "array");
        assert_eq!(op.items, Some(Items::Type("int".to_string())));
        assert!(op.models.is_empty());
        assert!(types.calls.is_empty());
    }

    #[test]
    fn test_success_object_resolves_model() {
        let mut types = FakeTypes::default().with_model(
            "pkg.Thing",
            "github.com.acme.pkg.Thing",
            &["github.com.acme.pkg.Part"],
        );
        let op = parse(&[r#"@Success 200 {object} pkg.Thing "the thing""#], &mut types).unwrap();

        assert_eq!(op.response_type, "github.com.acme.pkg.Thing");
        assert_eq!(op.items, None);
        let ids: Vec<&str> = op.models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["github.com.acme.pkg.Thing", "github.com.acme.pkg.Part"]);
        assert_eq!(
            op.response_messages,
            vec![ResponseMessage {
                code: 200,
                message: "the thing".to_string(),
                response_model: "github.com.acme.pkg.Thing".to_string(),
            }]
        );
    }

    #[test]
    fn test_success_array_of_model() {
        let mut types = FakeTypes::default().with_model("Order", "shop.api.Order", &[]);
        let op = parse(&["@Success 200 {array} Order"], &mut types).unwrap();

        assert_eq!(op.response_type, "array");
        assert_eq!(op.items, Some(Items::Ref("shop.api.Order".to_string())));
    }

    #[test]
    fn test_failure_does_not_resolve() {
        let mut types = FakeTypes::default();
        let op = parse(
            &[r#"@Failure 404 {object} models.NotFound "order not found""#],
            &mut types,
        )
        .unwrap();

        assert!(types.calls.is_empty());
        assert!(op.models.is_empty());
        assert_eq!(op.response_type, "");
        assert_eq!(op.response_messages[0].code, 404);
        assert_eq!(op.response_messages[0].message, "order not found");
        assert_eq!(op.response_messages[0].response_model, "");
    }

    #[test]
    fn test_error_and_free_form_markers_do_not_resolve() {
        let mut types = FakeTypes::default();
        let op = parse(
            &["@Success 200 {object} error", "@Success 200 {string} Token"],
            &mut types,
        )
        .unwrap();

        assert!(types.calls.is_empty());
        assert_eq!(op.response_type, "Token");
    }

    #[test]
    fn test_malformed_responses_are_skipped() {
        let op = parse(
            &[
                "@Success ok {object} Order",
                "@Failure 500",
                "@Router /orders",
            ],
            &mut FakeTypes::default(),
        )
        .unwrap();

        assert!(op.response_messages.is_empty());
        assert_eq!(op.path, "/orders");
    }

    #[test]
    fn test_accept_fills_both_lists_in_order() {
        let op = parse(&["@Accept json,xml", "@Accept json"], &mut FakeTypes::default()).unwrap();

        let expected = vec![CONTENT_TYPE_JSON.to_string(), CONTENT_TYPE_XML.to_string()];
        assert_eq!(op.consumes, expected);
        assert_eq!(op.produces, expected);
    }

    #[test]
    fn test_consume_and_produce_are_separate() {
        let op = parse(
            &["@Consume plain, application/json", "@Produce html"],
            &mut FakeTypes::default(),
        )
        .unwrap();

        assert_eq!(
            op.consumes,
            vec![CONTENT_TYPE_PLAIN.to_string(), CONTENT_TYPE_JSON.to_string()]
        );
        assert_eq!(op.produces, vec![CONTENT_TYPE_HTML.to_string()]);
    }

    #[test]
    fn test_title_description_resource() {
        let op = parse(
            &[
                "GetOrder returns one order.",
                "@Title getOrder",
                "@Description Returns a single order",
                "@Resource /orders",
            ],
            &mut FakeTypes::default(),
        )
        .unwrap();

        assert_eq!(op.nickname, "getOrder");
        assert_eq!(op.summary, "Returns a single order");
        assert_eq!(op.force_resource.as_deref(), Some("orders"));
    }

    #[test]
    fn test_models_deduplicated_across_directives() {
        let mut types = FakeTypes::default()
            .with_model("Order", "shop.api.Order", &["shop.api.Line"])
            .with_model("Line", "shop.api.Line", &[]);
        let op = parse(
            &[
                r#"@Param body body Order true "order""#,
                r#"@Param line body Line true "line""#,
                "@Success 200 {object} Order",
            ],
            &mut types,
        )
        .unwrap();

        let ids: Vec<&str> = op.models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["shop.api.Order", "shop.api.Line"]);
    }

    #[test]
    fn test_resolution_error_names_directive() {
        let err = parse(&["@Success 200 {object} models.Missing"], &mut FakeTypes::default())
            .unwrap_err();

        assert!(err.is_resolution());
        match err {
            Error::InDirective { directive, .. } => {
                assert_eq!(directive, "@Success 200 {object} models.Missing")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_no_directives_is_empty_annotation() {
        let err = parse(&["Helper without annotations."], &mut FakeTypes::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyAnnotation));
    }

    #[test]
    fn test_operation_serialization_omits_internal_fields() {
        let mut types = FakeTypes::default().with_model("Order", "shop.api.Order", &[]);
        let op = parse(
            &[
                "@Router /orders/{id} [get]",
                "@Title getOrder",
                "@Resource orders",
                "@Success 200 {object} Order",
            ],
            &mut types,
        )
        .unwrap();

        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "httpMethod": "GET",
                "nickname": "getOrder",
                "type": "shop.api.Order",
                "responseMessages": [
                    {"code": 200, "message": "", "responseModel": "shop.api.Order"}
                ],
                "path": "/orders/{id}"
            })
        );
    }
}
