//! Go symbol source backed by the tree-sitter Go grammar.

use super::{
    FieldAnnotations, FieldDecl, FunctionDecl, ImportDecl, SourceUnit, SymbolSource, TypeDecl,
    TypeDeclKind, TypeExpr,
};
use crate::error::{Error, Result};
use arborium::tree_sitter::{Node, Parser};
use log::{debug, warn};
use std::path::Path;

/// Reads Go source files.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoSource;

impl SymbolSource for GoSource {
    fn language(&self) -> &'static str {
        "Go"
    }

    fn is_source_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        name.ends_with(".go")
            && !name.ends_with("_test.go")
            && !name.starts_with('.')
            && !name.starts_with('_')
    }

    fn default_entry_file(&self) -> &'static str {
        "main.go"
    }

    fn parse_source(&self, path: &Path, source: &str) -> Result<SourceUnit> {
        let mut parser = Parser::new();
        parser
            .set_language(&arborium_go::language().into())
            .map_err(|e| Error::Parse {
                file: path.to_path_buf(),
                message: format!("failed to load Go grammar: {}", e),
            })?;

        let Some(tree) = parser.parse(source, None) else {
            return Err(Error::Parse {
                file: path.to_path_buf(),
                message: "tree-sitter returned no syntax tree".to_string(),
            });
        };

        let root = tree.root_node();
        if root.has_error() {
            warn!(
                "Syntax errors in {}, extracting what could be recovered",
                path.display()
            );
        }

        let mut extractor = GoExtractor {
            source,
            unit: SourceUnit::new(path),
        };
        extractor.visit_source_file(root);

        debug!(
            "Extracted {} types, {} functions, {} imports from {}",
            extractor.unit.types.len(),
            extractor.unit.functions.len(),
            extractor.unit.imports.len(),
            path.display()
        );
        Ok(extractor.unit)
    }
}

struct GoExtractor<'s> {
    source: &'s str,
    unit: SourceUnit,
}

impl<'s> GoExtractor<'s> {
    fn text(&self, node: Node) -> &'s str {
        &self.source[node.byte_range()]
    }

    fn visit_source_file(&mut self, root: Node) {
        // Doc comments are the comment block that ends on the line right above a declaration.
        let mut doc: Vec<String> = Vec::new();
        let mut doc_end_row: Option<usize> = None;

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if child.kind() == "comment" {
                let lines = comment_lines(self.text(child));
                self.unit.comments.extend(lines.iter().cloned());

                let contiguous = matches!(doc_end_row, Some(end) if end + 1 >= child.start_position().row);
                if !contiguous {
                    doc.clear();
                }
                doc.extend(lines);
                doc_end_row = Some(child.end_position().row);
                continue;
            }

            let attached = matches!(doc_end_row, Some(end) if end + 1 == child.start_position().row);
            let doc_lines = if attached {
                std::mem::take(&mut doc)
            } else {
                Vec::new()
            };
            doc.clear();
            doc_end_row = None;

            match child.kind() {
                "import_declaration" => self.visit_imports(child),
                "type_declaration" => self.visit_type_declaration(child),
                "function_declaration" | "method_declaration" => {
                    self.visit_function(child, doc_lines)
                }
                _ => {}
            }
        }
    }

    fn visit_imports(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "import_spec" => self.visit_import_spec(child),
                "import_spec_list" => {
                    let mut inner = child.walk();
                    for spec in child.named_children(&mut inner) {
                        if spec.kind() == "import_spec" {
                            self.visit_import_spec(spec);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_import_spec(&mut self, node: Node) {
        let Some(path) = node.child_by_field_name("path") else {
            return;
        };
        let alias = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string());
        self.unit.imports.push(ImportDecl {
            path: unquote(self.text(path)).to_string(),
            alias,
        });
    }

    fn visit_type_declaration(&mut self, node: Node) {
        let mut cursor = node.walk();
        for spec in node.named_children(&mut cursor) {
            if spec.kind() != "type_spec" && spec.kind() != "type_alias" {
                continue;
            }
            let (Some(name), Some(ty)) = (
                spec.child_by_field_name("name"),
                spec.child_by_field_name("type"),
            ) else {
                continue;
            };

            let kind = match ty.kind() {
                "struct_type" => TypeDeclKind::Struct(self.struct_fields(ty)),
                "interface_type" => TypeDeclKind::Interface,
                _ => TypeDeclKind::Alias(self.type_expr(ty)),
            };
            self.unit.types.push(TypeDecl {
                name: self.text(name).to_string(),
                kind,
            });
        }
    }

    fn struct_fields(&self, struct_node: Node) -> Vec<FieldDecl> {
        let mut fields = Vec::new();

        let mut cursor = struct_node.walk();
        for list in struct_node.named_children(&mut cursor) {
            if list.kind() != "field_declaration_list" {
                continue;
            }
            let mut inner = list.walk();
            for decl in list.named_children(&mut inner) {
                if decl.kind() != "field_declaration" {
                    continue;
                }
                let Some(ty_node) = decl.child_by_field_name("type") else {
                    continue;
                };
                let ty = self.type_expr(ty_node);
                let annotations = decl
                    .child_by_field_name("tag")
                    .map(|tag| tag_annotations(unquote(self.text(tag))))
                    .unwrap_or_default();

                let mut names_cursor = decl.walk();
                let names: Vec<String> = decl
                    .children_by_field_name("name", &mut names_cursor)
                    .map(|n| self.text(n).to_string())
                    .collect();

                if names.is_empty() {
                    fields.push(FieldDecl {
                        name: None,
                        ty,
                        annotations,
                    });
                } else {
                    for name in names {
                        fields.push(FieldDecl {
                            name: Some(name),
                            ty: ty.clone(),
                            annotations: annotations.clone(),
                        });
                    }
                }
            }
        }

        fields
    }

    fn type_expr(&self, node: Node) -> TypeExpr {
        match node.kind() {
            "type_identifier" => TypeExpr::named(self.text(node)),
            "qualified_type" => {
                match (
                    node.child_by_field_name("package"),
                    node.child_by_field_name("name"),
                ) {
                    (Some(package), Some(name)) => {
                        TypeExpr::qualified(self.text(package), self.text(name))
                    }
                    _ => TypeExpr::Unsupported(self.text(node).to_string()),
                }
            }
            "pointer_type" | "parenthesized_type" => match node.named_child(0) {
                Some(inner) => self.type_expr(inner),
                None => TypeExpr::Unsupported(self.text(node).to_string()),
            },
            "slice_type" | "array_type" | "implicit_length_array_type" => {
                match node.child_by_field_name("element") {
                    Some(element) => TypeExpr::Array(Box::new(self.type_expr(element))),
                    None => TypeExpr::Unsupported(self.text(node).to_string()),
                }
            }
            "map_type" => match node.child_by_field_name("value") {
                Some(value) => TypeExpr::Map(Box::new(self.type_expr(value))),
                None => TypeExpr::Unsupported(self.text(node).to_string()),
            },
            "generic_type" => match node.child_by_field_name("type") {
                Some(base) => self.type_expr(base),
                None => TypeExpr::Unsupported(self.text(node).to_string()),
            },
            "interface_type" => TypeExpr::Interface,
            _ => TypeExpr::Unsupported(self.text(node).to_string()),
        }
    }

    fn visit_function(&mut self, node: Node, doc: Vec<String>) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let receiver = node
            .child_by_field_name("receiver")
            .and_then(|params| self.receiver_type(params));

        self.unit.functions.push(FunctionDecl {
            name: self.text(name).to_string(),
            receiver,
            doc,
        });
    }

    fn receiver_type(&self, params: Node) -> Option<String> {
        let mut cursor = params.walk();
        let decl = params
            .named_children(&mut cursor)
            .find(|c| c.kind() == "parameter_declaration")?;
        let mut ty = decl.child_by_field_name("type")?;
        if ty.kind() == "pointer_type" {
            ty = ty.named_child(0)?;
        }
        if ty.kind() == "generic_type" {
            ty = ty.child_by_field_name("type")?;
        }
        Some(self.text(ty).to_string())
    }
}

/// Strips comment markers from a `//` or `/* */` comment and trims every line.
fn comment_lines(raw: &str) -> Vec<String> {
    if let Some(body) = raw.strip_prefix("//") {
        return vec![body.trim().to_string()];
    }
    if let Some(body) = raw.strip_prefix("/*") {
        let body = body.strip_suffix("*/").unwrap_or(body);
        return body
            .lines()
            .map(|line| line.trim().trim_start_matches('*').trim().to_string())
            .collect();
    }
    vec![raw.trim().to_string()]
}

fn unquote(literal: &str) -> &str {
    let literal = literal.trim();
    literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| literal.strip_prefix('`').and_then(|s| s.strip_suffix('`')))
        .unwrap_or(literal)
}

/// Looks up `key` in a Go struct tag using the conventional `key:"value"` syntax.
pub fn lookup_struct_tag<'t>(tag: &'t str, key: &str) -> Option<&'t str> {
    let mut rest = tag;
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            return None;
        }

        let name_end = rest
            .find(|c: char| c <= ' ' || c == ':' || c == '"' || c == '\u{7f}')
            .unwrap_or(rest.len());
        if name_end == 0 || !rest[name_end..].starts_with(":\"") {
            return None;
        }
        let name = &rest[..name_end];

        let value_start = name_end + 2;
        let bytes = rest.as_bytes();
        let mut i = value_start;
        while i < bytes.len() && bytes[i] != b'"' {
            if bytes[i] == b'\\' {
                i += 1;
            }
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }

        if name == key {
            return Some(&rest[value_start..i]);
        }
        rest = &rest[i + 1..];
    }
}

/// Field annotations carried by a struct tag.
///
/// The name comes from the `json` tag, falling back to `thrift`. Options after the name may
/// mark the field `required`; a separate non-empty `required` tag does the same and a
/// `description` tag documents the field.
pub fn tag_annotations(tag: &str) -> FieldAnnotations {
    let mut annotations = FieldAnnotations::default();

    let encoding = lookup_struct_tag(tag, "json")
        .filter(|v| !v.is_empty())
        .or_else(|| lookup_struct_tag(tag, "thrift").filter(|v| !v.is_empty()));

    if let Some(encoding) = encoding {
        if encoding == "-" {
            annotations.skip = true;
        } else {
            let mut parts = encoding.split(',');
            if let Some(name) = parts.next().filter(|n| !n.is_empty()) {
                if name == "required" {
                    annotations.required = true;
                } else if name != "omitempty" {
                    annotations.rename = Some(name.to_string());
                }
            }
            if parts.any(|option| option.trim() == "required") {
                annotations.required = true;
            }
        }
    }

    if lookup_struct_tag(tag, "required").is_some_and(|v| !v.is_empty()) {
        annotations.required = true;
    }
    if let Some(description) = lookup_struct_tag(tag, "description").filter(|v| !v.is_empty()) {
        annotations.description = Some(description.to_string());
    }

    annotations
}
