//! Rust symbol source backed by `syn`.
//!
//! A package is a directory of `.rs` files. `use` paths become imports with `::` replaced by
//! `/`, `#[serde(flatten)]` fields are embedded, `#[serde(rename)]` renames and doc comments
//! become descriptions.

use super::{
    FieldAnnotations, FieldDecl, FunctionDecl, ImportDecl, SourceUnit, SymbolSource, TypeDecl,
    TypeDeclKind, TypeExpr,
};
use crate::error::{Error, Result};
use log::debug;
use std::path::Path;
use syn::visit::Visit;

/// Reads Rust source files.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustSource;

impl SymbolSource for RustSource {
    fn language(&self) -> &'static str {
        "Rust"
    }

    fn is_source_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        name.ends_with(".rs") && !name.starts_with('.') && name != "build.rs"
    }

    fn default_entry_file(&self) -> &'static str {
        "lib.rs"
    }

    fn parse_source(&self, path: &Path, source: &str) -> Result<SourceUnit> {
        let syntax_tree = syn::parse_file(source).map_err(|e| Error::Parse {
            file: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut unit = SourceUnit::new(path);
        unit.comments.extend(doc_lines(&syntax_tree.attrs));

        for item in &syntax_tree.items {
            if is_test_only(item_attrs(item)) {
                continue;
            }
            let mut docs = DocCollector::default();
            docs.visit_item(item);
            unit.comments.extend(docs.lines);

            match item {
                syn::Item::Use(item_use) => {
                    collect_use_tree(&item_use.tree, &mut Vec::new(), &mut unit.imports)
                }
                syn::Item::Struct(item_struct) => unit.types.push(struct_decl(item_struct)),
                syn::Item::Type(item_type) => unit.types.push(TypeDecl {
                    name: item_type.ident.to_string(),
                    kind: TypeDeclKind::Alias(type_expr(&item_type.ty)),
                }),
                syn::Item::Trait(item_trait) => unit.types.push(TypeDecl {
                    name: item_trait.ident.to_string(),
                    kind: TypeDeclKind::Interface,
                }),
                syn::Item::Fn(item_fn) => unit.functions.push(FunctionDecl {
                    name: item_fn.sig.ident.to_string(),
                    receiver: None,
                    doc: doc_lines(&item_fn.attrs),
                }),
                syn::Item::Impl(item_impl) => {
                    let receiver = self_type_name(&item_impl.self_ty);
                    for impl_item in &item_impl.items {
                        if let syn::ImplItem::Fn(method) = impl_item {
                            unit.functions.push(FunctionDecl {
                                name: method.sig.ident.to_string(),
                                receiver: receiver.clone(),
                                doc: doc_lines(&method.attrs),
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        debug!(
            "Extracted {} types, {} functions, {} imports from {}",
            unit.types.len(),
            unit.functions.len(),
            unit.imports.len(),
            path.display()
        );
        Ok(unit)
    }
}

/// Collects every doc comment line below an item.
#[derive(Default)]
struct DocCollector {
    lines: Vec<String>,
}

impl<'ast> Visit<'ast> for DocCollector {
    fn visit_attribute(&mut self, attr: &'ast syn::Attribute) {
        if let Some(line) = doc_line(attr) {
            self.lines.push(line);
        }
    }
}

fn item_attrs(item: &syn::Item) -> &[syn::Attribute] {
    match item {
        syn::Item::Use(i) => &i.attrs,
        syn::Item::Struct(i) => &i.attrs,
        syn::Item::Type(i) => &i.attrs,
        syn::Item::Trait(i) => &i.attrs,
        syn::Item::Fn(i) => &i.attrs,
        syn::Item::Impl(i) => &i.attrs,
        syn::Item::Mod(i) => &i.attrs,
        syn::Item::Enum(i) => &i.attrs,
        _ => &[],
    }
}

/// Returns true for items gated behind `#[cfg(test)]`.
fn is_test_only(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("cfg")
            && attr
                .parse_args::<syn::Ident>()
                .map(|ident| ident == "test")
                .unwrap_or(false)
    })
}

fn doc_line(attr: &syn::Attribute) -> Option<String> {
    if !attr.path().is_ident("doc") {
        return None;
    }
    let syn::Meta::NameValue(name_value) = &attr.meta else {
        return None;
    };
    let syn::Expr::Lit(syn::ExprLit {
        lit: syn::Lit::Str(text),
        ..
    }) = &name_value.value
    else {
        return None;
    };
    Some(text.value().trim().to_string())
}

fn doc_lines(attrs: &[syn::Attribute]) -> Vec<String> {
    attrs.iter().filter_map(doc_line).collect()
}

fn collect_use_tree(tree: &syn::UseTree, prefix: &mut Vec<String>, out: &mut Vec<ImportDecl>) {
    match tree {
        syn::UseTree::Path(path) => {
            prefix.push(path.ident.to_string());
            collect_use_tree(&path.tree, prefix, out);
            prefix.pop();
        }
        syn::UseTree::Name(name) => {
            let mut segments = prefix.clone();
            if name.ident != "self" {
                segments.push(name.ident.to_string());
            }
            push_import(segments, None, out);
        }
        syn::UseTree::Rename(rename) => {
            let mut segments = prefix.clone();
            if rename.ident != "self" {
                segments.push(rename.ident.to_string());
            }
            push_import(segments, Some(rename.rename.to_string()), out);
        }
        syn::UseTree::Group(group) => {
            for item in &group.items {
                collect_use_tree(item, prefix, out);
            }
        }
        syn::UseTree::Glob(_) => {
            debug!("Skipping glob import of {}", prefix.join("::"));
        }
    }
}

fn push_import(segments: Vec<String>, alias: Option<String>, out: &mut Vec<ImportDecl>) {
    let Some(segments) = package_segments(segments) else {
        return;
    };
    if segments.is_empty() {
        return;
    }
    out.push(ImportDecl {
        path: segments.join("/"),
        alias,
    });
}

/// Drops `crate`/`self` prefixes; `super` paths have no package id and yield `None`.
fn package_segments(segments: Vec<String>) -> Option<Vec<String>> {
    match segments.first().map(String::as_str) {
        Some("super") => {
            debug!("Skipping relative path {}", segments.join("::"));
            None
        }
        Some("crate") | Some("self") => Some(segments.into_iter().skip(1).collect()),
        _ => Some(segments),
    }
}

fn self_type_name(ty: &syn::Type) -> Option<String> {
    match ty {
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        syn::Type::Reference(reference) => self_type_name(&reference.elem),
        _ => None,
    }
}

fn struct_decl(item_struct: &syn::ItemStruct) -> TypeDecl {
    let name = item_struct.ident.to_string();
    debug!("Reading struct definition: {}", name);

    let kind = match &item_struct.fields {
        syn::Fields::Named(named) => {
            TypeDeclKind::Struct(named.named.iter().map(field_decl).collect())
        }
        syn::Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => {
            TypeDeclKind::Alias(type_expr(&unnamed.unnamed[0].ty))
        }
        _ => TypeDeclKind::Struct(Vec::new()),
    };

    TypeDecl { name, kind }
}

fn field_decl(field: &syn::Field) -> FieldDecl {
    let (mut annotations, flatten) = serde_annotations(&field.attrs);

    annotations.required = !is_option(&field.ty);
    let docs = doc_lines(&field.attrs);
    if !docs.is_empty() {
        annotations.description = Some(docs.join(" "));
    }

    FieldDecl {
        name: if flatten {
            None
        } else {
            field.ident.as_ref().map(|ident| ident.to_string())
        },
        ty: type_expr(&field.ty),
        annotations,
    }
}

/// Reads `rename`, `skip` and `flatten` from `#[serde(...)]` attributes.
fn serde_annotations(attrs: &[syn::Attribute]) -> (FieldAnnotations, bool) {
    let mut annotations = FieldAnnotations::default();
    let mut flatten = false;

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                annotations.rename = Some(value.value());
            } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                annotations.skip = true;
            } else if meta.path.is_ident("flatten") {
                flatten = true;
            } else if meta.input.peek(syn::Token![=]) {
                let _: syn::Expr = meta.value()?.parse()?;
            }
            Ok(())
        });
        if let Err(e) = parsed {
            debug!("Ignoring unsupported serde attribute: {}", e);
        }
    }

    (annotations, flatten)
}

fn is_option(ty: &syn::Type) -> bool {
    match ty {
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option"),
        _ => false,
    }
}

fn type_expr(ty: &syn::Type) -> TypeExpr {
    match ty {
        syn::Type::Path(type_path) => path_type_expr(&type_path.path),
        syn::Type::Reference(reference) => type_expr(&reference.elem),
        syn::Type::Slice(slice) => TypeExpr::Array(Box::new(type_expr(&slice.elem))),
        syn::Type::Array(array) => TypeExpr::Array(Box::new(type_expr(&array.elem))),
        syn::Type::Paren(paren) => type_expr(&paren.elem),
        syn::Type::Group(group) => type_expr(&group.elem),
        syn::Type::TraitObject(_) | syn::Type::ImplTrait(_) => TypeExpr::Interface,
        syn::Type::Tuple(_) => TypeExpr::Unsupported("tuple".to_string()),
        syn::Type::BareFn(_) => TypeExpr::Unsupported("fn".to_string()),
        _ => TypeExpr::Unsupported("type".to_string()),
    }
}

fn generic_types(segment: &syn::PathSegment) -> Vec<&syn::Type> {
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn path_type_expr(path: &syn::Path) -> TypeExpr {
    let Some(last) = path.segments.last() else {
        return TypeExpr::Unsupported("path".to_string());
    };
    let ident = last.ident.to_string();
    let args = generic_types(last);

    match ident.as_str() {
        "Option" | "Box" | "Rc" | "Arc" | "Cow" => {
            return match args.first() {
                Some(inner) => type_expr(inner),
                None => TypeExpr::Unsupported(ident),
            };
        }
        "Vec" | "VecDeque" | "HashSet" | "BTreeSet" | "LinkedList" => {
            return match args.first() {
                Some(inner) => TypeExpr::Array(Box::new(type_expr(inner))),
                None => TypeExpr::Unsupported(ident),
            };
        }
        "HashMap" | "BTreeMap" => {
            return match args.get(1) {
                Some(value) => TypeExpr::Map(Box::new(type_expr(value))),
                None => TypeExpr::Unsupported(ident),
            };
        }
        _ => {}
    }

    let segments: Vec<String> = path
        .segments
        .iter()
        .map(|segment| segment.ident.to_string())
        .collect();
    let qualifier_segments = &segments[..segments.len() - 1];

    if ident == "Value" && qualifier_segments.last().is_some_and(|q| q == "serde_json") {
        return TypeExpr::Interface;
    }

    let std_path = qualifier_segments
        .first()
        .map_or(true, |first| matches!(first.as_str(), "std" | "core" | "alloc"));
    if std_path {
        if let Some(primitive) = canonical_primitive(&ident) {
            return TypeExpr::named(primitive);
        }
    }

    match package_segments(qualifier_segments.to_vec()) {
        Some(qualifier) if !qualifier.is_empty() => {
            TypeExpr::qualified(qualifier.join("/"), ident)
        }
        Some(_) => TypeExpr::named(ident),
        None => TypeExpr::Unsupported(segments.join("::")),
    }
}

/// Maps Rust primitive type names onto the canonical basic type names.
fn canonical_primitive(name: &str) -> Option<&'static str> {
    let canonical = match name {
        "bool" => "bool",
        "i8" => "int8",
        "i16" => "int16",
        "i32" => "int32",
        "i64" | "i128" => "int64",
        "isize" => "int",
        "u8" => "uint8",
        "u16" => "uint16",
        "u32" => "uint32",
        "u64" | "u128" => "uint64",
        "usize" => "uint",
        "f32" => "float32",
        "f64" => "float64",
        "char" => "rune",
        "String" | "str" => "string",
        _ => return None,
    };
    Some(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Helper function to create a temporary file with content
    fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(name);
        let mut file = fs::File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path
    }

    fn parse(source: &str) -> SourceUnit {
        RustSource
            .parse_source(&PathBuf::from("lib.rs"), source)
            .unwrap()
    }

    #[test]
    fn test_parse_file_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_file(&temp_dir, "order.rs", "pub struct Order { pub id: u32 }");

        let unit = RustSource.parse_file(&path).unwrap();

        assert_eq!(unit.path, path);
        assert_eq!(unit.types.len(), 1);
        assert_eq!(unit.types[0].name, "Order");
    }

    #[test]
    fn test_parse_invalid_rust_file() {
        let err = RustSource
            .parse_source(&PathBuf::from("broken.rs"), "pub struct {")
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_parse_use_trees() {
        let unit = parse(
            r#"
use shop::models;
use crate::common::{self, audit::Audit as Trail};
use super::sibling;
use std::collections::*;
"#,
        );

        assert_eq!(
            unit.imports,
            vec![
                ImportDecl {
                    path: "shop/models".to_string(),
                    alias: None
                },
                ImportDecl {
                    path: "common".to_string(),
                    alias: None
                },
                ImportDecl {
                    path: "common/audit/Audit".to_string(),
                    alias: Some("Trail".to_string())
                },
            ]
        );
    }

    #[test]
    fn test_parse_struct_with_serde_attributes() {
        let unit = parse(
            r#"
pub struct Order {
    /// Order number
    #[serde(rename = "orderId")]
    pub id: u64,
    pub note: Option<String>,
    pub lines: Vec<models::Line>,
    pub tags: HashMap<String, i32>,
    #[serde(skip)]
    pub cache: Vec<u8>,
    #[serde(flatten)]
    pub base: Base,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}
"#,
        );

        let TypeDeclKind::Struct(fields) = &unit.types[0].kind else {
            panic!("expected struct");
        };
        assert_eq!(fields.len(), 7);

        assert_eq!(fields[0].name.as_deref(), Some("id"));
        assert_eq!(fields[0].ty, TypeExpr::named("uint64"));
        assert_eq!(fields[0].annotations.rename.as_deref(), Some("orderId"));
        assert_eq!(fields[0].annotations.description.as_deref(), Some("Order number"));
        assert!(fields[0].annotations.required);

        assert_eq!(fields[1].ty, TypeExpr::named("string"));
        assert!(!fields[1].annotations.required);

        assert_eq!(
            fields[2].ty,
            TypeExpr::Array(Box::new(TypeExpr::qualified("models", "Line")))
        );
        assert_eq!(fields[3].ty, TypeExpr::Map(Box::new(TypeExpr::named("int32"))));
        assert!(fields[4].annotations.skip);

        assert_eq!(fields[5].name, None);
        assert_eq!(fields[5].ty, TypeExpr::named("Base"));

        assert_eq!(fields[6].ty, TypeExpr::Interface);
        assert!(!fields[6].annotations.skip);
    }

    #[test]
    fn test_parse_functions_and_comments() {
        let unit = parse(
            r#"
//! @APIVersion 1.0.0

/// @Title list
/// @Router /orders [get]
pub fn list_orders() {}

pub struct OrderController;

impl OrderController {
    /// @Router /orders/{id} [get]
    pub fn get(&self) {}
}

#[cfg(test)]
mod tests {
    /// @Router /ignored [get]
    fn ignored() {}
}
"#,
        );

        assert_eq!(unit.functions.len(), 2);
        assert_eq!(unit.functions[0].name, "list_orders");
        assert_eq!(unit.functions[0].receiver, None);
        assert_eq!(
            unit.functions[0].doc,
            vec!["@Title list".to_string(), "@Router /orders [get]".to_string()]
        );
        assert_eq!(unit.functions[1].receiver.as_deref(), Some("OrderController"));

        assert!(unit.comments.contains(&"@APIVersion 1.0.0".to_string()));
        assert!(unit.comments.contains(&"@Router /orders/{id} [get]".to_string()));
        assert!(!unit.comments.contains(&"@Router /ignored [get]".to_string()));
    }

    #[test]
    fn test_newtype_and_alias() {
        let unit = parse("pub struct OrderId(pub u64);\npub type Lines = Vec<Line>;\npub trait Store {}");

        assert_eq!(unit.types[0].kind, TypeDeclKind::Alias(TypeExpr::named("uint64")));
        assert_eq!(
            unit.types[1].kind,
            TypeDeclKind::Alias(TypeExpr::Array(Box::new(TypeExpr::named("Line"))))
        );
        assert_eq!(unit.types[2].kind, TypeDeclKind::Interface);
    }
}
