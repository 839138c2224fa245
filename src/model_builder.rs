//! Type/model graph builder.
//!
//! Resolves a symbolic type name, as written in a directive or a struct field, into a [`Model`]
//! and every inner model it transitively references. Embedded fields are flattened into the
//! embedding model, and referenced types are resolved once per distinct name.

use crate::error::{Error, Result};
use crate::model::{
    dedup_models, is_basic_type, is_interface_type, model_id, normalize_basic_type, Items,
    Model, ModelProperty,
};
use crate::resolver::PackageResolver;
use crate::source::{TypeDecl, TypeDeclKind, TypeExpr};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Type declarations of every registered package, keyed by package directory.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    definitions: HashMap<PathBuf, HashMap<String, TypeDecl>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, location: &Path) -> bool {
        self.definitions.contains_key(location)
    }

    /// Records the type declarations and imports of a package.
    ///
    /// Returns the ids of packages it imports. Registering a package twice is a no-op that
    /// returns no imports.
    pub fn register(
        &mut self,
        resolver: &mut PackageResolver,
        package: &str,
    ) -> Result<Vec<String>> {
        let location = resolver.resolve(package)?;
        if self.is_registered(&location) {
            return Ok(Vec::new());
        }

        let parsed = resolver.load_package(&location)?;
        let types: HashMap<String, TypeDecl> = parsed
            .types()
            .map(|decl| (decl.name.clone(), decl.clone()))
            .collect();
        debug!("Registered {} types of package {}", types.len(), package);
        self.definitions.insert(location.clone(), types);

        resolver.record_imports(&location)
    }

    pub fn get(&self, location: &Path, name: &str) -> Option<&TypeDecl> {
        self.definitions.get(location)?.get(name)
    }
}

/// Outcome of resolving a type name referenced by a directive.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedType {
    /// A basic type, an override, or an alias of one
    Primitive(String),
    /// A model plus every inner model it needs, deduplicated by Id
    Model { model: Model, inner: Vec<Model> },
}

/// Resolution of type names on behalf of the annotation grammar.
pub trait TypeLookup {
    fn resolve_type(&mut self, type_name: &str, current_package: &str) -> Result<ResolvedType>;
}

enum Resolution {
    Primitive { primitive: String, id: Option<String> },
    /// Already visited during this resolution; only the Id is needed
    Reference(String),
    Built(Model, Vec<Model>),
}

#[derive(Default)]
struct Visited {
    in_progress: HashSet<String>,
    done: HashSet<String>,
    /// Types being flattened into the model currently built, that model included
    embedding: HashSet<String>,
}

impl Visited {
    fn contains(&self, id: &str) -> bool {
        self.in_progress.contains(id) || self.done.contains(id)
    }
}

enum FieldShape {
    Primitive(String),
    Interface,
    Reference(String),
    Array(Box<FieldShape>),
    Unsupported,
}

/// A property whose type (or item type) still names an unresolved type.
struct PendingReference {
    property: String,
    type_name: String,
    in_items: bool,
}

pub struct ModelBuilder<'a> {
    resolver: &'a mut PackageResolver,
    registry: &'a mut TypeRegistry,
    overrides: &'a BTreeMap<String, String>,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(
        resolver: &'a mut PackageResolver,
        registry: &'a mut TypeRegistry,
        overrides: &'a BTreeMap<String, String>,
    ) -> Self {
        Self {
            resolver,
            registry,
            overrides,
        }
    }

    /// Resolves `type_name` in the context of `current_package` into a model and its inner
    /// models.
    ///
    /// Aliases of primitive types yield a model without properties.
    ///
    /// # Errors
    ///
    /// Fails when the type or any type it references cannot be found.
    pub fn resolve_model(
        &mut self,
        type_name: &str,
        current_package: &str,
    ) -> Result<(Model, Vec<Model>)> {
        let mut visited = Visited::default();
        match self.resolve_in(type_name, current_package, &mut visited)? {
            Resolution::Built(model, mut inner) => {
                dedup_models(&mut inner);
                Ok((model, inner))
            }
            Resolution::Primitive { id: Some(id), .. } | Resolution::Reference(id) => {
                Ok((Model::new(id), Vec::new()))
            }
            Resolution::Primitive { id: None, .. } => Err(Error::ModelNotFound {
                model: type_name.to_string(),
                package: current_package.to_string(),
            }),
        }
    }

    /// Finds the declaration a type name refers to and the package id that declares it.
    pub fn find_definition(
        &mut self,
        type_name: &str,
        current_package: &str,
    ) -> Result<(TypeDecl, String)> {
        let not_found = || Error::ModelNotFound {
            model: type_name.to_string(),
            package: current_package.to_string(),
        };

        let Some((qualifier, name)) = type_name.rsplit_once('.') else {
            if let Some(decl) = self.lookup(current_package, type_name)? {
                return Ok((decl, current_package.to_string()));
            }
            // An item imported directly by name, e.g. `use shop::models::Order`
            if let Some(found) = self.find_imported_item(type_name, current_package)? {
                return Ok(found);
            }
            return Err(not_found());
        };

        if let Some(decl) = self.lookup(qualifier, name)? {
            return Ok((decl, qualifier.to_string()));
        }
        if qualifier.contains('/') || qualifier.contains('.') {
            return Err(not_found());
        }

        let location = self.ensure_registered(current_package)?;
        let candidates = self
            .resolver
            .import_candidates(&location, qualifier)
            .ok_or_else(|| Error::ImportNotFound {
                alias: qualifier.to_string(),
                package: current_package.to_string(),
            })?
            .to_vec();

        for candidate in candidates {
            if let Some(decl) = self.lookup(&candidate, name)? {
                debug!("Resolved {} to package {}", type_name, candidate);
                return Ok((decl, candidate));
            }
        }
        Err(not_found())
    }

    fn find_imported_item(
        &mut self,
        name: &str,
        current_package: &str,
    ) -> Result<Option<(TypeDecl, String)>> {
        let location = self.ensure_registered(current_package)?;
        let Some(candidates) = self.resolver.import_candidates(&location, name) else {
            return Ok(None);
        };
        for candidate in candidates.to_vec() {
            let Some((package, item)) = candidate.rsplit_once('/') else {
                continue;
            };
            if let Some(decl) = self.lookup(package, item)? {
                return Ok(Some((decl, package.to_string())));
            }
        }
        Ok(None)
    }

    /// Looks a type up in a package, registering the package on first use.
    ///
    /// Packages that cannot be resolved simply hold no types.
    fn lookup(&mut self, package: &str, name: &str) -> Result<Option<TypeDecl>> {
        let Some(location) = self.resolver.try_resolve(package) else {
            return Ok(None);
        };
        if !self.registry.is_registered(&location) {
            self.registry.register(self.resolver, package)?;
        }
        Ok(self.registry.get(&location, name).cloned())
    }

    fn ensure_registered(&mut self, package: &str) -> Result<PathBuf> {
        let location = self.resolver.resolve(package)?;
        if !self.registry.is_registered(&location) {
            self.registry.register(self.resolver, package)?;
        }
        Ok(location)
    }

    /// Primitive kind for a basic or overridden type name.
    fn primitive_for(&self, type_name: &str) -> Option<String> {
        let bare = type_name.rsplit('.').next().unwrap_or(type_name);
        if let Some(kind) = self
            .overrides
            .get(type_name)
            .or_else(|| self.overrides.get(bare))
        {
            return Some(kind.clone());
        }
        is_basic_type(type_name).then(|| normalize_basic_type(type_name).to_string())
    }

    fn shape_of(&self, ty: &TypeExpr) -> FieldShape {
        match ty {
            TypeExpr::Named { qualifier, name } => {
                let full = match qualifier {
                    Some(qualifier) => format!("{}.{}", qualifier, name),
                    None => name.clone(),
                };
                if is_interface_type(&full) {
                    FieldShape::Interface
                } else if let Some(primitive) = self.primitive_for(&full) {
                    FieldShape::Primitive(primitive)
                } else {
                    FieldShape::Reference(full)
                }
            }
            TypeExpr::Array(element) | TypeExpr::Map(element) => match self.shape_of(element) {
                // Nested collections are described by their innermost element
                FieldShape::Array(inner) => FieldShape::Array(inner),
                FieldShape::Unsupported => FieldShape::Unsupported,
                other => FieldShape::Array(Box::new(other)),
            },
            TypeExpr::Interface => FieldShape::Interface,
            TypeExpr::Unsupported(_) => FieldShape::Unsupported,
        }
    }

    fn resolve_in(
        &mut self,
        type_name: &str,
        current_package: &str,
        visited: &mut Visited,
    ) -> Result<Resolution> {
        if let Some(primitive) = self.primitive_for(type_name) {
            return Ok(Resolution::Primitive {
                primitive,
                id: None,
            });
        }

        let (decl, package) = self.find_definition(type_name, current_package)?;
        let id = model_id(&package, &decl.name);
        if visited.contains(&id) {
            return Ok(Resolution::Reference(id));
        }

        if let TypeDeclKind::Alias(target) = &decl.kind {
            match self.shape_of(target) {
                FieldShape::Primitive(primitive) => {
                    debug!("{} is an alias of {}", id, primitive);
                    return Ok(Resolution::Primitive {
                        primitive,
                        id: Some(id),
                    });
                }
                FieldShape::Reference(target_name) => {
                    visited.in_progress.insert(id.clone());
                    let resolution = self.resolve_in(&target_name, &package, visited);
                    visited.in_progress.remove(&id);
                    return resolution;
                }
                _ => {}
            }
        }

        visited.in_progress.insert(id.clone());
        let outer_chain = std::mem::replace(&mut visited.embedding, HashSet::from([id.clone()]));
        let built = self.build_model(&id, &decl, &package, visited);
        visited.embedding = outer_chain;
        visited.in_progress.remove(&id);
        let (model, inner) = built?;
        visited.done.insert(id);
        Ok(Resolution::Built(model, inner))
    }

    fn build_model(
        &mut self,
        id: &str,
        decl: &TypeDecl,
        package: &str,
        visited: &mut Visited,
    ) -> Result<(Model, Vec<Model>)> {
        debug!("Building model {}", id);
        let mut model = Model::new(id);
        let mut inner = Vec::new();

        let TypeDeclKind::Struct(fields) = &decl.kind else {
            return Ok((model, inner));
        };

        let mut pending: Vec<PendingReference> = Vec::new();
        let mut embedded: Vec<Model> = Vec::new();

        for field in fields {
            if field.annotations.skip {
                continue;
            }

            let Some(field_name) = &field.name else {
                if let Some((child, child_inner)) = self.embedded_model(&field.ty, package, visited)? {
                    embedded.push(child);
                    inner.extend(child_inner);
                }
                continue;
            };

            let name = field
                .annotations
                .rename
                .clone()
                .unwrap_or_else(|| field_name.clone());

            let mut reference = None;
            let mut property = match self.shape_of(&field.ty) {
                FieldShape::Primitive(primitive) => ModelProperty::new(primitive),
                FieldShape::Interface => ModelProperty::new("interface"),
                FieldShape::Reference(type_name) => {
                    reference = Some(PendingReference {
                        property: name.clone(),
                        type_name: type_name.clone(),
                        in_items: false,
                    });
                    ModelProperty::new(type_name)
                }
                FieldShape::Array(element) => match *element {
                    FieldShape::Primitive(primitive) => ModelProperty::array(Items::Type(primitive)),
                    FieldShape::Interface => {
                        ModelProperty::array(Items::Type("interface".to_string()))
                    }
                    FieldShape::Reference(type_name) => {
                        reference = Some(PendingReference {
                            property: name.clone(),
                            type_name: type_name.clone(),
                            in_items: true,
                        });
                        ModelProperty::array(Items::Ref(type_name))
                    }
                    FieldShape::Array(_) | FieldShape::Unsupported => continue,
                },
                FieldShape::Unsupported => {
                    debug!("Skipping field {} of {} with unsupported type", field_name, id);
                    continue;
                }
            };

            if let Some(description) = &field.annotations.description {
                property.description = description.clone();
            }
            if field.annotations.required {
                model.mark_required(&name);
            }
            // A later field with the same name replaces the earlier one and its reference
            pending.retain(|p| p.property != name);
            pending.extend(reference);
            model.properties.insert(name, property);
        }

        for child in embedded {
            model.merge_flattened(child);
        }

        let used_types: BTreeSet<String> = pending.iter().map(|p| p.type_name.clone()).collect();
        for type_name in used_types {
            let target = match self.resolve_in(&type_name, package, visited)? {
                Resolution::Primitive { primitive, .. } => Items::Type(primitive),
                Resolution::Reference(ref_id) => Items::Ref(ref_id),
                Resolution::Built(used, used_inner) => {
                    let ref_id = used.id.clone();
                    inner.push(used);
                    inner.extend(used_inner);
                    Items::Ref(ref_id)
                }
            };

            for reference in pending.iter().filter(|p| p.type_name == type_name) {
                let Some(property) = model.properties.get_mut(&reference.property) else {
                    continue;
                };
                if reference.in_items {
                    property.items = Some(target.clone());
                } else {
                    property.property_type = match &target {
                        Items::Type(primitive) => primitive.clone(),
                        Items::Ref(ref_id) => ref_id.clone(),
                    };
                }
            }
        }

        Ok((model, inner))
    }

    /// Resolves an embedded field into the model whose properties get flattened.
    fn embedded_model(
        &mut self,
        ty: &TypeExpr,
        package: &str,
        visited: &mut Visited,
    ) -> Result<Option<(Model, Vec<Model>)>> {
        let FieldShape::Reference(type_name) = self.shape_of(ty) else {
            debug!("Embedded field without properties in package {}", package);
            return Ok(None);
        };

        let (decl, declaring_package) = self.find_definition(&type_name, package)?;
        let id = model_id(&declaring_package, &decl.name);
        if visited.embedding.contains(&id) {
            warn!("Not flattening {} into itself", id);
            return Ok(None);
        }

        visited.embedding.insert(id.clone());
        let built = match &decl.kind {
            TypeDeclKind::Alias(target) => match self.shape_of(target) {
                FieldShape::Reference(target_name) => {
                    self.embedded_model(&TypeExpr::named(target_name), &declaring_package, visited)
                }
                _ => Ok(None),
            },
            _ => self.build_model(&id, &decl, &declaring_package, visited).map(Some),
        };
        visited.embedding.remove(&id);
        built
    }
}

impl TypeLookup for ModelBuilder<'_> {
    fn resolve_type(&mut self, type_name: &str, current_package: &str) -> Result<ResolvedType> {
        if let Some(primitive) = self.primitive_for(type_name) {
            return Ok(ResolvedType::Primitive(primitive));
        }

        let mut visited = Visited::default();
        match self.resolve_in(type_name, current_package, &mut visited)? {
            Resolution::Primitive { primitive, .. } => Ok(ResolvedType::Primitive(primitive)),
            Resolution::Built(model, mut inner) => {
                dedup_models(&mut inner);
                Ok(ResolvedType::Model { model, inner })
            }
            Resolution::Reference(id) => Ok(ResolvedType::Model {
                model: Model::new(id),
                inner: Vec::new(),
            }),
        }
    }
}
