//! Class registry
//!
//! Registration happens in a single build phase on a `RegistryBuilder`.
//! `build()` freezes the table into a `ClassRegistry` shared by `Arc`; the
//! frozen registry is never mutated. Classes defined after startup go
//! through `extend()`, which copies the existing table into a fresh builder
//! and publishes a new registry, so concurrent readers of the old one are
//! unaffected.

use std::sync::Arc;

use ember_ast::{ClassDeclaration, Declaration};
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::class::ClassType;
use crate::error::CompileError;
use crate::object::Object;

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    classes: IndexMap<String, Arc<ClassType>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preloaded with the host-implemented classes
    pub fn with_builtins() -> Result<Self, CompileError> {
        let mut builder = Self::new();
        crate::builtin::install(&mut builder)?;
        Ok(builder)
    }

    /// Add a class. Names are unique within a registry.
    pub fn register_class(&mut self, class: ClassType) -> Result<Arc<ClassType>, CompileError> {
        if self.classes.contains_key(class.name()) {
            return Err(CompileError::DuplicateClass {
                name: class.name().to_string(),
            });
        }
        debug!(class = class.name(), "registering class");
        let class = Arc::new(class);
        self.classes.insert(class.name().to_string(), Arc::clone(&class));
        Ok(class)
    }

    /// Register a user-defined class and, recursively, its inner classes.
    /// Inner classes are named `Outer.Inner`.
    pub fn register_declaration(&mut self, decl: &ClassDeclaration) -> Result<Arc<ClassType>, CompileError> {
        self.register_declaration_as(decl, None)
    }

    fn register_declaration_as(
        &mut self,
        decl: &ClassDeclaration,
        outer: Option<&str>,
    ) -> Result<Arc<ClassType>, CompileError> {
        let mut class = ClassType::from_declaration(decl)?;
        if let Some(outer) = outer {
            class = class.renamed(format!("{}.{}", outer, decl.name));
        }
        let registered = self.register_class(class)?;
        for member in &decl.body {
            if let Declaration::Class(inner) = member {
                self.register_declaration_as(inner, Some(registered.name()))?;
            }
        }
        Ok(registered)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Freeze the table
    pub fn build(self) -> Arc<ClassRegistry> {
        info!(classes = self.classes.len(), "class registry built");
        Arc::new(ClassRegistry {
            classes: self.classes,
        })
    }
}

/// Immutable name → class table
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: IndexMap<String, Arc<ClassType>>,
}

impl ClassRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// New builder seeded with every class in this registry
    pub fn extend(&self) -> RegistryBuilder {
        RegistryBuilder {
            classes: self.classes.clone(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<ClassType>> {
        self.classes.get(name)
    }

    /// Like `lookup`, but an unknown name is a compile error
    pub fn resolve(&self, name: &str) -> Result<&Arc<ClassType>, CompileError> {
        self.lookup(name).ok_or_else(|| CompileError::UnknownClass {
            name: name.to_string(),
        })
    }

    /// Resolve the class a relation segment of `path` points to
    pub fn resolve_relation(&self, relation: &str, path: &str) -> Result<&Arc<ClassType>, CompileError> {
        self.lookup(relation).ok_or_else(|| CompileError::UnknownRelation {
            relation: relation.to_string(),
            path: path.to_string(),
        })
    }

    /// Empty instance of the named class
    pub fn create_object(&self, name: &str) -> Result<Object, CompileError> {
        self.resolve(name).map(|class| Object::new(Arc::clone(class)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
