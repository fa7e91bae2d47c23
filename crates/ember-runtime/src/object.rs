//! Runtime objects
//!
//! An `Object` is a class reference plus its own field table. Field tables
//! are never shared: cloning an object deep-copies its fields, and a nested
//! relation record is owned by the field that holds it.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::class::ClassType;
use crate::value::Value;

#[derive(Clone)]
pub struct Object {
    class: Arc<ClassType>,
    /// Insertion-ordered so generated statements list columns deterministically
    fields: IndexMap<String, Value>,
}

impl Object {
    /// Empty instance of `class`
    pub fn new(class: Arc<ClassType>) -> Self {
        Self {
            class,
            fields: IndexMap::new(),
        }
    }

    /// Instance with fields set in the given order
    pub fn with_fields<I, K, V>(class: Arc<ClassType>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut object = Self::new(class);
        for (name, value) in fields {
            object.set(name, value);
        }
        object
    }

    pub fn class(&self) -> &Arc<ClassType> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields.get_mut(field)
    }

    /// Set a field, returning the previous value. Setting an existing field
    /// keeps its original position.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Nested relation record stored under `relation`
    pub fn nested(&self, relation: &str) -> Option<&Object> {
        self.get(relation).and_then(Value::as_object)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.class.name() == other.class.name() && self.fields == other.fields
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.class.name());
        for (name, value) in &self.fields {
            s.field(name, value);
        }
        s.finish()
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{{", self.class.name())?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        f.write_str("}")
    }
}
