//! Result Materializer - rebuild object graphs from flat result rows
//!
//! Column `i` of every row is written to the field named by projection
//! entry `i`. Relation segments are walked from the root object; a nested
//! object is created the first time a relation is seen in a row and reused
//! for every later column under the same relation, so one row never yields
//! two instances of the same relation.

use std::sync::Arc;

use ember_ast::FieldPath;

use crate::class::{ClassType, FieldType};
use crate::error::{CompileError, ExecutionError, RuntimeError, TypeConversionError};
use crate::object::Object;
use crate::query::Projection;
use crate::registry::ClassRegistry;
use crate::store::{RawValue, Row};
use crate::value::Value;

pub struct Materializer<'r> {
    registry: &'r ClassRegistry,
}

impl<'r> Materializer<'r> {
    pub fn new(registry: &'r ClassRegistry) -> Self {
        Self { registry }
    }

    /// One root object of `class` per row, in row order. Any failure
    /// discards the whole result.
    pub fn materialize(
        &self,
        class: &Arc<ClassType>,
        projection: &Projection,
        rows: Vec<Row>,
    ) -> Result<Vec<Object>, RuntimeError> {
        let mut objects = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != projection.len() {
                return Err(ExecutionError::ProjectionMismatch {
                    expected: projection.len(),
                    found: row.len(),
                }
                .into());
            }

            let mut root = Object::new(Arc::clone(class));
            for (index, (path, raw)) in projection.iter().zip(row).enumerate() {
                self.place(&mut root, path, index, raw)?;
            }
            objects.push(root);
        }
        Ok(objects)
    }

    fn place(&self, root: &mut Object, path: &FieldPath, index: usize, raw: RawValue) -> Result<(), RuntimeError> {
        let leaf = path.leaf().ok_or(CompileError::EmptyFieldPath { index })?;

        let mut target = root;
        for relation in path.relations() {
            target = self.nested_mut(target, relation, path)?;
        }

        let value = convert_column(raw, target.class().field_type(leaf), &path.to_string())?;
        target.set(leaf, value);
        Ok(())
    }

    /// Nested object under `relation`, created if this row has not
    /// produced it yet
    fn nested_mut<'o>(
        &self,
        parent: &'o mut Object,
        relation: &str,
        path: &FieldPath,
    ) -> Result<&'o mut Object, RuntimeError> {
        if !matches!(parent.get(relation), Some(Value::Object(_))) {
            let class = self.registry.resolve_relation(relation, &path.to_string())?;
            parent.set(relation, Value::object(Object::new(Arc::clone(class))));
        }
        match parent.get_mut(relation) {
            Some(Value::Object(nested)) => Ok(nested),
            _ => Err(CompileError::UnknownRelation {
                relation: relation.to_string(),
                path: path.to_string(),
            }
            .into()),
        }
    }
}

/// Convert one raw column to a `Value`.
///
/// A declared field type decides the target kind; otherwise the column's
/// own storage class does. `field` names the column in errors.
pub fn convert_column(
    raw: RawValue,
    declared: Option<&FieldType>,
    field: &str,
) -> Result<Value, TypeConversionError> {
    let raw = match raw {
        RawValue::Null => return Ok(Value::Null),
        RawValue::Blob(bytes) => match String::from_utf8(bytes) {
            Ok(text) => RawValue::Text(text),
            Err(_) => return Err(mismatch(field, declared, "non-UTF-8 BLOB")),
        },
        other => other,
    };

    let declared = match declared {
        Some(declared) => declared,
        None => {
            return Ok(match raw {
                RawValue::Integer(i) => Value::Integer(i),
                RawValue::Real(f) => Value::Double(f),
                RawValue::Text(s) => Value::String(s),
                RawValue::Null | RawValue::Blob(_) => Value::Null,
            })
        }
    };

    match (declared, raw) {
        (FieldType::Integer, RawValue::Integer(i)) => Ok(Value::Integer(i)),
        (FieldType::Integer, RawValue::Real(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Ok(Value::Integer(f as i64))
        }
        (FieldType::Integer, RawValue::Text(s)) => s
            .trim()
            .parse()
            .map(Value::Integer)
            .map_err(|_| mismatch(field, Some(declared), &format!("TEXT '{}'", s))),

        (FieldType::Double, RawValue::Integer(i)) => Ok(Value::Double(i as f64)),
        (FieldType::Double, RawValue::Real(f)) => Ok(Value::Double(f)),
        (FieldType::Double, RawValue::Text(s)) => s
            .trim()
            .parse()
            .map(Value::Double)
            .map_err(|_| mismatch(field, Some(declared), &format!("TEXT '{}'", s))),

        (FieldType::Boolean, RawValue::Integer(i)) => Ok(Value::Boolean(i != 0)),
        (FieldType::Boolean, RawValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Boolean(true)),
            "false" | "0" => Ok(Value::Boolean(false)),
            _ => Err(mismatch(field, Some(declared), &format!("TEXT '{}'", s))),
        },

        (FieldType::String | FieldType::Id | FieldType::Reference(_), RawValue::Text(s)) => Ok(Value::String(s)),
        (FieldType::String | FieldType::Id | FieldType::Reference(_), RawValue::Integer(i)) => {
            Ok(Value::String(i.to_string()))
        }
        (FieldType::String | FieldType::Id | FieldType::Reference(_), RawValue::Real(f)) => {
            Ok(Value::String(f.to_string()))
        }

        (declared, raw) => Err(mismatch(field, Some(declared), raw.kind())),
    }
}

fn mismatch(field: &str, declared: Option<&FieldType>, found: &str) -> TypeConversionError {
    TypeConversionError {
        field: field.to_string(),
        expected: declared.map(FieldType::name).unwrap_or("String").to_string(),
        found: found.to_string(),
    }
}
