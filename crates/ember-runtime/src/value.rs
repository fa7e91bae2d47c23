//! Dynamically typed runtime values
//!
//! A `Value` keeps the tag it was constructed with. Conversions between
//! kinds are explicit (`from_literal`, the materializer's column conversion)
//! and never happen as a side effect of storing or reading a value.

use std::fmt;

use ember_ast::Literal;

use crate::error::CompileError;
use crate::object::Object;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    /// Nested record, owned by the field that holds it
    Object(Box<Object>),
    List(Vec<Value>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn object(object: Object) -> Self {
        Value::Object(Box::new(object))
    }

    pub fn from_literal(literal: &Literal) -> Self {
        match literal {
            Literal::Null => Value::Null,
            Literal::String(s) => Value::String(s.clone()),
            Literal::Integer(i) => Value::Integer(*i),
            Literal::Double(d) => Value::Double(*d),
            Literal::Boolean(b) => Value::Boolean(*b),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Type name used for overload resolution; objects report their class
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "Null",
            Value::String(_) => "String",
            Value::Integer(_) => "Integer",
            Value::Double(_) => "Double",
            Value::Boolean(_) => "Boolean",
            Value::Object(o) => o.class_name(),
            Value::List(_) => "List",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Render as a literal in store statement text.
    ///
    /// Strings are single-quoted with `'` doubled; control characters are
    /// spliced in with `char(N)` because SQL string literals have no escape
    /// sequences. Lists render as a parenthesized literal list for `IN`.
    pub fn to_sql_literal(&self) -> Result<String, CompileError> {
        match self {
            Value::Null => Ok("NULL".to_string()),
            Value::String(s) => Ok(quote_string(s)),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Double(d) if d.is_finite() => Ok(format!("{:?}", d)),
            Value::Double(_) => Err(CompileError::UnrenderableLiteral {
                kind: "non-finite Double".to_string(),
            }),
            Value::Boolean(true) => Ok("TRUE".to_string()),
            Value::Boolean(false) => Ok("FALSE".to_string()),
            Value::Object(o) => Err(CompileError::UnrenderableLiteral {
                kind: o.class_name().to_string(),
            }),
            Value::List(items) => {
                let rendered = items
                    .iter()
                    .map(|item| match item {
                        Value::List(_) => Err(CompileError::UnrenderableLiteral {
                            kind: "nested List".to_string(),
                        }),
                        other => other.to_sql_literal(),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("({})", rendered.join(", ")))
            }
        }
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("''"),
            c if c.is_control() => {
                out.push_str("' || char(");
                out.push_str(&(c as u32).to_string());
                out.push_str(") || '");
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Object(o) => write!(f, "{}", o),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::object(o)
    }
}
