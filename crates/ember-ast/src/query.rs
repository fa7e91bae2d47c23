//! Query and DML nodes
//!
//! A `Query` names the class it selects from and the ordered field paths it
//! projects. Filter, ordering and paging clauses are optional.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AstError;
use crate::span::Span;

// ============================================================================
// Field paths
// ============================================================================

/// Dotted identifier sequence selecting a field, possibly through relations
///
/// `Name` selects a field on the queried class; `Account.Name` selects
/// `Name` on the record reached through the `Account` relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPath {
    pub segments: Vec<String>,
}

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a dotted path. An empty string yields an empty path.
    pub fn parse(path: &str) -> Self {
        if path.is_empty() {
            return Self { segments: Vec::new() };
        }
        Self::new(path.split('.'))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Relation segments leading to the leaf field
    pub fn relations(&self) -> &[String] {
        match self.segments.split_last() {
            Some((_, init)) => init,
            None => &[],
        }
    }

    /// Final segment, the field actually read
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn is_relationship(&self) -> bool {
        self.segments.len() > 1
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        FieldPath::parse(path)
    }
}

// ============================================================================
// Literals and operands
// ============================================================================

/// Literal as written in query source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Literal(Literal),
    /// `:name` bind variable, resolved from the caller's bindings
    Bind(String),
    /// Parenthesized literal list for `IN` / `NOT IN`
    List(Vec<Literal>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
    NotIn,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::In => "IN",
            CompareOp::NotIn => "NOT IN",
        }
    }
}

impl FromStr for CompareOp {
    type Err = AstError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "=" => Ok(CompareOp::Eq),
            "!=" | "<>" => Ok(CompareOp::Ne),
            "<" => Ok(CompareOp::Lt),
            "<=" => Ok(CompareOp::Le),
            ">" => Ok(CompareOp::Gt),
            ">=" => Ok(CompareOp::Ge),
            "LIKE" => Ok(CompareOp::Like),
            "IN" => Ok(CompareOp::In),
            "NOT IN" => Ok(CompareOp::NotIn),
            _ => Err(AstError::UnknownOperator(s.to_string())),
        }
    }
}

/// Filter expression of a `WHERE` clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Compare {
        field: FieldPath,
        op: CompareOp,
        operand: Operand,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn compare(field: impl Into<FieldPath>, op: CompareOp, operand: Operand) -> Self {
        Condition::Compare {
            field: field.into(),
            op,
            operand,
        }
    }

    pub fn eq(field: impl Into<FieldPath>, literal: Literal) -> Self {
        Self::compare(field, CompareOp::Eq, Operand::Literal(literal))
    }

    /// Visit every field path referenced by this condition
    pub fn for_each_field<'a>(&'a self, f: &mut impl FnMut(&'a FieldPath)) {
        match self {
            Condition::Compare { field, .. } => f(field),
            Condition::And(items) | Condition::Or(items) => {
                for item in items {
                    item.for_each_field(f);
                }
            }
            Condition::Not(inner) => inner.for_each_field(f),
        }
    }
}

// ============================================================================
// Ordering
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullsOrder {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: FieldPath,
    pub direction: SortDirection,
    pub nulls: Option<NullsOrder>,
}

impl OrderBy {
    pub fn asc(field: impl Into<FieldPath>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
            nulls: None,
        }
    }

    pub fn desc(field: impl Into<FieldPath>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
            nulls: None,
        }
    }
}

// ============================================================================
// Query
// ============================================================================

/// `SELECT <fields> FROM <class> [WHERE ..] [ORDER BY ..] [LIMIT ..] [OFFSET ..]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Class (and table) the query selects from
    pub from: String,
    /// Selected fields, in result-column order
    pub fields: Vec<FieldPath>,
    pub filter: Option<Condition>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    #[serde(default)]
    pub span: Span,
}

impl Query {
    /// Query with only a field list; clauses are added with the builder methods
    pub fn select<I, P>(from: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<FieldPath>,
    {
        Self {
            from: from.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            filter: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            span: Span::default(),
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = Some(condition);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

// ============================================================================
// DML
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DmlOperation {
    Insert,
    Update,
    Delete,
    Upsert,
}

impl DmlOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DmlOperation::Insert => "insert",
            DmlOperation::Update => "update",
            DmlOperation::Delete => "delete",
            DmlOperation::Upsert => "upsert",
        }
    }
}

impl fmt::Display for DmlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DmlOperation {
    type Err = AstError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "insert" => Ok(DmlOperation::Insert),
            "update" => Ok(DmlOperation::Update),
            "delete" => Ok(DmlOperation::Delete),
            "upsert" => Ok(DmlOperation::Upsert),
            _ => Err(AstError::UnknownDmlOperation(s.to_string())),
        }
    }
}

/// DML statement as parsed: `upsert accounts Name;`
///
/// The records themselves are runtime values supplied by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmlStatement {
    pub operation: DmlOperation,
    /// Optional upsert key field (`upsert records ExternalKey__c`)
    pub upsert_key: Option<String>,
    #[serde(default)]
    pub span: Span,
}
