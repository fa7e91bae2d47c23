//! Runtime error taxonomy
//!
//! Every failure the core reports falls into one of the `ErrorKind`
//! categories. Errors are plain data (`Clone`) so per-record DML outcomes can
//! be inspected and copied by the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error category, stable across variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Compile,
    Lookup,
    Execution,
    TypeConversion,
    StoreTimeout,
    Native,
    Config,
}

/// Query or statement could not be built
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("unknown class '{name}'")]
    UnknownClass { name: String },

    #[error("unknown relation '{relation}' in field path '{path}'")]
    UnknownRelation { relation: String, path: String },

    #[error("relation '{relation}' refers back to the queried class")]
    SelfRelation { relation: String },

    #[error("field path #{index} is empty")]
    EmptyFieldPath { index: usize },

    #[error("query on '{class}' selects no fields")]
    EmptySelection { class: String },

    #[error("field '{path}' is selected more than once")]
    DuplicateField { path: String },

    #[error("'{identifier}' is not a valid identifier")]
    InvalidIdentifier { identifier: String },

    #[error("bind variable ':{name}' has no value")]
    UnboundVariable { name: String },

    #[error("{kind} value cannot be written as a store literal")]
    UnrenderableLiteral { kind: String },

    #[error("operator {op} cannot take {reason}")]
    InvalidOperand { op: String, reason: String },

    #[error("update of '{class}' has no fields to set")]
    EmptyUpdate { class: String },

    #[error("record of class '{found}' passed to DML on '{expected}'")]
    ClassMismatch { expected: String, found: String },

    #[error("class '{name}' is already registered")]
    DuplicateClass { name: String },

    #[error("method '{class}.{method}({signature})' is declared twice")]
    DuplicateMethod {
        class: String,
        method: String,
        signature: String,
    },

    #[error("join alias '{alias}' for '{path}' is already taken by another table")]
    AliasCollision { alias: String, path: String },

    #[error("{clause} {value} is out of range")]
    PagingOutOfRange { clause: String, value: u64 },
}

/// A required key or member is missing
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    #[error("record #{index} of '{class}' has no '{field}' value")]
    MissingKey {
        class: String,
        field: String,
        index: usize,
    },

    #[error("no method '{class}.{method}' accepts ({signature})")]
    NoSuchMethod {
        class: String,
        method: String,
        signature: String,
    },
}

/// The store rejected a statement, or its answer could not be used
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("statement rejected: {message} [{statement}]")]
    Rejected {
        statement: String,
        record: Option<usize>,
        message: String,
    },

    #[error("result row has {found} columns, projection expects {expected}")]
    ProjectionMismatch { expected: usize, found: usize },

    #[error("record #{record} rolled back with its batch")]
    RolledBack { record: usize },

    #[error("transaction failed: {message}")]
    Transaction { message: String },
}

/// A raw column value does not fit the field's value kind
#[derive(Debug, Clone, PartialEq, Error)]
#[error("field '{field}': cannot convert {found} to {expected}")]
pub struct TypeConversionError {
    pub field: String,
    pub expected: String,
    pub found: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutReason {
    DeadlineExceeded,
    Cancelled,
}

impl std::fmt::Display for TimeoutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutReason::DeadlineExceeded => f.write_str("exceeded its deadline"),
            TimeoutReason::Cancelled => f.write_str("was cancelled"),
        }
    }
}

/// A store call ran past its deadline or was cancelled
#[derive(Debug, Clone, PartialEq, Error)]
#[error("store call {reason}: {statement}")]
pub struct StoreTimeoutError {
    pub statement: String,
    pub reason: TimeoutReason,
}

/// Any failure surfaced by the runtime core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    TypeConversion(#[from] TypeConversionError),

    #[error(transparent)]
    StoreTimeout(#[from] StoreTimeoutError),

    #[error("{class}.{method}: {message}")]
    Native {
        class: String,
        method: String,
        message: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RuntimeError {
    pub fn native(class: &str, method: &str, message: impl Into<String>) -> Self {
        RuntimeError::Native {
            class: class.to_string(),
            method: method.to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Compile(_) => ErrorKind::Compile,
            RuntimeError::Lookup(_) => ErrorKind::Lookup,
            RuntimeError::Execution(_) => ErrorKind::Execution,
            RuntimeError::TypeConversion(_) => ErrorKind::TypeConversion,
            RuntimeError::StoreTimeout(_) => ErrorKind::StoreTimeout,
            RuntimeError::Native { .. } => ErrorKind::Native,
            RuntimeError::Config(_) => ErrorKind::Config,
        }
    }

    /// Stable error code for display
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeError::Compile(e) => match e {
                CompileError::UnknownClass { .. } => "E-COMPILE-001",
                CompileError::UnknownRelation { .. } => "E-COMPILE-002",
                CompileError::SelfRelation { .. } => "E-COMPILE-003",
                CompileError::EmptyFieldPath { .. } => "E-COMPILE-004",
                CompileError::EmptySelection { .. } => "E-COMPILE-005",
                CompileError::DuplicateField { .. } => "E-COMPILE-006",
                CompileError::InvalidIdentifier { .. } => "E-COMPILE-007",
                CompileError::UnboundVariable { .. } => "E-COMPILE-008",
                CompileError::UnrenderableLiteral { .. } => "E-COMPILE-009",
                CompileError::InvalidOperand { .. } => "E-COMPILE-010",
                CompileError::EmptyUpdate { .. } => "E-COMPILE-011",
                CompileError::ClassMismatch { .. } => "E-COMPILE-012",
                CompileError::DuplicateClass { .. } => "E-COMPILE-013",
                CompileError::DuplicateMethod { .. } => "E-COMPILE-014",
                CompileError::AliasCollision { .. } => "E-COMPILE-015",
                CompileError::PagingOutOfRange { .. } => "E-COMPILE-016",
            },
            RuntimeError::Lookup(e) => match e {
                LookupError::MissingKey { .. } => "E-LOOKUP-001",
                LookupError::NoSuchMethod { .. } => "E-LOOKUP-002",
            },
            RuntimeError::Execution(e) => match e {
                ExecutionError::Rejected { .. } => "E-EXEC-001",
                ExecutionError::ProjectionMismatch { .. } => "E-EXEC-002",
                ExecutionError::RolledBack { .. } => "E-EXEC-003",
                ExecutionError::Transaction { .. } => "E-EXEC-004",
            },
            RuntimeError::TypeConversion(_) => "E-TYPE-001",
            RuntimeError::StoreTimeout(_) => "E-TIMEOUT-001",
            RuntimeError::Native { .. } => "E-NATIVE-001",
            RuntimeError::Config(_) => "E-CONFIG-001",
        }
    }
}
