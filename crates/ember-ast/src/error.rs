use thiserror::Error;

/// Errors raised while building AST nodes from parser output
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AstError {
    #[error("unknown DML operation '{0}' (expected insert, update, delete or upsert)")]
    UnknownDmlOperation(String),

    #[error("unknown comparison operator '{0}'")]
    UnknownOperator(String),
}
