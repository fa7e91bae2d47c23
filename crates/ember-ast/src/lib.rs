//! ember-ast: AST shapes shared between the parser and the runtime core
//!
//! The grammar-driven parser lives outside this workspace. It hands the
//! runtime three families of nodes:
//! - query nodes (`Query`, `FieldPath`, `Condition`, `OrderBy`)
//! - DML statements (`DmlStatement`, `DmlOperation`)
//! - declarations (`Declaration` and its variants, `Modifier`)
//!
//! All nodes are plain data and serialize with serde so that a parser in a
//! separate process can ship them across.

mod decl;
mod error;
mod query;
mod span;

pub use decl::*;
pub use error::AstError;
pub use query::*;
pub use span::Span;
