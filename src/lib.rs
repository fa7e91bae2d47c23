//! ember: query, materialization and DML core for the ember scripting language
//!
//! Re-exports the member crates:
//! - [`ast`]: query, DML and declaration nodes produced by the parser
//! - [`runtime`]: class registry, query compiler, materializer and DML executor

pub use ember_ast as ast;
pub use ember_runtime as runtime;

pub use ember_runtime::{ClassRegistry, Driver, Object, RegistryBuilder, RuntimeConfig, RuntimeError, Value};
