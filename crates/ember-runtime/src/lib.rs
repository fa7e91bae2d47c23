//! ember-runtime: execution core of the ember scripting language
//!
//! This crate sits between the evaluator and the relational store:
//! - `ClassRegistry`: immutable class table with native and interpreted methods
//! - `QueryCompiler`: query AST → statement text plus a `Projection`
//! - `Materializer`: result rows + projection → object graphs
//! - `DmlExecutor`: insert/update/delete/upsert intents → statements, per record
//! - `Driver`: wires the above to a `Store` and a `RuntimeConfig`
//!
//! # Data flow
//!
//! ```text
//! evaluator ──Query──▶ QueryCompiler ──sql──▶ Store ──rows──▶ Materializer ──Objects──▶ evaluator
//! evaluator ──DmlIntent──▶ DmlExecutor ──one statement per record──▶ Store
//! ```

pub mod builtin;
mod class;
mod config;
mod deadline;
mod dml;
mod driver;
mod error;
pub mod fixture;
mod materialize;
mod object;
mod query;
mod registry;
mod sql;
mod store;
mod value;

pub use builtin::install_database_classes;
pub use class::{
    ClassType, Dispatch, ExtensionContext, FieldType, Method, MethodBody, MethodMap, NativeFn, CURRENT_PAGE,
};
pub use config::{RuntimeConfig, StoreConfig};
pub use deadline::{CancellationToken, Deadline};
pub use dml::{
    compile_delete, compile_insert, compile_update, compile_upsert_lookup, Applied, DmlExecutor, DmlIntent,
    DmlMode, DmlResult, RecordOutcome,
};
pub use driver::Driver;
pub use error::{
    CompileError, ErrorKind, ExecutionError, LookupError, RuntimeError, StoreTimeoutError, TimeoutReason,
    TypeConversionError,
};
pub use materialize::{convert_column, Materializer};
pub use object::Object;
pub use query::{Bindings, CompiledQuery, Projection, QueryCompiler};
pub use registry::{ClassRegistry, RegistryBuilder};
pub use store::{RawValue, Row, SqliteStore, Store, StoreError, TransactionEnd};
pub use value::Value;
