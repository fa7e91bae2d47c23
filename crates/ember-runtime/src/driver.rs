//! Driver - the evaluator's entry point into the core
//!
//! Ties a class registry, a store and the runtime configuration together:
//! `query` runs compile → store → materialize, `execute` runs a DML intent.
//! Every call carries a deadline, either the caller's or the configured
//! default.

use std::sync::Arc;

use ember_ast::{ClassDeclaration, Query};
use tracing::debug;

use crate::class::ClassType;
use crate::config::RuntimeConfig;
use crate::deadline::Deadline;
use crate::dml::{DmlExecutor, DmlIntent, DmlResult};
use crate::error::RuntimeError;
use crate::materialize::Materializer;
use crate::object::Object;
use crate::query::{Bindings, CompiledQuery, QueryCompiler};
use crate::registry::ClassRegistry;
use crate::store::{Row, SqliteStore, Store};

pub struct Driver {
    registry: Arc<ClassRegistry>,
    store: Arc<dyn Store>,
    config: RuntimeConfig,
}

impl Driver {
    pub fn new(registry: Arc<ClassRegistry>, store: Arc<dyn Store>, config: RuntimeConfig) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    /// Open the configured SQLite store
    pub fn open(registry: Arc<ClassRegistry>, config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let store = SqliteStore::open(&config.store)
            .map_err(|e| RuntimeError::Config(format!("cannot open store '{}': {}", config.store.path, e)))?;
        Ok(Self::new(registry, Arc::new(store), config))
    }

    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Register a user-defined class after startup. A new registry is
    /// published; readers holding the previous one keep an unchanged view.
    pub fn register_class(&mut self, decl: &ClassDeclaration) -> Result<Arc<ClassType>, RuntimeError> {
        let mut builder = self.registry.extend();
        let class = builder.register_declaration(decl)?;
        self.registry = builder.build();
        Ok(class)
    }

    pub fn compile(&self, query: &Query, bindings: &Bindings) -> Result<CompiledQuery, RuntimeError> {
        Ok(QueryCompiler::new(&self.registry).compile(query, bindings)?)
    }

    pub fn query(&self, query: &Query, bindings: &Bindings) -> Result<Vec<Object>, RuntimeError> {
        self.query_with_deadline(query, bindings, &self.config.default_deadline())
    }

    /// Compile, run and materialize. A compile failure never reaches the
    /// store; any later failure returns no objects.
    pub fn query_with_deadline(
        &self,
        query: &Query,
        bindings: &Bindings,
        deadline: &Deadline,
    ) -> Result<Vec<Object>, RuntimeError> {
        let compiled = self.compile(query, bindings)?;
        let rows = self
            .store
            .query(&compiled.sql, deadline)
            .map_err(|e| e.into_runtime(&compiled.sql, None))?;
        debug!(rows = rows.len(), class = compiled.class.name(), "query returned");
        Materializer::new(&self.registry).materialize(&compiled.class, &compiled.projection, rows)
    }

    pub fn execute(&self, intent: &DmlIntent) -> Result<DmlResult, RuntimeError> {
        self.execute_with_deadline(intent, self.config.default_deadline())
    }

    pub fn execute_with_deadline(&self, intent: &DmlIntent, deadline: Deadline) -> Result<DmlResult, RuntimeError> {
        DmlExecutor::new(self.store.as_ref())
            .with_mode(self.config.dml_mode)
            .with_deadline(deadline)
            .execute(&self.registry, intent)
    }

    /// Run statement text as-is and return the raw rows
    pub fn query_raw(&self, sql: &str) -> Result<Vec<Row>, RuntimeError> {
        self.store
            .query(sql, &self.config.default_deadline())
            .map_err(|e| e.into_runtime(sql, None))
    }

    /// Run statement text as-is, returning rows changed
    pub fn execute_raw(&self, sql: &str) -> Result<usize, RuntimeError> {
        self.store
            .execute(sql, &self.config.default_deadline())
            .map_err(|e| e.into_runtime(sql, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::FieldType;
    use crate::fixture;
    use crate::registry::RegistryBuilder;
    use crate::value::Value;
    use ember_ast::{Declaration, FieldDeclaration, Span, TypeRef};

    fn driver() -> Driver {
        let mut builder = RegistryBuilder::new();
        fixture::register_demo_classes(&mut builder).unwrap();
        let driver = Driver::open(builder.build(), RuntimeConfig::in_memory()).unwrap();
        fixture::seed_demo_schema(driver.store().as_ref(), &Deadline::none()).unwrap();
        driver
    }

    #[test]
    fn test_query_round_trip() {
        let driver = driver();
        let objects = driver
            .query(&Query::select("Account", ["Id", "Name"]), &Bindings::new())
            .unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].get("Id"), Some(&Value::from("12345")));
    }

    #[test]
    fn test_compile_error_does_not_reach_store() {
        let driver = driver();
        let err = driver
            .query(&Query::select("Missing", ["Name"]), &Bindings::new())
            .unwrap_err();
        assert_eq!(err.code(), "E-COMPILE-001");
    }

    #[test]
    fn test_expired_deadline() {
        let driver = driver();
        let err = driver
            .query_with_deadline(
                &Query::select("Account", ["Name"]),
                &Bindings::new(),
                &Deadline::at(std::time::Instant::now()),
            )
            .unwrap_err();
        assert_eq!(err.code(), "E-TIMEOUT-001");
    }

    #[test]
    fn test_raw_passthrough() {
        let driver = driver();
        let changed = driver
            .execute_raw("UPDATE Account SET name = 'piyo' WHERE id = '12345'")
            .unwrap();
        assert_eq!(changed, 1);
        let rows = driver.query_raw("SELECT COUNT(*) FROM Contact").unwrap();
        assert_eq!(rows, vec![vec![crate::store::RawValue::Integer(2)]]);
    }

    #[test]
    fn test_register_class_publishes_new_registry() {
        let mut driver = driver();
        let before = Arc::clone(driver.registry());
        let decl = ember_ast::ClassDeclaration {
            name: "Opportunity".into(),
            modifiers: Vec::new(),
            super_class: None,
            implements: Vec::new(),
            body: vec![Declaration::Field(FieldDeclaration {
                modifiers: Vec::new(),
                type_ref: TypeRef::named("Integer"),
                names: vec!["Amount".into()],
                span: Span::default(),
            })],
            span: Span::default(),
        };

        let class = driver.register_class(&decl).unwrap();
        assert_eq!(class.field_type("Amount"), Some(&FieldType::Integer));
        assert!(driver.registry().contains("Opportunity"));
        assert!(!before.contains("Opportunity"));

        let err = driver.register_class(&decl).unwrap_err();
        assert_eq!(err.code(), "E-COMPILE-013");
    }
}
