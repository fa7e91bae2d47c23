//! `Database` - DML and record counts from script code
//!
//! These methods reach the store, so the class only becomes visible after
//! the store has answered and every required table exists.

use std::sync::Arc;

use ember_ast::DmlOperation;
use tracing::info;

use super::argument;
use crate::class::{ClassType, Method};
use crate::config::RuntimeConfig;
use crate::dml::{DmlExecutor, DmlIntent};
use crate::error::{CompileError, RuntimeError};
use crate::object::Object;
use crate::registry::RegistryBuilder;
use crate::sql::check_identifier;
use crate::store::Store;
use crate::value::Value;

/// Verify the store, then register `Database` on `builder`
pub fn install_database_classes(
    builder: &mut RegistryBuilder,
    store: Arc<dyn Store>,
    config: &RuntimeConfig,
    required_tables: &[&str],
) -> Result<(), RuntimeError> {
    store
        .query("SELECT 1", &config.default_deadline())
        .map_err(|e| RuntimeError::Config(format!("store is not reachable: {}", e)))?;
    for table in required_tables {
        let exists = store
            .table_exists(table, &config.default_deadline())
            .map_err(|e| e.into_runtime("table lookup", None))?;
        if !exists {
            return Err(RuntimeError::Config(format!("required table '{}' does not exist", table)));
        }
    }

    builder.register_class(database_class(store, config.clone())?)?;
    info!(tables = required_tables.len(), "Database class installed");
    Ok(())
}

#[derive(Clone)]
struct Backend {
    store: Arc<dyn Store>,
    config: RuntimeConfig,
}

impl Backend {
    /// Run `operation` over a List of records; one Boolean per record
    fn dml(
        &self,
        method: &str,
        operation: DmlOperation,
        args: &[Value],
        upsert_key: Option<&str>,
    ) -> Result<Value, RuntimeError> {
        let records = records(method, argument("Database", method, args, 0)?)?;
        let Some(first) = records.first() else {
            return Ok(Value::List(Vec::new()));
        };
        let class = Arc::clone(first.class());

        let mut intent = DmlIntent::new(operation, class.name(), records);
        if let Some(key) = upsert_key {
            intent = intent.with_upsert_key(key);
        }
        let result = DmlExecutor::new(self.store.as_ref())
            .with_mode(self.config.dml_mode)
            .with_deadline(self.config.default_deadline())
            .execute_for(&class, &intent)?;

        Ok(Value::List(
            result.outcomes.iter().map(|o| Value::Boolean(o.is_ok())).collect(),
        ))
    }

    fn count(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        let name = argument("Database", "countRecords", args, 0)?
            .as_str()
            .ok_or_else(|| RuntimeError::native("Database", "countRecords", "class name must be a String"))?;
        let sql = format!("SELECT COUNT(*) FROM {}", check_identifier(name)?);
        let rows = self
            .store
            .query(&sql, &self.config.default_deadline())
            .map_err(|e| e.into_runtime(&sql, None))?;
        match rows.first().and_then(|row| row.first()) {
            Some(crate::store::RawValue::Integer(n)) => Ok(Value::Integer(*n)),
            _ => Err(RuntimeError::native("Database", "countRecords", "store returned no count")),
        }
    }
}

fn records(method: &str, value: &Value) -> Result<Vec<Object>, RuntimeError> {
    let items = value
        .as_list()
        .ok_or_else(|| RuntimeError::native("Database", method, format!("expected List, got {}", value.type_name())))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_object().cloned().ok_or_else(|| {
                RuntimeError::native("Database", method, format!("element #{} is {}, not a record", i, item.type_name()))
            })
        })
        .collect()
}

fn database_class(store: Arc<dyn Store>, config: RuntimeConfig) -> Result<ClassType, CompileError> {
    let backend = Backend { store, config };

    let mut class = ClassType::new("Database");
    for (name, operation) in [
        ("insert", DmlOperation::Insert),
        ("update", DmlOperation::Update),
        ("delete", DmlOperation::Delete),
        ("upsert", DmlOperation::Upsert),
    ] {
        let b = backend.clone();
        class = class.with_static_method(Method::native(name, &["List"], Some("List"), move |_, args, _| {
            b.dml(name, operation, args, None)
        }))?;
    }

    let b = backend.clone();
    class = class.with_static_method(Method::native(
        "upsert",
        &["List", "String"],
        Some("List"),
        move |_, args, _| {
            let key = argument("Database", "upsert", args, 1)?
                .as_str()
                .ok_or_else(|| RuntimeError::native("Database", "upsert", "key field must be a String"))?
                .to_string();
            b.dml("upsert", DmlOperation::Upsert, args, Some(&key))
        },
    ))?;

    class.with_static_method(Method::native("countRecords", &["String"], Some("Integer"), move |_, args, _| {
        backend.count(args)
    }))
}
