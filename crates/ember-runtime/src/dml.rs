//! DML Compiler & Executor
//!
//! Each record of a DML intent compiles to one statement and runs on its
//! own. A record that fails (missing key, unrenderable value, rejected by
//! the store) reports its error in its own outcome slot; its siblings still
//! run. `DmlMode::Atomic` opts into all-or-nothing batches instead.
//!
//! Statement shapes:
//!
//! ```text
//! INSERT INTO Account (Name) VALUES ('hoge')
//! UPDATE Account SET Name = 'fuga' WHERE id = '12345'
//! DELETE FROM Account WHERE id = 'abcde'
//! ```

use ember_ast::{DmlOperation, DmlStatement};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::class::ClassType;
use crate::deadline::Deadline;
use crate::error::{CompileError, ExecutionError, LookupError, RuntimeError};
use crate::object::Object;
use crate::registry::ClassRegistry;
use crate::sql::{check_identifier, key_column, ID_COLUMN, ID_FIELD};
use crate::store::{Store, StoreError, TransactionEnd};
use crate::value::Value;

// ============================================================================
// Intents and outcomes
// ============================================================================

/// A mutation request: one operation applied to every record
#[derive(Debug, Clone)]
pub struct DmlIntent {
    pub operation: DmlOperation,
    /// Class (and table) the records belong to
    pub target: String,
    pub records: Vec<Object>,
    /// Field matched by upsert; `Id` when absent
    pub upsert_key: Option<String>,
}

impl DmlIntent {
    pub fn new(operation: DmlOperation, target: impl Into<String>, records: Vec<Object>) -> Self {
        Self {
            operation,
            target: target.into(),
            records,
            upsert_key: None,
        }
    }

    /// Intent for a parsed `insert`/`update`/`delete`/`upsert` statement
    /// once the evaluator has resolved its record expression
    pub fn from_statement(statement: &DmlStatement, target: impl Into<String>, records: Vec<Object>) -> Self {
        Self {
            operation: statement.operation,
            target: target.into(),
            records,
            upsert_key: statement.upsert_key.clone(),
        }
    }

    pub fn with_upsert_key(mut self, key: impl Into<String>) -> Self {
        self.upsert_key = Some(key.into());
        self
    }
}

/// How a batch of records is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DmlMode {
    /// Every record runs independently
    #[default]
    PerRecord,
    /// One transaction; the first failure rolls back the whole batch
    Atomic,
}

/// A statement that ran
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Operation performed. An upsert reports the insert or update it chose.
    pub operation: DmlOperation,
    pub statement: String,
    pub rows_affected: usize,
}

pub type RecordOutcome = Result<Applied, RuntimeError>;

/// One outcome per record, in record order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DmlResult {
    pub outcomes: Vec<RecordOutcome>,
}

impl DmlResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// True when every record succeeded
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(Result::is_ok)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// `(record index, error)` for every failed record
    pub fn errors(&self) -> impl Iterator<Item = (usize, &RuntimeError)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().err().map(|e| (i, e)))
    }

    /// Statements that ran, in record order
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter_map(|o| o.as_ref().ok().map(|a| a.statement.as_str()))
    }
}

// ============================================================================
// Statement compilation
// ============================================================================

/// Literal for a DML column value. Lists and nested objects have no column
/// representation.
fn column_literal(value: &Value) -> Result<String, CompileError> {
    match value {
        Value::List(_) => Err(CompileError::UnrenderableLiteral {
            kind: "List".to_string(),
        }),
        other => other.to_sql_literal(),
    }
}

/// Non-Null value of `field`, or a missing-key error for record `index`
fn required_key<'a>(class: &str, record: &'a Object, field: &str, index: usize) -> Result<&'a Value, LookupError> {
    match record.get(field) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(LookupError::MissingKey {
            class: class.to_string(),
            field: field.to_string(),
            index,
        }),
    }
}

/// `Field = literal` for every non-Null field not in `skip`
fn assignments(record: &Object, skip: &[&str]) -> Result<Vec<String>, CompileError> {
    let mut out = Vec::new();
    for (field, value) in record.fields() {
        if value.is_null() || skip.iter().any(|s| s.eq_ignore_ascii_case(field)) {
            continue;
        }
        out.push(format!("{} = {}", check_identifier(field)?, column_literal(value)?));
    }
    Ok(out)
}

/// `INSERT INTO T (cols) VALUES (vals)`; Null fields are left out
pub fn compile_insert(class: &str, record: &Object) -> Result<String, CompileError> {
    let table = check_identifier(class)?;
    let mut columns = Vec::new();
    let mut values = Vec::new();
    for (field, value) in record.fields() {
        if value.is_null() {
            continue;
        }
        columns.push(check_identifier(field)?);
        values.push(column_literal(value)?);
    }
    if columns.is_empty() {
        return Ok(format!("INSERT INTO {} DEFAULT VALUES", table));
    }
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        values.join(", ")
    ))
}

/// `UPDATE T SET .. WHERE id = <Id>`; record `index` must carry an Id
pub fn compile_update(class: &str, record: &Object, index: usize) -> Result<String, RuntimeError> {
    let table = check_identifier(class)?;
    let id = required_key(class, record, ID_FIELD, index)?;
    let set = assignments(record, &[ID_FIELD])?;
    if set.is_empty() {
        return Err(CompileError::EmptyUpdate {
            class: class.to_string(),
        }
        .into());
    }
    Ok(format!(
        "UPDATE {} SET {} WHERE {} = {}",
        table,
        set.join(", "),
        ID_COLUMN,
        column_literal(id)?
    ))
}

/// `DELETE FROM T WHERE id = <Id>`
pub fn compile_delete(class: &str, record: &Object, index: usize) -> Result<String, RuntimeError> {
    let table = check_identifier(class)?;
    let id = required_key(class, record, ID_FIELD, index)?;
    Ok(format!(
        "DELETE FROM {} WHERE {} = {}",
        table,
        ID_COLUMN,
        column_literal(id)?
    ))
}

/// Probe for an existing row whose `key` matches the record's key value
pub fn compile_upsert_lookup(class: &str, record: &Object, key: &str, index: usize) -> Result<String, RuntimeError> {
    let table = check_identifier(class)?;
    let value = required_key(class, record, key, index)?;
    Ok(format!(
        "SELECT {} FROM {} WHERE {} = {} LIMIT 1",
        ID_COLUMN,
        table,
        key_column(key)?,
        column_literal(value)?
    ))
}

fn compile_upsert_update(class: &str, record: &Object, key: &str, index: usize) -> Result<Option<String>, RuntimeError> {
    let table = check_identifier(class)?;
    let value = required_key(class, record, key, index)?;
    let set = assignments(record, &[ID_FIELD, key])?;
    if set.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!(
        "UPDATE {} SET {} WHERE {} = {}",
        table,
        set.join(", "),
        key_column(key)?,
        column_literal(value)?
    )))
}

// ============================================================================
// Executor
// ============================================================================

pub struct DmlExecutor<'s> {
    store: &'s dyn Store,
    mode: DmlMode,
    deadline: Deadline,
}

impl<'s> DmlExecutor<'s> {
    pub fn new(store: &'s dyn Store) -> Self {
        Self {
            store,
            mode: DmlMode::default(),
            deadline: Deadline::none(),
        }
    }

    pub fn with_mode(mut self, mode: DmlMode) -> Self {
        self.mode = mode;
        self
    }

    /// Deadline shared by every statement of the batch
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Resolve the intent's target and run it. `Err` means nothing ran;
    /// per-record failures are reported inside the `DmlResult`.
    pub fn execute(&self, registry: &ClassRegistry, intent: &DmlIntent) -> Result<DmlResult, RuntimeError> {
        let class = registry.resolve(&intent.target)?;
        self.execute_for(class, intent)
    }

    /// Run an intent against an already resolved class
    pub fn execute_for(&self, class: &ClassType, intent: &DmlIntent) -> Result<DmlResult, RuntimeError> {
        check_identifier(class.name())?;
        if let Some(key) = &intent.upsert_key {
            check_identifier(key)?;
        }

        let result = match self.mode {
            DmlMode::PerRecord => {
                let outcomes = intent
                    .records
                    .iter()
                    .enumerate()
                    .map(|(index, record)| {
                        let outcome = self.apply(self.store, class, intent, record, index);
                        if let Err(e) = &outcome {
                            warn!(class = class.name(), record = index, code = e.code(), error = %e, "DML record failed");
                        }
                        outcome
                    })
                    .collect();
                DmlResult { outcomes }
            }
            DmlMode::Atomic => self.execute_atomic(class, intent)?,
        };

        info!(
            class = class.name(),
            operation = %intent.operation,
            succeeded = result.succeeded(),
            failed = result.failed(),
            "DML batch finished"
        );
        Ok(result)
    }

    fn execute_atomic(&self, class: &ClassType, intent: &DmlIntent) -> Result<DmlResult, RuntimeError> {
        let mut applied = Vec::with_capacity(intent.records.len());
        let mut failure: Option<(usize, RuntimeError)> = None;

        let end = self
            .store
            .in_transaction(&self.deadline, &mut |tx| {
                for (index, record) in intent.records.iter().enumerate() {
                    match self.apply(tx, class, intent, record, index) {
                        Ok(a) => applied.push(a),
                        Err(e) => {
                            failure = Some((index, e));
                            return TransactionEnd::Rollback;
                        }
                    }
                }
                TransactionEnd::Commit
            })
            .map_err(|e| match e {
                StoreError::Timeout(timeout) => RuntimeError::StoreTimeout(timeout),
                other => ExecutionError::Transaction {
                    message: other.to_string(),
                }
                .into(),
            })?;

        let outcomes = match (end, failure) {
            (TransactionEnd::Rollback, Some((failed, error))) => {
                warn!(class = class.name(), record = failed, error = %error, "DML batch rolled back");
                (0..intent.records.len())
                    .map(|index| {
                        if index == failed {
                            Err(error.clone())
                        } else {
                            Err(ExecutionError::RolledBack { record: index }.into())
                        }
                    })
                    .collect()
            }
            _ => applied.into_iter().map(Ok).collect(),
        };
        Ok(DmlResult { outcomes })
    }

    fn apply(
        &self,
        store: &dyn Store,
        class: &ClassType,
        intent: &DmlIntent,
        record: &Object,
        index: usize,
    ) -> RecordOutcome {
        if record.class_name() != class.name() {
            return Err(CompileError::ClassMismatch {
                expected: class.name().to_string(),
                found: record.class_name().to_string(),
            }
            .into());
        }

        let name = class.name();
        match intent.operation {
            DmlOperation::Insert => {
                let sql = compile_insert(name, record)?;
                self.run(store, DmlOperation::Insert, sql, index)
            }
            DmlOperation::Update => {
                let sql = compile_update(name, record, index)?;
                self.run(store, DmlOperation::Update, sql, index)
            }
            DmlOperation::Delete => {
                let sql = compile_delete(name, record, index)?;
                self.run(store, DmlOperation::Delete, sql, index)
            }
            DmlOperation::Upsert => {
                let key = intent.upsert_key.as_deref().unwrap_or(ID_FIELD);
                self.upsert(store, name, record, key, index)
            }
        }
    }

    fn upsert(&self, store: &dyn Store, class: &str, record: &Object, key: &str, index: usize) -> RecordOutcome {
        let lookup = compile_upsert_lookup(class, record, key, index)?;
        debug!(sql = %lookup, "upsert lookup");
        let existing = store
            .query(&lookup, &self.deadline)
            .map_err(|e| e.into_runtime(&lookup, Some(index)))?;

        if existing.is_empty() {
            let sql = compile_insert(class, record)?;
            return self.run(store, DmlOperation::Insert, sql, index);
        }
        match compile_upsert_update(class, record, key, index)? {
            Some(sql) => self.run(store, DmlOperation::Update, sql, index),
            None => Ok(Applied {
                operation: DmlOperation::Update,
                statement: lookup,
                rows_affected: 0,
            }),
        }
    }

    fn run(&self, store: &dyn Store, operation: DmlOperation, sql: String, index: usize) -> RecordOutcome {
        debug!(sql = %sql, record = index, "DML statement");
        let rows_affected = store
            .execute(&sql, &self.deadline)
            .map_err(|e| e.into_runtime(&sql, Some(index)))?;
        Ok(Applied {
            operation,
            statement: sql,
            rows_affected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use crate::store::{RawValue, Row};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Store that records statement text and fails statements containing
    /// `fail_on`
    #[derive(Default)]
    struct RecordingStore {
        log: Mutex<Vec<String>>,
        fail_on: Option<String>,
        existing: Vec<Row>,
    }

    impl RecordingStore {
        fn failing_on(pattern: &str) -> Self {
            Self {
                fail_on: Some(pattern.to_string()),
                ..Self::default()
            }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().clone()
        }

        fn record(&self, sql: &str) -> Result<(), StoreError> {
            self.log.lock().push(sql.to_string());
            match &self.fail_on {
                Some(pattern) if sql.contains(pattern.as_str()) => Err(StoreError::Sqlite(
                    rusqlite::Error::SqliteFailure(
                        rusqlite::ffi::Error::new(19),
                        Some("constraint failed".to_string()),
                    ),
                )),
                _ => Ok(()),
            }
        }
    }

    impl Store for RecordingStore {
        fn query(&self, sql: &str, _deadline: &Deadline) -> Result<Vec<Row>, StoreError> {
            self.record(sql)?;
            Ok(self.existing.clone())
        }

        fn execute(&self, sql: &str, _deadline: &Deadline) -> Result<usize, StoreError> {
            self.record(sql)?;
            Ok(1)
        }

        fn execute_batch(&self, sql: &str, _deadline: &Deadline) -> Result<(), StoreError> {
            self.record(sql)
        }

        fn table_exists(&self, _table: &str, _deadline: &Deadline) -> Result<bool, StoreError> {
            Ok(true)
        }

        fn in_transaction(
            &self,
            deadline: &Deadline,
            body: &mut dyn FnMut(&dyn Store) -> TransactionEnd,
        ) -> Result<TransactionEnd, StoreError> {
            deadline.check("BEGIN")?;
            self.record("BEGIN")?;
            let end = body(self);
            self.record(match end {
                TransactionEnd::Commit => "COMMIT",
                TransactionEnd::Rollback => "ROLLBACK",
            })?;
            Ok(end)
        }
    }

    fn account() -> Arc<ClassType> {
        Arc::new(ClassType::new("Account"))
    }

    fn record(fields: &[(&str, Value)]) -> Object {
        Object::with_fields(account(), fields.iter().cloned())
    }

    #[test]
    fn test_insert_skips_null_fields() {
        let sql = compile_insert("Account", &record(&[("Name", "hoge".into()), ("Other", Value::Null)])).unwrap();
        assert_eq!(sql, "INSERT INTO Account (Name) VALUES ('hoge')");
    }

    #[test]
    fn test_insert_column_order_follows_fields() {
        let sql = compile_insert(
            "Account",
            &record(&[("Name", "o'hara".into()), ("Employees", Value::Integer(12)), ("Active", true.into())]),
        )
        .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO Account (Name, Employees, Active) VALUES ('o''hara', 12, TRUE)"
        );
    }

    #[test]
    fn test_insert_without_values() {
        let sql = compile_insert("Account", &record(&[("Name", Value::Null)])).unwrap();
        assert_eq!(sql, "INSERT INTO Account DEFAULT VALUES");
    }

    #[test]
    fn test_update_sets_non_null_fields_except_id() {
        let sql = compile_update(
            "Account",
            &record(&[("Id", "12345".into()), ("Name", "fuga".into()), ("Other", Value::Null)]),
            0,
        )
        .unwrap();
        assert_eq!(sql, "UPDATE Account SET Name = 'fuga' WHERE id = '12345'");
    }

    #[test]
    fn test_update_requires_id() {
        let err = compile_update("Account", &record(&[("Name", "x".into())]), 3).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::Lookup(LookupError::MissingKey {
                class: "Account".into(),
                field: "Id".into(),
                index: 3,
            })
        );

        let err = compile_update("Account", &record(&[("Id", Value::Null), ("Name", "x".into())]), 0).unwrap_err();
        assert_eq!(err.code(), "E-LOOKUP-001");
    }

    #[test]
    fn test_update_with_nothing_to_set() {
        let err = compile_update("Account", &record(&[("Id", "1".into())]), 0).unwrap_err();
        assert_eq!(err.code(), "E-COMPILE-011");
    }

    #[test]
    fn test_delete_filters_by_id() {
        let sql = compile_delete("Account", &record(&[("Id", "abcde".into())]), 0).unwrap();
        assert_eq!(sql, "DELETE FROM Account WHERE id = 'abcde'");
    }

    #[test]
    fn test_unrenderable_values() {
        let nested = Value::object(record(&[("Name", "x".into())]));
        let err = compile_insert("Account", &record(&[("Parent", nested)])).unwrap_err();
        assert!(matches!(err, CompileError::UnrenderableLiteral { .. }));

        let err = compile_insert("Account", &record(&[("Tags", Value::List(vec!["a".into()]))])).unwrap_err();
        assert!(matches!(err, CompileError::UnrenderableLiteral { .. }));

        let err = compile_insert("Account", &record(&[("Score", f64::NAN.into())])).unwrap_err();
        assert!(matches!(err, CompileError::UnrenderableLiteral { .. }));
    }

    #[test]
    fn test_failed_record_does_not_stop_batch() {
        let store = RecordingStore::default();
        let intent = DmlIntent::new(
            DmlOperation::Update,
            "Account",
            vec![
                record(&[("Name", "x".into())]),
                record(&[("Id", "12345".into()), ("Name", "fuga".into())]),
            ],
        );

        let result = DmlExecutor::new(&store).execute_for(&account(), &intent).unwrap();
        assert_eq!(result.len(), 2);
        assert!(matches!(result.outcomes[0], Err(RuntimeError::Lookup(_))));
        assert_eq!(
            result.outcomes[1].as_ref().unwrap().statement,
            "UPDATE Account SET Name = 'fuga' WHERE id = '12345'"
        );
        assert_eq!(store.log(), vec!["UPDATE Account SET Name = 'fuga' WHERE id = '12345'"]);
        assert_eq!(result.failed(), 1);
    }

    #[test]
    fn test_rejected_statement_is_reported_per_record() {
        let store = RecordingStore::failing_on("'dup'");
        let intent = DmlIntent::new(
            DmlOperation::Insert,
            "Account",
            vec![record(&[("Id", "dup".into())]), record(&[("Id", "ok".into())])],
        );

        let result = DmlExecutor::new(&store).execute_for(&account(), &intent).unwrap();
        match &result.outcomes[0] {
            Err(RuntimeError::Execution(ExecutionError::Rejected { statement, record, .. })) => {
                assert_eq!(statement, "INSERT INTO Account (Id) VALUES ('dup')");
                assert_eq!(*record, Some(0));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(result.outcomes[1].is_ok());
    }

    #[test]
    fn test_record_of_other_class_fails_alone() {
        let store = RecordingStore::default();
        let contact = Object::with_fields(Arc::new(ClassType::new("Contact")), [("Id", "a")]);
        let intent = DmlIntent::new(
            DmlOperation::Delete,
            "Account",
            vec![contact, record(&[("Id", "abcde".into())])],
        );

        let result = DmlExecutor::new(&store).execute_for(&account(), &intent).unwrap();
        assert!(matches!(
            result.outcomes[0],
            Err(RuntimeError::Compile(CompileError::ClassMismatch { .. }))
        ));
        assert_eq!(store.log(), vec!["DELETE FROM Account WHERE id = 'abcde'"]);
    }

    #[test]
    fn test_unknown_target_fails_whole_intent() {
        let registry = RegistryBuilder::new().build();
        let store = RecordingStore::default();
        let intent = DmlIntent::new(DmlOperation::Insert, "Account", vec![record(&[])]);
        let err = DmlExecutor::new(&store).execute(&registry, &intent).unwrap_err();
        assert_eq!(err.code(), "E-COMPILE-001");
        assert!(store.log().is_empty());
    }

    #[test]
    fn test_upsert_inserts_when_missing() {
        let store = RecordingStore::default();
        let intent = DmlIntent::new(
            DmlOperation::Upsert,
            "Account",
            vec![record(&[("Id", "new".into()), ("Name", "n".into())])],
        );
        let result = DmlExecutor::new(&store).execute_for(&account(), &intent).unwrap();
        let applied = result.outcomes[0].as_ref().unwrap();
        assert_eq!(applied.operation, DmlOperation::Insert);
        assert_eq!(
            store.log(),
            vec![
                "SELECT id FROM Account WHERE id = 'new' LIMIT 1",
                "INSERT INTO Account (Id, Name) VALUES ('new', 'n')",
            ]
        );
    }

    #[test]
    fn test_upsert_updates_by_key_when_found() {
        let store = RecordingStore {
            existing: vec![vec![RawValue::Text("12345".into())]],
            ..RecordingStore::default()
        };
        let intent = DmlIntent::new(
            DmlOperation::Upsert,
            "Account",
            vec![record(&[("Code", "A-1".into()), ("Name", "n".into())])],
        )
        .with_upsert_key("Code");

        let result = DmlExecutor::new(&store).execute_for(&account(), &intent).unwrap();
        assert_eq!(result.outcomes[0].as_ref().unwrap().operation, DmlOperation::Update);
        assert_eq!(
            store.log(),
            vec![
                "SELECT id FROM Account WHERE Code = 'A-1' LIMIT 1",
                "UPDATE Account SET Name = 'n' WHERE Code = 'A-1'",
            ]
        );
    }

    #[test]
    fn test_upsert_requires_key_value() {
        let store = RecordingStore::default();
        let intent = DmlIntent::new(DmlOperation::Upsert, "Account", vec![record(&[("Name", "n".into())])]);
        let result = DmlExecutor::new(&store).execute_for(&account(), &intent).unwrap();
        assert_eq!(result.outcomes[0].as_ref().unwrap_err().code(), "E-LOOKUP-001");
        assert!(store.log().is_empty());
    }

    #[test]
    fn test_atomic_batch_rolls_back_on_failure() {
        let store = RecordingStore::failing_on("'b'");
        let intent = DmlIntent::new(
            DmlOperation::Insert,
            "Account",
            vec![
                record(&[("Id", "a".into())]),
                record(&[("Id", "b".into())]),
                record(&[("Id", "c".into())]),
            ],
        );

        let result = DmlExecutor::new(&store)
            .with_mode(DmlMode::Atomic)
            .execute_for(&account(), &intent)
            .unwrap();

        assert_eq!(result.failed(), 3);
        assert_eq!(
            result.outcomes[0],
            Err(RuntimeError::Execution(ExecutionError::RolledBack { record: 0 }))
        );
        assert_eq!(result.outcomes[1].as_ref().unwrap_err().code(), "E-EXEC-001");
        assert_eq!(
            result.outcomes[2],
            Err(RuntimeError::Execution(ExecutionError::RolledBack { record: 2 }))
        );
        let log = store.log();
        assert_eq!(log.first().map(String::as_str), Some("BEGIN"));
        assert_eq!(log.last().map(String::as_str), Some("ROLLBACK"));
        assert!(!log.iter().any(|s| s.contains("'c'")));
    }

    #[test]
    fn test_atomic_batch_commits() {
        let store = RecordingStore::default();
        let intent = DmlIntent::new(
            DmlOperation::Delete,
            "Account",
            vec![record(&[("Id", "a".into())]), record(&[("Id", "b".into())])],
        );
        let result = DmlExecutor::new(&store)
            .with_mode(DmlMode::Atomic)
            .execute_for(&account(), &intent)
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.statements().count(), 2);
        assert_eq!(store.log().last().map(String::as_str), Some("COMMIT"));
    }

    #[test]
    fn test_atomic_batch_reports_expired_deadline_as_timeout() {
        let store = RecordingStore::default();
        let intent = DmlIntent::new(DmlOperation::Insert, "Account", vec![record(&[("Id", "a".into())])]);
        let err = DmlExecutor::new(&store)
            .with_mode(DmlMode::Atomic)
            .with_deadline(Deadline::at(std::time::Instant::now()))
            .execute_for(&account(), &intent)
            .unwrap_err();
        assert_eq!(err.code(), "E-TIMEOUT-001");
        assert!(store.log().is_empty());
    }

    #[test]
    fn test_intent_from_parsed_statement() {
        let statement = DmlStatement {
            operation: DmlOperation::Upsert,
            upsert_key: Some("Name".into()),
            span: ember_ast::Span::new(0, 20),
        };
        let intent = DmlIntent::from_statement(&statement, "Account", vec![record(&[("Name", "hoge".into())])]);
        assert_eq!(intent.operation, DmlOperation::Upsert);
        assert_eq!(intent.upsert_key.as_deref(), Some("Name"));
        assert_eq!(intent.target, "Account");

        let store = RecordingStore::default();
        let result = DmlExecutor::new(&store).execute_for(&account(), &intent).unwrap();
        assert!(result.is_success());
        assert!(store.log()[0].contains("WHERE Name = 'hoge'"));
    }
}
