//! Demo schema: two Accounts and a Contact for each
//!
//! Used by tests and by hosts that want a populated store to try queries
//! against.

use crate::class::{ClassType, FieldType};
use crate::deadline::Deadline;
use crate::error::CompileError;
use crate::registry::RegistryBuilder;
use crate::store::{Store, StoreError};

const DEMO_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS Account (
    id VARCHAR PRIMARY KEY,
    name TEXT
);
CREATE TABLE IF NOT EXISTS Contact (
    id VARCHAR PRIMARY KEY,
    lastname TEXT,
    firstname TEXT,
    accountid VARCHAR
);
INSERT OR IGNORE INTO Account (id, name) VALUES ('12345', 'hoge'), ('abcde', 'fuga');
INSERT OR IGNORE INTO Contact (id, lastname, firstname, accountid) VALUES
    ('a', 'l1', 'r1', '12345'),
    ('b', 'l2', 'r2', 'abcde');
";

/// Tables the demo classes live in
pub const DEMO_TABLES: &[&str] = &["Account", "Contact"];

/// Create the demo tables and rows. Safe to run more than once.
pub fn seed_demo_schema(store: &dyn Store, deadline: &Deadline) -> Result<(), StoreError> {
    store.execute_batch(DEMO_SCHEMA, deadline)
}

/// Register `Account` and `Contact` with their declared field types
pub fn register_demo_classes(builder: &mut RegistryBuilder) -> Result<(), CompileError> {
    builder.register_class(
        ClassType::new("Account")
            .with_field("Id", FieldType::Id)
            .with_field("Name", FieldType::String),
    )?;
    builder.register_class(
        ClassType::new("Contact")
            .with_field("Id", FieldType::Id)
            .with_field("LastName", FieldType::String)
            .with_field("FirstName", FieldType::String)
            .with_field("AccountId", FieldType::Reference("Account".to_string())),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn test_seed_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        seed_demo_schema(&store, &Deadline::none()).unwrap();
        seed_demo_schema(&store, &Deadline::none()).unwrap();
        let rows = store.query("SELECT id FROM Account", &Deadline::none()).unwrap();
        assert_eq!(rows.len(), 2);
        for table in DEMO_TABLES {
            assert!(store.table_exists(table, &Deadline::none()).unwrap());
        }
    }

    #[test]
    fn test_demo_classes() {
        let mut builder = RegistryBuilder::new();
        register_demo_classes(&mut builder).unwrap();
        let registry = builder.build();
        let contact = registry.resolve("Contact").unwrap();
        assert_eq!(
            contact.field_type("AccountId"),
            Some(&FieldType::Reference("Account".into()))
        );
    }
}
