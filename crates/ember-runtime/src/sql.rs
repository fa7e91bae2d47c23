//! Statement text helpers shared by the query and DML compilers

use crate::error::CompileError;

/// Column the store keys every table on
pub const ID_COLUMN: &str = "id";

/// Field carrying a record's key
pub const ID_FIELD: &str = "Id";

/// Accept `[A-Za-z_][A-Za-z0-9_]*`. Class and field names are interpolated
/// into statement text verbatim, so nothing else may pass.
pub fn check_identifier(identifier: &str) -> Result<&str, CompileError> {
    let mut chars = identifier.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(identifier)
    } else {
        Err(CompileError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

/// Column name for a key field; `Id` maps to the store's `id` column
pub fn key_column(field: &str) -> Result<&str, CompileError> {
    if field.eq_ignore_ascii_case(ID_FIELD) {
        Ok(ID_COLUMN)
    } else {
        check_identifier(field)
    }
}
