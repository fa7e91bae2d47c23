use tracing::info;

use super::argument;
use crate::class::{ClassType, Method};
use crate::error::CompileError;
use crate::value::Value;

/// `System.debug(Object)` writes its argument to the `ember::debug` target
pub(super) fn class() -> Result<ClassType, CompileError> {
    ClassType::new("System").with_static_method(Method::native("debug", &["Object"], None, |_, args, _| {
        let value = argument("System", "debug", args, 0)?;
        info!(target: "ember::debug", "{}", value);
        Ok(Value::Null)
    }))
}
