//! Host-implemented classes
//!
//! `install` seeds a registry builder with every native class that does not
//! need the store. Classes whose methods reach the store are installed
//! separately through `install_database_classes`, once the store is known to
//! be reachable.

mod apex_pages;
mod database;
mod primitives;
mod system;

pub use database::install_database_classes;

use crate::error::{CompileError, RuntimeError};
use crate::registry::RegistryBuilder;
use crate::value::Value;

pub fn install(builder: &mut RegistryBuilder) -> Result<(), CompileError> {
    builder.register_class(apex_pages::class()?)?;
    builder.register_class(system::class()?)?;
    builder.register_class(primitives::double_class()?)?;
    builder.register_class(primitives::integer_class()?)?;
    builder.register_class(primitives::string_class()?)?;
    Ok(())
}

/// Receiver of an instance call, which must be present
fn receiver<'a>(class: &str, method: &str, receiver: Option<&'a Value>) -> Result<&'a Value, RuntimeError> {
    receiver.ok_or_else(|| RuntimeError::native(class, method, "called without a receiver"))
}

/// Positional argument `index`
fn argument<'a>(class: &str, method: &str, args: &'a [Value], index: usize) -> Result<&'a Value, RuntimeError> {
    args.get(index)
        .ok_or_else(|| RuntimeError::native(class, method, format!("missing argument #{}", index)))
}
