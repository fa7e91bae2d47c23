//! `Double`, `Integer` and `String` helpers

use super::{argument, receiver};
use crate::class::{ClassType, Method};
use crate::error::{CompileError, RuntimeError};
use crate::value::Value;

fn parse_arg<T: std::str::FromStr>(class: &str, method: &str, args: &[Value]) -> Result<T, RuntimeError> {
    let value = argument(class, method, args, 0)?;
    let text = value
        .as_str()
        .ok_or_else(|| RuntimeError::native(class, method, format!("expected String, got {}", value.type_name())))?;
    text.trim()
        .parse()
        .map_err(|_| RuntimeError::native(class, method, format!("'{}' is not a valid {}", text, class)))
}

pub(super) fn double_class() -> Result<ClassType, CompileError> {
    ClassType::new("Double")
        .with_instance_method(Method::native("format", &[], Some("String"), |recv, _, _| {
            match receiver("Double", "format", recv)? {
                Value::Double(d) => Ok(Value::String(format!("{:.6}", d))),
                Value::Integer(i) => Ok(Value::String(format!("{:.6}", *i as f64))),
                other => Err(RuntimeError::native(
                    "Double",
                    "format",
                    format!("receiver is {}", other.type_name()),
                )),
            }
        }))?
        .with_static_method(Method::native("valueOf", &["String"], Some("Double"), |_, args, _| {
            parse_arg::<f64>("Double", "valueOf", args).map(Value::Double)
        }))
}

pub(super) fn integer_class() -> Result<ClassType, CompileError> {
    ClassType::new("Integer").with_static_method(Method::native(
        "valueOf",
        &["String"],
        Some("Integer"),
        |_, args, _| parse_arg::<i64>("Integer", "valueOf", args).map(Value::Integer),
    ))
}

fn string_receiver<'a>(method: &str, recv: Option<&'a Value>) -> Result<&'a str, RuntimeError> {
    let value = receiver("String", method, recv)?;
    value
        .as_str()
        .ok_or_else(|| RuntimeError::native("String", method, format!("receiver is {}", value.type_name())))
}

pub(super) fn string_class() -> Result<ClassType, CompileError> {
    ClassType::new("String")
        .with_static_method(Method::native("valueOf", &["Object"], Some("String"), |_, args, _| {
            let value = argument("String", "valueOf", args, 0)?;
            Ok(Value::String(value.to_string()))
        }))?
        .with_instance_method(Method::native("length", &[], Some("Integer"), |recv, _, _| {
            let s = string_receiver("length", recv)?;
            Ok(Value::Integer(s.chars().count() as i64))
        }))?
        .with_instance_method(Method::native("toUpperCase", &[], Some("String"), |recv, _, _| {
            Ok(Value::String(string_receiver("toUpperCase", recv)?.to_uppercase()))
        }))?
        .with_instance_method(Method::native("toLowerCase", &[], Some("String"), |recv, _, _| {
            Ok(Value::String(string_receiver("toLowerCase", recv)?.to_lowercase()))
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{Dispatch, ExtensionContext};

    fn returned(dispatch: Result<Dispatch<'_>, RuntimeError>) -> Result<Value, RuntimeError> {
        dispatch.map(|d| match d {
            Dispatch::Returned(v) => v,
            other => panic!("expected native result, got {:?}", other),
        })
    }

    #[test]
    fn test_double_format_six_places() {
        let class = double_class().unwrap();
        let ctx = ExtensionContext::new();
        let v = returned(class.invoke_instance(&Value::Double(1.5), "format", &[], &ctx)).unwrap();
        assert_eq!(v, Value::from("1.500000"));
    }

    #[test]
    fn test_value_of_parses() {
        let ctx = ExtensionContext::new();
        let d = returned(double_class().unwrap().invoke_static("valueOf", &[" 2.25".into()], &ctx)).unwrap();
        assert_eq!(d, Value::Double(2.25));

        let i = returned(integer_class().unwrap().invoke_static("valueOf", &["42".into()], &ctx)).unwrap();
        assert_eq!(i, Value::Integer(42));

        let err = returned(integer_class().unwrap().invoke_static("valueOf", &["4x".into()], &ctx)).unwrap_err();
        assert_eq!(err.code(), "E-NATIVE-001");
    }

    #[test]
    fn test_value_of_null_argument() {
        let ctx = ExtensionContext::new();
        let err = returned(integer_class().unwrap().invoke_static("valueOf", &[Value::Null], &ctx)).unwrap_err();
        assert!(err.to_string().contains("expected String"));
    }

    #[test]
    fn test_string_methods() {
        let class = string_class().unwrap();
        let ctx = ExtensionContext::new();
        let s = Value::from("Hoge");
        assert_eq!(
            returned(class.invoke_instance(&s, "length", &[], &ctx)).unwrap(),
            Value::Integer(4)
        );
        assert_eq!(
            returned(class.invoke_instance(&s, "toUpperCase", &[], &ctx)).unwrap(),
            Value::from("HOGE")
        );
        assert_eq!(
            returned(class.invoke_instance(&s, "toLowerCase", &[], &ctx)).unwrap(),
            Value::from("hoge")
        );
        assert_eq!(
            returned(class.invoke_static("valueOf", &[Value::Integer(7)], &ctx)).unwrap(),
            Value::from("7")
        );
    }
}
