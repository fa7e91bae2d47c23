//! Class types and method tables
//!
//! A `ClassType` is built once, wrapped in an `Arc`, and never mutated
//! afterwards. Methods are grouped into overload sets by name; overload
//! resolution matches parameter type names exactly, except that a parameter
//! typed `Object` accepts any argument and a `Null` argument fits any
//! parameter.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ember_ast::{Block, ClassDeclaration, Declaration, MethodDeclaration, Modifier, Parameter, TypeRef};
use indexmap::IndexMap;

use crate::error::{CompileError, LookupError, RuntimeError};
use crate::value::Value;

/// Context key under which the host exposes the current page
pub const CURRENT_PAGE: &str = "current_page";

// ============================================================================
// Extension context
// ============================================================================

/// Ambient named values threaded through every native call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionContext {
    values: HashMap<String, Value>,
}

impl ExtensionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

// ============================================================================
// Methods
// ============================================================================

/// Host implementation of a method: `(receiver, arguments, context) -> Value`
pub type NativeFn =
    Arc<dyn Fn(Option<&Value>, &[Value], &ExtensionContext) -> Result<Value, RuntimeError> + Send + Sync>;

#[derive(Clone)]
pub enum MethodBody {
    Native(NativeFn),
    /// Body run by the evaluator
    Interpreted(Block),
}

impl fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodBody::Native(_) => f.write_str("Native"),
            MethodBody::Interpreted(block) => f.debug_tuple("Interpreted").field(block).finish(),
        }
    }
}

/// One overload of a method
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    /// Parameter type names, in order
    pub parameter_types: Vec<String>,
    pub parameter_names: Vec<String>,
    /// `None` for void
    pub return_type: Option<String>,
    pub modifiers: Vec<Modifier>,
    /// `None` for abstract methods
    pub body: Option<MethodBody>,
}

impl Method {
    /// Host-implemented method
    pub fn native<F>(name: &str, parameter_types: &[&str], return_type: Option<&str>, f: F) -> Self
    where
        F: Fn(Option<&Value>, &[Value], &ExtensionContext) -> Result<Value, RuntimeError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.to_string(),
            parameter_types: parameter_types.iter().map(|t| t.to_string()).collect(),
            parameter_names: (0..parameter_types.len()).map(|i| format!("arg{}", i)).collect(),
            return_type: return_type.map(str::to_string),
            modifiers: Vec::new(),
            body: Some(MethodBody::Native(Arc::new(f))),
        }
    }

    fn from_parameters(
        name: &str,
        parameters: &[Parameter],
        return_type: Option<&TypeRef>,
        modifiers: &[Modifier],
        body: Option<Block>,
    ) -> Self {
        Self {
            name: name.to_string(),
            parameter_types: parameters.iter().map(|p| p.type_ref.to_string()).collect(),
            parameter_names: parameters.iter().map(|p| p.name.clone()).collect(),
            return_type: return_type.map(|t| t.to_string()),
            modifiers: modifiers.to_vec(),
            body: body.map(MethodBody::Interpreted),
        }
    }

    pub fn from_declaration(decl: &MethodDeclaration) -> Self {
        Self::from_parameters(
            &decl.name,
            &decl.parameters,
            decl.return_type.as_ref(),
            &decl.modifiers,
            decl.body,
        )
    }

    pub fn is_native(&self) -> bool {
        matches!(self.body, Some(MethodBody::Native(_)))
    }

    pub fn has_modifier(&self, name: &str) -> bool {
        self.modifiers.iter().any(|m| m.is(name))
    }

    pub fn signature(&self) -> String {
        self.parameter_types.join(", ")
    }

    /// Whether this overload takes arguments of the given type names
    pub fn accepts(&self, argument_types: &[&str]) -> bool {
        self.parameter_types.len() == argument_types.len()
            && self
                .parameter_types
                .iter()
                .zip(argument_types)
                .all(|(param, arg)| {
                    param.eq_ignore_ascii_case(arg)
                        || param.eq_ignore_ascii_case("Object")
                        || *arg == "Null"
                })
    }
}

/// Overload sets keyed by method name
#[derive(Debug, Clone, Default)]
pub struct MethodMap {
    methods: IndexMap<String, Vec<Method>>,
}

impl MethodMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an overload; an identical parameter list under the same name is rejected
    pub fn add(&mut self, class: &str, method: Method) -> Result<(), CompileError> {
        let overloads = self.methods.entry(method.name.clone()).or_default();
        if overloads
            .iter()
            .any(|m| m.parameter_types == method.parameter_types)
        {
            return Err(CompileError::DuplicateMethod {
                class: class.to_string(),
                method: method.name.clone(),
                signature: method.signature(),
            });
        }
        overloads.push(method);
        Ok(())
    }

    /// Every overload declared under `name`
    pub fn get(&self, name: &str) -> &[Method] {
        self.methods.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First overload accepting the argument types
    pub fn resolve(&self, name: &str, argument_types: &[&str]) -> Option<&Method> {
        self.get(name).iter().find(|m| m.accepts(argument_types))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

// ============================================================================
// Field types
// ============================================================================

/// Declared kind of a field, used when converting store columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    String,
    Id,
    Integer,
    Double,
    Boolean,
    List,
    /// Relation to another class
    Reference(String),
}

impl FieldType {
    pub fn from_type_ref(type_ref: &TypeRef) -> Self {
        match type_ref.name.to_ascii_lowercase().as_str() {
            "string" => FieldType::String,
            "id" => FieldType::Id,
            "integer" | "long" => FieldType::Integer,
            "double" | "decimal" => FieldType::Double,
            "boolean" => FieldType::Boolean,
            "list" | "set" => FieldType::List,
            _ => FieldType::Reference(type_ref.name.clone()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FieldType::String => "String",
            FieldType::Id => "Id",
            FieldType::Integer => "Integer",
            FieldType::Double => "Double",
            FieldType::Boolean => "Boolean",
            FieldType::List => "List",
            FieldType::Reference(name) => name,
        }
    }
}

// ============================================================================
// Class type
// ============================================================================

/// Result of dispatching a call to a resolved overload
#[derive(Debug)]
pub enum Dispatch<'a> {
    /// Native overload ran and produced a value
    Returned(Value),
    /// Interpreted overload; the evaluator runs its body
    Interpreted(&'a Method),
}

#[derive(Debug, Clone)]
pub struct ClassType {
    name: String,
    modifiers: Vec<Modifier>,
    super_class: Option<String>,
    constructors: Vec<Method>,
    instance_methods: MethodMap,
    static_methods: MethodMap,
    fields: IndexMap<String, FieldType>,
}

impl ClassType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers: Vec::new(),
            super_class: None,
            constructors: Vec::new(),
            instance_methods: MethodMap::new(),
            static_methods: MethodMap::new(),
            fields: IndexMap::new(),
        }
    }

    /// Declare a field and its value kind
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    pub fn with_instance_method(mut self, method: Method) -> Result<Self, CompileError> {
        self.instance_methods.add(&self.name, method)?;
        Ok(self)
    }

    pub fn with_static_method(mut self, method: Method) -> Result<Self, CompileError> {
        self.static_methods.add(&self.name, method)?;
        Ok(self)
    }

    pub fn with_constructor(mut self, constructor: Method) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Build a user-defined class from its declaration. Nested class and
    /// interface declarations are registered separately by the registry.
    pub fn from_declaration(decl: &ClassDeclaration) -> Result<Self, CompileError> {
        let mut class = ClassType::new(decl.name.clone());
        class.modifiers = decl.modifiers.clone();
        class.super_class = decl.super_class.as_ref().map(|t| t.to_string());

        for member in &decl.body {
            match member {
                Declaration::Method(method) => {
                    let is_static = member.has_modifier("static");
                    let method = Method::from_declaration(method);
                    if is_static {
                        class.static_methods.add(&decl.name, method)?;
                    } else {
                        class.instance_methods.add(&decl.name, method)?;
                    }
                }
                Declaration::Constructor(ctor) => {
                    class.constructors.push(Method::from_parameters(
                        &ctor.name,
                        &ctor.parameters,
                        None,
                        &ctor.modifiers,
                        Some(ctor.body),
                    ));
                }
                Declaration::Field(field) => {
                    for name in &field.names {
                        class
                            .fields
                            .insert(name.clone(), FieldType::from_type_ref(&field.type_ref));
                    }
                }
                Declaration::Property(prop) => {
                    class
                        .fields
                        .insert(prop.name.clone(), FieldType::from_type_ref(&prop.type_ref));
                }
                Declaration::Class(_) | Declaration::Interface(_) => {}
            }
        }

        Ok(class)
    }

    pub(crate) fn renamed(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn super_class(&self) -> Option<&str> {
        self.super_class.as_deref()
    }

    pub fn constructors(&self) -> &[Method] {
        &self.constructors
    }

    pub fn instance_methods(&self) -> &MethodMap {
        &self.instance_methods
    }

    pub fn static_methods(&self) -> &MethodMap {
        &self.static_methods
    }

    /// Declared type of `field`, if the class declares it
    pub fn field_type(&self, field: &str) -> Option<&FieldType> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldType)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Call a static method with the given arguments
    pub fn invoke_static(
        &self,
        name: &str,
        arguments: &[Value],
        context: &ExtensionContext,
    ) -> Result<Dispatch<'_>, RuntimeError> {
        let method = self.resolve_in(&self.static_methods, name, arguments)?;
        dispatch(&self.name, method, None, arguments, context)
    }

    /// Call an instance method on `receiver`
    pub fn invoke_instance(
        &self,
        receiver: &Value,
        name: &str,
        arguments: &[Value],
        context: &ExtensionContext,
    ) -> Result<Dispatch<'_>, RuntimeError> {
        let method = self.resolve_in(&self.instance_methods, name, arguments)?;
        dispatch(&self.name, method, Some(receiver), arguments, context)
    }

    fn resolve_in<'a>(
        &self,
        methods: &'a MethodMap,
        name: &str,
        arguments: &[Value],
    ) -> Result<&'a Method, LookupError> {
        let types: Vec<&str> = arguments.iter().map(Value::type_name).collect();
        methods
            .resolve(name, &types)
            .ok_or_else(|| LookupError::NoSuchMethod {
                class: self.name.clone(),
                method: name.to_string(),
                signature: types.join(", "),
            })
    }
}

fn dispatch<'a>(
    class: &str,
    method: &'a Method,
    receiver: Option<&Value>,
    arguments: &[Value],
    context: &ExtensionContext,
) -> Result<Dispatch<'a>, RuntimeError> {
    match &method.body {
        Some(MethodBody::Native(f)) => f(receiver, arguments, context).map(Dispatch::Returned),
        Some(MethodBody::Interpreted(_)) => Ok(Dispatch::Interpreted(method)),
        None => Err(RuntimeError::native(class, &method.name, "abstract method has no body")),
    }
}
