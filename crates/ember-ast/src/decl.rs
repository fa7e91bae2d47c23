//! Declaration nodes
//!
//! Class bodies are a closed set of member kinds. Modifiers are parsed
//! separately from the member they precede and attached afterwards with
//! [`Declaration::with_modifiers`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// `public`, `static`, `with sharing`, ...
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    pub name: String,
    #[serde(default)]
    pub span: Span,
}

impl Modifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            span: Span::default(),
        }
    }

    /// Modifier names compare case-insensitively
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Type reference as written: `Integer`, `List<Account>`, `Map<Id, Contact>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<TypeRef>,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.arguments.is_empty() {
            let args: Vec<String> = self.arguments.iter().map(|a| a.to_string()).collect();
            write!(f, "<{}>", args.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub type_ref: TypeRef,
    pub name: String,
}

/// Method or constructor body. Statements stay in the evaluator's tree;
/// the runtime core only carries where the body was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDeclaration {
    pub name: String,
    pub modifiers: Vec<Modifier>,
    /// `None` for `void`
    pub return_type: Option<TypeRef>,
    pub parameters: Vec<Parameter>,
    /// `None` for abstract and interface methods
    pub body: Option<Block>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorDeclaration {
    pub name: String,
    pub modifiers: Vec<Modifier>,
    pub parameters: Vec<Parameter>,
    pub body: Block,
    #[serde(default)]
    pub span: Span,
}

/// `Integer a, b;` declares two fields sharing one type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    pub modifiers: Vec<Modifier>,
    pub type_ref: TypeRef,
    pub names: Vec<String>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDeclaration {
    pub modifiers: Vec<Modifier>,
    pub type_ref: TypeRef,
    pub name: String,
    pub getter: Option<Block>,
    pub setter: Option<Block>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDeclaration {
    pub name: String,
    pub modifiers: Vec<Modifier>,
    pub super_class: Option<TypeRef>,
    pub implements: Vec<TypeRef>,
    pub body: Vec<Declaration>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDeclaration {
    pub name: String,
    pub modifiers: Vec<Modifier>,
    pub extends: Vec<TypeRef>,
    pub methods: Vec<MethodDeclaration>,
    #[serde(default)]
    pub span: Span,
}

impl InterfaceDeclaration {
    /// Add an interface member. Interface methods are implicitly abstract.
    pub fn push_method(&mut self, mut method: MethodDeclaration) {
        if !method.modifiers.iter().any(|m| m.is("abstract")) {
            method.modifiers.push(Modifier::new("abstract"));
        }
        self.methods.push(method);
    }
}

/// Member of a class body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Declaration {
    Method(MethodDeclaration),
    Field(FieldDeclaration),
    Constructor(ConstructorDeclaration),
    Property(PropertyDeclaration),
    Class(ClassDeclaration),
    Interface(InterfaceDeclaration),
}

impl Declaration {
    /// Replace this declaration's modifiers
    pub fn with_modifiers(mut self, modifiers: Vec<Modifier>) -> Self {
        match &mut self {
            Declaration::Method(d) => d.modifiers = modifiers,
            Declaration::Field(d) => d.modifiers = modifiers,
            Declaration::Constructor(d) => d.modifiers = modifiers,
            Declaration::Property(d) => d.modifiers = modifiers,
            Declaration::Class(d) => d.modifiers = modifiers,
            Declaration::Interface(d) => d.modifiers = modifiers,
        }
        self
    }

    pub fn modifiers(&self) -> &[Modifier] {
        match self {
            Declaration::Method(d) => &d.modifiers,
            Declaration::Field(d) => &d.modifiers,
            Declaration::Constructor(d) => &d.modifiers,
            Declaration::Property(d) => &d.modifiers,
            Declaration::Class(d) => &d.modifiers,
            Declaration::Interface(d) => &d.modifiers,
        }
    }

    pub fn has_modifier(&self, name: &str) -> bool {
        self.modifiers().iter().any(|m| m.is(name))
    }

    pub fn span(&self) -> Span {
        match self {
            Declaration::Method(d) => d.span,
            Declaration::Field(d) => d.span,
            Declaration::Constructor(d) => d.span,
            Declaration::Property(d) => d.span,
            Declaration::Class(d) => d.span,
            Declaration::Interface(d) => d.span,
        }
    }
}
