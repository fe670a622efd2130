use serde_derive::{Deserialize, Serialize};

use corvid_lang_miette_util::Span;

use crate::ids::{DeclId, ExprId, FileId, StmtId, TypeId};
use crate::types::BitSize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decl {
    pub name: String,
    pub kind: DeclKind,
    /// The syntactically enclosing declaration, `None` for top-level declarations.
    #[serde(default)]
    pub parent: Option<DeclId>,
    pub file: FileId,
    #[serde(default)]
    pub span: Span,
    /// Raw `//%` annotation comments attached to the declaration.
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclKind {
    Function(FunctionDecl),
    Variable(VariableDecl),
    Parameter(ParameterDecl),
    Class(ClassDecl),
    Field(FieldDecl),
    Interface(InterfaceDecl),
    /// A member of an interface.
    Signature(SignatureDecl),
    TypeParam,
    Enum(EnumDecl),
    EnumMember(EnumMemberDecl),
    Namespace(NamespaceDecl),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    /// A top-level or nested `function` declaration.
    Free,
    Method,
    Constructor,
    Getter,
    Setter,
    /// A `function` expression or an arrow function.
    Expression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionBody {
    Block(StmtId),
    /// Expression body of an arrow function.
    Expr(ExprId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub fun_kind: FunctionKind,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub type_params: Vec<DeclId>,
    #[serde(default)]
    pub params: Vec<DeclId>,
    pub ret: TypeId,
    /// `None` for ambient declarations, which must be shims.
    #[serde(default)]
    pub body: Option<FunctionBody>,
    /// The function type of the declaration (without `this`).
    pub ty: TypeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDecl {
    pub ty: TypeId,
    #[serde(default)]
    pub init: Option<ExprId>,
    #[serde(default)]
    pub bit_size: BitSize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDecl {
    pub ty: TypeId,
    #[serde(default)]
    pub default: Option<ExprId>,
    #[serde(default)]
    pub bit_size: BitSize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDecl {
    #[serde(default)]
    pub type_params: Vec<DeclId>,
    /// Types of the `extends` clause. At most one is supported.
    #[serde(default)]
    pub extends: Vec<TypeId>,
    #[serde(default)]
    pub implements: Vec<TypeId>,
    /// Fields, methods, accessors and the constructor in declaration order.
    #[serde(default)]
    pub members: Vec<DeclId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub ty: TypeId,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub init: Option<ExprId>,
    #[serde(default)]
    pub bit_size: BitSize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDecl {
    #[serde(default)]
    pub type_params: Vec<DeclId>,
    #[serde(default)]
    pub members: Vec<DeclId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureDecl {
    pub ty: TypeId,
    #[serde(default)]
    pub optional: bool,
    /// Method signatures are called, property signatures are read and written.
    #[serde(default)]
    pub is_method: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDecl {
    #[serde(default)]
    pub members: Vec<DeclId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumMemberDecl {
    /// Constant value computed by the front end.
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub init: Option<ExprId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceDecl {
    #[serde(default)]
    pub body: Vec<StmtId>,
}

impl Decl {
    pub fn as_function(&self) -> Option<&FunctionDecl> {
        match &self.kind {
            DeclKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassDecl> {
        match &self.kind {
            DeclKind::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldDecl> {
        match &self.kind {
            DeclKind::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, DeclKind::Function(_))
    }

    /// Human readable kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            DeclKind::Function(f) => match f.fun_kind {
                FunctionKind::Free => "function",
                FunctionKind::Method => "method",
                FunctionKind::Constructor => "constructor",
                FunctionKind::Getter => "get accessor",
                FunctionKind::Setter => "set accessor",
                FunctionKind::Expression => "function expression",
            },
            DeclKind::Variable(_) => "variable",
            DeclKind::Parameter(_) => "parameter",
            DeclKind::Class(_) => "class",
            DeclKind::Field(_) => "field",
            DeclKind::Interface(_) => "interface",
            DeclKind::Signature(_) => "interface member",
            DeclKind::TypeParam => "type parameter",
            DeclKind::Enum(_) => "enum",
            DeclKind::EnumMember(_) => "enum member",
            DeclKind::Namespace(_) => "namespace",
        }
    }
}
