use serde_derive::{Deserialize, Serialize};

use corvid_lang_miette_util::Span;

use crate::ids::{DeclId, ExprId, FileId, TypeId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    /// The type the front end computed for this expression.
    pub ty: TypeId,
    pub file: FileId,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExprKind {
    Number { value: f64 },
    String { value: String },
    Boolean { value: bool },
    Null,
    Undefined,
    /// `head${e1}lit1${e2}lit2`
    Template { head: String, spans: Vec<(ExprId, String)> },
    Ident { decl: DeclId },
    This,
    Super,
    /// `object.name`; `decl` is the resolved member, if any.
    Property { object: ExprId, name: String, decl: Option<DeclId> },
    Index { object: ExprId, index: ExprId },
    /// `callee<type_args>(args)`; `type_args` are the inferred arguments of the resolved signature.
    Call { callee: ExprId, args: Vec<ExprId>, type_args: Vec<TypeId> },
    /// `new C<..>(args)`; the class and its type arguments are given by `ty`.
    New { args: Vec<ExprId> },
    Binary { op: BinOp, left: ExprId, right: ExprId },
    /// `target = value` or `target op= value`.
    Assign { op: Option<BinOp>, target: ExprId, value: ExprId },
    Unary { op: UnaryOp, operand: ExprId },
    /// `x++` or `x--`.
    Postfix { op: UpdateOp, operand: ExprId },
    Conditional { cond: ExprId, then: ExprId, els: ExprId },
    Array { elems: Vec<ExprId> },
    Object { props: Vec<(String, ExprId)> },
    /// Function expression or arrow function.
    Function { decl: DeclId },
    As { expr: ExprId, target: TypeId },
    Paren { expr: ExprId },
    TypeOf { expr: ExprId },
    Delete { expr: ExprId },
    Void { expr: ExprId },
    Spread { expr: ExprId },
    TaggedTemplate { tag: ExprId },
    Class { decl: DeclId },
    Await { expr: ExprId },
    Yield { expr: Option<ExprId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    And,
    Or,
    Comma,
    In,
    InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    /// `++x`
    Incr,
    /// `--x`
    Decr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOp {
    Incr,
    Decr,
}

impl BinOp {
    pub fn token(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::UShr => ">>>",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::StrictEq => "===",
            BinOp::StrictNe => "!==",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Comma => ",",
            BinOp::In => "in",
            BinOp::InstanceOf => "instanceof",
        }
    }
}

impl ExprKind {
    /// Descriptive name of the syntax, used in diagnostics.
    pub fn syntax_name(&self) -> &'static str {
        match self {
            ExprKind::Number { .. } => "numeric literal",
            ExprKind::String { .. } => "string literal",
            ExprKind::Boolean { .. } => "boolean literal",
            ExprKind::Null => "null",
            ExprKind::Undefined => "undefined",
            ExprKind::Template { .. } => "template string",
            ExprKind::Ident { .. } => "identifier",
            ExprKind::This => "this",
            ExprKind::Super => "super",
            ExprKind::Property { .. } => "property access",
            ExprKind::Index { .. } => "element access",
            ExprKind::Call { .. } => "call",
            ExprKind::New { .. } => "new expression",
            ExprKind::Binary { .. } => "binary expression",
            ExprKind::Assign { .. } => "assignment",
            ExprKind::Unary { .. } => "prefix unary expression",
            ExprKind::Postfix { .. } => "postfix unary expression",
            ExprKind::Conditional { .. } => "conditional expression",
            ExprKind::Array { .. } => "array literal",
            ExprKind::Object { .. } => "object literal",
            ExprKind::Function { .. } => "function expression",
            ExprKind::As { .. } => "type assertion",
            ExprKind::Paren { .. } => "parenthesized expression",
            ExprKind::TypeOf { .. } => "typeof",
            ExprKind::Delete { .. } => "delete",
            ExprKind::Void { .. } => "void expression",
            ExprKind::Spread { .. } => "spread",
            ExprKind::TaggedTemplate { .. } => "tagged templates",
            ExprKind::Class { .. } => "class expressions",
            ExprKind::Await { .. } => "await",
            ExprKind::Yield { .. } => "yield",
        }
    }
}
