use serde_derive::{Deserialize, Serialize};

use corvid_lang_miette_util::Span;

use crate::ids::{DeclId, ExprId, FileId, StmtId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub file: FileId,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StmtKind {
    Block { stmts: Vec<StmtId> },
    Expr { expr: ExprId },
    /// `let`/`const`/`var`; initializers live on the variable declarations.
    Var { bindings: Vec<VarBinding> },
    If { cond: ExprId, then: StmtId, els: Option<StmtId> },
    While { cond: ExprId, body: StmtId },
    DoWhile { body: StmtId, cond: ExprId },
    For { init: Option<StmtId>, cond: Option<ExprId>, update: Option<ExprId>, body: StmtId },
    ForOf { var: DeclId, iterable: ExprId, body: StmtId },
    ForIn { var: DeclId, object: ExprId, body: StmtId },
    Break { label: Option<String> },
    Continue { label: Option<String> },
    Return { value: Option<ExprId> },
    Switch { discriminant: ExprId, cases: Vec<SwitchCase> },
    Labeled { label: String, body: StmtId },
    Function { decl: DeclId },
    Class { decl: DeclId },
    Interface { decl: DeclId },
    Enum { decl: DeclId },
    TypeAlias { name: String },
    Namespace { decl: DeclId },
    Debugger,
    Empty,
    Throw { value: ExprId },
    Try { block: StmtId, handler: Option<StmtId>, finalizer: Option<StmtId> },
    With { object: ExprId, body: StmtId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    /// `None` for the `default` clause.
    pub test: Option<ExprId>,
    pub body: Vec<StmtId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarBinding {
    Single(DeclId),
    /// A destructuring binding; the declared variables carry no initializer.
    Pattern { pattern: Pattern, init: ExprId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// `{ a, b: c }` binds property `a` to `a` and `b` to `c`.
    Object(Vec<(String, DeclId)>),
    /// `[x, , y]`; holes are `None`.
    Array(Vec<Option<DeclId>>),
}

impl StmtKind {
    /// Statements that `break` without a label may target.
    pub fn is_breakable(&self) -> bool {
        self.is_loop() || matches!(self, StmtKind::Switch { .. })
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            StmtKind::While { .. }
                | StmtKind::DoWhile { .. }
                | StmtKind::For { .. }
                | StmtKind::ForOf { .. }
                | StmtKind::ForIn { .. }
        )
    }
}
