use crate::exprs::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JmpMode {
    Always,
    IfZero,
    IfNotZero,
    /// Jump when the operand equals the current jump value.
    IfJmpValEq,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// Evaluate and discard.
    Expr(Expr),
    Label(String),
    /// For `Always` the operand is the value passed to the target. For the
    /// conditional modes it is the tested value, passed on when the jump is taken.
    Jmp { mode: JmpMode, target: String, expr: Option<Expr> },
    /// Asserts that the evaluation stack is empty between statements.
    StackEmpty,
    /// Index into the binary's breakpoint records.
    Breakpoint(usize),
}

impl Stmt {
    pub fn jmp(target: &str) -> Stmt {
        Stmt::Jmp { mode: JmpMode::Always, target: target.to_owned(), expr: None }
    }

    pub fn jmp_value(target: &str, value: Expr) -> Stmt {
        Stmt::Jmp { mode: JmpMode::Always, target: target.to_owned(), expr: Some(value) }
    }

    pub fn jmp_if(mode: JmpMode, target: &str, cond: Expr) -> Stmt {
        Stmt::Jmp { mode, target: target.to_owned(), expr: Some(cond) }
    }

    pub fn is_label(&self, name: &str) -> bool {
        matches!(self, Stmt::Label(l) if l == name)
    }
}
