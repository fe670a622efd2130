use std::fmt;
use std::rc::Rc;

use corvid_lang_ast::{BitSize, DeclId};

use crate::cell::{Cell, CellKind, VarKey};
use crate::exprs::Expr;
use crate::stmts::{JmpMode, Stmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcId(pub u32);

impl ProcId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ProcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proc{}", self.0)
    }
}

/// The source construct a procedure is compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// The top-level statements of all files.
    Root,
    Decl(DeclId),
    /// Synthesized accessors of a field, used for interface dispatch.
    FieldGetter(DeclId),
    FieldSetter(DeclId),
}

#[derive(Debug, Clone)]
pub struct Procedure {
    pub id: ProcId,
    pub action: Action,
    pub label: String,
    /// The ref-mask of the binding set this instance is specialized for.
    pub ref_mask: String,
    /// The class info of methods, accessors and constructors.
    pub class_id: Option<String>,
    pub args: Vec<Cell>,
    pub locals: Vec<Cell>,
    pub captured: Vec<Cell>,
    pub body: Vec<Stmt>,
    lbl_no: u32,
}

impl Procedure {
    pub fn new(id: ProcId, action: Action, label: String, ref_mask: String) -> Self {
        Procedure {
            id,
            action,
            label,
            ref_mask,
            class_id: None,
            args: Vec::new(),
            locals: Vec::new(),
            captured: Vec::new(),
            body: Vec::new(),
            lbl_no: 0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.action == Action::Root
    }

    /// Forgets the result of a previous lowering of this procedure.
    pub fn reset(&mut self) {
        self.args.clear();
        self.locals.clear();
        self.captured.clear();
        self.body.clear();
        self.lbl_no = 0;
    }

    pub fn emit(&mut self, stmt: Stmt) {
        self.body.push(stmt)
    }

    pub fn emit_expr(&mut self, expr: Expr) {
        self.emit(Stmt::Expr(expr))
    }

    pub fn emit_label(&mut self, label: &str) {
        self.emit(Stmt::Label(label.to_owned()))
    }

    pub fn emit_jmp(&mut self, target: &str) {
        self.emit(Stmt::jmp(target))
    }

    pub fn emit_jmp_value(&mut self, target: &str, value: Expr) {
        self.emit(Stmt::jmp_value(target, value))
    }

    pub fn emit_jmp_if(&mut self, mode: JmpMode, target: &str, cond: Expr) {
        self.emit(Stmt::jmp_if(mode, target, cond))
    }

    /// Emits a jump to `target` when `cond` is zero.
    pub fn emit_jmp_z(&mut self, target: &str, cond: Expr) {
        self.emit_jmp_if(JmpMode::IfZero, target, cond)
    }

    pub fn stack_empty(&mut self) {
        self.emit(Stmt::StackEmpty)
    }

    /// A fresh label, unique within this procedure.
    pub fn mk_label(&mut self, name: &str) -> String {
        let lbl = format!(".{name}_{}", self.lbl_no);
        self.lbl_no += 1;
        lbl
    }

    pub fn mk_local(&mut self, key: VarKey, name: &str, is_ref: bool, by_ref_local: bool) -> Cell {
        push_cell(&mut self.locals, CellKind::Local, key, name, is_ref, by_ref_local)
    }

    pub fn mk_arg(&mut self, key: VarKey, name: &str, is_ref: bool, by_ref_local: bool) -> Cell {
        push_cell(&mut self.args, CellKind::Arg, key, name, is_ref, by_ref_local)
    }

    pub fn mk_captured(&mut self, key: VarKey, name: &str, is_ref: bool, by_ref_local: bool) -> Cell {
        push_cell(&mut self.captured, CellKind::Captured, key, name, is_ref, by_ref_local)
    }

    /// Finds the cell of a variable: closure slots first, then locals, then arguments.
    pub fn local_index(&self, key: VarKey) -> Option<&Cell> {
        self.captured
            .iter()
            .chain(self.locals.iter())
            .chain(self.args.iter())
            .find(|c| c.key == key)
    }

    /// Releases a local or argument if it holds a reference.
    pub fn emit_clr_if_ref(&mut self, cell: &Cell) {
        if cell.is_ref || cell.by_ref_local {
            self.emit_expr(Expr::decr(cell.load_core()))
        }
    }

    /// Releases all locals and arguments at procedure exit.
    pub fn emit_clrs(&mut self) {
        if self.is_root() {
            return;
        }
        let cells: Vec<Cell> = self.locals.iter().chain(self.args.iter()).cloned().collect();
        for cell in &cells {
            self.emit_clr_if_ref(cell)
        }
    }

    /// Peephole clean-up run once lowering is complete: cancels `Decr(Incr(e))`,
    /// drops pure non-final sequence elements and inlines single-use shared values.
    pub fn resolve(&mut self) {
        let body = std::mem::take(&mut self.body);
        self.body = body
            .into_iter()
            .map(|stmt| match stmt {
                Stmt::Expr(e) => Stmt::Expr(optimize(e)),
                Stmt::Jmp { mode, target, expr } => Stmt::Jmp { mode, target, expr: expr.map(optimize) },
                other => other,
            })
            .collect();
    }
}

fn push_cell(
    list: &mut Vec<Cell>,
    kind: CellKind,
    key: VarKey,
    name: &str,
    is_ref: bool,
    by_ref_local: bool,
) -> Cell {
    let cell = Cell {
        key,
        kind,
        index: list.len(),
        is_ref,
        by_ref_local,
        bit_size: BitSize::None,
        name: name.to_owned(),
    };
    list.push(cell.clone());
    cell
}

fn optimize(expr: Expr) -> Expr {
    match expr {
        Expr::Decr(inner) => match optimize(*inner) {
            Expr::Incr(e) => *e,
            e => Expr::decr(e),
        },
        Expr::Incr(inner) => Expr::incr(optimize(*inner)),
        Expr::Sequence(args) => {
            let n = args.len();
            let args: Vec<Expr> = args
                .into_iter()
                .enumerate()
                .filter(|(i, a)| *i + 1 == n || !a.is_pure())
                .map(|(_, a)| optimize(a))
                .collect();
            Expr::Sequence(args)
        }
        Expr::Shared(def) => match Rc::try_unwrap(def) {
            Ok(def) => optimize(def.expr),
            Err(def) => Expr::Shared(def),
        },
        Expr::RuntimeCall { name, args, mask } => {
            Expr::RuntimeCall { name, args: args.into_iter().map(optimize).collect(), mask }
        }
        Expr::ProcCall { target, args } => {
            Expr::ProcCall { target, args: args.into_iter().map(optimize).collect() }
        }
        Expr::FieldAccess { object, field } => Expr::field(optimize(*object), field),
        Expr::Store { target, value } => Expr::store(optimize(*target), optimize(*value)),
        e @ (Expr::Number(_)
        | Expr::Pointer(_)
        | Expr::CellRef(_)
        | Expr::JmpValue
        | Expr::Nop) => e,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn proc() -> Procedure {
        Procedure::new(ProcId(0), Action::Decl(DeclId(1)), "_f__P1".to_owned(), String::new())
    }

    #[test]
    fn local_index_prefers_captured() {
        let mut p = proc();
        let key = VarKey::Decl(DeclId(7));
        p.mk_arg(key, "x", false, false);
        let cap = p.mk_captured(key, "x", false, false);
        assert_eq!(p.local_index(key), Some(&cap));
        assert_eq!(p.local_index(VarKey::Temp(3)), None);
    }

    /// Only reference-counted locals and arguments are released at exit.
    #[test]
    fn emit_clrs_releases_refs() {
        let mut p = proc();
        p.mk_local(VarKey::Temp(0), "a", true, false);
        p.mk_local(VarKey::Temp(1), "b", false, false);
        p.mk_arg(VarKey::Temp(2), "c", false, true);
        p.emit_clrs();
        assert_eq!(p.body.len(), 2);
    }

    #[test]
    fn root_does_not_release() {
        let mut p = Procedure::new(ProcId(0), Action::Root, "_main".to_owned(), String::new());
        p.mk_local(VarKey::Temp(0), "a", true, false);
        p.emit_clrs();
        assert!(p.body.is_empty());
    }

    #[test]
    fn labels_are_unique() {
        let mut p = proc();
        assert_eq!(p.mk_label("lazy"), ".lazy_0");
        assert_eq!(p.mk_label("lazy"), ".lazy_1");
    }

    #[test]
    fn resolve_cancels_incr_decr() {
        let mut p = proc();
        let cell = p.mk_local(VarKey::Temp(0), "a", true, false);
        p.emit_expr(Expr::decr(cell.load()));
        p.emit_expr(Expr::Sequence(vec![Expr::Number(1), Expr::rt_call("f", vec![])]));
        p.resolve();
        assert!(matches!(p.body[0], Stmt::Expr(Expr::CellRef(_))));
        assert!(matches!(&p.body[1], Stmt::Expr(Expr::Sequence(a)) if a.len() == 1));
    }
}
