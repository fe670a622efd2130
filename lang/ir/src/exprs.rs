use std::rc::Rc;

use crate::cell::{Cell, FieldRef};
use crate::procedure::ProcId;

/// Runtime entry points used by the IR helpers.
pub mod rt {
    pub const LDLOC: &str = "pxtrt::ldloc";
    pub const LDLOC_REF: &str = "pxtrt::ldlocRef";
    pub const STLOC: &str = "pxtrt::stloc";
    pub const STLOC_REF: &str = "pxtrt::stlocRef";
    pub const MKLOC: &str = "pxtrt::mkloc";
    pub const MKLOC_REF: &str = "pxtrt::mklocRef";
}

#[derive(Debug, Clone)]
pub enum Expr {
    /// A raw machine word.
    Number(i64),
    /// The address of a labelled literal, vtable or procedure.
    Pointer(String),
    /// A call into the runtime. Bit `i` of `mask` tells the runtime to release
    /// argument `i` after the call.
    RuntimeCall { name: String, args: Vec<Expr>, mask: u32 },
    ProcCall { target: CallTarget, args: Vec<Expr> },
    /// An expression evaluated once and referenced several times.
    Shared(Rc<SharedDef>),
    /// Reads a field. The object reference is released after the read and a
    /// reference-counted field value is returned as a new reference.
    FieldAccess { object: Box<Expr>, field: FieldRef },
    /// Stores into a cell or a field. Storing into a field releases the previous
    /// value, storing into a cell does not.
    Store { target: Box<Expr>, value: Box<Expr> },
    CellRef(Cell),
    Incr(Box<Expr>),
    Decr(Box<Expr>),
    /// Evaluates all expressions, the value is the value of the last one.
    Sequence(Vec<Expr>),
    /// The value carried by the jump that reached the current label.
    JmpValue,
    Nop,
}

#[derive(Debug)]
pub struct SharedDef {
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// A statically known procedure. `proc` is unset while the callee is not lowered yet.
    Direct { label: String, proc: Option<ProcId> },
    /// Dispatch through the receiver's vtable slot.
    Virtual { index: usize },
    /// Dispatch through the receiver's interface table. `map_method` is the runtime
    /// fallback for receivers without a vtable, it is passed the key `map_key`.
    Iface { member: usize, map_method: Option<String>, map_key: usize },
}

impl Expr {
    pub fn rt_call(name: &str, args: Vec<Expr>) -> Expr {
        Expr::RuntimeCall { name: name.to_owned(), args, mask: 0 }
    }

    pub fn rt_call_mask(name: &str, args: Vec<Expr>, mask: u32) -> Expr {
        Expr::RuntimeCall { name: name.to_owned(), args, mask }
    }

    pub fn shared(expr: Expr) -> Expr {
        match expr {
            // sharing these is pointless
            e @ (Expr::Shared(_) | Expr::Number(_) | Expr::Pointer(_) | Expr::Nop) => e,
            e => Expr::Shared(Rc::new(SharedDef { expr: e })),
        }
    }

    pub fn incr(expr: Expr) -> Expr {
        Expr::Incr(Box::new(expr))
    }

    pub fn decr(expr: Expr) -> Expr {
        Expr::Decr(Box::new(expr))
    }

    pub fn store(target: Expr, value: Expr) -> Expr {
        Expr::Store { target: Box::new(target), value: Box::new(value) }
    }

    pub fn field(object: Expr, field: FieldRef) -> Expr {
        Expr::FieldAccess { object: Box::new(object), field }
    }

    /// Whether the expression can be dropped when its value is unused. Shared values
    /// are never pure, their first occurrence fixes the evaluation order.
    pub fn is_pure(&self) -> bool {
        match self {
            Expr::Number(_) | Expr::Pointer(_) | Expr::CellRef(_) | Expr::JmpValue | Expr::Nop => {
                true
            }
            Expr::FieldAccess { object, .. } => object.is_pure(),
            _ => false,
        }
    }

    /// The numeric value of a raw word literal.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Expr::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Counts `Incr` and `Decr` nodes, not descending into shared definitions twice.
    pub fn count_refops(&self) -> (usize, usize) {
        let mut seen = Vec::new();
        let mut counts = (0, 0);
        self.count_refops_into(&mut seen, &mut counts);
        counts
    }

    fn count_refops_into(&self, seen: &mut Vec<*const SharedDef>, counts: &mut (usize, usize)) {
        match self {
            Expr::Incr(e) => {
                counts.0 += 1;
                e.count_refops_into(seen, counts)
            }
            Expr::Decr(e) => {
                counts.1 += 1;
                e.count_refops_into(seen, counts)
            }
            Expr::Shared(def) => {
                let ptr = Rc::as_ptr(def);
                if !seen.contains(&ptr) {
                    seen.push(ptr);
                    def.expr.count_refops_into(seen, counts)
                }
            }
            Expr::RuntimeCall { args, .. } | Expr::ProcCall { args, .. } | Expr::Sequence(args) => {
                args.iter().for_each(|a| a.count_refops_into(seen, counts))
            }
            Expr::FieldAccess { object, .. } => object.count_refops_into(seen, counts),
            Expr::Store { target, value } => {
                target.count_refops_into(seen, counts);
                value.count_refops_into(seen, counts)
            }
            Expr::Number(_)
            | Expr::Pointer(_)
            | Expr::CellRef(_)
            | Expr::JmpValue
            | Expr::Nop => {}
        }
    }
}
