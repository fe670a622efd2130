use std::fmt;

use derivative::Derivative;

use corvid_lang_ast::{BitSize, DeclId};

use crate::exprs::{Expr, rt};

/// What a storage cell holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VarKey {
    /// A variable, parameter or static field.
    Decl(DeclId),
    /// The `this` parameter of the given class function.
    This(DeclId),
    /// A compiler-introduced temporary.
    Temp(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Global,
    Local,
    Arg,
    /// A slot of the closure record of the current procedure.
    Captured,
}

/// A storage location.
#[derive(Derivative, Clone)]
#[derivative(Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    pub key: VarKey,
    pub kind: CellKind,
    /// Position among the cells of the same kind.
    pub index: usize,
    /// Whether the stored value is reference-counted.
    pub is_ref: bool,
    /// Locals captured by a closure and written after capture live in a runtime box
    /// shared by the procedure and all closures.
    pub by_ref_local: bool,
    pub bit_size: BitSize,
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    pub name: String,
}

/// A field of a class instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub index: usize,
    pub name: String,
    pub is_ref: bool,
    pub bit_size: BitSize,
}

impl Cell {
    pub fn is_global(&self) -> bool {
        self.kind == CellKind::Global
    }

    pub fn is_local(&self) -> bool {
        self.kind == CellKind::Local
    }

    /// The cell itself, without any reference count adjustment.
    pub fn load_core(&self) -> Expr {
        Expr::CellRef(self.clone())
    }

    /// Reads the cell, producing an owned value.
    pub fn load(&self) -> Expr {
        if self.by_ref_local {
            let name = if self.is_ref { rt::LDLOC_REF } else { rt::LDLOC };
            Expr::rt_call(name, vec![self.load_core()])
        } else if self.is_ref {
            Expr::incr(self.load_core())
        } else {
            self.load_core()
        }
    }

    /// Writes without releasing the previous value and without looking through a box.
    pub fn store_direct(&self, src: Expr) -> Expr {
        Expr::store(self.load_core(), src)
    }

    /// Writes an owned value, releasing the previous one.
    pub fn store_by_ref(&self, src: Expr) -> Expr {
        if self.by_ref_local {
            let name = if self.is_ref { rt::STLOC_REF } else { rt::STLOC };
            Expr::rt_call(name, vec![self.load_core(), src])
        } else if self.is_ref {
            let tmp = Expr::shared(src);
            Expr::Sequence(vec![tmp.clone(), Expr::decr(self.load_core()), self.store_direct(tmp)])
        } else {
            self.store_direct(src)
        }
    }

    /// Allocates the runtime box of a by-ref local, holding `init`.
    pub fn box_init(&self, init: Expr) -> Expr {
        let name = if self.is_ref { rt::MKLOC_REF } else { rt::MKLOC };
        self.store_direct(Expr::rt_call(name, vec![init]))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            CellKind::Global => "@",
            CellKind::Local => "$",
            CellKind::Arg => "$arg",
            CellKind::Captured => "$cap",
        };
        write!(f, "{prefix}{}_{}", self.index, self.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cell(is_ref: bool, by_ref_local: bool) -> Cell {
        Cell {
            key: VarKey::Temp(0),
            kind: CellKind::Local,
            index: 0,
            is_ref,
            by_ref_local,
            bit_size: BitSize::None,
            name: "x".to_owned(),
        }
    }

    /// Reading a reference cell takes a new reference.
    #[test]
    fn load_increments_refs() {
        assert!(matches!(cell(true, false).load(), Expr::Incr(_)));
        assert!(matches!(cell(false, false).load(), Expr::CellRef(_)));
        assert!(matches!(
            cell(true, true).load(),
            Expr::RuntimeCall { ref name, .. } if name == rt::LDLOC_REF
        ));
    }

    /// Overwriting a reference cell releases the old value exactly once.
    #[test]
    fn store_releases_old_value() {
        let store = cell(true, false).store_by_ref(Expr::Pointer("_str0".to_owned()));
        assert_eq!(store.count_refops(), (0, 1));
        let store = cell(true, false).store_by_ref(Expr::rt_call("mk", vec![]));
        let Expr::Sequence(parts) = store else { panic!("expected sequence") };
        assert_eq!(parts.len(), 3);
        assert!(matches!(parts[0], Expr::Shared(_)));
        assert!(matches!(parts[1], Expr::Decr(_)));
    }

    #[test]
    fn equality_ignores_names() {
        let mut other = cell(true, false);
        other.name = "y".to_owned();
        assert_eq!(cell(true, false), other);
    }
}
