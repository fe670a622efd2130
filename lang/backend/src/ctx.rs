use std::collections::VecDeque;
use std::mem;

use fxhash::{FxHashMap, FxHashSet};
use indexmap::{IndexMap, IndexSet};

use corvid_lang_ast::{Attrs, DeclId, ExprId, FileId, Program, StmtId};
use corvid_lang_ir::{Action, Binary, Cell, Expr, ProcId, Procedure, VarKey};
use corvid_lang_miette_util::Span;

use crate::classes::ClassInfo;
use crate::generics::TypeBinding;
use crate::options::CompileOptions;
use crate::result::{BackendError, BackendResult, Diagnostic};
use crate::subtype::SubtypeChecker;

/// Per-declaration state of functions and methods.
#[derive(Debug, Clone, Default)]
pub struct FunctionInfo {
    /// Variables of enclosing functions referenced by this function.
    pub captured_vars: Vec<VarKey>,
    /// Binding sets a generic function is instantiated with, in discovery order.
    pub usages: Option<Vec<Vec<TypeBinding>>>,
    /// How many of `usages` were lowered in the current pass.
    pub lowered_usages: usize,
    /// The top-most method this method overrides.
    pub virtual_root: Option<DeclId>,
    /// Overrides of a virtual root.
    pub virtual_instances: Vec<DeclId>,
    pub virtual_index: Option<usize>,
    /// Set on a virtual root once it is called through a vtable.
    pub is_dispatched: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VarInfo {
    pub captured: bool,
    pub written: bool,
}

/// A statement `break` and `continue` may refer to.
#[derive(Debug, Clone)]
pub struct JumpTarget {
    pub stmt: StmtId,
    pub labels: Vec<String>,
    pub is_loop: bool,
    pub is_switch: bool,
}

/// The state of one compilation.
pub struct Ctx<'p> {
    pub(crate) prg: &'p Program,
    pub(crate) opts: &'p CompileOptions,
    pub(crate) bin: Binary,
    attrs: Vec<Attrs>,
    pub(crate) function_infos: FxHashMap<DeclId, FunctionInfo>,
    pub(crate) var_infos: FxHashMap<VarKey, VarInfo>,
    pub(crate) class_infos: IndexMap<String, ClassInfo>,
    /// Ids of class infos that are instantiated, bases before derived classes.
    pub(crate) used_classes: Vec<String>,
    /// Class infos whose base class is being resolved.
    pub(crate) class_stack: Vec<String>,
    pub(crate) used_decls: FxHashSet<DeclId>,
    pub(crate) worklist: VecDeque<DeclId>,
    /// Interface member names by member id.
    pub(crate) iface_members: IndexMap<String, usize>,
    pub(crate) subtypes: SubtypeChecker<'p>,
    /// IR of expressions that are evaluated once but referenced twice.
    pub(crate) ir_cache: FxHashMap<ExprId, Expr>,
    pub(crate) needs_cache: FxHashSet<ExprId>,
    /// Active binding sets, innermost last.
    pub(crate) bindings: Vec<TypeBinding>,
    pub(crate) root: ProcId,
    pub(crate) cur: ProcId,
    pub(crate) targets: Vec<JumpTarget>,
    pub(crate) pending_labels: Vec<String>,
    secondary: Vec<Option<Box<BackendError>>>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) used_symbols: IndexSet<String>,
    next_temp: u32,
}

impl<'p> Ctx<'p> {
    pub fn new(prg: &'p Program, opts: &'p CompileOptions) -> Self {
        let mut diagnostics = Vec::new();
        let attrs = prg
            .decls
            .iter()
            .map(|decl| {
                let (attrs, warnings) = Attrs::parse(&decl.comment);
                for warning in warnings {
                    let err = BackendError::Annotation { message: warning.to_string() };
                    diagnostics.push(Diagnostic::from_error(&err, Some(decl.file), Some(decl.span)));
                }
                attrs
            })
            .collect();
        let mut bin = Binary::new();
        let root = bin.add_proc(Action::Root, "_main".to_owned(), "");
        Ctx {
            prg,
            opts,
            bin,
            attrs,
            function_infos: FxHashMap::default(),
            var_infos: FxHashMap::default(),
            class_infos: IndexMap::new(),
            used_classes: Vec::new(),
            class_stack: Vec::new(),
            used_decls: FxHashSet::default(),
            worklist: VecDeque::new(),
            iface_members: IndexMap::new(),
            subtypes: SubtypeChecker::new(prg),
            ir_cache: FxHashMap::default(),
            needs_cache: FxHashSet::default(),
            bindings: Vec::new(),
            root,
            cur: root,
            targets: Vec::new(),
            pending_labels: Vec::new(),
            secondary: Vec::new(),
            diagnostics,
            used_symbols: IndexSet::new(),
            next_temp: 0,
        }
    }

    pub(crate) fn attrs(&self, decl: DeclId) -> &Attrs {
        &self.attrs[decl.index()]
    }

    pub(crate) fn fn_info(&mut self, decl: DeclId) -> &mut FunctionInfo {
        self.function_infos.entry(decl).or_default()
    }

    pub(crate) fn proc(&mut self) -> &mut Procedure {
        self.bin.proc_mut(self.cur)
    }

    pub(crate) fn proc_ref(&self) -> &Procedure {
        self.bin.proc(self.cur)
    }

    pub(crate) fn emit_expr_stmt(&mut self, expr: Expr) {
        self.proc().emit_expr(expr)
    }

    /// A fresh local of the current procedure.
    pub(crate) fn mk_temp(&mut self, is_ref: bool) -> Cell {
        let n = self.next_temp;
        self.next_temp += 1;
        self.proc().mk_local(VarKey::Temp(n), &format!("tmp{n}"), is_ref, false)
    }

    /// Runs `f` in a nested lowering scope. The current procedure, the binding sets
    /// and the jump targets are restored afterwards.
    pub(crate) fn scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let cur = self.cur;
        let bindings = self.bindings.clone();
        let targets = mem::take(&mut self.targets);
        let labels = mem::take(&mut self.pending_labels);
        let res = f(self);
        self.cur = cur;
        self.bindings = bindings;
        self.targets = targets;
        self.pending_labels = labels;
        res
    }

    /// Runs `f`, reporting any error it raises against the given location.
    ///
    /// Secondary errors raised inside `f` are reported once `f` finishes, the first one
    /// wins. `None` is returned whenever an error was reported.
    pub(crate) fn catch_errors<T>(
        &mut self,
        file: FileId,
        span: Span,
        f: impl FnOnce(&mut Self) -> BackendResult<T>,
    ) -> Option<T> {
        self.secondary.push(None);
        let res = f(self);
        let secondary = self.secondary.pop().flatten();
        match (res, secondary) {
            (Ok(value), None) => Some(value),
            (Ok(_), Some(err)) | (Err(err), _) => {
                self.report(&err, file, span);
                None
            }
        }
    }

    /// Remembers an error without aborting the current node.
    pub(crate) fn secondary_error(&mut self, err: BackendError) -> BackendResult {
        match self.secondary.last_mut() {
            Some(slot) => {
                if slot.is_none() {
                    *slot = Some(Box::new(err));
                }
                Ok(())
            }
            None => Err(Box::new(err)),
        }
    }

    pub(crate) fn report(&mut self, err: &BackendError, file: FileId, span: Span) {
        log::debug!("Reporting error {}: {err}", err.code_number());
        self.diagnostics.push(Diagnostic::from_error(err, Some(file), Some(span)));
    }

    /// Reports an error at a declaration without aborting.
    pub(crate) fn report_at_decl(&mut self, err: &BackendError, decl: DeclId) {
        let d = &self.prg[decl];
        self.report(err, d.file, d.span)
    }

    pub(crate) fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Clears everything that is recomputed by each pass.
    pub(crate) fn reset(&mut self) {
        self.bin.reset();
        if self.opts.breakpoints {
            self.bin.breakpoints.push(corvid_lang_ir::Breakpoint {
                id: 0,
                file: "bogus".to_owned(),
                start: 0,
                length: 0,
                line: 0,
                character: 0,
            });
        }
        self.cur = self.root;
        self.bindings.clear();
        self.targets.clear();
        self.pending_labels.clear();
        self.ir_cache.clear();
        self.needs_cache.clear();
        self.used_symbols.clear();
        self.next_temp = 0;
        for info in self.function_infos.values_mut() {
            info.lowered_usages = 0;
        }
    }
}
