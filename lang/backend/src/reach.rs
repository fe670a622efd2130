//! The two lowering passes and the worklist of reachable declarations.

use corvid_lang_ast::{DeclId, DeclKind, ExprId, ExprKind, FunctionKind, Program};
use corvid_lang_ir::Binary;

use crate::ctx::Ctx;
use crate::generics::{TypeBinding, ref_mask};
use crate::globals::layout_globals;
use crate::options::CompileOptions;
use crate::result::Diagnostic;

/// The outcome of one compilation.
#[derive(Debug)]
pub struct CompileResult {
    pub diagnostics: Vec<Diagnostic>,
    /// Only produced when no error was reported.
    pub binary: Option<Binary>,
}

impl CompileResult {
    pub fn is_success(&self) -> bool {
        self.binary.is_some()
    }
}

/// Lowers a type-checked program.
///
/// The first pass discovers the reachable declarations and their instantiations.
/// Class layouts and dispatch tables are then fixed, and the second pass lowers every
/// reachable declaration again with full knowledge of captured variables and vtable
/// slots. The second pass only runs when the first reported no errors.
pub fn compile(prg: &Program, opts: &CompileOptions) -> CompileResult {
    let mut ctx = Ctx::new(prg, opts);
    if let Err(err) = opts.target.validate() {
        ctx.diagnostics.push(Diagnostic::from_error(&err, None, None));
        return CompileResult { diagnostics: ctx.diagnostics, binary: None };
    }

    log::debug!("Starting discovery pass");
    ctx.reset();
    ctx.emit_root();
    log::debug!(
        "Discovery pass reached {} declarations and {} procedures",
        ctx.used_decls.len(),
        ctx.bin.procs.len()
    );
    if ctx.has_errors() {
        return CompileResult { diagnostics: ctx.diagnostics, binary: None };
    }
    ctx.prune_classes();
    ctx.emit_vtables();
    if ctx.has_errors() {
        return CompileResult { diagnostics: ctx.diagnostics, binary: None };
    }

    log::debug!("Starting final pass");
    ctx.reset();
    ctx.bin.final_pass = true;
    ctx.emit_root();
    if ctx.has_errors() {
        return CompileResult { diagnostics: ctx.diagnostics, binary: None };
    }
    ctx.finish();
    let Ctx { bin, diagnostics, .. } = ctx;
    CompileResult { diagnostics, binary: Some(bin) }
}

/// Initializers that can be evaluated at any time.
fn is_side_effectful_initializer(prg: &Program, init: Option<ExprId>) -> bool {
    let Some(init) = init else { return false };
    !matches!(
        prg[init].kind,
        ExprKind::Null | ExprKind::Number { .. } | ExprKind::String { .. } | ExprKind::Boolean { .. }
    )
}

impl Ctx<'_> {
    /// Declarations that are only compiled once something refers to them.
    pub(crate) fn is_on_demand(&self, decl: DeclId) -> bool {
        let prg = self.prg;
        let d = &prg[decl];
        let on_demand = match &d.kind {
            DeclKind::Variable(v) if prg.is_global_var(decl) => {
                self.attrs(decl).deferred || !is_side_effectful_initializer(prg, v.init)
            }
            DeclKind::Function(f) => {
                prg.is_class_function(decl)
                    || (f.fun_kind != FunctionKind::Expression && prg.enclosing_function(decl).is_none())
            }
            _ => false,
        };
        if on_demand && self.opts.test_mode && !prg[d.file].is_library {
            return false;
        }
        on_demand
    }

    pub(crate) fn is_used(&self, decl: DeclId) -> bool {
        !self.is_on_demand(decl) || self.used_decls.contains(&decl)
    }

    fn record_symbol(&mut self, decl: DeclId) {
        if self.opts.compute_used_symbols {
            self.used_symbols.insert(self.prg.qualified_name(decl));
        }
    }

    /// Records a reference to a declaration, queueing it the first time.
    pub(crate) fn mark_used(&mut self, decl: DeclId) {
        self.record_symbol(decl);
        if !self.is_used(decl) {
            log::trace!("Queueing {}", self.prg.qualified_name(decl));
            self.used_decls.insert(decl);
            self.worklist.push_back(decl);
        }
    }

    /// Records a use of a function with a binding set, queueing it for every new
    /// ref-mask.
    pub(crate) fn mark_function_used(&mut self, decl: DeclId, bindings: Vec<TypeBinding>) {
        if bindings.is_empty() || !self.is_generic_function(decl) {
            return self.mark_used(decl);
        }
        self.record_symbol(decl);
        self.used_decls.insert(decl);
        let mask = ref_mask(&bindings);
        let info = self.fn_info(decl);
        let usages = info.usages.get_or_insert_with(Vec::new);
        if usages.iter().all(|u| ref_mask(u) != mask) {
            usages.push(bindings);
            log::trace!("Queueing {} with bindings {mask}", self.prg.qualified_name(decl));
            self.worklist.push_back(decl);
        }
    }

    /// Lowers queued declarations until the worklist is empty.
    pub(crate) fn flush_worklist(&mut self) {
        let prg = self.prg;
        while let Some(decl) = self.worklist.pop_front() {
            let d = &prg[decl];
            self.catch_errors(d.file, d.span, |ctx| {
                ctx.scope(|ctx| {
                    ctx.cur = ctx.root;
                    ctx.bindings.clear();
                    match &d.kind {
                        DeclKind::Function(_) => ctx.emit_function_decl(decl).map(|_| ()),
                        DeclKind::Variable(_) => ctx.emit_var_decl(decl).map(|_| ()),
                        _ => Ok(()),
                    }
                })
            });
        }
    }

    /// Lowers the top-level statements of all files into the root procedure, followed
    /// by everything they reach.
    pub(crate) fn emit_root(&mut self) {
        let prg = self.prg;
        let root = self.root;
        self.bin.proc_mut(root).reset();
        self.cur = root;
        for file in &prg.files {
            for stmt in &file.statements {
                self.emit_stmt(*stmt);
            }
        }
        self.flush_worklist();
    }

    /// Produces the parts of the binary that only depend on the final pass.
    pub(crate) fn finish(&mut self) {
        self.bin.resolve();
        layout_globals(&mut self.bin);
        self.bin.iface_members = self.iface_members.keys().cloned().collect();
        self.bin.used_symbols = self.used_symbols.iter().cloned().collect();
    }
}
