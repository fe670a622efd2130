//! Function bodies, closures, variables and their storage cells.

use corvid_lang_ast::{DeclId, DeclKind, FunctionBody, FunctionKind, Type};
use corvid_lang_ir::{Action, Cell, Expr, VarKey};

use crate::ctx::Ctx;
use crate::generics::{TypeBinding, ref_mask};
use crate::result::{BackendError, BackendResult};

/// The label every `return` of a function jumps to.
pub(crate) fn return_label(decl: DeclId) -> String {
    format!(".ret.{decl}")
}

impl Ctx<'_> {
    /// Nested function declarations that reference variables of enclosing functions
    /// are compiled to closures stored in a local of the enclosing function.
    pub(crate) fn is_closure_decl(&self, decl: DeclId) -> bool {
        let prg = self.prg;
        prg[decl].as_function().is_some_and(|f| f.fun_kind == FunctionKind::Free)
            && prg.enclosing_function(decl).is_some()
            && self.function_infos.get(&decl).is_some_and(|info| !info.captured_vars.is_empty())
    }

    fn is_global_cell(&self, decl: DeclId) -> bool {
        self.prg.is_global_var(decl) || self.prg.is_static_field(decl)
    }

    /// Whether callers of a function receive a value.
    pub(crate) fn returns_value(&self, decl: DeclId) -> bool {
        let prg = self.prg;
        match prg[decl].as_function() {
            Some(f) => {
                !matches!(f.fun_kind, FunctionKind::Constructor | FunctionKind::Setter)
                    && !matches!(prg[f.ret], Type::Void | Type::Undefined)
            }
            None => false,
        }
    }

    pub(crate) fn var_name(&self, key: VarKey) -> String {
        match key {
            VarKey::Decl(decl) => self.prg[decl].name.clone(),
            VarKey::This(_) => "this".to_owned(),
            VarKey::Temp(n) => format!("tmp{n}"),
        }
    }

    /// Lowers a function declaration or expression for every instantiation that is in
    /// use. Returns the closure or literal for function expressions.
    pub(crate) fn emit_function_decl(&mut self, decl: DeclId) -> BackendResult<Option<Expr>> {
        let prg = self.prg;
        let Some(f) = prg[decl].as_function() else {
            return Err(BackendError::impossible("function declaration expected"));
        };
        if !self.is_used(decl) || f.body.is_none() {
            return Ok(None);
        }
        if self.attrs(decl).is_shim() && !self.has_shim_dummy(decl) {
            return Ok(None);
        }
        if !self.is_generic_function(decl) {
            let bindings = self.enclosing_bindings(decl)?;
            return self.scope(|ctx| ctx.emit_func_core(decl, bindings));
        }
        if self.has_own_type_params(decl) && self.has_generic_parent(decl) {
            return Err(Box::new(BackendError::NestedGeneric));
        }

        let usages = match self.function_infos.get(&decl).and_then(|i| i.usages.clone()) {
            Some(usages) => usages,
            None if self.opts.test_mode => {
                let mut bindings: Vec<TypeBinding> = prg
                    .type_params(decl)
                    .iter()
                    .map(|param| TypeBinding { param: *param, is_ref: self.opts.target.ref_counting })
                    .collect();
                self.add_enclosing_bindings(&mut bindings, decl)?;
                vec![bindings]
            }
            None => return Ok(None),
        };
        let start = self.fn_info(decl).lowered_usages;
        self.fn_info(decl).lowered_usages = usages.len();
        for bindings in usages.into_iter().skip(start) {
            self.scope(|ctx| ctx.emit_func_core(decl, bindings))?;
        }
        Ok(None)
    }

    /// Captured variables in closure slot order, references first.
    fn ordered_captures(&self, decl: DeclId) -> BackendResult<(Vec<(VarKey, bool)>, usize)> {
        let keys = self.function_infos.get(&decl).map(|i| i.captured_vars.clone()).unwrap_or_default();
        let mut refs = Vec::new();
        let mut prims = Vec::new();
        for key in keys {
            let is_ref = self.is_ref_var(key)?;
            if is_ref || self.is_by_ref_local(key) {
                refs.push((key, is_ref));
            } else {
                prims.push((key, is_ref));
            }
        }
        let num_refs = refs.len();
        refs.extend(prims);
        Ok((refs, num_refs))
    }

    fn emit_func_core(&mut self, decl: DeclId, bindings: Vec<TypeBinding>) -> BackendResult<Option<Expr>> {
        let prg = self.prg;
        let d = &prg[decl];
        let Some(f) = d.as_function() else {
            return Err(BackendError::impossible("function declaration expected"));
        };
        let is_expression = f.fun_kind == FunctionKind::Expression;
        if is_expression && self.has_own_type_params(decl) {
            return Err(Box::new(BackendError::GenericFunctionExpression));
        }
        let (caps, num_refs) = self.ordered_captures(decl)?;
        if !caps.is_empty() && self.is_generic_function(decl) {
            return Err(Box::new(BackendError::GenericClosure));
        }
        let label = self.function_label(decl, &bindings);
        let mask = ref_mask(&bindings);

        let mut lit = None;
        if !caps.is_empty() {
            let closure = Expr::shared(Expr::rt_call(
                "pxt::mkAction",
                vec![
                    Expr::Number(num_refs as i64),
                    Expr::Number(caps.len() as i64),
                    Expr::Pointer(label.clone()),
                ],
            ));
            for (i, (key, _)) in caps.iter().enumerate() {
                let cell = match self.proc_ref().local_index(*key) {
                    Some(cell) => cell.clone(),
                    None if !self.bin.final_pass => self.lookup_cell(*key)?,
                    None => return Err(Box::new(BackendError::CapturedNotFound { name: self.var_name(*key) })),
                };
                let mut value = cell.load_core();
                if cell.is_ref || cell.by_ref_local {
                    value = Expr::incr(value);
                }
                self.proc()
                    .emit_expr(Expr::rt_call("pxtrt::stclo", vec![closure.clone(), Expr::Number(i as i64), value]));
            }
            if is_expression {
                lit = Some(closure);
            } else {
                let location = self.declare_local(VarKey::Decl(decl))?;
                self.proc().emit_expr(location.store_by_ref(closure));
            }
        } else if is_expression {
            lit = Some(self.emit_fun_lit_core(decl, &bindings));
        }

        let action = Action::Decl(decl);
        let proc_id = match self.bin.lookup_proc(action, &mask) {
            Some(id) => {
                self.bin.proc_mut(id).reset();
                id
            }
            None if self.bin.final_pass => {
                return Err(BackendError::impossible(format!("{label} first seen in the final pass")));
            }
            None => self.bin.add_proc(action, label.clone(), &mask),
        };
        log::debug!("Lowering {label}");

        let is_instance = prg.is_class_function(decl) && !f.is_static;
        let class_id = match prg.owning_class(decl) {
            Some(cls) if is_instance => {
                let n = prg.type_params(cls).len();
                Some(self.class_info(cls, bindings.iter().take(n).copied().collect())?)
            }
            _ => None,
        };
        self.bin.proc_mut(proc_id).class_id = class_id;

        self.cur = proc_id;
        self.bindings.extend(bindings.iter().copied());
        for (key, is_ref) in &caps {
            let name = self.var_name(*key);
            let by_ref = self.is_by_ref_local(*key);
            self.proc().mk_captured(*key, &name, *is_ref, by_ref);
        }
        if is_instance {
            let is_ref = self.opts.target.ref_counting;
            self.proc().mk_arg(VarKey::This(decl), "this", is_ref, false);
        }
        let mut boxed = Vec::new();
        for param in &f.params {
            let key = VarKey::Decl(*param);
            self.type_check_var(*param)?;
            self.bit_size(*param)?;
            let is_ref = self.is_ref_var(key)?;
            let by_ref = self.is_by_ref_local(key);
            let cell = self.proc().mk_arg(key, &prg[*param].name, is_ref, by_ref);
            if by_ref {
                boxed.push(cell);
            }
        }
        for cell in boxed {
            self.proc().emit_expr(cell.box_init(cell.load_core()));
        }

        let ret = return_label(decl);
        let has_value = self.returns_value(decl);
        match &f.body {
            Some(FunctionBody::Block(stmt)) => self.emit_stmt(*stmt),
            Some(FunctionBody::Expr(expr)) if has_value => {
                let v = self.emit_expr(*expr);
                self.proc().emit_jmp_value(&ret, v);
            }
            Some(FunctionBody::Expr(expr)) => {
                let e = &prg[*expr];
                self.catch_errors(e.file, e.span, |ctx| ctx.emit_expr_as_stmt(*expr));
            }
            None => {}
        }
        self.proc().emit_label(&ret);
        if has_value {
            let v = Expr::shared(Expr::JmpValue);
            self.proc().emit_expr(v.clone());
            self.proc().emit_clrs();
            let fin = self.proc().mk_label("final");
            self.proc().emit_jmp_value(&fin, v);
            self.proc().emit_label(&fin);
        } else {
            self.proc().emit_clrs();
        }
        Ok(lit)
    }

    /// A pointer to the static closure of a function without captures.
    fn emit_fun_lit_core(&mut self, decl: DeclId, bindings: &[TypeBinding]) -> Expr {
        let label = self.function_label(decl, bindings);
        Expr::rt_call("pxt::ptrOfLiteral", vec![Expr::Pointer(format!("{label}_Lit"))])
    }

    /// A named function used as a value.
    pub(crate) fn emit_fun_literal(&mut self, decl: DeclId) -> BackendResult<Expr> {
        if self.attrs(decl).is_shim() {
            return Err(Box::new(BackendError::BuiltinAsValue));
        }
        if self.is_generic_function(decl) {
            return Err(Box::new(BackendError::GenericAsValue));
        }
        if self.is_closure_decl(decl) {
            return self.emit_var_load(VarKey::Decl(decl));
        }
        let bindings = self.enclosing_bindings(decl)?;
        self.mark_function_used(decl, bindings.clone());
        Ok(self.emit_fun_lit_core(decl, &bindings))
    }

    /// The cell holding a variable, as seen from the current procedure.
    pub(crate) fn lookup_cell(&mut self, key: VarKey) -> BackendResult<Cell> {
        let prg = self.prg;
        if let VarKey::Decl(decl) = key {
            if self.is_global_cell(decl) {
                self.mark_used(decl);
                return self.global_cell(decl);
            }
        }
        if let Some(cell) = self.proc_ref().local_index(key) {
            return Ok(cell.clone());
        }
        // closure locals may be called before their declaration is reached
        let is_function = matches!(key, VarKey::Decl(d) if prg[d].is_function());
        if self.bin.final_pass && !is_function {
            return Err(Box::new(BackendError::CannotLocate { name: self.var_name(key) }));
        }
        self.declare_local(key)
    }

    fn global_cell(&mut self, decl: DeclId) -> BackendResult<Cell> {
        let key = VarKey::Decl(decl);
        if let Some(cell) = self.bin.lookup_global(key) {
            return Ok(cell.clone());
        }
        let is_ref = self.is_ref_var(key)?;
        let bit_size = self.bit_size(decl)?;
        Ok(self.bin.add_global(key, &self.prg[decl].name, is_ref, bit_size))
    }

    fn declare_local(&mut self, key: VarKey) -> BackendResult<Cell> {
        if let Some(cell) = self.proc_ref().local_index(key) {
            return Ok(cell.clone());
        }
        if let VarKey::Decl(decl) = key {
            self.bit_size(decl)?;
        }
        let is_ref = self.is_ref_var(key)?;
        let by_ref = self.is_by_ref_local(key);
        let name = self.var_name(key);
        Ok(self.proc().mk_local(key, &name, is_ref, by_ref))
    }

    /// Records a read or write of a variable from the current procedure. Variables of
    /// enclosing functions become captured by every function in between.
    pub(crate) fn record_use(&mut self, key: VarKey, written: bool) {
        let prg = self.prg;
        let owner = match key {
            VarKey::Decl(decl) => {
                if self.is_global_cell(decl) {
                    return;
                }
                prg.enclosing_function(decl)
            }
            VarKey::This(method) => Some(method),
            VarKey::Temp(_) => return,
        };
        if written {
            self.var_infos.entry(key).or_default().written = true;
        }
        let Action::Decl(mut cur) = self.proc_ref().action else { return };
        if Some(cur) == owner {
            return;
        }
        loop {
            if !self.fn_info(cur).captured_vars.contains(&key) {
                log::trace!("{} captures {}", prg.qualified_name(cur), self.var_name(key));
                self.fn_info(cur).captured_vars.push(key);
            }
            match prg.enclosing_function(cur) {
                Some(parent) if Some(parent) != owner => cur = parent,
                _ => break,
            }
        }
        self.var_infos.entry(key).or_default().captured = true;
    }

    pub(crate) fn emit_var_load(&mut self, key: VarKey) -> BackendResult<Expr> {
        if let VarKey::Decl(decl) = key {
            if !self.prg[decl].is_function() {
                self.type_check_var(decl)?;
            }
        }
        let cell = self.lookup_cell(key)?;
        self.record_use(key, false);
        Ok(cell.load())
    }

    pub(crate) fn emit_var_store(&mut self, decl: DeclId, value: Expr) -> BackendResult {
        match &self.prg[decl].kind {
            DeclKind::Variable(_) | DeclKind::Parameter(_) => {}
            DeclKind::Field(f) if f.is_static => {}
            _ => return Err(Box::new(BackendError::BadTargetIdentifier)),
        }
        let key = VarKey::Decl(decl);
        let cell = self.lookup_cell(key)?;
        self.record_use(key, true);
        self.proc().emit_expr(cell.store_by_ref(value));
        Ok(())
    }

    /// The innermost instance method around the current procedure.
    fn enclosing_method(&self) -> BackendResult<DeclId> {
        let prg = self.prg;
        let mut cur = match self.proc_ref().action {
            Action::Decl(decl) => Some(decl),
            _ => None,
        };
        while let Some(fun) = cur {
            if prg.is_class_function(fun) && !prg[fun].as_function().is_some_and(|f| f.is_static) {
                return Ok(fun);
            }
            cur = prg.enclosing_function(fun);
        }
        Err(Box::new(BackendError::ThisOutsideMethod))
    }

    pub(crate) fn emit_this(&mut self) -> BackendResult<Expr> {
        let method = self.enclosing_method()?;
        self.emit_var_load(VarKey::This(method))
    }

    /// Declares a variable or static field and stores its initializer. Returns `None`
    /// when the declaration is never used.
    pub(crate) fn emit_var_decl(&mut self, decl: DeclId) -> BackendResult<Option<Cell>> {
        let prg = self.prg;
        let d = &prg[decl];
        let (ty, init) = match &d.kind {
            DeclKind::Variable(v) => (v.ty, v.init),
            DeclKind::Field(f) if f.is_static => (f.ty, f.init),
            _ => return Err(BackendError::impossible("variable declaration expected")),
        };
        if !self.is_used(decl) {
            return Ok(None);
        }
        self.type_check_var(decl)?;
        let key = VarKey::Decl(decl);
        let cell = if self.is_global_cell(decl) { self.global_cell(decl)? } else { self.declare_local(key)? };
        if cell.by_ref_local {
            self.proc().emit_clr_if_ref(&cell);
            let undefined = self.emit_undefined();
            self.proc().emit_expr(cell.box_init(undefined));
        }
        if let Some(init) = init {
            self.emit_brk(d.file, d.span);
            self.check_subtype(prg[init].ty, ty)?;
            let v = self.emit_expr(init);
            self.proc().emit_expr(cell.store_by_ref(v));
            self.proc().stack_empty();
        }
        Ok(Some(cell))
    }
}
