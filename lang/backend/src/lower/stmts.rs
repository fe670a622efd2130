use corvid_lang_ast::{
    BinOp, DeclId, DeclKind, ExprId, ExprKind, FileId, Pattern, StmtId, StmtKind, SwitchCase, Type, VarBinding,
};
use corvid_lang_ir::{Action, Breakpoint, Expr, JmpMode, Stmt, VarKey};
use corvid_lang_miette_util::Span;

use crate::ctx::{Ctx, JumpTarget};
use crate::generics::TypeBinding;
use crate::result::{BackendError, BackendResult};

use super::Lower;
use super::calls::{Arg, IfaceAccess, Receiver};
use super::funcs::return_label;

fn brk_label(stmt: StmtId) -> String {
    format!(".brk.{}", stmt.0)
}

fn cont_label(stmt: StmtId) -> String {
    format!(".cont.{}", stmt.0)
}

fn top_label(stmt: StmtId) -> String {
    format!(".fortop.{}", stmt.0)
}

impl Lower for StmtId {
    type Target = ();

    fn lower(&self, ctx: &mut Ctx<'_>) -> BackendResult<Self::Target> {
        let prg = ctx.prg;
        let stmt = *self;
        let s = &prg[stmt];
        match &s.kind {
            StmtKind::Block { stmts } => {
                for st in stmts {
                    ctx.emit_stmt(*st);
                }
                Ok(())
            }
            StmtKind::Expr { expr } => {
                ctx.emit_brk(s.file, s.span);
                ctx.emit_expr_stmt_core(*expr)
            }
            StmtKind::Var { bindings } => ctx.emit_var_stmt(bindings),
            StmtKind::If { cond, then, els } => {
                ctx.emit_brk(s.file, s.span);
                ctx.emit_if(*cond, *then, *els)
            }
            StmtKind::While { cond, body } => ctx.emit_while(stmt, *cond, *body),
            StmtKind::DoWhile { body, cond } => ctx.emit_do_while(stmt, *body, *cond),
            StmtKind::For { init, cond, update, body } => ctx.emit_for(stmt, *init, *cond, *update, *body),
            StmtKind::ForOf { var, iterable, body } => ctx.emit_for_of(stmt, *var, *iterable, *body),
            StmtKind::Break { label } => {
                ctx.emit_brk(s.file, s.span);
                let target = ctx.find_target(label.as_deref(), false)?;
                ctx.proc().emit_jmp(&brk_label(target));
                Ok(())
            }
            StmtKind::Continue { label } => {
                ctx.emit_brk(s.file, s.span);
                let target = ctx.find_target(label.as_deref(), true)?;
                ctx.proc().emit_jmp(&cont_label(target));
                Ok(())
            }
            StmtKind::Return { value } => {
                ctx.emit_brk(s.file, s.span);
                ctx.emit_return(*value)
            }
            StmtKind::Switch { discriminant, cases } => ctx.emit_switch(stmt, *discriminant, cases),
            StmtKind::Labeled { label, body } => {
                if prg[*body].kind.is_breakable() {
                    ctx.pending_labels.push(label.clone());
                    ctx.emit_stmt(*body);
                    Ok(())
                } else {
                    ctx.pending_labels.push(label.clone());
                    ctx.with_target(stmt, false, false, |ctx| {
                        ctx.emit_stmt(*body);
                        Ok(())
                    })?;
                    ctx.proc().emit_label(&brk_label(stmt));
                    Ok(())
                }
            }
            StmtKind::Function { decl } => ctx.emit_function_decl(*decl).map(|_| ()),
            StmtKind::Class { decl } => ctx.emit_class_decl(*decl),
            StmtKind::Namespace { decl } => {
                if let DeclKind::Namespace(ns) = &prg[*decl].kind {
                    for st in &ns.body {
                        ctx.emit_stmt(*st);
                    }
                }
                Ok(())
            }
            StmtKind::Interface { .. } | StmtKind::Enum { .. } | StmtKind::TypeAlias { .. } | StmtKind::Empty => Ok(()),
            StmtKind::Debugger => {
                ctx.emit_brk(s.file, s.span);
                Ok(())
            }
            StmtKind::ForIn { .. } => Err(BackendError::unhandled("for in loops")),
            StmtKind::Throw { .. } => Err(BackendError::unhandled("throw statement")),
            StmtKind::Try { .. } => Err(BackendError::unhandled("try statement")),
            StmtKind::With { .. } => Err(BackendError::unhandled("with statement")),
        }
    }
}

impl Ctx<'_> {
    /// Records a breakpoint at the first non-blank character of a statement.
    pub(crate) fn emit_brk(&mut self, file: FileId, span: Span) {
        if !self.opts.breakpoints {
            return;
        }
        let prg = self.prg;
        let f = &prg[file];
        if self.opts.just_my_code && f.is_library {
            return;
        }
        let mut start = span.start.to_usize();
        let (mut line, mut character) = (0, 0);
        if let Some(src) = f.source.as_deref() {
            if let Some(rest) = src.get(start..) {
                start += rest.len() - rest.trim_start().len();
            }
            if let Some(before) = src.get(..start) {
                line = before.matches('\n').count();
                character = before.rfind('\n').map(|nl| start - nl - 1).unwrap_or(start);
            }
        }
        let id = self.bin.breakpoints.len();
        self.bin.breakpoints.push(Breakpoint {
            id,
            file: f.name.clone(),
            start,
            length: span.end.to_usize().saturating_sub(start),
            line,
            character,
        });
        self.proc().emit(Stmt::Breakpoint(id));
    }

    /// Runs `f` with `stmt` as the innermost target of `break` and `continue`.
    fn with_target<T>(
        &mut self,
        stmt: StmtId,
        is_loop: bool,
        is_switch: bool,
        f: impl FnOnce(&mut Self) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let labels = std::mem::take(&mut self.pending_labels);
        self.targets.push(JumpTarget { stmt, labels, is_loop, is_switch });
        let res = f(self);
        self.targets.pop();
        res
    }

    fn find_target(&self, label: Option<&str>, is_continue: bool) -> BackendResult<StmtId> {
        let mut targets = self.targets.iter().rev();
        let found = match label {
            Some(label) => {
                let target = targets.find(|t| t.labels.iter().any(|l| l == label));
                if let Some(t) = target {
                    if is_continue && !t.is_loop {
                        return Err(Box::new(BackendError::ContinueNonLoop));
                    }
                }
                target
            }
            None if is_continue => targets.find(|t| t.is_loop),
            None => targets.find(|t| t.is_loop || t.is_switch),
        };
        found.map(|t| t.stmt).ok_or_else(|| Box::new(BackendError::NoOuterLoop))
    }

    /// Plain assignments used as statements are lowered as stores only.
    fn emit_expr_stmt_core(&mut self, expr: ExprId) -> BackendResult {
        let prg = self.prg;
        let e = &prg[expr];
        if let ExprKind::Assign { op: None, target, value } = &e.kind {
            self.catch_errors(e.file, e.span, |ctx| ctx.emit_store(*target, Arg::Expr(*value)));
            self.proc().stack_empty();
            return Ok(());
        }
        self.emit_expr_as_stmt(expr)
    }

    fn emit_if(&mut self, cond: ExprId, then: StmtId, els: Option<StmtId>) -> BackendResult {
        let test = self.emit_condition(cond)?;
        let else_label = self.proc().mk_label("else");
        self.proc().emit_jmp_z(&else_label, test);
        self.emit_stmt(then);
        match els {
            Some(els) => {
                let after = self.proc().mk_label("afterif");
                self.proc().emit_jmp(&after);
                self.proc().emit_label(&else_label);
                self.emit_stmt(els);
                self.proc().emit_label(&after);
            }
            None => self.proc().emit_label(&else_label),
        }
        Ok(())
    }

    fn emit_while(&mut self, stmt: StmtId, cond: ExprId, body: StmtId) -> BackendResult {
        self.with_target(stmt, true, false, |ctx| {
            ctx.proc().emit_label(&cont_label(stmt));
            let test = ctx.emit_condition(cond)?;
            ctx.proc().emit_jmp_z(&brk_label(stmt), test);
            ctx.emit_stmt(body);
            ctx.proc().emit_jmp(&cont_label(stmt));
            ctx.proc().emit_label(&brk_label(stmt));
            Ok(())
        })
    }

    fn emit_do_while(&mut self, stmt: StmtId, body: StmtId, cond: ExprId) -> BackendResult {
        self.with_target(stmt, true, false, |ctx| {
            ctx.proc().emit_label(&top_label(stmt));
            ctx.emit_stmt(body);
            ctx.proc().emit_label(&cont_label(stmt));
            let test = ctx.emit_condition(cond)?;
            ctx.proc().emit_jmp_if(JmpMode::IfNotZero, &top_label(stmt), test);
            ctx.proc().emit_label(&brk_label(stmt));
            Ok(())
        })
    }

    fn emit_for(
        &mut self,
        stmt: StmtId,
        init: Option<StmtId>,
        cond: Option<ExprId>,
        update: Option<ExprId>,
        body: StmtId,
    ) -> BackendResult {
        self.with_target(stmt, true, false, |ctx| {
            if let Some(init) = init {
                ctx.emit_stmt(init);
            }
            ctx.proc().emit_label(&top_label(stmt));
            if let Some(cond) = cond {
                let test = ctx.emit_condition(cond)?;
                ctx.proc().emit_jmp_z(&brk_label(stmt), test);
            }
            ctx.emit_stmt(body);
            ctx.proc().emit_label(&cont_label(stmt));
            if let Some(update) = update {
                let e = &ctx.prg[update];
                ctx.catch_errors(e.file, e.span, |ctx| ctx.emit_expr_as_stmt(update));
            }
            ctx.proc().emit_jmp(&top_label(stmt));
            ctx.proc().emit_label(&brk_label(stmt));
            Ok(())
        })
    }

    /// Whether numbers are boxed, reference-counted values.
    fn numbers_are_refs(&self) -> bool {
        self.opts.target.ref_counting && !self.opts.target.numbers_are_values()
    }

    fn emit_for_of(&mut self, stmt: StmtId, var: DeclId, iterable: ExprId, body: StmtId) -> BackendResult {
        let prg = self.prg;
        let (indexer, length) = match &prg[prg[iterable].ty] {
            Type::String => ("String_::charAt", "String_::length"),
            Type::Array { .. } => ("Array_::getAt", "Array_::length"),
            _ => return Err(BackendError::unhandled("for-of loops over this type")),
        };
        let lt = self.intrinsic(BinOp::Lt)?;
        let adds = self.intrinsic(BinOp::Add)?;
        let num_ref = self.numbers_are_refs();

        self.mark_used(var);
        let Some(elem) = self.emit_var_decl(var)? else {
            return Err(BackendError::impossible("for-of variable without storage"));
        };
        let coll_is_ref = self.is_ref_expr(iterable)?;
        let coll = self.mk_temp(coll_is_ref);
        let v = self.emit_expr(iterable);
        self.proc().emit_expr(coll.store_by_ref(v));
        let idx = self.mk_temp(num_ref);
        let zero = self.emit_number(0.0)?;
        self.proc().emit_expr(idx.store_by_ref(zero));
        self.proc().stack_empty();
        let s = &prg[stmt];
        self.emit_brk(s.file, s.span);

        self.with_target(stmt, true, false, |ctx| {
            let num_mask = if num_ref { 3 } else { 0 };
            ctx.proc().emit_label(&top_label(stmt));
            let len = Expr::rt_call(length, vec![coll.load_core()]);
            let test = ctx.to_bool(Expr::rt_call_mask(lt, vec![idx.load(), len], num_mask));
            ctx.proc().emit_jmp_z(&brk_label(stmt), test);
            let item = Expr::rt_call_mask(indexer, vec![coll.load_core(), idx.load()], if num_ref { 2 } else { 0 });
            ctx.proc().emit_expr(elem.store_by_ref(item));
            ctx.emit_stmt(body);
            ctx.proc().emit_label(&cont_label(stmt));
            let one = ctx.emit_number(1.0)?;
            let next = Expr::rt_call_mask(adds, vec![idx.load(), one], num_mask);
            ctx.proc().emit_expr(idx.store_by_ref(next));
            ctx.proc().emit_jmp(&top_label(stmt));
            ctx.proc().emit_label(&brk_label(stmt));
            Ok(())
        })?;
        if coll_is_ref {
            let null = self.emit_null();
            self.proc().emit_expr(coll.store_by_ref(null));
        }
        Ok(())
    }

    fn emit_return(&mut self, value: Option<ExprId>) -> BackendResult {
        let Action::Decl(fun) = self.proc_ref().action else {
            return Err(BackendError::unhandled("return outside of a function"));
        };
        let ret = return_label(fun);
        let returns_value = self.returns_value(fun);
        match value {
            Some(value) if returns_value => {
                let v = self.emit_expr(value);
                self.proc().emit_jmp_value(&ret, v);
            }
            Some(value) => {
                self.emit_expr_as_stmt(value)?;
                self.proc().emit_jmp(&ret);
            }
            None if returns_value => {
                let undefined = self.emit_undefined();
                self.proc().emit_jmp_value(&ret, undefined);
            }
            None => self.proc().emit_jmp(&ret),
        }
        Ok(())
    }

    fn emit_switch(&mut self, stmt: StmtId, discriminant: ExprId, cases: &[SwitchCase]) -> BackendResult {
        let prg = self.prg;
        let disc_ty = &prg[prg[discriminant].ty];
        let quick = disc_ty.is_number_like()
            && self.opts.target.numbers_are_values()
            && cases.iter().all(|c| c.test.is_none_or(|t| matches!(prg[t].kind, ExprKind::Number { .. })));

        self.with_target(stmt, false, true, |ctx| {
            let labels: Vec<String> = cases.iter().map(|_| ctx.proc().mk_label("switch_case")).collect();
            let mut release = None;
            if quick {
                let v = ctx.emit_expr(discriminant);
                let dispatch = ctx.proc().mk_label("switch_dispatch");
                ctx.proc().emit_jmp_value(&dispatch, v);
                ctx.proc().emit_label(&dispatch);
                for (case, label) in cases.iter().zip(&labels) {
                    if let Some(test) = case.test {
                        let t = ctx.emit_expr(test);
                        ctx.proc().emit_jmp_if(JmpMode::IfJmpValEq, label, t);
                    }
                }
            } else {
                let is_ref = ctx.is_ref_expr(discriminant)?;
                let tmp = ctx.mk_temp(is_ref);
                let v = ctx.emit_expr(discriminant);
                ctx.proc().emit_expr(tmp.store_by_ref(v));
                ctx.proc().stack_empty();
                let tmp_mask = if is_ref { 1 } else { 0 };
                for (case, label) in cases.iter().zip(&labels) {
                    let Some(test) = case.test else { continue };
                    let mask = tmp_mask | ctx.ref_bit(test, 1)?;
                    let t = ctx.emit_expr(test);
                    let cond = match disc_ty {
                        Type::String => {
                            let cmp = Expr::rt_call_mask("String_::compare", vec![tmp.load(), t], mask);
                            let zero = ctx.emit_number(0.0)?;
                            let cmp_mask = if ctx.numbers_are_refs() { 1 } else { 0 };
                            ctx.to_bool(Expr::rt_call_mask(ctx.intrinsic(BinOp::Eq)?, vec![cmp, zero], cmp_mask))
                        }
                        _ if is_ref && !ctx.opts.target.is_legacy() => {
                            ctx.to_bool(Expr::rt_call_mask("langsupp::ptreq", vec![tmp.load(), t], mask))
                        }
                        _ => ctx.to_bool(Expr::rt_call_mask(ctx.intrinsic(BinOp::Eq)?, vec![tmp.load(), t], mask)),
                    };
                    ctx.proc().emit_jmp_if(JmpMode::IfNotZero, label, cond);
                }
                if is_ref {
                    release = Some(tmp);
                }
            }
            let default = cases.iter().zip(&labels).find(|(c, _)| c.test.is_none()).map(|(_, l)| l.clone());
            ctx.proc().emit_jmp(&default.unwrap_or_else(|| brk_label(stmt)));
            for (case, label) in cases.iter().zip(&labels) {
                ctx.proc().emit_label(label);
                for st in &case.body {
                    ctx.emit_stmt(*st);
                }
            }
            ctx.proc().emit_label(&brk_label(stmt));
            if let Some(tmp) = release {
                let null = ctx.emit_null();
                ctx.proc().emit_expr(tmp.store_by_ref(null));
            }
            Ok(())
        })
    }

    fn emit_var_stmt(&mut self, bindings: &[VarBinding]) -> BackendResult {
        let prg = self.prg;
        for binding in bindings {
            match binding {
                VarBinding::Single(decl) => {
                    let d = &prg[*decl];
                    self.catch_errors(d.file, d.span, |ctx| ctx.emit_var_decl(*decl));
                }
                VarBinding::Pattern { pattern, init } => {
                    let e = &prg[*init];
                    self.catch_errors(e.file, e.span, |ctx| ctx.emit_destructuring(pattern, *init));
                }
            }
        }
        Ok(())
    }

    fn emit_destructuring(&mut self, pattern: &Pattern, init: ExprId) -> BackendResult {
        let prg = self.prg;
        let init_ty = prg[init].ty;
        let is_ref = self.is_ref_expr(init)?;
        let tmp = self.mk_temp(is_ref);
        let v = self.emit_expr(init);
        self.proc().emit_expr(tmp.store_by_ref(v));
        self.proc().stack_empty();

        match pattern {
            Pattern::Array(elems) => {
                let mask = (if is_ref { 1 } else { 0 }) | (if self.numbers_are_refs() { 2 } else { 0 });
                for (i, slot) in elems.iter().enumerate() {
                    let Some(var) = slot else { continue };
                    let idx = self.emit_number(i as f64)?;
                    let value = Expr::rt_call_mask("Array_::getAt", vec![tmp.load(), idx], mask);
                    self.store_pattern_var(*var, value)?;
                }
            }
            Pattern::Object(props) => {
                for (name, var) in props {
                    let Some(var_ty) = prg.decl_type(*var) else {
                        return Err(Box::new(BackendError::UnknownVariableType));
                    };
                    let recv = Receiver { value: Arg::Value(tmp.load(), is_ref), ty: init_ty, is_super: false };
                    let value = match &prg[init_ty] {
                        Type::Class { decl: class, .. } => {
                            let member = prg
                                .find_member(*class, name)
                                .ok_or_else(|| Box::new(BackendError::FieldNotFound { name: name.clone() }))?;
                            match &prg[member].kind {
                                DeclKind::Field(f) if !f.is_static => {
                                    let id = self.class_info_for_type(init_ty)?;
                                    let field = self.field_ref(&id, member)?;
                                    Expr::field(tmp.load(), field)
                                }
                                DeclKind::Function(_) => {
                                    self.emit_call_core(member, Some(recv), Vec::new(), &[], var_ty)?
                                }
                                _ => return Err(Box::new(BackendError::FieldNotFound { name: name.clone() })),
                            }
                        }
                        Type::Interface { .. } | Type::Object { .. } | Type::Any => {
                            self.emit_iface_call(name, IfaceAccess::Get, vec![recv.value], var_ty)?
                        }
                        _ => {
                            return Err(Box::new(BackendError::UnknownPropertyAccess {
                                kind: prg.type_to_string(init_ty),
                            }));
                        }
                    };
                    self.store_pattern_var(*var, value)?;
                }
            }
        }
        if is_ref {
            let null = self.emit_null();
            self.proc().emit_expr(tmp.store_by_ref(null));
        }
        Ok(())
    }

    fn store_pattern_var(&mut self, var: DeclId, value: Expr) -> BackendResult {
        match self.emit_var_decl(var)? {
            Some(cell) => self.proc().emit_expr(cell.store_by_ref(value)),
            None if self.is_ref_var(VarKey::Decl(var))? => self.proc().emit_expr(Expr::decr(value)),
            None => self.proc().emit_expr(value),
        }
        Ok(())
    }

    /// Checks the heritage of a class and lowers its members.
    fn emit_class_decl(&mut self, class: DeclId) -> BackendResult {
        let prg = self.prg;
        let bindings: Vec<TypeBinding> = prg
            .type_params(class)
            .iter()
            .map(|param| TypeBinding { param: *param, is_ref: self.opts.target.ref_counting })
            .collect();
        self.class_info(class, bindings)?;
        for member in prg.class_members(class) {
            let m = &prg[*member];
            self.catch_errors(m.file, m.span, |ctx| match &m.kind {
                DeclKind::Function(_) => ctx.emit_function_decl(*member).map(|_| ()),
                DeclKind::Field(f) if f.is_static => ctx.emit_var_decl(*member).map(|_| ()),
                DeclKind::Field(f) if f.init.is_some() => Err(Box::new(BackendError::FieldInitializer)),
                _ => Ok(()),
            });
        }
        Ok(())
    }
}
