//! Operators, conditions, assignments and indexed access.

use corvid_lang_ast::{BinOp, DeclId, DeclKind, ExprId, ExprKind, FunctionKind, Type, TypeId, UnaryOp, UpdateOp};
use corvid_lang_ir::{Expr, JmpMode};

use crate::ctx::Ctx;
use crate::result::{BackendError, BackendResult};

use super::calls::{Arg, IfaceAccess, Receiver};

/// Runtime entry points of the numeric operators.
fn numeric_intrinsic(legacy: bool, op: BinOp) -> Option<&'static str> {
    let name = if legacy {
        match op {
            BinOp::Add => "thumb::adds",
            BinOp::Sub => "thumb::subs",
            BinOp::Mul => "thumb::muls",
            BinOp::BitAnd => "thumb::ands",
            BinOp::BitOr => "thumb::orrs",
            BinOp::BitXor => "thumb::eors",
            BinOp::Shl => "thumb::lsls",
            BinOp::Shr => "thumb::asrs",
            BinOp::UShr => "thumb::lsrs",
            BinOp::Div => "Number_::div",
            BinOp::Mod => "Number_::mod",
            BinOp::Lt => "Number_::lt",
            BinOp::Le => "Number_::le",
            BinOp::Gt => "Number_::gt",
            BinOp::Ge => "Number_::ge",
            BinOp::Eq | BinOp::StrictEq => "Number_::eq",
            BinOp::Ne | BinOp::StrictNe => "Number_::neq",
            _ => return None,
        }
    } else {
        match op {
            BinOp::Add => "numops::adds",
            BinOp::Sub => "numops::subs",
            BinOp::Mul => "numops::muls",
            BinOp::Div => "numops::div",
            BinOp::Mod => "numops::mod",
            BinOp::BitAnd => "numops::ands",
            BinOp::BitOr => "numops::orrs",
            BinOp::BitXor => "numops::eors",
            BinOp::Shl => "numops::lsls",
            BinOp::Shr => "numops::asrs",
            BinOp::UShr => "numops::lsrs",
            BinOp::Lt => "numops::lt",
            BinOp::Le => "numops::le",
            BinOp::Gt => "numops::gt",
            BinOp::Ge => "numops::ge",
            BinOp::Eq => "numops::eq",
            BinOp::Ne => "numops::neq",
            BinOp::StrictEq => "numops::eqq",
            BinOp::StrictNe => "numops::neqq",
            BinOp::Pow => "Math_::pow",
            _ => return None,
        }
    };
    Some(name)
}

fn is_comparison(op: BinOp) -> bool {
    matches!(
        op,
        BinOp::Lt
            | BinOp::Le
            | BinOp::Gt
            | BinOp::Ge
            | BinOp::Eq
            | BinOp::Ne
            | BinOp::StrictEq
            | BinOp::StrictNe
    )
}

fn is_numeric(ty: &Type) -> bool {
    ty.is_number_like() || matches!(ty, Type::Boolean)
}

fn unary_token(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Plus => "+",
        UnaryOp::Not => "!",
        UnaryOp::BitNot => "~",
        UnaryOp::Incr => "++",
        UnaryOp::Decr => "--",
    }
}

impl Ctx<'_> {
    pub(crate) fn intrinsic(&self, op: BinOp) -> BackendResult<&'static str> {
        numeric_intrinsic(self.opts.target.is_legacy(), op)
            .ok_or_else(|| Box::new(BackendError::UnsupportedNumericOp { op: op.token().to_owned() }))
    }

    fn lower_arg(&mut self, arg: Arg) -> BackendResult<(Expr, bool)> {
        match arg {
            Arg::Expr(e) => {
                let is_ref = self.is_ref_expr(e)?;
                Ok((self.emit_expr(e), is_ref))
            }
            Arg::Value(v, is_ref) => Ok((v, is_ref)),
        }
    }

    pub(crate) fn emit_binary(&mut self, op: BinOp, left: ExprId, right: ExprId) -> BackendResult<Expr> {
        let prg = self.prg;
        match op {
            BinOp::Comma => {
                let l = self.emit_ignored(left)?;
                let r = self.emit_expr(right);
                return Ok(Expr::Sequence(vec![l, r]));
            }
            BinOp::And | BinOp::Or => return self.emit_lazy(op, left, right),
            BinOp::In | BinOp::InstanceOf => return Err(BackendError::unhandled(op.token())),
            _ => {}
        }

        let (lt, rt) = (&prg[prg[left].ty], &prg[prg[right].ty]);
        if is_numeric(lt) && is_numeric(rt) {
            let name = self.intrinsic(op)?;
            let mask = self.ref_bit(left, 0)? | self.ref_bit(right, 1)?;
            let l = self.emit_expr(left);
            let r = self.emit_expr(right);
            return Ok(Expr::rt_call_mask(name, vec![l, r], mask));
        }
        let (l_str, r_str) = (matches!(lt, Type::String), matches!(rt, Type::String));
        if op == BinOp::Add && (l_str || r_str) {
            return self.emit_concat(left, right);
        }
        if l_str && r_str {
            if !is_comparison(op) {
                return Err(Box::new(BackendError::UnknownStringOp { op: op.token().to_owned() }));
            }
            let name = self.intrinsic(op)?;
            let mask = self.ref_bit(left, 0)? | self.ref_bit(right, 1)?;
            let l = self.emit_expr(left);
            let r = self.emit_expr(right);
            let cmp = Expr::rt_call_mask("String_::compare", vec![l, r], mask);
            let zero = self.emit_number(0.0)?;
            let cmp_mask = if self.opts.target.numbers_are_values() { 0 } else { 1 };
            return Ok(Expr::rt_call_mask(name, vec![cmp, zero], cmp_mask));
        }

        let name = match (self.opts.target.is_legacy(), op) {
            (true, BinOp::Eq | BinOp::StrictEq) => "Number_::eq",
            (true, BinOp::Ne | BinOp::StrictNe) => "Number_::neq",
            (false, BinOp::Eq) => "langsupp::ptreq",
            (false, BinOp::Ne) => "langsupp::ptrneq",
            (false, BinOp::StrictEq) => "langsupp::ptreqq",
            (false, BinOp::StrictNe) => "langsupp::ptrneqq",
            _ => return Err(Box::new(BackendError::UnknownGenericOp { op: op.token().to_owned() })),
        };
        let mask = self.ref_bit(left, 0)? | self.ref_bit(right, 1)?;
        let l = self.emit_expr(left);
        let r = self.emit_expr(right);
        Ok(Expr::rt_call_mask(name, vec![l, r], mask))
    }

    /// Converts a boolean-like value to a raw word for conditional jumps.
    pub(crate) fn to_bool(&self, v: Expr) -> Expr {
        self.to_bool_mask(v, 0)
    }

    fn to_bool_mask(&self, v: Expr, mask: u32) -> Expr {
        let target = &self.opts.target;
        if target.tagged_ints || !target.numbers_are_values() {
            Expr::rt_call_mask("numops::toBool", vec![v], mask)
        } else {
            v
        }
    }

    /// The truthiness of a value of type `ty` as a raw word. With `release` the value
    /// is consumed.
    fn truth_test(&self, v: Expr, ty: TypeId, release: bool) -> BackendResult<Expr> {
        let prg = self.prg;
        let is_ref = self.is_ref_type(ty)?;
        let mask = if release && is_ref { 1 } else { 0 };
        let test = match &prg[ty] {
            Type::String => Expr::rt_call_mask("pxtrt::stringToBool", vec![v], mask),
            t if is_numeric(t) => self.to_bool_mask(v, mask),
            _ if is_ref => Expr::rt_call_mask("pxtrt::ptrToBool", vec![v], mask),
            _ => self.to_bool_mask(v, mask),
        };
        Ok(test)
    }

    pub(crate) fn emit_condition(&mut self, expr: ExprId) -> BackendResult<Expr> {
        let v = self.emit_expr(expr);
        self.truth_test(v, self.prg[expr].ty, true)
    }

    /// `a || b` yields `a` when it is truthy, `a && b` yields `a` when it is falsy.
    /// Otherwise `a` is released and `b` is the value.
    fn emit_lazy(&mut self, op: BinOp, left: ExprId, right: ExprId) -> BackendResult<Expr> {
        let is_ref = self.is_ref_expr(left)?;
        let lhs = Expr::shared(self.emit_expr(left));
        let rhs_label = self.proc().mk_label("lazyRhs");
        let fin = self.proc().mk_label("lazyFin");
        let test = self.truth_test(lhs.clone(), self.prg[left].ty, false)?;
        let mode = if op == BinOp::Or { JmpMode::IfZero } else { JmpMode::IfNotZero };
        self.proc().emit_jmp_if(mode, &rhs_label, test);
        self.proc().emit_jmp_value(&fin, lhs.clone());
        self.proc().emit_label(&rhs_label);
        if is_ref {
            self.proc().emit_expr(Expr::decr(lhs));
        }
        let rhs = self.emit_expr(right);
        self.proc().emit_jmp_value(&fin, rhs);
        self.proc().emit_label(&fin);
        Ok(Expr::JmpValue)
    }

    /// Caches the parts of an assignment target that are both read and written.
    /// Objects consumed twice get an extra reference.
    fn prep_for_update(&mut self, target: ExprId) -> BackendResult<Vec<ExprId>> {
        let parts = match &self.prg[target].kind {
            ExprKind::Property { object, .. } => vec![*object],
            ExprKind::Index { object, index } => vec![*object, *index],
            ExprKind::Paren { expr } => return self.prep_for_update(*expr),
            _ => Vec::new(),
        };
        for part in &parts {
            self.needs_cache.insert(*part);
            if self.is_ref_expr(*part)? {
                let v = self.emit_expr(*part);
                self.proc().emit_expr(Expr::incr(v));
            }
        }
        Ok(parts)
    }

    fn cleanup_update(&mut self, parts: &[ExprId]) {
        for part in parts {
            self.needs_cache.remove(part);
            self.ir_cache.remove(part);
        }
    }

    /// `target = value` as an expression; the value is also the result.
    pub(crate) fn emit_assignment(&mut self, target: ExprId, value: ExprId) -> BackendResult<Expr> {
        self.needs_cache.insert(value);
        let res = self.emit_store(target, Arg::Expr(value)).and_then(|()| {
            let v = self.emit_expr(value);
            Ok(if self.is_ref_expr(value)? { Expr::incr(v) } else { v })
        });
        self.cleanup_update(&[value]);
        res
    }

    pub(crate) fn emit_compound_assignment(
        &mut self,
        op: BinOp,
        target: ExprId,
        value: ExprId,
    ) -> BackendResult<Expr> {
        let prg = self.prg;
        let ty = prg[target].ty;
        if op == BinOp::Add && matches!(prg[ty], Type::String) {
            let parts = self.prep_for_update(target)?;
            let res: BackendResult<Expr> = (|| {
                let cur = self.emit_expr(target);
                let rhs = self.emit_as_string(value)?;
                let joined = Expr::shared(Expr::rt_call_mask("String_::concat", vec![cur, rhs], 3));
                let is_ref = self.is_ref_type(ty)?;
                self.emit_store(target, Arg::Value(joined.clone(), is_ref))?;
                Ok(if is_ref { Expr::incr(joined) } else { joined })
            })();
            self.cleanup_update(&parts);
            return res;
        }
        if is_numeric(&prg[ty]) && is_numeric(&prg[prg[value].ty]) {
            let name = self.intrinsic(op)?;
            return self.emit_increment(target, name, false, Some(value));
        }
        Err(Box::new(BackendError::UnknownGenericOp { op: format!("{}=", op.token()) }))
    }

    /// Applies `name` to the current value of `target` and `rhs` (one by default) and
    /// stores the result. Postfix updates yield the previous value.
    fn emit_increment(
        &mut self,
        target: ExprId,
        name: &str,
        is_post: bool,
        rhs: Option<ExprId>,
    ) -> BackendResult<Expr> {
        let boxed = self.is_ref_type(self.prg[target].ty)?;
        let parts = self.prep_for_update(target)?;
        let res: BackendResult<Expr> = (|| {
            let prev = Expr::shared(self.emit_expr(target));
            let (one, one_is_ref) = match rhs {
                Some(value) => self.lower_arg(Arg::Expr(value))?,
                None => (self.emit_number(1.0)?, false),
            };
            let mask = if one_is_ref { 2 } else { 0 };
            let result = Expr::shared(Expr::rt_call_mask(name, vec![prev.clone(), one], mask));
            self.emit_store(target, Arg::Value(result.clone(), boxed))?;
            if is_post {
                Ok(prev)
            } else if boxed {
                self.proc().emit_expr(Expr::decr(prev));
                Ok(Expr::incr(result))
            } else {
                Ok(result)
            }
        })();
        self.cleanup_update(&parts);
        res
    }

    pub(crate) fn emit_prefix(&mut self, op: UnaryOp, operand: ExprId) -> BackendResult<Expr> {
        let prg = self.prg;
        if op == UnaryOp::Not {
            let cond = self.emit_condition(operand)?;
            return Ok(Expr::rt_call("Boolean_::bang", vec![cond]));
        }
        if !is_numeric(&prg[prg[operand].ty]) {
            return Err(Box::new(BackendError::UnsupportedPrefix { op: unary_token(op).to_owned() }));
        }
        match op {
            UnaryOp::Incr => {
                let name = self.intrinsic(BinOp::Add)?;
                self.emit_increment(operand, name, false, None)
            }
            UnaryOp::Decr => {
                let name = self.intrinsic(BinOp::Sub)?;
                self.emit_increment(operand, name, false, None)
            }
            UnaryOp::Neg => {
                let name = self.intrinsic(BinOp::Sub)?;
                let zero = self.emit_number(0.0)?;
                let mask = self.ref_bit(operand, 1)?;
                let v = self.emit_expr(operand);
                Ok(Expr::rt_call_mask(name, vec![zero, v], mask))
            }
            UnaryOp::Plus => Ok(self.emit_expr(operand)),
            UnaryOp::BitNot => {
                let name = self.intrinsic(BinOp::BitXor)?;
                let ones = self.emit_number(-1.0)?;
                let mask = self.ref_bit(operand, 0)?;
                let v = self.emit_expr(operand);
                Ok(Expr::rt_call_mask(name, vec![v, ones], mask))
            }
            UnaryOp::Not => Err(BackendError::impossible("negation handled above")),
        }
    }

    pub(crate) fn emit_postfix(&mut self, op: UpdateOp, operand: ExprId) -> BackendResult<Expr> {
        let prg = self.prg;
        let (token, bin) = match op {
            UpdateOp::Incr => ("++", BinOp::Add),
            UpdateOp::Decr => ("--", BinOp::Sub),
        };
        if !is_numeric(&prg[prg[operand].ty]) {
            return Err(Box::new(BackendError::UnsupportedPostfix { op: token.to_owned() }));
        }
        let name = self.intrinsic(bin)?;
        self.emit_increment(operand, name, true, None)
    }

    /// The accessor of the given kind named `name` in `class` or its bases.
    pub(crate) fn find_accessor(&self, class: DeclId, name: &str, kind: FunctionKind) -> Option<DeclId> {
        let prg = self.prg;
        prg.class_chain(class).into_iter().find_map(|c| {
            prg.class_members(c)
                .iter()
                .find(|m| prg[**m].name == name && prg[**m].as_function().is_some_and(|f| f.fun_kind == kind))
                .copied()
        })
    }

    /// Emits a store of `src` into an assignable expression.
    pub(crate) fn emit_store(&mut self, target: ExprId, src: Arg) -> BackendResult {
        let prg = self.prg;
        let target_ty = prg[target].ty;
        if let Arg::Expr(value) = &src {
            self.check_subtype(prg[*value].ty, target_ty)?;
        }
        match &prg[target].kind {
            ExprKind::Ident { decl } => {
                let (v, _) = self.lower_arg(src)?;
                self.emit_var_store(*decl, v)
            }
            ExprKind::Paren { expr } => self.emit_store(*expr, src),
            ExprKind::Index { object, index } => {
                let value = self.lower_arg(src)?;
                let store = self.emit_indexed_access(*object, *index, target_ty, Some(value))?;
                self.proc().emit_expr(store);
                Ok(())
            }
            ExprKind::Property { object, name, decl: Some(decl) } => match &prg[*decl].kind {
                DeclKind::Function(f) if matches!(f.fun_kind, FunctionKind::Getter | FunctionKind::Setter) => {
                    let setter = prg
                        .owning_class(*decl)
                        .and_then(|class| self.find_accessor(class, name, FunctionKind::Setter))
                        .ok_or_else(|| Box::new(BackendError::NoSetter))?;
                    let recv = (!f.is_static).then(|| Receiver::of(prg, *object));
                    let call = self.emit_call_core(setter, recv, vec![src], &[], target_ty)?;
                    self.proc().emit_expr(call);
                    Ok(())
                }
                DeclKind::Signature(sig) if !sig.is_method => {
                    let call =
                        self.emit_call_core(*decl, Some(Receiver::of(prg, *object)), vec![src], &[], target_ty)?;
                    self.proc().emit_expr(call);
                    Ok(())
                }
                DeclKind::Field(f) if f.is_static => {
                    let (v, _) = self.lower_arg(src)?;
                    self.emit_var_store(*decl, v)
                }
                DeclKind::Variable(_) => {
                    let (v, _) = self.lower_arg(src)?;
                    self.emit_var_store(*decl, v)
                }
                DeclKind::Field(_) => {
                    let id = self.class_info_for_type(prg[*object].ty)?;
                    let field = self.field_ref(&id, *decl)?;
                    let obj = self.emit_expr(*object);
                    let (v, _) = self.lower_arg(src)?;
                    self.proc().emit_expr(Expr::store(Expr::field(obj, field), v));
                    Ok(())
                }
                _ => Err(Box::new(BackendError::BadAssignmentTarget)),
            },
            ExprKind::Property { object, name, decl: None }
                if matches!(prg[prg[*object].ty], Type::Object { .. } | Type::Any) =>
            {
                let call = self.emit_iface_call(name, IfaceAccess::Set, vec![Arg::Expr(*object), src], target_ty)?;
                self.proc().emit_expr(call);
                Ok(())
            }
            _ => Err(Box::new(BackendError::BadAssignmentTarget)),
        }
    }

    /// Reads `object[index]`, or writes `assign` into it. `elem_ty` is the type of the
    /// element expression.
    pub(crate) fn emit_indexed_access(
        &mut self,
        object: ExprId,
        index: ExprId,
        elem_ty: TypeId,
        assign: Option<(Expr, bool)>,
    ) -> BackendResult<Expr> {
        let prg = self.prg;
        let obj_ty = prg[object].ty;

        if let (Type::Object { .. } | Type::Any, ExprKind::String { value }) = (&prg[obj_ty], &prg[index].kind) {
            let mut args = vec![Arg::Expr(object)];
            let access = match assign {
                Some((v, is_ref)) => {
                    args.push(Arg::Value(v, is_ref));
                    IfaceAccess::Set
                }
                None => IfaceAccess::Get,
            };
            return self.emit_iface_call(value, access, args, elem_ty);
        }
        if !prg[prg[index].ty].is_number_like() {
            return Err(Box::new(BackendError::NonNumericIndexer { ty: prg.type_to_string(obj_ty) }));
        }

        let name = match (&prg[obj_ty], assign.is_some()) {
            (Type::String, false) => "String_::charAt".to_owned(),
            (Type::Array { .. }, false) => "Array_::getAt".to_owned(),
            (Type::Array { .. }, true) => "Array_::setAt".to_owned(),
            (Type::Class { decl, .. } | Type::Interface { decl, .. }, is_set) => {
                let attrs = self.attrs(*decl);
                let indexer = if is_set { &attrs.indexer_set } else { &attrs.indexer_get };
                indexer.clone().ok_or_else(|| Box::new(BackendError::UnsupportedIndexer))?
            }
            _ => return Err(Box::new(BackendError::UnsupportedIndexer)),
        };
        let mut mask = self.ref_bit(object, 0)? | self.ref_bit(index, 1)?;
        let obj = self.emit_expr(object);
        let idx = self.emit_expr(index);
        let mut args = vec![obj, idx];
        if let Some((v, is_ref)) = assign {
            if is_ref {
                mask |= 4;
            }
            args.push(v);
        }
        Ok(Expr::rt_call_mask(&name, args, mask))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn intrinsics_follow_target() {
        assert_eq!(numeric_intrinsic(true, BinOp::Add), Some("thumb::adds"));
        assert_eq!(numeric_intrinsic(true, BinOp::Lt), Some("Number_::lt"));
        assert_eq!(numeric_intrinsic(true, BinOp::Pow), None);
        assert_eq!(numeric_intrinsic(false, BinOp::Add), Some("numops::adds"));
        assert_eq!(numeric_intrinsic(false, BinOp::StrictNe), Some("numops::neqq"));
        assert_eq!(numeric_intrinsic(false, BinOp::Pow), Some("Math_::pow"));
        assert_eq!(numeric_intrinsic(false, BinOp::And), None);
    }
}
