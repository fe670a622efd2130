use corvid_lang_ast::{DeclId, DeclKind, ExprId, ExprKind, FunctionKind, Type, TypeId};
use corvid_lang_ir::{Expr, VarKey};

use crate::ctx::Ctx;
use crate::result::{BackendError, BackendResult};

use super::Lower;
use super::calls::{Arg, IfaceAccess, Receiver};

impl Lower for ExprId {
    type Target = Expr;

    fn lower(&self, ctx: &mut Ctx<'_>) -> BackendResult<Self::Target> {
        let prg = ctx.prg;
        let expr = *self;
        let e = &prg[expr];
        match &e.kind {
            ExprKind::Number { value } => ctx.emit_number(*value),
            ExprKind::String { value } => Ok(ctx.emit_string_literal(value)),
            ExprKind::Boolean { value } => Ok(ctx.emit_bool(*value)),
            ExprKind::Null => Ok(ctx.emit_null()),
            ExprKind::Undefined => Ok(ctx.emit_undefined()),
            ExprKind::Template { head, spans } => ctx.emit_template(head, spans),
            ExprKind::Ident { decl } => ctx.emit_identifier(*decl),
            ExprKind::This | ExprKind::Super => ctx.emit_this(),
            ExprKind::Property { object, name, decl } => ctx.emit_property_access(expr, *object, name, *decl),
            ExprKind::Index { object, index } => ctx.emit_indexed_access(*object, *index, e.ty, None),
            ExprKind::Call { callee, args, type_args } => ctx.emit_call_expr(expr, *callee, args, type_args),
            ExprKind::New { args } => ctx.emit_new(expr, args),
            ExprKind::Binary { op, left, right } => ctx.emit_binary(*op, *left, *right),
            ExprKind::Assign { op: None, target, value } => ctx.emit_assignment(*target, *value),
            ExprKind::Assign { op: Some(op), target, value } => {
                ctx.emit_compound_assignment(*op, *target, *value)
            }
            ExprKind::Unary { op, operand } => ctx.emit_prefix(*op, *operand),
            ExprKind::Postfix { op, operand } => ctx.emit_postfix(*op, *operand),
            ExprKind::Conditional { cond, then, els } => ctx.emit_conditional(*cond, *then, *els),
            ExprKind::Array { elems } => ctx.emit_array_literal(e.ty, elems),
            ExprKind::Object { props } => ctx.emit_object_literal(props),
            ExprKind::Function { decl } => {
                if ctx.has_own_type_params(*decl) {
                    return Err(Box::new(BackendError::GenericFunctionExpression));
                }
                ctx.emit_function_decl(*decl)?
                    .ok_or_else(|| BackendError::impossible("function expression was not lowered"))
            }
            ExprKind::As { expr: inner, target } => ctx.emit_cast(*inner, *target),
            ExprKind::Paren { expr: inner } => Ok(ctx.emit_expr(*inner)),
            ExprKind::TypeOf { .. } | ExprKind::Delete { .. } | ExprKind::TaggedTemplate { .. } => {
                Err(BackendError::unhandled(e.kind.syntax_name()))
            }
            ExprKind::Spread { .. } | ExprKind::Await { .. } | ExprKind::Yield { .. } | ExprKind::Void { .. } => {
                Err(BackendError::future(e.kind.syntax_name()))
            }
            ExprKind::Class { .. } => {
                Err(BackendError::unhandled_with(e.kind.syntax_name(), "declare a class as class C {}"))
            }
        }
    }
}

impl Ctx<'_> {
    fn emit_identifier(&mut self, decl: DeclId) -> BackendResult<Expr> {
        match &self.prg[decl].kind {
            DeclKind::Variable(_) | DeclKind::Parameter(_) => self.emit_var_load(VarKey::Decl(decl)),
            DeclKind::Function(_) => self.emit_fun_literal(decl),
            _ => Err(Box::new(BackendError::UnknownIdentifier)),
        }
    }

    fn emit_property_access(
        &mut self,
        expr: ExprId,
        object: ExprId,
        name: &str,
        decl: Option<DeclId>,
    ) -> BackendResult<Expr> {
        let prg = self.prg;
        let ty = prg[expr].ty;
        let obj_ty = prg[object].ty;
        let Some(decl) = decl else {
            return match prg[obj_ty] {
                Type::Object { .. } | Type::Any => {
                    self.emit_iface_call(name, IfaceAccess::Get, vec![Arg::Expr(object)], ty)
                }
                _ => Err(Box::new(BackendError::UnknownPropertyAccess { kind: prg.type_to_string(obj_ty) })),
            };
        };
        let d = &prg[decl];
        match &d.kind {
            DeclKind::Function(f) => {
                let is_instance = prg.is_class_function(decl) && !f.is_static;
                let getter = match f.fun_kind {
                    FunctionKind::Getter => Some(decl),
                    FunctionKind::Setter => prg
                        .owning_class(decl)
                        .and_then(|class| self.find_accessor(class, name, FunctionKind::Getter)),
                    FunctionKind::Method if prg.is_class_function(decl) => {
                        return Err(Box::new(BackendError::MethodAsLambda));
                    }
                    _ => return self.emit_fun_literal(decl),
                };
                let Some(getter) = getter else {
                    return Err(Box::new(BackendError::UnknownPropertyAccess { kind: d.kind_name().to_owned() }));
                };
                let recv = is_instance.then(|| Receiver::of(prg, object));
                self.emit_call_core(getter, recv, Vec::new(), &[], ty)
            }
            DeclKind::Signature(sig) if sig.is_method => Err(Box::new(BackendError::MethodAsLambda)),
            DeclKind::Signature(_) => self.emit_call_core(decl, Some(Receiver::of(prg, object)), Vec::new(), &[], ty),
            DeclKind::EnumMember(member) => {
                if let Some(ev) = self.attrs(decl).enum_val.clone() {
                    return match ev.parse::<f64>() {
                        Ok(n) => self.emit_number(n),
                        Err(_) => Ok(Expr::rt_call(&ev, Vec::new())),
                    };
                }
                match (member.value, member.init) {
                    (Some(n), _) => self.emit_number(n),
                    (None, Some(init)) => Ok(self.emit_expr(init)),
                    (None, None) => Err(Box::new(BackendError::EnumValue)),
                }
            }
            DeclKind::Variable(_) => self.emit_var_load(VarKey::Decl(decl)),
            DeclKind::Field(f) if f.is_static => self.emit_var_load(VarKey::Decl(decl)),
            DeclKind::Field(_) => {
                let id = self.class_info_for_type(obj_ty)?;
                let field = self.field_ref(&id, decl)?;
                let obj = self.emit_expr(object);
                Ok(Expr::field(obj, field))
            }
            _ => Err(Box::new(BackendError::UnknownPropertyAccess { kind: d.kind_name().to_owned() })),
        }
    }

    fn emit_conditional(&mut self, cond: ExprId, then: ExprId, els: ExprId) -> BackendResult<Expr> {
        let else_label = self.proc().mk_label("condexprz");
        let fin = self.proc().mk_label("condexprfin");
        let test = self.emit_condition(cond)?;
        self.proc().emit_jmp_z(&else_label, test);
        let v = self.emit_expr(then);
        self.proc().emit_jmp_value(&fin, v);
        self.proc().emit_label(&else_label);
        let v = self.emit_expr(els);
        self.proc().emit_jmp_value(&fin, v);
        self.proc().emit_label(&fin);
        Ok(Expr::JmpValue)
    }

    /// Casts are free at runtime but must be sound.
    fn emit_cast(&mut self, expr: ExprId, target: TypeId) -> BackendResult<Expr> {
        self.check_subtype(self.prg[expr].ty, target)?;
        Ok(self.emit_expr(expr))
    }
}
