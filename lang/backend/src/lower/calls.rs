//! Calls of functions, methods, interface members, shims and closures, and `new`.

use corvid_lang_ast::{
    Decl, DeclId, DeclKind, ExprId, ExprKind, FunctionBody, FunctionKind, Program, StmtKind, Type, TypeId,
};
use corvid_lang_ir::{Action, CallTarget, Expr};

use crate::ctx::Ctx;
use crate::generics::{TypeBinding, ref_mask};
use crate::result::{BackendError, BackendResult};

/// An argument of a call, lowered on demand.
pub(crate) enum Arg {
    Expr(ExprId),
    /// An already lowered value and whether it is an owned reference.
    Value(Expr, bool),
}

/// The object a method is called on.
pub(crate) struct Receiver {
    pub value: Arg,
    pub ty: TypeId,
    pub is_super: bool,
}

impl Receiver {
    pub(crate) fn of(prg: &Program, expr: ExprId) -> Self {
        Receiver {
            value: Arg::Expr(expr),
            ty: prg[expr].ty,
            is_super: matches!(prg[expr].kind, ExprKind::Super),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IfaceAccess {
    Call,
    Get,
    Set,
}

impl Ctx<'_> {
    /// Lowers arguments left to right. Bit `i` of the mask is set for every argument
    /// that is an owned reference.
    pub(crate) fn lower_args(&mut self, args: Vec<Arg>) -> BackendResult<(Vec<Expr>, u32)> {
        let mut values = Vec::with_capacity(args.len());
        let mut mask = 0;
        for (i, arg) in args.into_iter().enumerate() {
            let (value, is_ref) = match arg {
                Arg::Expr(e) => {
                    let is_ref = self.is_ref_expr(e)?;
                    (self.emit_expr(e), is_ref)
                }
                Arg::Value(v, is_ref) => (v, is_ref),
            };
            if is_ref && i < 32 {
                mask |= 1 << i;
            }
            values.push(value);
        }
        Ok((values, mask))
    }

    pub(crate) fn emit_call_expr(
        &mut self,
        expr: ExprId,
        callee: ExprId,
        args: &[ExprId],
        type_args: &[TypeId],
    ) -> BackendResult<Expr> {
        let prg = self.prg;
        let ty = prg[expr].ty;
        let call_args: Vec<Arg> = args.iter().map(|a| Arg::Expr(*a)).collect();
        match &prg[callee].kind {
            ExprKind::Super => self.emit_super_call(call_args),
            ExprKind::Ident { decl } => match &prg[*decl].kind {
                DeclKind::Function(_) if !self.is_closure_decl(*decl) => {
                    self.emit_call_core(*decl, None, call_args, type_args, ty)
                }
                DeclKind::Namespace(_) => Err(namespace_call_error(prg, *decl)),
                _ => self.emit_lambda_call(callee, call_args),
            },
            ExprKind::Property { object, decl: Some(decl), .. } => match &prg[*decl].kind {
                DeclKind::Function(f)
                    if matches!(f.fun_kind, FunctionKind::Method | FunctionKind::Free)
                        && !self.is_closure_decl(*decl) =>
                {
                    let recv = (prg.is_class_function(*decl) && !f.is_static)
                        .then(|| Receiver::of(prg, *object));
                    self.emit_call_core(*decl, recv, call_args, type_args, ty)
                }
                DeclKind::Signature(s) if s.is_method => {
                    self.emit_call_core(*decl, Some(Receiver::of(prg, *object)), call_args, type_args, ty)
                }
                DeclKind::Namespace(_) => Err(namespace_call_error(prg, *decl)),
                _ => self.emit_lambda_call(callee, call_args),
            },
            _ => self.emit_lambda_call(callee, call_args),
        }
    }

    /// Calls a function, method, accessor or interface member.
    ///
    /// `type_args` are the explicit or inferred type arguments of the call, the result
    /// type is only consulted for interface property reads.
    pub(crate) fn emit_call_core(
        &mut self,
        decl: DeclId,
        recv: Option<Receiver>,
        mut args: Vec<Arg>,
        type_args: &[TypeId],
        result_ty: TypeId,
    ) -> BackendResult<Expr> {
        let prg = self.prg;
        let d = &prg[decl];
        let mut own = match d.as_function() {
            Some(f) if !f.type_params.is_empty() => self.bindings_core(&f.type_params, type_args)?,
            _ => Vec::new(),
        };
        self.add_enclosing_bindings(&mut own, decl)?;
        self.check_args(decl, &args)?;
        self.add_default_args(decl, &mut args)?;

        let is_shim = self.attrs(decl).is_shim();
        if d.as_function().is_some_and(|f| f.body.is_none()) && !is_shim {
            return Err(Box::new(BackendError::NoShim { name: prg.qualified_name(decl) }));
        }
        let is_shim_call = is_shim && !self.has_shim_dummy(decl);
        let is_method = prg.is_class_function(decl) || matches!(d.kind, DeclKind::Signature(_));
        if !is_method {
            if is_shim_call {
                return self.emit_shim(decl, args);
            }
            self.mark_function_used(decl, own.clone());
            return self.mk_proc_call(decl, args, &own);
        }

        let is_static = d.as_function().is_some_and(|f| f.is_static);
        let mut bindings = Vec::new();
        let mut is_super = false;
        if !is_static {
            let Some(recv) = recv else { return Err(Box::new(BackendError::StrangeMethodCall)) };
            is_super = recv.is_super;
            bindings = self.method_bindings(recv.ty, decl)?;
            args.insert(0, recv.value);
        }
        bindings.extend(own);

        if is_shim_call {
            return self.emit_shim(decl, args);
        }
        if let Some(helper) = self.attrs(decl).helper.clone() {
            let helper_decl = self.find_helper(&helper)?;
            let params = prg.type_params(helper_decl);
            if params.len() != bindings.len() {
                return Err(BackendError::impossible(format!(
                    "helpers.{helper} takes {} type parameters, {} given",
                    params.len(),
                    bindings.len()
                )));
            }
            let bindings: Vec<TypeBinding> = params
                .iter()
                .zip(&bindings)
                .map(|(param, b)| TypeBinding { param: *param, is_ref: b.is_ref })
                .collect();
            self.mark_function_used(helper_decl, bindings.clone());
            return self.mk_proc_call(helper_decl, args, &bindings);
        }
        if let DeclKind::Signature(sig) = &d.kind {
            let access = if sig.is_method {
                IfaceAccess::Call
            } else if args.len() == 2 {
                IfaceAccess::Set
            } else {
                IfaceAccess::Get
            };
            return self.emit_iface_call(&d.name, access, args, result_ty);
        }
        if !is_static && !is_super {
            self.mark_dispatched(decl);
            if let Some(index) = self.function_infos.get(&decl).and_then(|i| i.virtual_index) {
                self.mark_function_used(decl, bindings);
                let (values, _) = self.lower_args(args)?;
                return Ok(Expr::ProcCall { target: CallTarget::Virtual { index }, args: values });
            }
        }
        self.mark_function_used(decl, bindings.clone());
        self.mk_proc_call(decl, args, &bindings)
    }

    /// The bindings of the class that declares `method`, as seen from a receiver type.
    fn method_bindings(&mut self, recv_ty: TypeId, method: DeclId) -> BackendResult<Vec<TypeBinding>> {
        let prg = self.prg;
        match (&prg[recv_ty], prg.owning_class(method)) {
            (Type::Class { .. } | Type::This { .. }, Some(owner)) => {
                let mut cur = Some(self.class_info_for_type(recv_ty)?);
                while let Some(c) = cur {
                    let info = &self.class_infos[c.as_str()];
                    if info.decl == owner {
                        return Ok(info.bindings.clone());
                    }
                    cur = info.base.clone();
                }
                self.type_bindings_of(recv_ty)
            }
            (Type::Array { elem }, _) => {
                let params = prg[method].parent.map(|p| prg.type_params(p)).unwrap_or(&[]);
                if params.len() == 1 { self.bindings_core(params, &[*elem]) } else { Ok(Vec::new()) }
            }
            _ => self.type_bindings_of(recv_ty),
        }
    }

    fn mk_proc_call(&mut self, decl: DeclId, args: Vec<Arg>, bindings: &[TypeBinding]) -> BackendResult<Expr> {
        let label = self.function_label(decl, bindings);
        let proc = self.bin.lookup_proc(Action::Decl(decl), &ref_mask(bindings));
        if proc.is_none() && self.bin.final_pass {
            return Err(BackendError::impossible(format!("no procedure for {label}")));
        }
        let (values, _) = self.lower_args(args)?;
        Ok(Expr::ProcCall { target: CallTarget::Direct { label, proc }, args: values })
    }

    /// Accesses a member through the interface table of the receiver, which is the
    /// first argument. Objects without a vtable are looked up as maps.
    pub(crate) fn emit_iface_call(
        &mut self,
        name: &str,
        access: IfaceAccess,
        args: Vec<Arg>,
        result_ty: TypeId,
    ) -> BackendResult<Expr> {
        let key = self.iface_member_id(name);
        let (values, mask) = self.lower_args(args)?;
        let (member, map_method) = match access {
            IfaceAccess::Call => (key, None),
            IfaceAccess::Get => {
                let method = if self.is_ref_type(result_ty)? { "pxtrt::mapGetRef" } else { "pxtrt::mapGet" };
                (key, Some(method))
            }
            IfaceAccess::Set => {
                let method = if mask & 2 != 0 { "pxtrt::mapSetRef" } else { "pxtrt::mapSet" };
                (self.iface_member_id(&format!("set/{name}")), Some(method))
            }
        };
        Ok(Expr::ProcCall {
            target: CallTarget::Iface { member, map_method: map_method.map(str::to_owned), map_key: key },
            args: values,
        })
    }

    fn emit_shim(&mut self, decl: DeclId, args: Vec<Arg>) -> BackendResult<Expr> {
        let Some(shim) = self.attrs(decl).shim.clone() else {
            return Err(BackendError::impossible("shim call without a shim"));
        };
        match shim.as_str() {
            "TD_NOOP" => Ok(Expr::Number(0)),
            "TD_ID" => {
                let (mut values, _) = self.lower_args(args)?;
                if values.len() != 1 {
                    return Err(BackendError::impossible("TD_ID takes exactly one argument"));
                }
                Ok(values.remove(0))
            }
            _ => {
                let (values, mask) = self.lower_args(args)?;
                Ok(Expr::rt_call_mask(&shim, values, mask))
            }
        }
    }

    /// Shims of non-native targets may carry a body that is compiled instead.
    pub(crate) fn has_shim_dummy(&self, decl: DeclId) -> bool {
        if self.opts.target.is_native {
            return false;
        }
        let prg = self.prg;
        match prg[decl].as_function().and_then(|f| f.body.as_ref()) {
            Some(FunctionBody::Block(stmt)) => {
                matches!(&prg[*stmt].kind, StmtKind::Block { stmts } if !stmts.is_empty())
            }
            Some(FunctionBody::Expr(_)) => true,
            None => false,
        }
    }

    /// Appends the values of omitted parameters.
    /// Checks explicit arguments against the declared parameter types.
    fn check_args(&mut self, decl: DeclId, args: &[Arg]) -> BackendResult {
        let prg = self.prg;
        let Some(f) = prg[decl].as_function() else { return Ok(()) };
        for (arg, param) in args.iter().zip(&f.params) {
            if let (Arg::Expr(e), DeclKind::Parameter(p)) = (arg, &prg[*param].kind) {
                self.check_subtype(prg[*e].ty, p.ty)?;
            }
        }
        Ok(())
    }

    fn add_default_args(&mut self, decl: DeclId, args: &mut Vec<Arg>) -> BackendResult {
        let prg = self.prg;
        let params: &[DeclId] = match prg[decl].as_function() {
            Some(f) => &f.params,
            None => &[],
        };
        for param in params.iter().skip(args.len()) {
            let p = &prg[*param];
            let default = match &p.kind {
                DeclKind::Parameter(pd) => pd.default,
                _ => None,
            };
            if let Some(init) = default {
                let simple = matches!(
                    prg[init].kind,
                    ExprKind::Null | ExprKind::Number { .. } | ExprKind::Boolean { .. }
                );
                if !simple {
                    return Err(Box::new(BackendError::DefaultArgument));
                }
                args.push(Arg::Expr(init));
            } else if let Some(defl) = self.attrs(decl).param_defl.get(&p.name).cloned() {
                let n: f64 = defl
                    .parse()
                    .map_err(|_| Box::new(BackendError::DefaultParameter { name: p.name.clone() }))?;
                args.push(Arg::Value(self.emit_number(n)?, false));
            } else {
                args.push(Arg::Value(self.emit_null(), false));
            }
        }
        if self.attrs(decl).image_literal.is_some() {
            self.image_literal_arg(args)?;
        }
        Ok(())
    }

    fn find_helper(&self, name: &str) -> BackendResult<DeclId> {
        let prg = self.prg;
        let in_helpers = |d: &Decl| {
            d.parent.is_some_and(|p| {
                matches!(prg[p].kind, DeclKind::Namespace(_)) && prg[p].name == "helpers"
            })
        };
        match prg.decls.iter().position(|d| d.name == name && in_helpers(d)) {
            None => Err(Box::new(BackendError::HelperNotFound { name: name.to_owned() })),
            Some(idx) if prg.decls[idx].is_function() => Ok(DeclId::from(idx)),
            Some(_) => Err(Box::new(BackendError::HelperNotFunction { name: name.to_owned() })),
        }
    }

    /// Calls a function value through the runtime.
    fn emit_lambda_call(&mut self, callee: ExprId, args: Vec<Arg>) -> BackendResult<Expr> {
        if args.len() > 3 {
            return Err(Box::new(BackendError::LambdaArity));
        }
        let name = format!("pxt::runAction{}", args.len());
        let mut all = vec![Arg::Expr(callee)];
        all.extend(args);
        let (values, mask) = self.lower_args(all)?;
        Ok(Expr::rt_call_mask(&name, values, mask))
    }

    /// The constructor used to initialize instances of a class, searching the bases.
    fn find_ctor(&self, id: &str) -> Option<(DeclId, String)> {
        let mut cur = Some(id.to_owned());
        while let Some(c) = cur {
            let info = &self.class_infos[c.as_str()];
            if let Some(ctor) = self.class_ctor(info.decl) {
                return Some((ctor, c));
            }
            cur = info.base.clone();
        }
        None
    }

    fn emit_super_call(&mut self, mut args: Vec<Arg>) -> BackendResult<Expr> {
        let Some(class_id) = self.proc_ref().class_id.clone() else {
            return Err(BackendError::impossible("super call outside of a constructor"));
        };
        let Some(base) = self.class_infos[class_id.as_str()].base.clone() else {
            return Err(BackendError::impossible("super call in a class without base"));
        };
        let Some((ctor, owner)) = self.find_ctor(&base) else {
            if !args.is_empty() {
                return Err(Box::new(BackendError::ConstructorNotFound));
            }
            return Ok(Expr::Nop);
        };
        let this = self.emit_this()?;
        self.add_default_args(ctor, &mut args)?;
        args.insert(0, Arg::Value(this, self.opts.target.ref_counting));
        let bindings = self.class_infos[owner.as_str()].bindings.clone();
        self.mark_function_used(ctor, bindings.clone());
        self.mk_proc_call(ctor, args, &bindings)
    }

    pub(crate) fn emit_new(&mut self, expr: ExprId, args: &[ExprId]) -> BackendResult<Expr> {
        let prg = self.prg;
        let ty = prg[expr].ty;
        match &prg[ty] {
            Type::Class { .. } => {}
            Type::Interface { .. } | Type::Object { .. } | Type::Array { .. } => {
                return Err(Box::new(BackendError::NewOnNonClass));
            }
            _ => return Err(Box::new(BackendError::UnknownNewType)),
        }
        let id = self.class_info_for_type(ty)?;
        self.mark_class_used(&id);
        let vtable = Expr::Pointer(format!("{id}_VT"));
        let Some((ctor, owner)) = self.find_ctor(&id) else {
            if !args.is_empty() {
                return Err(Box::new(BackendError::ConstructorNotFound));
            }
            return Ok(Expr::rt_call("pxt::mkClassInstance", vec![vtable]));
        };
        let mut call_args: Vec<Arg> = args.iter().map(|a| Arg::Expr(*a)).collect();
        self.add_default_args(ctor, &mut call_args)?;
        if self.attrs(ctor).is_shim() && !self.has_shim_dummy(ctor) {
            return self.emit_shim(ctor, call_args);
        }
        let obj = Expr::shared(Expr::rt_call("pxt::mkClassInstance", vec![vtable]));
        let this_is_ref = self.opts.target.ref_counting;
        let this = if this_is_ref { Expr::incr(obj.clone()) } else { obj.clone() };
        call_args.insert(0, Arg::Value(this, this_is_ref));
        let bindings = self.class_infos[owner.as_str()].bindings.clone();
        self.mark_function_used(ctor, bindings.clone());
        let call = self.mk_proc_call(ctor, call_args, &bindings)?;
        self.proc().emit_expr(call);
        Ok(obj)
    }
}

fn namespace_call_error(prg: &Program, decl: DeclId) -> Box<BackendError> {
    if prg[decl].name == "String" {
        Box::new(BackendError::StringCall)
    } else {
        Box::new(BackendError::NamespaceCall)
    }
}
