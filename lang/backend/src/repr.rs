//! Which values are reference-counted.

use corvid_lang_ast::{BitSize, DeclId, DeclKind, ExprId, ExprKind, Type, TypeId};
use corvid_lang_ir::VarKey;

use crate::ctx::Ctx;
use crate::result::{BackendError, BackendResult};

impl Ctx<'_> {
    /// Whether values of `ty` are reference-counted under the current bindings.
    pub fn is_ref_type(&self, ty: TypeId) -> BackendResult<bool> {
        let target = &self.opts.target;
        if !target.ref_counting {
            return Ok(false);
        }
        let prg = self.prg;
        let is_ref = match &prg[ty] {
            Type::This { .. } => true,
            Type::Null | Type::Undefined | Type::Void => false,
            Type::Param { decl } => match self.lookup_binding(*decl) {
                Some(is_ref) => is_ref,
                None => {
                    return Err(BackendError::impossible(format!(
                        "unbound type parameter {}",
                        prg[*decl].name
                    )));
                }
            },
            Type::Number | Type::Boolean | Type::Enum { .. } => !target.numbers_are_values(),
            Type::Class { decl, .. } => !self.attrs(*decl).no_ref_counting,
            Type::Any
            | Type::String
            | Type::Interface { .. }
            | Type::Object { .. }
            | Type::Array { .. }
            | Type::Function { .. } => true,
        };
        Ok(is_ref)
    }

    pub(crate) fn is_ref_var(&self, key: VarKey) -> BackendResult<bool> {
        match key {
            VarKey::This(_) => Ok(self.opts.target.ref_counting),
            VarKey::Decl(decl) => match self.prg.decl_type(decl) {
                Some(ty) => self.is_ref_type(ty),
                None => Err(Box::new(BackendError::UnknownVariableType)),
            },
            VarKey::Temp(_) => Ok(false),
        }
    }

    /// Literals are static and never need reference count updates.
    pub(crate) fn is_ref_expr(&self, expr: ExprId) -> BackendResult<bool> {
        let e = &self.prg[expr];
        match e.kind {
            ExprKind::Null | ExprKind::Undefined | ExprKind::Number { .. } | ExprKind::String { .. } => {
                Ok(false)
            }
            _ => self.is_ref_type(e.ty),
        }
    }

    /// Captured locals that are written live in a box shared with the closures.
    pub(crate) fn is_by_ref_local(&self, key: VarKey) -> bool {
        let VarKey::Decl(decl) = key else { return false };
        let is_local = match &self.prg[decl].kind {
            DeclKind::Variable(_) => !self.prg.is_global_var(decl),
            DeclKind::Parameter(_) => true,
            _ => false,
        };
        is_local && self.var_infos.get(&key).is_some_and(|info| info.captured && info.written)
    }

    /// Reports types the backend cannot represent. The error is secondary: lowering
    /// continues and the diagnostic is raised when the enclosing node is done.
    pub(crate) fn check_type(&mut self, ty: TypeId) -> BackendResult {
        let prg = self.prg;
        if matches!(prg[ty], Type::Any) {
            return self.secondary_error(BackendError::UnsupportedType { ty: prg.type_to_string(ty) });
        }
        Ok(())
    }

    pub(crate) fn type_check_var(&mut self, decl: DeclId) -> BackendResult {
        let prg = self.prg;
        match prg.decl_type(decl) {
            None => Err(Box::new(BackendError::UnknownVariableType)),
            Some(ty) if matches!(prg[ty], Type::Void) => Err(Box::new(BackendError::VoidVariable)),
            Some(ty) => self.check_type(ty),
        }
    }

    /// The storage width of a variable. Only globals and fields may be narrowed.
    pub(crate) fn bit_size(&self, decl: DeclId) -> BackendResult<BitSize> {
        let prg = self.prg;
        let size = match &prg[decl].kind {
            DeclKind::Variable(v) => v.bit_size,
            DeclKind::Parameter(p) => p.bit_size,
            DeclKind::Field(f) => f.bit_size,
            _ => BitSize::None,
        };
        let is_global = prg.is_global_var(decl) || matches!(prg[decl].kind, DeclKind::Field(_));
        if !size.is_none() && !is_global {
            return Err(Box::new(BackendError::LocalBitSize));
        }
        Ok(size)
    }
}

#[cfg(test)]
mod test {
    use corvid_lang_ast::{ProgramBuilder, Type};

    use crate::ctx::Ctx;
    use crate::generics::TypeBinding;
    use crate::options::{CompileOptions, CompileTarget};

    fn opts(target: CompileTarget) -> CompileOptions {
        CompileOptions { target, ..Default::default() }
    }

    #[test]
    fn primitives_follow_target() {
        let mut b = ProgramBuilder::new();
        let num = b.number();
        let string = b.string();
        let null = b.null_type();
        let prg = b.finish();

        let tagged = opts(CompileTarget::default());
        let ctx = Ctx::new(&prg, &tagged);
        assert!(!ctx.is_ref_type(num).unwrap());
        assert!(ctx.is_ref_type(string).unwrap());
        assert!(!ctx.is_ref_type(null).unwrap());

        let boxed = opts(CompileTarget { tagged_ints: false, ..Default::default() });
        let ctx = Ctx::new(&prg, &boxed);
        assert!(ctx.is_ref_type(num).unwrap());

        let managed = opts(CompileTarget::managed());
        let ctx = Ctx::new(&prg, &managed);
        assert!(!ctx.is_ref_type(string).unwrap());
    }

    #[test]
    fn no_ref_counting_classes() {
        let mut b = ProgramBuilder::new();
        let plain = b.class("Plain", None);
        b.annotate(plain, "//% noRefCounting");
        let rc = b.class("Rc", None);
        let plain_ty = b.class_type(plain, vec![]);
        let rc_ty = b.class_type(rc, vec![]);
        let prg = b.finish();

        let opts = opts(CompileTarget::default());
        let ctx = Ctx::new(&prg, &opts);
        assert!(!ctx.is_ref_type(plain_ty).unwrap());
        assert!(ctx.is_ref_type(rc_ty).unwrap());
    }

    #[test]
    fn parameters_resolve_innermost_first() {
        let mut b = ProgramBuilder::new();
        let f = b.function("id", None);
        let (t, t_ty) = b.type_param(f, "T");
        let prg = b.finish();

        let opts = opts(CompileTarget::default());
        let mut ctx = Ctx::new(&prg, &opts);
        assert_eq!(ctx.is_ref_type(t_ty).unwrap_err().code_number(), 9200);
        ctx.bindings.push(TypeBinding { param: t, is_ref: true });
        ctx.bindings.push(TypeBinding { param: t, is_ref: false });
        assert!(!ctx.is_ref_type(t_ty).unwrap());
        assert!(matches!(prg[t_ty], Type::Param { .. }));
    }
}
