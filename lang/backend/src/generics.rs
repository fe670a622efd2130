//! Binding sets and the names of specialized instances.

use std::fmt;

use corvid_lang_ast::{DeclId, DeclKind, FunctionKind, Type, TypeId};

use crate::ctx::Ctx;
use crate::result::{BackendError, BackendResult};

/// The representation chosen for one type parameter in a compiled instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeBinding {
    pub param: DeclId,
    pub is_ref: bool,
}

impl fmt::Display for TypeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.param, if self.is_ref { 'R' } else { 'P' })
    }
}

/// `""` for an empty binding set, otherwise `_` followed by `R` or `P` per binding.
pub fn ref_mask(bindings: &[TypeBinding]) -> String {
    if bindings.is_empty() {
        return String::new();
    }
    let mut mask = String::with_capacity(bindings.len() + 1);
    mask.push('_');
    mask.extend(bindings.iter().map(|b| if b.is_ref { 'R' } else { 'P' }));
    mask
}

/// Replaces every run of characters that cannot appear in a label by `_`.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

impl Ctx<'_> {
    /// The innermost binding of a type parameter.
    pub(crate) fn lookup_binding(&self, param: DeclId) -> Option<bool> {
        self.bindings.iter().rev().find(|b| b.param == param).map(|b| b.is_ref)
    }

    /// Binds `params` to the representations of `args`.
    pub(crate) fn bindings_core(
        &self,
        params: &[DeclId],
        args: &[TypeId],
    ) -> BackendResult<Vec<TypeBinding>> {
        if params.len() != args.len() {
            return Err(BackendError::impossible(format!(
                "expected {} type arguments, got {}",
                params.len(),
                args.len()
            )));
        }
        params
            .iter()
            .zip(args)
            .map(|(param, arg)| Ok(TypeBinding { param: *param, is_ref: self.is_ref_type(*arg)? }))
            .collect()
    }

    /// The bindings of the class or interface type parameters of `ty`.
    pub(crate) fn type_bindings_of(&self, ty: TypeId) -> BackendResult<Vec<TypeBinding>> {
        let prg = self.prg;
        match &prg[ty] {
            Type::Class { decl, args } | Type::Interface { decl, args } => {
                self.bindings_core(prg.type_params(*decl), args)
            }
            Type::This { class } => prg
                .type_params(*class)
                .iter()
                .map(|p| self.current_binding(*p))
                .collect(),
            _ => Ok(Vec::new()),
        }
    }

    pub(crate) fn current_binding(&self, param: DeclId) -> BackendResult<TypeBinding> {
        match self.lookup_binding(param) {
            Some(is_ref) => Ok(TypeBinding { param, is_ref }),
            None => Err(BackendError::impossible(format!(
                "unbound type parameter {}",
                self.prg[param].name
            ))),
        }
    }

    /// Appends the bindings of the generic functions and classes enclosing `decl`,
    /// taken from the bindings currently in scope.
    pub(crate) fn add_enclosing_bindings(
        &self,
        bindings: &mut Vec<TypeBinding>,
        decl: DeclId,
    ) -> BackendResult {
        let prg = self.prg;
        let mut cur = prg.enclosing_function(decl);
        while let Some(fun) = cur {
            for param in prg.type_params(fun) {
                if bindings.iter().all(|b| b.param != *param) {
                    bindings.push(self.current_binding(*param)?);
                }
            }
            cur = prg.enclosing_function(fun);
        }
        Ok(())
    }

    pub(crate) fn enclosing_bindings(&self, decl: DeclId) -> BackendResult<Vec<TypeBinding>> {
        let mut bindings = Vec::new();
        self.add_enclosing_bindings(&mut bindings, decl)?;
        Ok(bindings)
    }

    pub(crate) fn is_generic_function(&self, decl: DeclId) -> bool {
        !self.prg.type_params(decl).is_empty()
    }

    /// Whether a function has type parameters of its own, not just those of its class.
    pub(crate) fn has_own_type_params(&self, decl: DeclId) -> bool {
        self.prg[decl].as_function().is_some_and(|f| !f.type_params.is_empty())
    }

    pub(crate) fn has_generic_parent(&self, decl: DeclId) -> bool {
        let prg = self.prg;
        let mut cur = prg.enclosing_function(decl);
        while let Some(fun) = cur {
            if self.is_generic_function(fun) {
                return true;
            }
            cur = prg.enclosing_function(fun);
        }
        false
    }

    /// A readable name used in labels, e.g. `Point.norm` or `inline`.
    pub(crate) fn decl_label_name(&self, decl: DeclId) -> String {
        let prg = self.prg;
        let d = &prg[decl];
        match &d.kind {
            DeclKind::Function(f) if f.fun_kind == FunctionKind::Constructor => {
                match prg.owning_class(decl) {
                    Some(cls) => format!("{}.constructor", prg[cls].name),
                    None => "constructor".to_owned(),
                }
            }
            DeclKind::Function(f) if f.fun_kind == FunctionKind::Expression && d.name.is_empty() => {
                "inline".to_owned()
            }
            _ => prg.qualified_name(decl),
        }
    }

    /// The label of the instance of `decl` compiled for `bindings`.
    pub(crate) fn function_label(&self, decl: DeclId, bindings: &[TypeBinding]) -> String {
        format!("_{}__P{}{}", sanitize(&self.decl_label_name(decl)), decl.0, ref_mask(bindings))
    }
}
