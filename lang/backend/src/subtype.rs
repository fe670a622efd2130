//! Structural subtyping, used to reject unsafe casts, assignments and arguments.

use fxhash::FxHashMap;

use corvid_lang_ast::{DeclId, MemberSig, Program, Type, TypeId};

use crate::ctx::Ctx;
use crate::result::{BackendError, BackendResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtypeResult {
    pub ok: bool,
    pub reason: Option<String>,
}

impl SubtypeResult {
    fn ok() -> Self {
        SubtypeResult { ok: true, reason: None }
    }

    fn fail(reason: String) -> Self {
        SubtypeResult { ok: false, reason: Some(reason) }
    }
}

/// Memoized subtype checks over the types of one program.
///
/// Pairs currently being checked are assumed to hold, which makes recursive types
/// terminate.
pub struct SubtypeChecker<'p> {
    prg: &'p Program,
    memo: FxHashMap<(TypeId, TypeId), SubtypeResult>,
    in_progress: Vec<(TypeId, TypeId)>,
}

impl<'p> SubtypeChecker<'p> {
    pub fn new(prg: &'p Program) -> Self {
        SubtypeChecker { prg, memo: FxHashMap::default(), in_progress: Vec::new() }
    }

    pub fn check(&mut self, sub: TypeId, sup: TypeId) -> SubtypeResult {
        let prg = self.prg;
        if sub == sup || prg[sub] == prg[sup] {
            return SubtypeResult::ok();
        }
        let key = (sub, sup);
        if let Some(res) = self.memo.get(&key) {
            log::trace!("Subtype memo hit for {} <: {}", prg.type_to_string(sub), prg.type_to_string(sup));
            return res.clone();
        }
        if self.in_progress.contains(&key) {
            return SubtypeResult::ok();
        }
        self.in_progress.push(key);
        let res = self.check_core(sub, sup);
        self.in_progress.pop();
        self.memo.insert(key, res.clone());
        res
    }

    fn check_core(&mut self, sub: TypeId, sup: TypeId) -> SubtypeResult {
        let prg = self.prg;
        let (sub_ty, sup_ty) = (&prg[sub], &prg[sup]);
        if matches!(sub_ty, Type::Any) || matches!(sup_ty, Type::Any) {
            return SubtypeResult::fail("Unsupported type: any.".to_owned());
        }
        // type parameters were checked against their constraints by the front end
        if matches!(sub_ty, Type::Param { .. }) || matches!(sup_ty, Type::Param { .. }) {
            return SubtypeResult::ok();
        }
        if sup_ty.is_structural() {
            match sub_ty {
                Type::Null | Type::Undefined => return SubtypeResult::ok(),
                Type::Class { .. } | Type::Interface { .. } | Type::Object { .. } | Type::This { .. } => {}
                _ => {
                    return SubtypeResult::fail(format!(
                        "Cast to class/interface not supported for {}",
                        prg.type_to_string(sub)
                    ));
                }
            }
        }
        match (sub_ty, sup_ty) {
            (Type::Class { decl: a, .. } | Type::This { class: a }, Type::Class { decl: b, .. }) => {
                if !self.inherits(*a, *b) {
                    return SubtypeResult::fail(format!(
                        "Classes {} and {} are not related",
                        prg[*a].name, prg[*b].name
                    ));
                }
                self.check_members(sub, sup)
            }
            (Type::Function { params: sub_params, ret: sub_ret }, Type::Function { params: sup_params, ret: sup_ret }) => {
                if sup_params.len() < sub_params.len() {
                    return SubtypeResult::fail(format!(
                        "Function type {} takes more arguments than {}",
                        prg.type_to_string(sub),
                        prg.type_to_string(sup)
                    ));
                }
                for (sub_param, sup_param) in sub_params.iter().zip(sup_params) {
                    let res = self.check(*sup_param, *sub_param);
                    if !res.ok {
                        return res;
                    }
                }
                self.check(*sub_ret, *sup_ret)
            }
            (_, Type::Interface { .. } | Type::Object { .. }) => self.check_members(sub, sup),
            (Type::Array { elem: sub_elem }, Type::Array { elem: sup_elem }) => self.check(*sub_elem, *sup_elem),
            _ => SubtypeResult::ok(),
        }
    }

    fn check_members(&mut self, sub: TypeId, sup: TypeId) -> SubtypeResult {
        let prg = self.prg;
        let sub = match &prg[sub] {
            Type::This { class } => self.class_members_of(*class),
            _ => prg.structural_members(sub),
        };
        for member in prg.structural_members(sup) {
            match sub.iter().find(|m| m.name == member.name) {
                None if member.optional => {}
                None => return SubtypeResult::fail(format!("Property {} not present", member.name)),
                Some(found) => {
                    let res = self.check(found.ty, member.ty);
                    if !res.ok {
                        return res;
                    }
                }
            }
        }
        SubtypeResult::ok()
    }

    fn class_members_of(&self, class: DeclId) -> Vec<MemberSig> {
        let prg = self.prg;
        prg.types
            .iter()
            .position(|t| matches!(t, Type::Class { decl, .. } if *decl == class))
            .map(|idx| prg.structural_members(TypeId::from(idx)))
            .unwrap_or_default()
    }

    fn inherits(&self, class: DeclId, base: DeclId) -> bool {
        self.prg.class_chain(class).contains(&base)
    }
}

impl Ctx<'_> {
    /// Rejects a value of type `from` flowing into a place of type `to`.
    ///
    /// A value typed `any`, or a place typed `any`, is dynamic and always accepted. `any`
    /// nested inside structural types is still rejected.
    pub(crate) fn check_subtype(&mut self, from: TypeId, to: TypeId) -> BackendResult {
        let prg = self.prg;
        if matches!(prg[from], Type::Any) || matches!(prg[to], Type::Any) {
            return Ok(());
        }
        let res = self.subtypes.check(from, to);
        if res.ok {
            return Ok(());
        }
        Err(Box::new(BackendError::InvalidCast {
            from: prg.type_to_string(from),
            to: prg.type_to_string(to),
            reason: res.reason.unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod test {
    use corvid_lang_ast::ProgramBuilder;

    use super::*;

    #[test]
    fn missing_member_is_reported() {
        let mut b = ProgramBuilder::new();
        let num = b.number();
        let iface = b.interface("Pair");
        b.member_sig(iface, "a", num, false, false);
        b.member_sig(iface, "b", num, false, false);
        let iface_ty = b.iface_type(iface, vec![]);
        let lit_ty = b.object_type(&[("a", num)]);
        let prg = b.finish();

        let mut checker = SubtypeChecker::new(&prg);
        let res = checker.check(lit_ty, iface_ty);
        assert!(!res.ok);
        assert_eq!(res.reason.as_deref(), Some("Property b not present"));
    }

    #[test]
    fn optional_members_may_be_missing() {
        let mut b = ProgramBuilder::new();
        let num = b.number();
        let iface = b.interface("Opt");
        b.member_sig(iface, "a", num, false, false);
        b.member_sig(iface, "b", num, true, false);
        let iface_ty = b.iface_type(iface, vec![]);
        let lit_ty = b.object_type(&[("a", num)]);
        let prg = b.finish();

        assert!(SubtypeChecker::new(&prg).check(lit_ty, iface_ty).ok);
    }

    #[test]
    fn primitives_do_not_cast_to_interfaces() {
        let mut b = ProgramBuilder::new();
        let num = b.number();
        let null = b.null_type();
        let iface = b.interface("Empty");
        let iface_ty = b.iface_type(iface, vec![]);
        let prg = b.finish();

        let mut checker = SubtypeChecker::new(&prg);
        assert!(!checker.check(num, iface_ty).ok);
        assert!(checker.check(null, iface_ty).ok);
    }

    #[test]
    fn unrelated_classes() {
        let mut b = ProgramBuilder::new();
        let base = b.class("Base", None);
        let derived = b.class("Derived", None);
        let other = b.class("Other", None);
        let base_ty = b.class_type(base, vec![]);
        b.extends(derived, base_ty);
        let derived_ty = b.class_type(derived, vec![]);
        let other_ty = b.class_type(other, vec![]);
        let prg = b.finish();

        let mut checker = SubtypeChecker::new(&prg);
        assert!(checker.check(derived_ty, base_ty).ok);
        assert!(!checker.check(base_ty, derived_ty).ok);
        assert!(!checker.check(other_ty, base_ty).ok);
    }

    #[test]
    fn functions_are_contravariant_in_parameters() {
        let mut b = ProgramBuilder::new();
        let void = b.void();
        let base = b.class("Base", None);
        let derived = b.class("Derived", None);
        let base_ty = b.class_type(base, vec![]);
        b.extends(derived, base_ty);
        let derived_ty = b.class_type(derived, vec![]);
        let takes_base = b.fun_type(vec![base_ty], void);
        let takes_derived = b.fun_type(vec![derived_ty], void);
        let takes_two = b.fun_type(vec![base_ty, base_ty], void);
        let prg = b.finish();

        let mut checker = SubtypeChecker::new(&prg);
        assert!(checker.check(takes_base, takes_derived).ok);
        assert!(!checker.check(takes_derived, takes_base).ok);
        assert!(!checker.check(takes_two, takes_base).ok);
    }

    #[test]
    fn arrays_are_covariant() {
        let mut b = ProgramBuilder::new();
        let base = b.class("Base", None);
        let derived = b.class("Derived", None);
        let base_ty = b.class_type(base, vec![]);
        b.extends(derived, base_ty);
        let derived_ty = b.class_type(derived, vec![]);
        let bases = b.array_of(base_ty);
        let deriveds = b.array_of(derived_ty);
        let prg = b.finish();

        let mut checker = SubtypeChecker::new(&prg);
        assert!(checker.check(deriveds, bases).ok);
        assert!(!checker.check(bases, deriveds).ok);
    }

    #[test]
    fn type_parameters_are_trusted() {
        let mut b = ProgramBuilder::new();
        let id = b.function("id", None);
        let (_, t_ty) = b.type_param(id, "T");
        let iface = b.interface("Named");
        let iface_ty = b.iface_type(iface, vec![]);
        let prg = b.finish();

        let mut checker = SubtypeChecker::new(&prg);
        assert!(checker.check(t_ty, iface_ty).ok);
        assert!(checker.check(iface_ty, t_ty).ok);
    }

    #[test]
    fn memoized_results_are_stable() {
        let mut b = ProgramBuilder::new();
        let string = b.string();
        let iface = b.interface("Named");
        b.member_sig(iface, "name", string, false, false);
        let iface_ty = b.iface_type(iface, vec![]);
        let lit_ty = b.object_type(&[("title", string)]);
        let prg = b.finish();

        let mut checker = SubtypeChecker::new(&prg);
        let first = checker.check(lit_ty, iface_ty);
        let second = checker.check(lit_ty, iface_ty);
        assert_eq!(first, second);
        assert!(!first.ok);
    }
}
