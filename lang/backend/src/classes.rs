//! Class layout, override linkage, vtables and interface tables.

use corvid_lang_ast::{DeclId, DeclKind, FunctionKind, Type, TypeId};
use corvid_lang_ir::{Action, Expr, FieldRef, ProcId, VTable, VarKey};

use crate::ctx::Ctx;
use crate::generics::{TypeBinding, ref_mask, sanitize};
use crate::result::{BackendError, BackendResult};

/// How many leading fields of a class hold references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefFieldCount {
    /// Reference-counted fields were laid out first.
    Leading(usize),
    /// The class extends another one and its own fields were appended to the base
    /// layout, so the count is recomputed when the vtable is built.
    Inherited,
}

/// The layout of one class instantiation.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub id: String,
    pub decl: DeclId,
    pub bindings: Vec<TypeBinding>,
    pub base: Option<String>,
    /// Instance fields, base class fields first.
    pub fields: Vec<DeclId>,
    pub field_is_ref: Vec<bool>,
    pub ref_fields: RefFieldCount,
    /// Methods and accessors declared by this class, without the constructor.
    pub methods: Vec<DeclId>,
    pub is_used: bool,
    /// Vtable keys and the methods occupying them.
    pub slots: Option<Vec<(String, DeclId)>>,
}

impl ClassInfo {
    fn new(id: String, decl: DeclId, bindings: Vec<TypeBinding>) -> Self {
        ClassInfo {
            id,
            decl,
            bindings,
            base: None,
            fields: Vec::new(),
            field_is_ref: Vec::new(),
            ref_fields: RefFieldCount::Leading(0),
            methods: Vec::new(),
            is_used: false,
            slots: None,
        }
    }
}

impl Ctx<'_> {
    /// The key under which a method overrides and is overridden.
    pub(crate) fn class_function_key(&self, method: DeclId) -> String {
        let d = &self.prg[method];
        let prefix = match d.as_function().map(|f| f.fun_kind) {
            Some(FunctionKind::Constructor) => "new/",
            Some(FunctionKind::Getter) => "get/",
            Some(FunctionKind::Setter) => "set/",
            _ => "",
        };
        format!("{prefix}{}", d.name)
    }

    /// The interface member a method implements.
    pub(crate) fn iface_key(&self, method: DeclId) -> String {
        let d = &self.prg[method];
        match d.as_function().map(|f| f.fun_kind) {
            Some(FunctionKind::Setter) => format!("set/{}", d.name),
            _ => d.name.clone(),
        }
    }

    pub(crate) fn class_ctor(&self, class: DeclId) -> Option<DeclId> {
        let prg = self.prg;
        prg.class_members(class)
            .iter()
            .copied()
            .find(|m| prg[*m].as_function().is_some_and(|f| f.fun_kind == FunctionKind::Constructor))
    }

    /// The class info of a class or `this` type.
    pub(crate) fn class_info_for_type(&mut self, ty: TypeId) -> BackendResult<String> {
        let prg = self.prg;
        match &prg[ty] {
            Type::Class { decl, .. } | Type::This { class: decl } => {
                let bindings = self.type_bindings_of(ty)?;
                self.class_info(*decl, bindings)
            }
            _ => Err(Box::new(BackendError::BadFieldAccess)),
        }
    }

    /// The class info of `decl` instantiated with `bindings`, computed on first use.
    pub(crate) fn class_info(&mut self, decl: DeclId, bindings: Vec<TypeBinding>) -> BackendResult<String> {
        let id = format!("C{}{}", decl.0, ref_mask(&bindings));
        if self.class_infos.contains_key(&id) {
            if self.class_stack.contains(&id) {
                return Err(Box::new(BackendError::CyclicInheritance {
                    name: self.prg[decl].name.clone(),
                }));
            }
            return Ok(id);
        }
        if self.prg[decl].as_class().is_none() {
            return Err(BackendError::impossible(format!("{} is not a class", self.prg[decl].name)));
        }
        log::trace!("New class info {id} for {}", self.prg.qualified_name(decl));
        self.class_infos.insert(id.clone(), ClassInfo::new(id.clone(), decl, bindings.clone()));
        self.class_stack.push(id.clone());
        let res = self.scope(|ctx| {
            ctx.bindings.extend(bindings.iter().copied());
            ctx.fill_class_info(&id)
        });
        self.class_stack.pop();
        match res {
            Ok(()) => Ok(id),
            Err(err) => {
                self.class_infos.shift_remove(&id);
                Err(err)
            }
        }
    }

    fn fill_class_info(&mut self, id: &str) -> BackendResult {
        let prg = self.prg;
        let decl = self.class_infos[id].decl;
        let Some(cls) = prg[decl].as_class() else {
            return Err(BackendError::impossible("class info of a non-class"));
        };
        let base = match cls.extends.as_slice() {
            [] => None,
            [ty] => match &prg[*ty] {
                Type::Class { decl: base, args } => {
                    let bindings = self.bindings_core(prg.type_params(*base), args)?;
                    Some(self.class_info(*base, bindings)?)
                }
                _ => {
                    return Err(Box::new(BackendError::InvalidHeritage {
                        message: "cannot inherit from this type".to_owned(),
                    }));
                }
            },
            _ => {
                return Err(Box::new(BackendError::InvalidHeritage {
                    message: "invalid extends clause".to_owned(),
                }));
            }
        };

        let mut ref_fields = Vec::new();
        let mut prim_fields = Vec::new();
        let mut own_fields = Vec::new();
        let mut methods = Vec::new();
        for member in &cls.members {
            match &prg[*member].kind {
                DeclKind::Field(f) if !f.is_static => {
                    if self.is_ref_type(f.ty)? {
                        ref_fields.push(*member);
                    } else {
                        prim_fields.push(*member);
                    }
                    own_fields.push(*member);
                }
                DeclKind::Function(f) if f.fun_kind != FunctionKind::Constructor => methods.push(*member),
                _ => {}
            }
        }

        let (fields, ref_count) = match &base {
            Some(base) => {
                let mut fields = self.class_infos[base.as_str()].fields.clone();
                fields.extend(own_fields);
                (fields, RefFieldCount::Inherited)
            }
            None => {
                let count = ref_fields.len();
                ref_fields.extend(prim_fields);
                (ref_fields, RefFieldCount::Leading(count))
            }
        };
        let field_is_ref = fields
            .iter()
            .map(|f| match &prg[*f].kind {
                DeclKind::Field(fld) => self.is_ref_type(fld.ty),
                _ => Ok(false),
            })
            .collect::<BackendResult<Vec<_>>>()?;

        let info = &mut self.class_infos[id];
        info.base = base;
        info.fields = fields;
        info.field_is_ref = field_is_ref;
        info.ref_fields = ref_count;
        info.methods = methods;
        let first_instance = self.class_infos.values().filter(|i| i.decl == decl).count() == 1;
        self.link_overrides(id, first_instance);
        Ok(())
    }

    /// Links every method of `id` that overrides a method of a base class to the
    /// top-most method with the same key.
    fn link_overrides(&mut self, id: &str, report: bool) {
        let prg = self.prg;
        let Some(base) = self.class_infos[id].base.clone() else { return };
        let mut inherited: Vec<(String, DeclId)> = Vec::new();
        let mut cur = Some(base);
        while let Some(c) = cur {
            let info = &self.class_infos[c.as_str()];
            for m in &info.methods {
                let key = self.class_function_key(*m);
                match inherited.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = *m,
                    None => inherited.push((key, *m)),
                }
            }
            cur = info.base.clone();
        }
        for method in self.class_infos[id].methods.clone() {
            if prg[method].as_function().is_some_and(|f| f.is_static) {
                continue;
            }
            let key = self.class_function_key(method);
            let Some((_, root)) = inherited.iter().find(|(k, _)| *k == key).cloned() else { continue };
            let param_count = |d: DeclId| prg[d].as_function().map(|f| f.params.len());
            if report && param_count(method) != param_count(root) {
                self.report_at_decl(&BackendError::OverrideParamCount, method);
            }
            self.fn_info(method).virtual_root = Some(root);
            let root_info = self.fn_info(root);
            root_info.virtual_root = Some(root);
            if !root_info.virtual_instances.contains(&method) {
                root_info.virtual_instances.push(method);
            }
        }
    }

    /// Marks a class instantiation as allocated, together with its base classes, its
    /// constructor and every method that may be dispatched to.
    pub(crate) fn mark_class_used(&mut self, id: &str) {
        let info = &mut self.class_infos[id];
        if info.is_used {
            return;
        }
        info.is_used = true;
        let (decl, base, bindings, methods) =
            (info.decl, info.base.clone(), info.bindings.clone(), info.methods.clone());
        if let Some(base) = base {
            self.mark_class_used(&base);
        }
        log::trace!("Class {id} is allocated");
        self.used_classes.push(id.to_owned());
        for method in methods {
            let key = self.iface_key(method);
            if self.is_dispatched_in_chain(id, method) || self.iface_members.contains_key(&key) {
                self.mark_function_used(method, bindings.clone());
            }
        }
        if let Some(ctor) = self.class_ctor(decl) {
            self.mark_function_used(ctor, bindings);
        }
    }

    /// Whether a method with the key of `method` is called through a vtable on the
    /// class `id` or one of its bases.
    fn is_dispatched_in_chain(&self, id: &str, method: DeclId) -> bool {
        let key = self.class_function_key(method);
        let mut cur = Some(id);
        while let Some(c) = cur {
            let info = &self.class_infos[c];
            let dispatched = info.methods.iter().any(|m| {
                self.function_infos.get(m).is_some_and(|f| f.is_dispatched)
                    && self.class_function_key(*m) == key
            });
            if dispatched {
                return true;
            }
            cur = info.base.as_deref();
        }
        false
    }

    fn chain_contains(&self, id: &str, class: DeclId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            let info = &self.class_infos[c];
            if info.decl == class {
                return true;
            }
            cur = info.base.as_deref();
        }
        false
    }

    /// Marks a method as called through a vtable. Every method with the same key in an
    /// allocated subclass becomes reachable.
    pub(crate) fn mark_dispatched(&mut self, method: DeclId) {
        let info = self.fn_info(method);
        if info.is_dispatched {
            return;
        }
        info.is_dispatched = true;
        let Some(owner) = self.prg.owning_class(method) else { return };
        let key = self.class_function_key(method);
        for id in self.used_classes.clone() {
            if !self.chain_contains(&id, owner) {
                continue;
            }
            let info = &self.class_infos[id.as_str()];
            let bindings = info.bindings.clone();
            let found: Vec<DeclId> =
                info.methods.iter().copied().filter(|m| self.class_function_key(*m) == key).collect();
            for m in found {
                self.mark_function_used(m, bindings.clone());
            }
        }
    }

    /// Drops methods that were never compiled and relinks the overrides among the
    /// remaining ones. Dispatched methods are kept, so that call sites on classes that
    /// are never allocated still find their slot.
    pub(crate) fn prune_classes(&mut self) {
        let ids: Vec<String> = self.class_infos.keys().cloned().collect();
        for id in &ids {
            let kept: Vec<DeclId> = self.class_infos[id.as_str()]
                .methods
                .iter()
                .copied()
                .filter(|m| {
                    self.bin.procs_for(Action::Decl(*m)).next().is_some()
                        || self.is_dispatched_in_chain(id, *m)
                })
                .collect();
            self.class_infos[id.as_str()].methods = kept;
        }
        for info in self.function_infos.values_mut() {
            info.virtual_root = None;
            info.virtual_instances.clear();
            info.virtual_index = None;
        }
        for id in &ids {
            self.link_overrides(id, false);
        }
    }

    /// Vtable keys of a class, base slots first, overrides in place.
    fn vtable_slots(&mut self, id: &str) -> Vec<(String, DeclId)> {
        if let Some(slots) = &self.class_infos[id].slots {
            return slots.clone();
        }
        let mut slots = match self.class_infos[id].base.clone() {
            Some(base) => self.vtable_slots(&base),
            None => Vec::new(),
        };
        for method in self.class_infos[id].methods.clone() {
            if self.fn_info(method).virtual_root.is_none() {
                continue;
            }
            let key = self.class_function_key(method);
            let index = match slots.iter().position(|(k, _)| *k == key) {
                Some(index) => {
                    slots[index].1 = method;
                    index
                }
                None => {
                    slots.push((key, method));
                    slots.len() - 1
                }
            };
            self.fn_info(method).virtual_index = Some(index);
        }
        self.class_infos[id].slots = Some(slots.clone());
        slots
    }

    /// The class info in the chain of `id` that declares `method`.
    fn declaring_class(&self, id: &str, method: DeclId) -> Option<String> {
        let mut cur = Some(id.to_owned());
        while let Some(c) = cur {
            let info = &self.class_infos[c.as_str()];
            if info.methods.contains(&method) {
                return Some(c);
            }
            cur = info.base.clone();
        }
        None
    }

    fn method_proc(&self, id: &str, method: DeclId) -> BackendResult<ProcId> {
        let owner = self.declaring_class(id, method).unwrap_or_else(|| id.to_owned());
        let mask = ref_mask(&self.class_infos[owner.as_str()].bindings);
        self.bin.lookup_proc(Action::Decl(method), &mask).ok_or_else(|| {
            BackendError::impossible(format!(
                "no procedure for {} in class {owner}",
                self.prg.qualified_name(method)
            ))
        })
    }

    /// Assigns vtable slots in every class and builds the dispatch tables of the
    /// allocated ones.
    pub(crate) fn emit_vtables(&mut self) {
        let ids: Vec<String> = self.class_infos.keys().cloned().collect();
        for id in &ids {
            self.vtable_slots(id);
        }
        self.bin.vtables.clear();
        for id in self.used_classes.clone() {
            let decl = self.class_infos[id.as_str()].decl;
            match self.build_vtable(&id) {
                Ok(vtable) => self.bin.vtables.push(vtable),
                Err(err) => self.report_at_decl(&err, decl),
            }
        }
    }

    fn build_vtable(&mut self, id: &str) -> BackendResult<VTable> {
        let prg = self.prg;
        let slots = self.vtable_slots(id);
        let methods = slots
            .iter()
            .map(|(_, m)| self.method_proc(id, *m))
            .collect::<BackendResult<Vec<_>>>()?;

        let mut iface_table: Vec<Option<ProcId>> = vec![None; self.iface_members.len()];
        let fields = self.class_infos[id].fields.clone();
        for field in fields {
            let name = prg[field].name.clone();
            if let Some(member) = self.iface_members.get(&name).copied() {
                iface_table[member] = Some(self.field_accessor(id, field, false)?);
            }
            if let Some(member) = self.iface_members.get(&format!("set/{name}")).copied() {
                iface_table[member] = Some(self.field_accessor(id, field, true)?);
            }
        }
        let mut cur = Some(id.to_owned());
        while let Some(c) = cur {
            for method in self.class_infos[c.as_str()].methods.clone() {
                if prg[method].as_function().is_some_and(|f| f.is_static) {
                    continue;
                }
                let Some(member) = self.iface_members.get(&self.iface_key(method)).copied() else {
                    continue;
                };
                if iface_table[member].is_none() {
                    iface_table[member] = Some(self.method_proc(&c, method)?);
                }
            }
            cur = self.class_infos[c.as_str()].base.clone();
        }

        let info = &self.class_infos[id];
        let num_ref_fields = match info.ref_fields {
            RefFieldCount::Leading(n) => n,
            RefFieldCount::Inherited => info.field_is_ref.iter().take_while(|r| **r).count(),
        };
        Ok(VTable {
            class_id: id.to_owned(),
            class_name: prg.qualified_name(info.decl),
            label: format!("{id}_VT"),
            base: info.base.clone(),
            num_fields: info.fields.len(),
            num_ref_fields,
            methods,
            iface_table,
        })
    }

    pub(crate) fn field_ref(&self, id: &str, field: DeclId) -> BackendResult<FieldRef> {
        let prg = self.prg;
        let info = &self.class_infos[id];
        let name = &prg[field].name;
        let Some(index) = info.fields.iter().position(|f| prg[*f].name == *name) else {
            return Err(Box::new(BackendError::FieldNotFound { name: name.clone() }));
        };
        let bit_size = prg[info.fields[index]].as_field().map(|f| f.bit_size).unwrap_or_default();
        Ok(FieldRef { index, name: name.clone(), is_ref: info.field_is_ref[index], bit_size })
    }

    /// A synthesized procedure reading or writing a field, so that fields can satisfy
    /// interface members.
    fn field_accessor(&mut self, id: &str, field: DeclId, setter: bool) -> BackendResult<ProcId> {
        let prg = self.prg;
        let action = if setter { Action::FieldSetter(field) } else { Action::FieldGetter(field) };
        let bindings = self.class_infos[id].bindings.clone();
        let mask = ref_mask(&bindings);
        if let Some(proc) = self.bin.lookup_proc(action, &mask) {
            return Ok(proc);
        }
        let class_name = prg[self.class_infos[id].decl].name.clone();
        let label = format!(
            "_{}_{}_{}__P{}{mask}",
            sanitize(&class_name),
            if setter { "set" } else { "get" },
            sanitize(&prg[field].name),
            field.0
        );
        let fld = self.field_ref(id, field)?;
        let is_ref = fld.is_ref;
        let this_is_ref = self.opts.target.ref_counting;
        let proc_id = self.bin.add_proc(action, label, &mask);
        let proc = self.bin.proc_mut(proc_id);
        proc.class_id = Some(id.to_owned());
        let this = proc.mk_arg(VarKey::This(field), "this", this_is_ref, false);
        let access = Expr::field(this.load(), fld);
        if setter {
            let value = proc.mk_arg(VarKey::Decl(field), "v", is_ref, false);
            proc.emit_expr(Expr::store(access, value.load()));
        } else {
            let lbl = proc.mk_label("final");
            proc.emit_jmp_value(&lbl, access);
            proc.emit_label(&lbl);
        }
        proc.emit_clrs();
        Ok(proc_id)
    }

    /// Marks every method of allocated classes implementing an interface member.
    pub(crate) fn iface_member_id(&mut self, name: &str) -> usize {
        if let Some(id) = self.iface_members.get(name) {
            return *id;
        }
        for class in self.used_classes.clone() {
            let info = &self.class_infos[class.as_str()];
            let bindings = info.bindings.clone();
            let found: Vec<DeclId> =
                info.methods.iter().copied().filter(|m| self.iface_key(*m) == name).collect();
            for method in found {
                self.mark_function_used(method, bindings.clone());
            }
        }
        let id = self.iface_members.len();
        log::trace!("New interface member {name} with id {id}");
        self.iface_members.insert(name.to_owned(), id);
        id
    }
}
