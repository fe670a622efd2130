use std::ops::Index;

use serde_derive::{Deserialize, Serialize};

use crate::decls::*;
use crate::exprs::{Expr, ExprKind};
use crate::ids::*;
use crate::stmts::{Pattern, Stmt, StmtKind, VarBinding};
use crate::types::{MemberSig, Type};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    /// Source text, used to compute line and column information.
    #[serde(default)]
    pub source: Option<String>,
    /// Library files are not part of the user's own code.
    #[serde(default)]
    pub is_library: bool,
    /// Top-level statements in order.
    #[serde(default)]
    pub statements: Vec<StmtId>,
}

/// A type-checked program.
///
/// All nodes live in arenas and refer to each other by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub files: Vec<SourceFile>,
    pub decls: Vec<Decl>,
    pub stmts: Vec<Stmt>,
    pub exprs: Vec<Expr>,
    pub types: Vec<Type>,
}

impl Index<DeclId> for Program {
    type Output = Decl;

    fn index(&self, id: DeclId) -> &Decl {
        &self.decls[id.index()]
    }
}

impl Index<StmtId> for Program {
    type Output = Stmt;

    fn index(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }
}

impl Index<ExprId> for Program {
    type Output = Expr;

    fn index(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }
}

impl Index<TypeId> for Program {
    type Output = Type;

    fn index(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }
}

impl Index<FileId> for Program {
    type Output = SourceFile;

    fn index(&self, id: FileId) -> &SourceFile {
        &self.files[id.index()]
    }
}

impl Program {
    /// Checks that every id stored in the program is in bounds, that types only refer
    /// to types interned before them and that declaration parents form a forest.
    pub fn validate(&self) -> Result<(), String> {
        let v = Validator { prg: self };
        for (idx, file) in self.files.iter().enumerate() {
            v.stmts(&file.statements).map_err(|e| format!("file {idx}: {e}"))?;
        }
        for (idx, ty) in self.types.iter().enumerate() {
            v.ty_components(ty, idx).map_err(|e| format!("type {idx}: {e}"))?;
        }
        for (idx, decl) in self.decls.iter().enumerate() {
            v.decl(decl).map_err(|e| format!("declaration {idx} ({}): {e}", decl.name))?;
        }
        for (idx, stmt) in self.stmts.iter().enumerate() {
            v.stmt(stmt).map_err(|e| format!("statement {idx}: {e}"))?;
        }
        for (idx, expr) in self.exprs.iter().enumerate() {
            v.expr(expr).map_err(|e| format!("expression {idx}: {e}"))?;
        }
        self.check_parent_cycles()
    }

    fn check_parent_cycles(&self) -> Result<(), String> {
        // 0: unvisited, 1: on the current path, 2: known to reach a root
        let mut state = vec![0u8; self.decls.len()];
        for start in 0..self.decls.len() {
            let mut path = Vec::new();
            let mut cur = Some(start);
            while let Some(idx) = cur {
                match state[idx] {
                    2 => break,
                    1 => return Err(format!("declaration {} is its own ancestor", self.decls[idx].name)),
                    _ => {}
                }
                state[idx] = 1;
                path.push(idx);
                cur = self.decls[idx].parent.map(|p| p.index());
            }
            for idx in path {
                state[idx] = 2;
            }
        }
        Ok(())
    }

    /// `class` followed by its base classes, innermost first. Stops at the first
    /// class seen twice, so cyclic heritage is left to the backend to report.
    pub fn class_chain(&self, class: DeclId) -> Vec<DeclId> {
        let mut chain = vec![class];
        while let Some(next) = chain.last().and_then(|c| self.base_class(*c)) {
            if chain.contains(&next) {
                break;
            }
            chain.push(next);
        }
        chain
    }

    /// The class named by the `extends` clause of `class`, if it names a class.
    pub fn base_class(&self, class: DeclId) -> Option<DeclId> {
        self.base_class_type(class).and_then(|t| match &self[t] {
            Type::Class { decl, .. } => Some(*decl),
            _ => None,
        })
    }

    /// The innermost function declaration enclosing `decl`.
    pub fn enclosing_function(&self, decl: DeclId) -> Option<DeclId> {
        let mut cur = self[decl].parent;
        while let Some(p) = cur {
            if self[p].is_function() {
                return Some(p);
            }
            cur = self[p].parent;
        }
        None
    }

    /// The class a method, accessor, constructor or field belongs to.
    pub fn owning_class(&self, decl: DeclId) -> Option<DeclId> {
        let parent = self[decl].parent?;
        self[parent].as_class().map(|_| parent)
    }

    /// Methods, accessors and constructors declared in a class body.
    pub fn is_class_function(&self, decl: DeclId) -> bool {
        self[decl].is_function() && self.owning_class(decl).is_some()
    }

    /// Variables declared outside of any function are stored in globals.
    pub fn is_global_var(&self, decl: DeclId) -> bool {
        matches!(self[decl].kind, DeclKind::Variable(_)) && self.enclosing_function(decl).is_none()
    }

    pub fn is_static_field(&self, decl: DeclId) -> bool {
        matches!(&self[decl].kind, DeclKind::Field(f) if f.is_static)
    }

    /// The type parameters a compiled instance of `decl` is specialized over.
    ///
    /// Class functions without type parameters of their own are specialized over the
    /// class's type parameters.
    pub fn type_params(&self, decl: DeclId) -> &[DeclId] {
        match &self[decl].kind {
            DeclKind::Function(f) if !f.type_params.is_empty() => &f.type_params,
            DeclKind::Function(_) => match self.owning_class(decl) {
                Some(cls) => self.type_params(cls),
                None => &[],
            },
            DeclKind::Class(c) => &c.type_params,
            DeclKind::Interface(i) => &i.type_params,
            _ => &[],
        }
    }

    /// The declared type of a value declaration.
    pub fn decl_type(&self, decl: DeclId) -> Option<TypeId> {
        match &self[decl].kind {
            DeclKind::Function(f) => Some(f.ty),
            DeclKind::Variable(v) => Some(v.ty),
            DeclKind::Parameter(p) => Some(p.ty),
            DeclKind::Field(f) => Some(f.ty),
            DeclKind::Signature(s) => Some(s.ty),
            _ => None,
        }
    }

    /// The first type of the `extends` clause of a class.
    pub fn base_class_type(&self, class: DeclId) -> Option<TypeId> {
        self[class].as_class().and_then(|c| c.extends.first().copied())
    }

    pub fn class_members(&self, class: DeclId) -> &[DeclId] {
        self[class].as_class().map(|c| c.members.as_slice()).unwrap_or(&[])
    }

    /// A class member by name, searching the inheritance chain.
    pub fn find_member(&self, class: DeclId, name: &str) -> Option<DeclId> {
        self.class_chain(class)
            .into_iter()
            .find_map(|c| self.class_members(c).iter().find(|m| self[**m].name == name).copied())
    }

    /// The structural members of an interface or class type, as seen by the subtype checker.
    pub fn structural_members(&self, ty: TypeId) -> Vec<MemberSig> {
        match &self[ty] {
            Type::Object { members } => members.clone(),
            Type::Interface { decl, .. } => match &self[*decl].kind {
                DeclKind::Interface(iface) => iface
                    .members
                    .iter()
                    .filter_map(|m| match &self[*m].kind {
                        DeclKind::Signature(sig) => Some(MemberSig {
                            name: self[*m].name.clone(),
                            ty: sig.ty,
                            optional: sig.optional,
                        }),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            },
            Type::Class { decl, .. } => {
                let mut out: Vec<MemberSig> = Vec::new();
                for c in self.class_chain(*decl) {
                    for m in self.class_members(c) {
                        let d = &self[*m];
                        let ty = match &d.kind {
                            DeclKind::Field(f) if !f.is_static => f.ty,
                            DeclKind::Function(f) if !f.is_static => match f.fun_kind {
                                FunctionKind::Method => f.ty,
                                FunctionKind::Getter => f.ret,
                                _ => continue,
                            },
                            _ => continue,
                        };
                        if out.iter().all(|o| o.name != d.name) {
                            out.push(MemberSig { name: d.name.clone(), ty, optional: false });
                        }
                    }
                }
                out
            }
            _ => Vec::new(),
        }
    }

    /// Qualified name of a declaration, e.g. `ns.Class.method`.
    pub fn qualified_name(&self, decl: DeclId) -> String {
        let mut parts = vec![self[decl].name.as_str()];
        let mut cur = self[decl].parent;
        while let Some(p) = cur {
            if matches!(self[p].kind, DeclKind::Namespace(_) | DeclKind::Class(_)) {
                parts.push(self[p].name.as_str());
            }
            cur = self[p].parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// A readable rendering of a type for diagnostics.
    pub fn type_to_string(&self, ty: TypeId) -> String {
        let args = |args: &[TypeId]| {
            if args.is_empty() {
                String::new()
            } else {
                let args: Vec<_> = args.iter().map(|a| self.type_to_string(*a)).collect();
                format!("<{}>", args.join(", "))
            }
        };
        match &self[ty] {
            Type::Any => "any".to_owned(),
            Type::Void => "void".to_owned(),
            Type::Null => "null".to_owned(),
            Type::Undefined => "undefined".to_owned(),
            Type::Number => "number".to_owned(),
            Type::Boolean => "boolean".to_owned(),
            Type::String => "string".to_owned(),
            Type::Enum { decl } | Type::Param { decl } => self[*decl].name.clone(),
            Type::Class { decl, args: a } | Type::Interface { decl, args: a } => {
                format!("{}{}", self[*decl].name, args(a))
            }
            Type::Object { members } => {
                let members: Vec<_> = members
                    .iter()
                    .map(|m| {
                        let opt = if m.optional { "?" } else { "" };
                        format!("{}{opt}: {}", m.name, self.type_to_string(m.ty))
                    })
                    .collect();
                format!("{{ {} }}", members.join("; "))
            }
            Type::Array { elem } => format!("{}[]", self.type_to_string(*elem)),
            Type::Function { params, ret } => {
                let params: Vec<_> = params.iter().map(|p| self.type_to_string(*p)).collect();
                format!("({}) => {}", params.join(", "), self.type_to_string(*ret))
            }
            Type::This { .. } => "this".to_owned(),
        }
    }
}

/// Bounds checks for the ids stored in the nodes of a program.
struct Validator<'a> {
    prg: &'a Program,
}

fn in_bounds(what: &str, idx: usize, len: usize) -> Result<(), String> {
    if idx < len { Ok(()) } else { Err(format!("{what} id {idx} out of bounds")) }
}

impl Validator<'_> {
    fn file(&self, id: FileId) -> Result<(), String> {
        in_bounds("file", id.index(), self.prg.files.len())
    }

    fn decl_id(&self, id: DeclId) -> Result<(), String> {
        in_bounds("declaration", id.index(), self.prg.decls.len())
    }

    fn decls(&self, ids: &[DeclId]) -> Result<(), String> {
        ids.iter().try_for_each(|id| self.decl_id(*id))
    }

    fn stmt_id(&self, id: StmtId) -> Result<(), String> {
        in_bounds("statement", id.index(), self.prg.stmts.len())
    }

    fn stmts(&self, ids: &[StmtId]) -> Result<(), String> {
        ids.iter().try_for_each(|id| self.stmt_id(*id))
    }

    fn expr_id(&self, id: ExprId) -> Result<(), String> {
        in_bounds("expression", id.index(), self.prg.exprs.len())
    }

    fn exprs(&self, ids: &[ExprId]) -> Result<(), String> {
        ids.iter().try_for_each(|id| self.expr_id(*id))
    }

    fn ty(&self, id: TypeId) -> Result<(), String> {
        in_bounds("type", id.index(), self.prg.types.len())
    }

    fn types(&self, ids: &[TypeId]) -> Result<(), String> {
        ids.iter().try_for_each(|id| self.ty(*id))
    }

    /// Components of the type at `own` must be interned before it.
    fn ty_components(&self, ty: &Type, own: usize) -> Result<(), String> {
        let earlier = |id: &TypeId| in_bounds("component type", id.index(), own);
        match ty {
            Type::Any | Type::Void | Type::Null | Type::Undefined | Type::Number | Type::Boolean | Type::String => {
                Ok(())
            }
            Type::Enum { decl } | Type::Param { decl } | Type::This { class: decl } => self.decl_id(*decl),
            Type::Class { decl, args } | Type::Interface { decl, args } => {
                self.decl_id(*decl)?;
                args.iter().try_for_each(earlier)
            }
            Type::Object { members } => members.iter().try_for_each(|m| earlier(&m.ty)),
            Type::Array { elem } => earlier(elem),
            Type::Function { params, ret } => {
                params.iter().try_for_each(earlier)?;
                earlier(ret)
            }
        }
    }

    fn decl(&self, decl: &Decl) -> Result<(), String> {
        self.file(decl.file)?;
        if let Some(parent) = decl.parent {
            self.decl_id(parent)?;
        }
        match &decl.kind {
            DeclKind::Function(f) => {
                self.decls(&f.type_params)?;
                self.decls(&f.params)?;
                self.ty(f.ret)?;
                self.ty(f.ty)?;
                match f.body {
                    Some(FunctionBody::Block(s)) => self.stmt_id(s),
                    Some(FunctionBody::Expr(e)) => self.expr_id(e),
                    None => Ok(()),
                }
            }
            DeclKind::Variable(v) => {
                self.ty(v.ty)?;
                v.init.map_or(Ok(()), |e| self.expr_id(e))
            }
            DeclKind::Parameter(p) => {
                self.ty(p.ty)?;
                p.default.map_or(Ok(()), |e| self.expr_id(e))
            }
            DeclKind::Class(c) => {
                self.decls(&c.type_params)?;
                self.types(&c.extends)?;
                self.types(&c.implements)?;
                self.decls(&c.members)
            }
            DeclKind::Field(f) => {
                self.ty(f.ty)?;
                f.init.map_or(Ok(()), |e| self.expr_id(e))
            }
            DeclKind::Interface(i) => {
                self.decls(&i.type_params)?;
                self.decls(&i.members)
            }
            DeclKind::Signature(s) => self.ty(s.ty),
            DeclKind::TypeParam => Ok(()),
            DeclKind::Enum(e) => self.decls(&e.members),
            DeclKind::EnumMember(m) => m.init.map_or(Ok(()), |e| self.expr_id(e)),
            DeclKind::Namespace(ns) => self.stmts(&ns.body),
        }
    }

    fn stmt(&self, stmt: &Stmt) -> Result<(), String> {
        self.file(stmt.file)?;
        let opt_stmt = |s: &Option<StmtId>| s.map_or(Ok(()), |s| self.stmt_id(s));
        let opt_expr = |e: &Option<ExprId>| e.map_or(Ok(()), |e| self.expr_id(e));
        match &stmt.kind {
            StmtKind::Block { stmts } => self.stmts(stmts),
            StmtKind::Expr { expr } | StmtKind::Throw { value: expr } => self.expr_id(*expr),
            StmtKind::Var { bindings } => bindings.iter().try_for_each(|b| match b {
                VarBinding::Single(decl) => self.decl_id(*decl),
                VarBinding::Pattern { pattern, init } => {
                    self.expr_id(*init)?;
                    match pattern {
                        Pattern::Object(props) => props.iter().try_for_each(|(_, d)| self.decl_id(*d)),
                        Pattern::Array(elems) => elems.iter().flatten().try_for_each(|d| self.decl_id(*d)),
                    }
                }
            }),
            StmtKind::If { cond, then, els } => {
                self.expr_id(*cond)?;
                self.stmt_id(*then)?;
                opt_stmt(els)
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                self.expr_id(*cond)?;
                self.stmt_id(*body)
            }
            StmtKind::For { init, cond, update, body } => {
                opt_stmt(init)?;
                opt_expr(cond)?;
                opt_expr(update)?;
                self.stmt_id(*body)
            }
            StmtKind::ForOf { var, iterable: object, body } | StmtKind::ForIn { var, object, body } => {
                self.decl_id(*var)?;
                self.expr_id(*object)?;
                self.stmt_id(*body)
            }
            StmtKind::Return { value } => opt_expr(value),
            StmtKind::Switch { discriminant, cases } => {
                self.expr_id(*discriminant)?;
                cases.iter().try_for_each(|c| {
                    opt_expr(&c.test)?;
                    self.stmts(&c.body)
                })
            }
            StmtKind::Labeled { body, .. } => self.stmt_id(*body),
            StmtKind::Function { decl }
            | StmtKind::Class { decl }
            | StmtKind::Interface { decl }
            | StmtKind::Enum { decl }
            | StmtKind::Namespace { decl } => self.decl_id(*decl),
            StmtKind::Try { block, handler, finalizer } => {
                self.stmt_id(*block)?;
                opt_stmt(handler)?;
                opt_stmt(finalizer)
            }
            StmtKind::With { object, body } => {
                self.expr_id(*object)?;
                self.stmt_id(*body)
            }
            StmtKind::Break { .. }
            | StmtKind::Continue { .. }
            | StmtKind::TypeAlias { .. }
            | StmtKind::Debugger
            | StmtKind::Empty => Ok(()),
        }
    }

    fn expr(&self, expr: &Expr) -> Result<(), String> {
        self.file(expr.file)?;
        self.ty(expr.ty)?;
        match &expr.kind {
            ExprKind::Number { .. }
            | ExprKind::String { .. }
            | ExprKind::Boolean { .. }
            | ExprKind::Null
            | ExprKind::Undefined
            | ExprKind::This
            | ExprKind::Super => Ok(()),
            ExprKind::Template { spans, .. } => spans.iter().try_for_each(|(e, _)| self.expr_id(*e)),
            ExprKind::Ident { decl } | ExprKind::Function { decl } | ExprKind::Class { decl } => {
                self.decl_id(*decl)
            }
            ExprKind::Property { object, decl, .. } => {
                self.expr_id(*object)?;
                decl.map_or(Ok(()), |d| self.decl_id(d))
            }
            ExprKind::Index { object, index } => {
                self.expr_id(*object)?;
                self.expr_id(*index)
            }
            ExprKind::Call { callee, args, type_args } => {
                self.expr_id(*callee)?;
                self.exprs(args)?;
                self.types(type_args)
            }
            ExprKind::New { args } | ExprKind::Array { elems: args } => self.exprs(args),
            ExprKind::Binary { left, right, .. } => {
                self.expr_id(*left)?;
                self.expr_id(*right)
            }
            ExprKind::Assign { target, value, .. } => {
                self.expr_id(*target)?;
                self.expr_id(*value)
            }
            ExprKind::Unary { operand, .. } | ExprKind::Postfix { operand, .. } => self.expr_id(*operand),
            ExprKind::Conditional { cond, then, els } => self.exprs(&[*cond, *then, *els]),
            ExprKind::Object { props } => props.iter().try_for_each(|(_, e)| self.expr_id(*e)),
            ExprKind::As { expr, target } => {
                self.expr_id(*expr)?;
                self.ty(*target)
            }
            ExprKind::Paren { expr }
            | ExprKind::TypeOf { expr }
            | ExprKind::Delete { expr }
            | ExprKind::Void { expr }
            | ExprKind::Spread { expr }
            | ExprKind::Await { expr }
            | ExprKind::TaggedTemplate { tag: expr } => self.expr_id(*expr),
            ExprKind::Yield { expr } => expr.map_or(Ok(()), |e| self.expr_id(e)),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::builder::ProgramBuilder;
    use crate::decls::DeclKind;
    use crate::exprs::ExprKind;
    use crate::ids::{DeclId, StmtId, TypeId};
    use crate::stmts::StmtKind;
    use crate::types::Type;

    #[test]
    fn built_programs_are_valid() {
        let mut b = ProgramBuilder::new();
        let f = b.function("f", None);
        let num = b.number();
        b.signature(f, &[("x", num)], num);
        let call = b.call_fn(f, vec![], vec![]);
        let stmt = b.expr_stmt(call);
        b.push_top_level(stmt);
        assert_eq!(b.finish().validate(), Ok(()));
    }

    #[test]
    fn dangling_ids_inside_nodes_are_rejected() {
        let mut b = ProgramBuilder::new();
        let one = b.num(1.0);
        let stmt = b.expr_stmt(one);
        b.push_top_level(stmt);
        let mut prg = b.finish();
        prg.exprs[one.index()].kind = ExprKind::Ident { decl: DeclId(999) };
        let err = prg.validate().unwrap_err();
        assert!(err.contains("declaration id 999 out of bounds"), "{err}");

        prg.exprs[one.index()].kind = ExprKind::Number { value: 1.0 };
        prg.stmts[stmt.index()].kind = StmtKind::Block { stmts: vec![StmtId(42)] };
        assert!(prg.validate().is_err());
    }

    #[test]
    fn dangling_ids_inside_types_are_rejected() {
        let mut b = ProgramBuilder::new();
        let num = b.number();
        let arr = b.array_of(num);
        let mut prg = b.finish();
        prg.types[arr.index()] = Type::Class { decl: DeclId(7), args: vec![] };
        assert!(prg.validate().is_err());
        prg.types[arr.index()] = Type::Array { elem: arr };
        assert!(prg.validate().is_err());
        prg.types[arr.index()] = Type::Array { elem: TypeId(0) };
        assert_eq!(prg.validate(), Ok(()));
    }

    #[test]
    fn parent_cycles_are_rejected() {
        let mut b = ProgramBuilder::new();
        let outer = b.function("outer", None);
        let inner = b.function("inner", Some(outer));
        let mut prg = b.finish();
        prg.decls[outer.index()].parent = Some(inner);
        let err = prg.validate().unwrap_err();
        assert!(err.contains("is its own ancestor"), "{err}");
    }

    #[test]
    fn class_chain_stops_at_cycles() {
        let mut b = ProgramBuilder::new();
        let a = b.class("A", None);
        let c = b.class("B", None);
        let a_ty = b.class_type(a, vec![]);
        let c_ty = b.class_type(c, vec![]);
        b.extends(a, c_ty);
        b.extends(c, a_ty);
        let prg = b.finish();
        assert_eq!(prg.class_chain(a), vec![a, c]);
        assert!(matches!(prg[a].kind, DeclKind::Class(_)));
        assert_eq!(prg.find_member(a, "missing"), None);
    }

    /// Methods see the type parameters of their class.
    #[test]
    fn class_functions_inherit_type_params() {
        let mut b = ProgramBuilder::new();
        let cls = b.class("Box", None);
        let (t, _) = b.type_param(cls, "T");
        let get = b.function("get", Some(cls));
        let prg = b.finish();
        assert_eq!(prg.type_params(get), &[t]);
        assert!(prg.is_class_function(get));
        assert_eq!(prg.owning_class(get), Some(cls));
    }

    #[test]
    fn enclosing_function_skips_blocks_and_classes() {
        let mut b = ProgramBuilder::new();
        let outer = b.function("outer", None);
        let num = b.number();
        let local = b.variable("x", num, None, Some(outer));
        let global = b.variable("g", num, None, None);
        let prg = b.finish();
        assert_eq!(prg.enclosing_function(local), Some(outer));
        assert!(!prg.is_global_var(local));
        assert!(prg.is_global_var(global));
    }

    #[test]
    fn members_are_found_through_the_base_chain() {
        let mut b = ProgramBuilder::new();
        let num = b.number();
        let a = b.class("A", None);
        let x = b.field(a, "x", num);
        let a_ty = b.class_type(a, vec![]);
        let c = b.class("B", None);
        b.extends(c, a_ty);
        let y = b.field(c, "y", num);
        let c_ty = b.class_type(c, vec![]);
        let prg = b.finish();
        assert_eq!(prg.find_member(c, "x"), Some(x));
        assert_eq!(prg.find_member(c, "y"), Some(y));
        assert_eq!(prg.find_member(a, "y"), None);
        let names: Vec<_> = prg.structural_members(c_ty).into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["y".to_owned(), "x".to_owned()]);
        assert_eq!(prg.qualified_name(x), "A.x");
    }

    #[test]
    fn type_to_string() {
        let mut b = ProgramBuilder::new();
        let num = b.number();
        let arr = b.array_of(num);
        let s = b.string();
        let fun = b.fun_type(vec![arr, s], num);
        let obj = b.object_type(&[("a", num)]);
        let prg = b.finish();
        assert_eq!(prg.type_to_string(fun), "(number[], string) => number");
        assert_eq!(prg.type_to_string(obj), "{ a: number }");
        assert!(matches!(prg[arr], Type::Array { .. }));
    }
}
