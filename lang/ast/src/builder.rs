//! Programmatic construction of programs, used by tools and tests.

use fxhash::FxHashMap;

use corvid_lang_miette_util::Span;

use crate::decls::*;
use crate::exprs::*;
use crate::ids::*;
use crate::program::{Program, SourceFile};
use crate::stmts::{Stmt, StmtKind, VarBinding};
use crate::types::{MemberSig, Type};

pub struct ProgramBuilder {
    prg: Program,
    interned: FxHashMap<Type, TypeId>,
    file: FileId,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    /// A builder with a single user file named `main.ts`.
    pub fn new() -> Self {
        let mut builder =
            ProgramBuilder { prg: Program::default(), interned: FxHashMap::default(), file: FileId(0) };
        builder.add_file("main.ts", false);
        builder
    }

    /// Adds a file and makes it the target of subsequent declarations and statements.
    pub fn add_file(&mut self, name: &str, is_library: bool) -> FileId {
        self.prg.files.push(SourceFile {
            name: name.to_owned(),
            source: None,
            is_library,
            statements: Vec::new(),
        });
        self.file = FileId::from(self.prg.files.len() - 1);
        self.file
    }

    pub fn set_source(&mut self, text: &str) {
        self.prg.files[self.file.index()].source = Some(text.to_owned());
    }

    pub fn finish(self) -> Program {
        self.prg
    }

    pub fn program(&self) -> &Program {
        &self.prg
    }

    // Types

    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(id) = self.interned.get(&ty) {
            return *id;
        }
        self.prg.types.push(ty.clone());
        let id = TypeId::from(self.prg.types.len() - 1);
        self.interned.insert(ty, id);
        id
    }

    pub fn any(&mut self) -> TypeId {
        self.intern(Type::Any)
    }

    pub fn void(&mut self) -> TypeId {
        self.intern(Type::Void)
    }

    pub fn null_type(&mut self) -> TypeId {
        self.intern(Type::Null)
    }

    pub fn number(&mut self) -> TypeId {
        self.intern(Type::Number)
    }

    pub fn boolean(&mut self) -> TypeId {
        self.intern(Type::Boolean)
    }

    pub fn string(&mut self) -> TypeId {
        self.intern(Type::String)
    }

    pub fn array_of(&mut self, elem: TypeId) -> TypeId {
        self.intern(Type::Array { elem })
    }

    pub fn fun_type(&mut self, params: Vec<TypeId>, ret: TypeId) -> TypeId {
        self.intern(Type::Function { params, ret })
    }

    pub fn class_type(&mut self, decl: DeclId, args: Vec<TypeId>) -> TypeId {
        self.intern(Type::Class { decl, args })
    }

    pub fn iface_type(&mut self, decl: DeclId, args: Vec<TypeId>) -> TypeId {
        self.intern(Type::Interface { decl, args })
    }

    pub fn object_type(&mut self, members: &[(&str, TypeId)]) -> TypeId {
        let members = members
            .iter()
            .map(|(name, ty)| MemberSig { name: (*name).to_owned(), ty: *ty, optional: false })
            .collect();
        self.intern(Type::Object { members })
    }

    // Declarations

    pub fn add_decl(&mut self, name: &str, kind: DeclKind, parent: Option<DeclId>) -> DeclId {
        self.prg.decls.push(Decl {
            name: name.to_owned(),
            kind,
            parent,
            file: self.file,
            span: Span::default(),
            comment: String::new(),
        });
        DeclId::from(self.prg.decls.len() - 1)
    }

    /// Attaches `//%` annotations to a declaration.
    pub fn annotate(&mut self, decl: DeclId, comment: &str) {
        let d = &mut self.prg.decls[decl.index()];
        if !d.comment.is_empty() {
            d.comment.push('\n');
        }
        d.comment.push_str(comment);
    }

    /// A function without parameters returning `void`; see [`Self::signature`].
    ///
    /// Functions whose parent is a class become methods of that class.
    pub fn function(&mut self, name: &str, parent: Option<DeclId>) -> DeclId {
        let in_class = parent.is_some_and(|p| self.prg[p].as_class().is_some());
        let kind = if in_class { FunctionKind::Method } else { FunctionKind::Free };
        self.function_of_kind(name, parent, kind)
    }

    pub fn function_of_kind(
        &mut self,
        name: &str,
        parent: Option<DeclId>,
        fun_kind: FunctionKind,
    ) -> DeclId {
        let void = self.void();
        let ty = self.fun_type(vec![], void);
        let decl = self.add_decl(
            name,
            DeclKind::Function(FunctionDecl {
                fun_kind,
                is_static: false,
                type_params: vec![],
                params: vec![],
                ret: void,
                body: None,
                ty,
            }),
            parent,
        );
        if let Some(DeclKind::Class(c)) = parent.map(|p| &mut self.prg.decls[p.index()].kind) {
            c.members.push(decl);
        }
        decl
    }

    pub fn constructor(&mut self, class: DeclId) -> DeclId {
        self.function_of_kind("constructor", Some(class), FunctionKind::Constructor)
    }

    pub fn set_static(&mut self, decl: DeclId) {
        match &mut self.prg.decls[decl.index()].kind {
            DeclKind::Function(f) => f.is_static = true,
            DeclKind::Field(f) => f.is_static = true,
            _ => {}
        }
    }

    /// Sets parameters and return type of a function, returning the parameter declarations.
    pub fn signature(&mut self, fun: DeclId, params: &[(&str, TypeId)], ret: TypeId) -> Vec<DeclId> {
        let decls: Vec<DeclId> = params
            .iter()
            .map(|(name, ty)| {
                self.add_decl(
                    name,
                    DeclKind::Parameter(ParameterDecl {
                        ty: *ty,
                        default: None,
                        bit_size: Default::default(),
                    }),
                    Some(fun),
                )
            })
            .collect();
        let ty = self.fun_type(params.iter().map(|(_, t)| *t).collect(), ret);
        if let DeclKind::Function(f) = &mut self.prg.decls[fun.index()].kind {
            f.params = decls.clone();
            f.ret = ret;
            f.ty = ty;
        }
        decls
    }

    pub fn set_param_default(&mut self, param: DeclId, default: ExprId) {
        if let DeclKind::Parameter(p) = &mut self.prg.decls[param.index()].kind {
            p.default = Some(default);
        }
    }

    /// Gives a function a block body.
    pub fn body(&mut self, fun: DeclId, stmts: Vec<StmtId>) -> StmtId {
        let block = self.stmt(StmtKind::Block { stmts });
        if let DeclKind::Function(f) = &mut self.prg.decls[fun.index()].kind {
            f.body = Some(FunctionBody::Block(block));
        }
        block
    }

    /// Gives an arrow function an expression body.
    pub fn expr_body(&mut self, fun: DeclId, expr: ExprId) {
        if let DeclKind::Function(f) = &mut self.prg.decls[fun.index()].kind {
            f.body = Some(FunctionBody::Expr(expr));
        }
    }

    /// Adds a type parameter to a function or class.
    pub fn type_param(&mut self, owner: DeclId, name: &str) -> (DeclId, TypeId) {
        let decl = self.add_decl(name, DeclKind::TypeParam, Some(owner));
        match &mut self.prg.decls[owner.index()].kind {
            DeclKind::Function(f) => f.type_params.push(decl),
            DeclKind::Class(c) => c.type_params.push(decl),
            DeclKind::Interface(i) => i.type_params.push(decl),
            _ => {}
        }
        let ty = self.intern(Type::Param { decl });
        (decl, ty)
    }

    pub fn class(&mut self, name: &str, parent: Option<DeclId>) -> DeclId {
        self.add_decl(
            name,
            DeclKind::Class(ClassDecl {
                type_params: vec![],
                extends: vec![],
                implements: vec![],
                members: vec![],
            }),
            parent,
        )
    }

    pub fn extends(&mut self, class: DeclId, base: TypeId) {
        if let DeclKind::Class(c) = &mut self.prg.decls[class.index()].kind {
            c.extends.push(base);
        }
    }

    pub fn implements(&mut self, class: DeclId, iface: TypeId) {
        if let DeclKind::Class(c) = &mut self.prg.decls[class.index()].kind {
            c.implements.push(iface);
        }
    }

    pub fn field(&mut self, class: DeclId, name: &str, ty: TypeId) -> DeclId {
        let decl = self.add_decl(
            name,
            DeclKind::Field(FieldDecl {
                ty,
                is_static: false,
                init: None,
                bit_size: Default::default(),
            }),
            Some(class),
        );
        if let DeclKind::Class(c) = &mut self.prg.decls[class.index()].kind {
            c.members.push(decl);
        }
        decl
    }

    pub fn interface(&mut self, name: &str) -> DeclId {
        self.add_decl(
            name,
            DeclKind::Interface(InterfaceDecl { type_params: vec![], members: vec![] }),
            None,
        )
    }

    pub fn member_sig(
        &mut self,
        iface: DeclId,
        name: &str,
        ty: TypeId,
        optional: bool,
        is_method: bool,
    ) -> DeclId {
        let decl = self.add_decl(
            name,
            DeclKind::Signature(SignatureDecl { ty, optional, is_method }),
            Some(iface),
        );
        if let DeclKind::Interface(i) = &mut self.prg.decls[iface.index()].kind {
            i.members.push(decl);
        }
        decl
    }

    pub fn variable(
        &mut self,
        name: &str,
        ty: TypeId,
        init: Option<ExprId>,
        parent: Option<DeclId>,
    ) -> DeclId {
        self.add_decl(
            name,
            DeclKind::Variable(VariableDecl { ty, init, bit_size: Default::default() }),
            parent,
        )
    }

    pub fn set_bit_size(&mut self, decl: DeclId, size: crate::types::BitSize) {
        match &mut self.prg.decls[decl.index()].kind {
            DeclKind::Variable(v) => v.bit_size = size,
            DeclKind::Parameter(p) => p.bit_size = size,
            DeclKind::Field(f) => f.bit_size = size,
            _ => {}
        }
    }

    pub fn enumeration(&mut self, name: &str, members: &[(&str, f64)]) -> (DeclId, Vec<DeclId>) {
        let decl = self.add_decl(name, DeclKind::Enum(EnumDecl { members: vec![] }), None);
        let members: Vec<DeclId> = members
            .iter()
            .map(|(n, v)| {
                self.add_decl(
                    n,
                    DeclKind::EnumMember(EnumMemberDecl { value: Some(*v), init: None }),
                    Some(decl),
                )
            })
            .collect();
        if let DeclKind::Enum(e) = &mut self.prg.decls[decl.index()].kind {
            e.members = members.clone();
        }
        (decl, members)
    }

    pub fn namespace(&mut self, name: &str, body: Vec<StmtId>) -> DeclId {
        self.add_decl(name, DeclKind::Namespace(NamespaceDecl { body }), None)
    }

    pub fn set_namespace_body(&mut self, ns: DeclId, body: Vec<StmtId>) {
        if let DeclKind::Namespace(n) = &mut self.prg.decls[ns.index()].kind {
            n.body = body;
        }
    }

    pub fn reparent(&mut self, decl: DeclId, parent: DeclId) {
        self.prg.decls[decl.index()].parent = Some(parent);
    }

    // Statements

    pub fn stmt(&mut self, kind: StmtKind) -> StmtId {
        self.prg.stmts.push(Stmt { kind, file: self.file, span: Span::default() });
        StmtId::from(self.prg.stmts.len() - 1)
    }

    pub fn set_stmt_span(&mut self, stmt: StmtId, span: Span) {
        self.prg.stmts[stmt.index()].span = span;
    }

    /// Appends a statement to the top level of the current file.
    pub fn push_top_level(&mut self, stmt: StmtId) {
        self.prg.files[self.file.index()].statements.push(stmt);
    }

    pub fn top_level(&mut self, kind: StmtKind) -> StmtId {
        let stmt = self.stmt(kind);
        self.push_top_level(stmt);
        stmt
    }

    pub fn expr_stmt(&mut self, expr: ExprId) -> StmtId {
        self.stmt(StmtKind::Expr { expr })
    }

    pub fn var_stmt(&mut self, decl: DeclId) -> StmtId {
        self.stmt(StmtKind::Var { bindings: vec![VarBinding::Single(decl)] })
    }

    pub fn ret(&mut self, value: Option<ExprId>) -> StmtId {
        self.stmt(StmtKind::Return { value })
    }

    pub fn block(&mut self, stmts: Vec<StmtId>) -> StmtId {
        self.stmt(StmtKind::Block { stmts })
    }

    // Expressions

    pub fn expr(&mut self, kind: ExprKind, ty: TypeId) -> ExprId {
        self.prg.exprs.push(Expr { kind, ty, file: self.file, span: Span::default() });
        ExprId::from(self.prg.exprs.len() - 1)
    }

    pub fn num(&mut self, value: f64) -> ExprId {
        let ty = self.number();
        self.expr(ExprKind::Number { value }, ty)
    }

    pub fn str_lit(&mut self, value: &str) -> ExprId {
        let ty = self.string();
        self.expr(ExprKind::String { value: value.to_owned() }, ty)
    }

    pub fn bool_lit(&mut self, value: bool) -> ExprId {
        let ty = self.boolean();
        self.expr(ExprKind::Boolean { value }, ty)
    }

    pub fn null(&mut self) -> ExprId {
        let ty = self.null_type();
        self.expr(ExprKind::Null, ty)
    }

    /// A reference to a declaration, typed with the declaration's type.
    pub fn ident(&mut self, decl: DeclId) -> ExprId {
        let ty = match self.prg.decl_type(decl) {
            Some(ty) => ty,
            None => self.any(),
        };
        self.expr(ExprKind::Ident { decl }, ty)
    }

    pub fn this(&mut self, class: DeclId) -> ExprId {
        let ty = self.intern(Type::This { class });
        self.expr(ExprKind::This, ty)
    }

    pub fn prop(&mut self, object: ExprId, name: &str, decl: Option<DeclId>, ty: TypeId) -> ExprId {
        self.expr(ExprKind::Property { object, name: name.to_owned(), decl }, ty)
    }

    /// `object.member` for a resolved member, typed with the member's type.
    pub fn member(&mut self, object: ExprId, member: DeclId) -> ExprId {
        let any = self.any();
        let name = self.prg[member].name.clone();
        let ty = match &self.prg[member].kind {
            DeclKind::Function(f) if f.fun_kind == FunctionKind::Getter => f.ret,
            _ => self.prg.decl_type(member).unwrap_or(any),
        };
        self.prop(object, &name, Some(member), ty)
    }

    pub fn call(&mut self, callee: ExprId, args: Vec<ExprId>, type_args: Vec<TypeId>, ty: TypeId) -> ExprId {
        self.expr(ExprKind::Call { callee, args, type_args }, ty)
    }

    /// Calls a function declaration directly; the result type is the declared return
    /// type with the function's own type parameters substituted.
    pub fn call_fn(&mut self, fun: DeclId, args: Vec<ExprId>, type_args: Vec<TypeId>) -> ExprId {
        let callee = self.ident(fun);
        let ty = self.return_type(fun, &type_args);
        self.call(callee, args, type_args, ty)
    }

    pub fn call_method(&mut self, object: ExprId, method: DeclId, args: Vec<ExprId>) -> ExprId {
        let callee = self.member(object, method);
        let ty = self.return_type(method, &[]);
        self.call(callee, args, vec![], ty)
    }

    fn return_type(&mut self, fun: DeclId, type_args: &[TypeId]) -> TypeId {
        let any = self.any();
        let Some(f) = self.prg[fun].as_function() else { return any };
        let ret = f.ret;
        match &self.prg[ret] {
            Type::Param { decl } => f
                .type_params
                .iter()
                .position(|tp| tp == decl)
                .and_then(|i| type_args.get(i).copied())
                .unwrap_or(ret),
            _ => ret,
        }
    }

    pub fn new_object(&mut self, class_ty: TypeId, args: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::New { args }, class_ty)
    }

    pub fn binary(&mut self, op: BinOp, left: ExprId, right: ExprId, ty: TypeId) -> ExprId {
        self.expr(ExprKind::Binary { op, left, right }, ty)
    }

    pub fn assign(&mut self, target: ExprId, value: ExprId) -> ExprId {
        let ty = self.prg[target].ty;
        self.expr(ExprKind::Assign { op: None, target, value }, ty)
    }
}
