//! Whole-program scenarios built with `ProgramBuilder`.

use corvid_lang_ast::*;
use corvid_lang_backend::{CompileOptions, CompileResult, CompileTarget, compile};
use corvid_lang_ir::{Action, Binary, Expr, JmpMode, Procedure, Stmt};
use corvid_lang_miette_util::Span;
use corvid_lang_printer::PrintToString;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn compile_ok(prg: &Program, opts: &CompileOptions) -> Binary {
    init_logger();
    let CompileResult { diagnostics, binary } = compile(prg, opts);
    match binary {
        Some(bin) => bin,
        None => panic!("compilation failed: {diagnostics:#?}"),
    }
}

fn procs_of(bin: &Binary, decl: DeclId) -> Vec<&Procedure> {
    bin.procs_for(Action::Decl(decl)).collect()
}

/// Compiles a program that must be rejected and returns its diagnostic codes.
fn failure_codes(prg: &Program) -> Vec<u32> {
    init_logger();
    let res = compile(prg, &CompileOptions::default());
    assert!(!res.is_success());
    res.diagnostics.iter().map(|d| d.code).collect()
}

fn void_function(b: &mut ProgramBuilder, name: &str) -> DeclId {
    let f = b.function(name, None);
    b.body(f, vec![]);
    b.top_level(StmtKind::Function { decl: f });
    f
}

#[test]
fn called_function_is_compiled_once() {
    let mut b = ProgramBuilder::new();
    let f = void_function(&mut b, "f");
    let call = b.call_fn(f, vec![], vec![]);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    let call = b.call_fn(f, vec![], vec![]);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    let prg = b.finish();

    let bin = compile_ok(&prg, &CompileOptions::default());
    let procs = procs_of(&bin, f);
    assert_eq!(procs.len(), 1);
    assert_eq!(procs[0].label, format!("_f__P{}", f.0));
}

#[test]
fn uncalled_function_is_omitted() {
    let mut b = ProgramBuilder::new();
    let f = void_function(&mut b, "f");
    let prg = b.finish();

    let bin = compile_ok(&prg, &CompileOptions::default());
    assert!(procs_of(&bin, f).is_empty());
    assert_eq!(bin.procs.iter().filter(|p| !p.is_root()).count(), 0);
}

#[test]
fn test_mode_compiles_uncalled_functions() {
    let mut b = ProgramBuilder::new();
    let f = void_function(&mut b, "f");
    let prg = b.finish();

    let opts = CompileOptions { test_mode: true, ..Default::default() };
    let bin = compile_ok(&prg, &opts);
    assert_eq!(procs_of(&bin, f).len(), 1);
}

#[test]
fn generic_instances_are_shared_by_ref_mask() {
    let mut b = ProgramBuilder::new();
    let identity = b.function("identity", None);
    let (_, t) = b.type_param(identity, "T");
    let params = b.signature(identity, &[("x", t)], t);
    let x = b.ident(params[0]);
    let ret = b.ret(Some(x));
    b.body(identity, vec![ret]);
    b.top_level(StmtKind::Function { decl: identity });

    let string = b.string();
    let number = b.number();
    let boolean = b.boolean();
    let uses = [(b.str_lit("hello"), string), (b.num(1.0), number), (b.bool_lit(true), boolean)];
    for (arg, ty) in uses {
        let call = b.call_fn(identity, vec![arg], vec![ty]);
        let stmt = b.expr_stmt(call);
        b.push_top_level(stmt);
    }
    let prg = b.finish();

    let bin = compile_ok(&prg, &CompileOptions::default());
    let mut labels: Vec<String> = procs_of(&bin, identity).iter().map(|p| p.label.clone()).collect();
    labels.sort();
    let base = format!("_identity__P{}", identity.0);
    assert_eq!(labels, vec![format!("{base}_P"), format!("{base}_R")]);
}

#[test]
fn managed_targets_only_use_value_instances() {
    let mut b = ProgramBuilder::new();
    let identity = b.function("identity", None);
    let (_, t) = b.type_param(identity, "T");
    let params = b.signature(identity, &[("x", t)], t);
    let x = b.ident(params[0]);
    let ret = b.ret(Some(x));
    b.body(identity, vec![ret]);
    b.top_level(StmtKind::Function { decl: identity });
    let string = b.string();
    let arg = b.str_lit("hello");
    let call = b.call_fn(identity, vec![arg], vec![string]);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    let prg = b.finish();

    let opts = CompileOptions { target: CompileTarget::managed(), ..Default::default() };
    let bin = compile_ok(&prg, &opts);
    let labels: Vec<&str> = procs_of(&bin, identity).iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, vec![format!("_identity__P{}_P", identity.0)]);
}

struct Hierarchy {
    prg: Program,
    a_f: DeclId,
    a_g: DeclId,
    b_f: DeclId,
    c_g: DeclId,
}

/// `A { f, g }`, `B extends A { f }` and `C extends A { g }`, all allocated, with
/// `f` and `g` called through a variable of type `A`.
fn hierarchy() -> Hierarchy {
    let mut b = ProgramBuilder::new();
    let a = b.class("A", None);
    let a_f = b.function("f", Some(a));
    let a_g = b.function("g", Some(a));
    let a_ty = b.class_type(a, vec![]);
    let sub_b = b.class("B", None);
    b.extends(sub_b, a_ty);
    let b_f = b.function("f", Some(sub_b));
    let sub_c = b.class("C", None);
    b.extends(sub_c, a_ty);
    let c_g = b.function("g", Some(sub_c));
    for method in [a_f, a_g, b_f, c_g] {
        b.body(method, vec![]);
    }
    for class in [a, sub_b, sub_c] {
        b.top_level(StmtKind::Class { decl: class });
    }

    for (name, class) in [("a", a), ("b", sub_b), ("c", sub_c)] {
        let ty = b.class_type(class, vec![]);
        let init = b.new_object(ty, vec![]);
        let var = b.variable(name, a_ty, Some(init), None);
        let stmt = b.var_stmt(var);
        b.push_top_level(stmt);
        for method in [a_f, a_g] {
            let recv = b.ident(var);
            let call = b.call_method(recv, method, vec![]);
            let stmt = b.expr_stmt(call);
            b.push_top_level(stmt);
        }
    }
    Hierarchy { prg: b.finish(), a_f, a_g, b_f, c_g }
}

#[test]
fn overrides_keep_base_slots() {
    let h = hierarchy();
    let bin = compile_ok(&h.prg, &CompileOptions::default());
    let vtable = |name: &str| match bin.vtables.iter().find(|v| v.class_name == name) {
        Some(v) => v,
        None => panic!("no vtable for {name}"),
    };
    let proc = |decl: DeclId| procs_of(&bin, decl)[0].id;

    let (va, vb, vc) = (vtable("A"), vtable("B"), vtable("C"));
    assert_eq!(va.methods, vec![proc(h.a_f), proc(h.a_g)]);
    assert_eq!(vb.methods.len(), va.methods.len());
    assert_eq!(vb.methods, vec![proc(h.b_f), proc(h.a_g)]);
    assert_eq!(vc.methods, vec![proc(h.a_f), proc(h.c_g)]);
    assert_eq!(vb.base.as_deref(), Some(va.class_id.as_str()));
}

#[test]
fn dispatched_calls_use_vtable_slots() {
    let h = hierarchy();
    let bin = compile_ok(&h.prg, &CompileOptions::default());
    let root = bin.procs.iter().find(|p| p.is_root()).map(|p| p.print_to_string(None));
    let root = root.unwrap_or_default();
    assert!(root.contains("vcall[0]"), "{root}");
    assert!(root.contains("vcall[1]"), "{root}");
    assert!(root.contains("pxt::mkClassInstance"), "{root}");
}

#[test]
fn cast_to_wider_interface_fails() {
    let mut b = ProgramBuilder::new();
    let num = b.number();
    let iface = b.interface("Pair");
    b.member_sig(iface, "a", num, false, false);
    b.member_sig(iface, "b", num, false, false);
    let iface_ty = b.iface_type(iface, vec![]);
    let lit_ty = b.object_type(&[("a", num)]);
    let one = b.num(1.0);
    let lit = b.expr(ExprKind::Object { props: vec![("a".to_owned(), one)] }, lit_ty);
    let cast = b.expr(ExprKind::As { expr: lit, target: iface_ty }, iface_ty);
    let stmt = b.expr_stmt(cast);
    b.push_top_level(stmt);
    let prg = b.finish();

    init_logger();
    let res = compile(&prg, &CompileOptions::default());
    assert!(!res.is_success());
    assert_eq!(res.diagnostics.len(), 1);
    let diag = &res.diagnostics[0];
    assert_eq!(diag.code, 9261);
    assert!(diag.message.contains("Property b not present"), "{}", diag.message);
}

#[test]
fn string_switch_compares_strings() {
    let mut b = ProgramBuilder::new();
    let string = b.string();
    let num = b.number();
    let classify = b.function("classify", None);
    let params = b.signature(classify, &[("s", string)], num);

    let zero = b.num(0.0);
    let ret_default = b.ret(Some(zero));
    let a = b.str_lit("a");
    let one = b.num(1.0);
    let ret_a = b.ret(Some(one));
    let bb = b.str_lit("b");
    let two = b.num(2.0);
    let ret_b = b.ret(Some(two));
    let disc = b.ident(params[0]);
    let switch = b.stmt(StmtKind::Switch {
        discriminant: disc,
        cases: vec![
            SwitchCase { test: None, body: vec![ret_default] },
            SwitchCase { test: Some(a), body: vec![ret_a] },
            SwitchCase { test: Some(bb), body: vec![ret_b] },
        ],
    });
    b.body(classify, vec![switch]);
    b.top_level(StmtKind::Function { decl: classify });
    let arg = b.str_lit("x");
    let call = b.call_fn(classify, vec![arg], vec![]);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    let prg = b.finish();

    let bin = compile_ok(&prg, &CompileOptions::default());
    let proc = procs_of(&bin, classify)[0];
    let text = proc.print_to_string(None);
    assert_eq!(text.matches("String_::compare").count(), 2, "{text}");
    assert!(!text.contains("ptreq"), "{text}");

    let case_labels: Vec<&str> = proc
        .body
        .iter()
        .filter_map(|s| match s {
            Stmt::Label(l) if l.starts_with(".switch_case") => Some(l.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(case_labels.len(), 3);
    let first_case = proc.body.iter().position(|s| matches!(s, Stmt::Label(l) if l == case_labels[0]));
    let fallback = first_case.and_then(|i| proc.body.get(i - 1));
    match fallback {
        Some(Stmt::Jmp { mode: JmpMode::Always, target, .. }) => assert_eq!(target, case_labels[0]),
        other => panic!("expected a jump to the default clause, found {other:?}"),
    }
    let conditional: Vec<&String> = proc
        .body
        .iter()
        .filter_map(|s| match s {
            Stmt::Jmp { mode: JmpMode::IfNotZero, target, .. } => Some(target),
            _ => None,
        })
        .collect();
    assert_eq!(conditional, vec![case_labels[1], case_labels[2]]);
}

#[test]
fn numeric_switch_uses_quick_dispatch() {
    let mut b = ProgramBuilder::new();
    let num = b.number();
    let pick = b.function("pick", None);
    let params = b.signature(pick, &[("n", num)], num);
    let one = b.num(1.0);
    let ten = b.num(10.0);
    let ret = b.ret(Some(ten));
    let disc = b.ident(params[0]);
    let switch = b.stmt(StmtKind::Switch {
        discriminant: disc,
        cases: vec![SwitchCase { test: Some(one), body: vec![ret] }],
    });
    let zero = b.num(0.0);
    let fallback = b.ret(Some(zero));
    b.body(pick, vec![switch, fallback]);
    b.top_level(StmtKind::Function { decl: pick });
    let arg = b.num(1.0);
    let call = b.call_fn(pick, vec![arg], vec![]);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    let prg = b.finish();

    let bin = compile_ok(&prg, &CompileOptions::default());
    let proc = procs_of(&bin, pick)[0];
    assert!(proc.body.iter().any(|s| matches!(s, Stmt::Jmp { mode: JmpMode::IfJmpValEq, .. })));
}

#[test]
fn structural_members_share_ids() {
    let mut b = ProgramBuilder::new();
    let num = b.number();
    let any = b.any();

    let holder = b.class("Holder", None);
    let holder_foo = b.field(holder, "foo", num);
    b.top_level(StmtKind::Class { decl: holder });

    let with_prop = b.interface("WithProp");
    let prop_foo = b.member_sig(with_prop, "foo", num, false, false);
    let with_prop_ty = b.iface_type(with_prop, vec![]);
    let fn_ty = b.fun_type(vec![], num);
    let with_method = b.interface("WithMethod");
    let method_foo = b.member_sig(with_method, "foo", fn_ty, false, true);
    let with_method_ty = b.iface_type(with_method, vec![]);

    let holder_ty = b.class_type(holder, vec![]);
    let alloc = b.new_object(holder_ty, vec![]);
    let x = b.variable("x", with_prop_ty, Some(alloc), None);
    let stmt = b.var_stmt(x);
    b.push_top_level(stmt);
    let null = b.null();
    let y = b.variable("y", with_method_ty, Some(null), None);
    let stmt = b.var_stmt(y);
    b.push_top_level(stmt);

    let recv = b.ident(x);
    let read = b.member(recv, prop_foo);
    let stmt = b.expr_stmt(read);
    b.push_top_level(stmt);
    let recv = b.ident(y);
    let callee = b.member(recv, method_foo);
    let call = b.call(callee, vec![], vec![], num);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    let two = b.num(2.0);
    let lit_ty = b.object_type(&[("foo", num)]);
    let lit = b.expr(ExprKind::Object { props: vec![("foo".to_owned(), two)] }, lit_ty);
    let lit = b.expr(ExprKind::As { expr: lit, target: any }, any);
    let stmt = b.expr_stmt(lit);
    b.push_top_level(stmt);
    let prg = b.finish();

    let bin = compile_ok(&prg, &CompileOptions::default());
    let ids: Vec<usize> =
        bin.iface_members.iter().enumerate().filter(|(_, m)| *m == "foo").map(|(i, _)| i).collect();
    assert_eq!(ids.len(), 1);
    let id = ids[0];

    let root = bin.procs.iter().find(|p| p.is_root()).map(|p| p.print_to_string(None));
    let root = root.unwrap_or_default();
    assert_eq!(root.matches(&format!("icall[{id}]")).count(), 2, "{root}");

    let vtable = bin.vtables.iter().find(|v| v.class_name == "Holder");
    let slot = vtable.and_then(|v| v.iface_table.get(id).copied().flatten());
    let getter = slot.map(|p| bin.proc(p).action);
    assert_eq!(getter, Some(Action::FieldGetter(holder_foo)));
}

#[test]
fn closures_capture_enclosing_locals() {
    let mut b = ProgramBuilder::new();
    let num = b.number();
    let outer = b.function("outer", None);
    let one = b.num(1.0);
    let n = b.variable("n", num, Some(one), Some(outer));
    let arrow = b.function_of_kind("", Some(outer), FunctionKind::Expression);
    b.signature(arrow, &[], num);
    let n_ref = b.ident(n);
    b.expr_body(arrow, n_ref);
    let arrow_ty = b.fun_type(vec![], num);
    let lit = b.expr(ExprKind::Function { decl: arrow }, arrow_ty);
    let g = b.variable("g", arrow_ty, Some(lit), Some(outer));
    let decl_n = b.var_stmt(n);
    let decl_g = b.var_stmt(g);
    b.body(outer, vec![decl_n, decl_g]);
    b.top_level(StmtKind::Function { decl: outer });
    let call = b.call_fn(outer, vec![], vec![]);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    let prg = b.finish();

    let bin = compile_ok(&prg, &CompileOptions::default());
    let text = procs_of(&bin, outer)[0].print_to_string(None);
    assert!(text.contains("pxt::mkAction"), "{text}");
    assert!(text.contains("pxtrt::stclo"), "{text}");
    assert_eq!(procs_of(&bin, arrow)[0].captured.len(), 1);
}

#[test]
fn errors_are_collected_per_statement() {
    let mut b = ProgramBuilder::new();
    let any = b.any();
    let string = b.string();
    let one = b.num(1.0);
    let type_of = b.expr(ExprKind::TypeOf { expr: one }, string);
    let stmt = b.expr_stmt(type_of);
    b.push_top_level(stmt);
    let two = b.num(2.0);
    let spread = b.expr(ExprKind::Spread { expr: two }, any);
    let stmt = b.expr_stmt(spread);
    b.push_top_level(stmt);
    let prg = b.finish();

    init_logger();
    let res = compile(&prg, &CompileOptions::default());
    assert!(res.binary.is_none());
    let codes: Vec<u32> = res.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![9202, 9202]);
    assert!(res.diagnostics[1].message.contains("not currently supported"), "{}", res.diagnostics[1].message);
}

#[test]
fn breakpoints_map_statements_to_source() {
    let mut b = ProgramBuilder::new();
    b.set_source("let a = 1\n  debugger\n");
    let stmt = b.top_level(StmtKind::Debugger);
    b.set_stmt_span(stmt, Span::new(10, 20));
    let prg = b.finish();

    let opts = CompileOptions { breakpoints: true, ..Default::default() };
    let bin = compile_ok(&prg, &opts);
    // Breakpoint 0 is a placeholder so that real ids are never zero.
    assert_eq!(bin.breakpoints.len(), 2);
    let bp = &bin.breakpoints[1];
    assert_eq!(bp.id, 1);
    assert_eq!(bp.file, "main.ts");
    assert_eq!((bp.line, bp.character), (1, 2));
    assert_eq!(bp.start, 12);
}

#[test]
fn used_symbols_are_recorded() {
    let mut b = ProgramBuilder::new();
    let f = void_function(&mut b, "used");
    void_function(&mut b, "unused");
    let call = b.call_fn(f, vec![], vec![]);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    let prg = b.finish();

    let opts = CompileOptions { compute_used_symbols: true, ..Default::default() };
    let bin = compile_ok(&prg, &opts);
    assert!(bin.used_symbols.iter().any(|s| s == "used"));
    assert!(!bin.used_symbols.iter().any(|s| s == "unused"));
}

struct Family {
    b: ProgramBuilder,
    base_ty: TypeId,
    derived_ty: TypeId,
    other_ty: TypeId,
    v: DeclId,
}

/// `Base`, `Derived extends Base` and an unrelated `Other`, with `let v: Base = new Base()`.
fn family() -> Family {
    let mut b = ProgramBuilder::new();
    let base = b.class("Base", None);
    let base_ty = b.class_type(base, vec![]);
    let derived = b.class("Derived", None);
    b.extends(derived, base_ty);
    let derived_ty = b.class_type(derived, vec![]);
    let other = b.class("Other", None);
    let other_ty = b.class_type(other, vec![]);
    for class in [base, derived, other] {
        b.top_level(StmtKind::Class { decl: class });
    }
    let init = b.new_object(base_ty, vec![]);
    let v = b.variable("v", base_ty, Some(init), None);
    let stmt = b.var_stmt(v);
    b.push_top_level(stmt);
    Family { b, base_ty, derived_ty, other_ty, v }
}

fn cast_of_v(mut fam: Family, target: TypeId) -> Program {
    let v = fam.b.ident(fam.v);
    let cast = fam.b.expr(ExprKind::As { expr: v, target }, target);
    let stmt = fam.b.expr_stmt(cast);
    fam.b.push_top_level(stmt);
    fam.b.finish()
}

#[test]
fn downcast_fails() {
    let fam = family();
    let target = fam.derived_ty;
    let prg = cast_of_v(fam, target);
    init_logger();
    let res = compile(&prg, &CompileOptions::default());
    assert!(!res.is_success());
    assert_eq!(res.diagnostics.len(), 1);
    let diag = &res.diagnostics[0];
    assert_eq!(diag.code, 9261);
    assert!(diag.message.contains("Classes Base and Derived are not related"), "{}", diag.message);
}

#[test]
fn cast_to_unrelated_class_fails() {
    let fam = family();
    let target = fam.other_ty;
    assert_eq!(failure_codes(&cast_of_v(fam, target)), vec![9261]);
}

#[test]
fn upcast_succeeds() {
    let mut fam = family();
    let derived = fam.b.new_object(fam.derived_ty, vec![]);
    let cast = fam.b.expr(ExprKind::As { expr: derived, target: fam.base_ty }, fam.base_ty);
    let stmt = fam.b.expr_stmt(cast);
    fam.b.push_top_level(stmt);
    compile_ok(&fam.b.finish(), &CompileOptions::default());
}

#[test]
fn arguments_and_initializers_are_checked() {
    let mut fam = family();
    let b = &mut fam.b;
    let void = b.void();
    let takes = b.function("takes", None);
    b.signature(takes, &[("x", fam.derived_ty)], void);
    b.body(takes, vec![]);
    b.top_level(StmtKind::Function { decl: takes });
    let arg = b.ident(fam.v);
    let call = b.call_fn(takes, vec![arg], vec![]);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    let init = b.ident(fam.v);
    let w = b.variable("w", fam.other_ty, Some(init), None);
    let stmt = b.var_stmt(w);
    b.push_top_level(stmt);
    let prg = fam.b.finish();

    assert_eq!(failure_codes(&prg), vec![9261, 9261]);
}

#[test]
fn generic_function_in_generic_scope_fails() {
    let mut b = ProgramBuilder::new();
    let number = b.number();
    let outer = b.function("outer", None);
    b.type_param(outer, "T");
    let inner = b.function("inner", Some(outer));
    b.type_param(inner, "U");
    b.body(inner, vec![]);
    let decl_inner = b.stmt(StmtKind::Function { decl: inner });
    b.body(outer, vec![decl_inner]);
    b.top_level(StmtKind::Function { decl: outer });
    let call = b.call_fn(outer, vec![], vec![number]);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    let prg = b.finish();

    assert_eq!(failure_codes(&prg), vec![9259]);
}

#[test]
fn generic_function_capturing_locals_fails() {
    let mut b = ProgramBuilder::new();
    let number = b.number();
    let string = b.string();
    let outer = b.function("outer", None);
    let hello = b.str_lit("hello");
    let n = b.variable("n", string, Some(hello), Some(outer));
    let inner = b.function("inner", Some(outer));
    b.type_param(inner, "U");
    b.signature(inner, &[], string);
    let n_ref = b.ident(n);
    let ret = b.ret(Some(n_ref));
    b.body(inner, vec![ret]);
    let decl_n = b.var_stmt(n);
    let decl_inner = b.stmt(StmtKind::Function { decl: inner });
    let call = b.call_fn(inner, vec![], vec![number]);
    let use_inner = b.expr_stmt(call);
    b.body(outer, vec![decl_n, decl_inner, use_inner]);
    b.top_level(StmtKind::Function { decl: outer });
    let call = b.call_fn(outer, vec![], vec![]);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    let prg = b.finish();

    assert!(failure_codes(&prg).contains(&9234));
}

#[test]
fn override_with_other_param_count_fails() {
    let mut b = ProgramBuilder::new();
    let number = b.number();
    let void = b.void();
    let base = b.class("Base", None);
    let base_f = b.function("f", Some(base));
    b.signature(base_f, &[("x", number)], void);
    let base_ty = b.class_type(base, vec![]);
    let derived = b.class("Derived", None);
    b.extends(derived, base_ty);
    let derived_f = b.function("f", Some(derived));
    for method in [base_f, derived_f] {
        b.body(method, vec![]);
    }
    for class in [base, derived] {
        b.top_level(StmtKind::Class { decl: class });
    }
    let derived_ty = b.class_type(derived, vec![]);
    let alloc = b.new_object(derived_ty, vec![]);
    let stmt = b.expr_stmt(alloc);
    b.push_top_level(stmt);
    let prg = b.finish();

    assert_eq!(failure_codes(&prg), vec![9255]);
}

#[test]
fn multiple_base_classes_fail() {
    let mut b = ProgramBuilder::new();
    let left = b.class("Left", None);
    let right = b.class("Right", None);
    let both = b.class("Both", None);
    let left_ty = b.class_type(left, vec![]);
    let right_ty = b.class_type(right, vec![]);
    b.extends(both, left_ty);
    b.extends(both, right_ty);
    b.top_level(StmtKind::Class { decl: both });
    let prg = b.finish();

    init_logger();
    let res = compile(&prg, &CompileOptions::default());
    assert!(!res.is_success());
    let codes: Vec<u32> = res.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![9228]);
    assert!(res.diagnostics[0].message.contains("invalid extends clause"), "{}", res.diagnostics[0].message);
}

#[test]
fn cyclic_inheritance_fails() {
    let mut b = ProgramBuilder::new();
    let first = b.class("First", None);
    let second = b.class("Second", None);
    let first_ty = b.class_type(first, vec![]);
    let second_ty = b.class_type(second, vec![]);
    b.extends(first, second_ty);
    b.extends(second, first_ty);
    b.top_level(StmtKind::Class { decl: first });
    let prg = b.finish();

    assert_eq!(failure_codes(&prg), vec![9227]);
}

#[test]
fn function_values_take_at_most_three_arguments() {
    let mut b = ProgramBuilder::new();
    let number = b.number();
    let void = b.void();
    let fn_ty = b.fun_type(vec![number; 4], void);
    let g = b.variable("g", fn_ty, None, None);
    let stmt = b.var_stmt(g);
    b.push_top_level(stmt);
    let callee = b.ident(g);
    let args = (1..=4).map(|i| b.num(i as f64)).collect();
    let call = b.call(callee, args, vec![], void);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    let prg = b.finish();

    assert_eq!(failure_codes(&prg), vec![9217]);
}

/// `function pick(s: string, t: string) { s <op> t; }`, called once.
fn lazy_program(op: BinOp) -> (Program, DeclId) {
    let mut b = ProgramBuilder::new();
    let string = b.string();
    let void = b.void();
    let pick = b.function("pick", None);
    let params = b.signature(pick, &[("s", string), ("t", string)], void);
    let s = b.ident(params[0]);
    let t = b.ident(params[1]);
    let lazy = b.binary(op, s, t, string);
    let stmt = b.expr_stmt(lazy);
    b.body(pick, vec![stmt]);
    b.top_level(StmtKind::Function { decl: pick });
    let x = b.str_lit("x");
    let y = b.str_lit("y");
    let call = b.call_fn(pick, vec![x, y], vec![]);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    (b.finish(), pick)
}

fn label_pos(proc: &Procedure, prefix: &str) -> usize {
    match proc.body.iter().position(|s| matches!(s, Stmt::Label(l) if l.starts_with(prefix))) {
        Some(pos) => pos,
        None => panic!("no {prefix} label in {}", proc.print_to_string(None)),
    }
}

fn jumps_to_rhs(proc: &Procedure, mode: JmpMode) -> bool {
    proc.body
        .iter()
        .any(|s| matches!(s, Stmt::Jmp { mode: m, target, .. } if *m == mode && target.starts_with(".lazyRhs")))
}

#[test]
fn lazy_or_releases_left_operand_before_right() {
    let (prg, pick) = lazy_program(BinOp::Or);
    let bin = compile_ok(&prg, &CompileOptions::default());
    let proc = procs_of(&bin, pick)[0];
    let text = proc.print_to_string(None);
    assert!(jumps_to_rhs(proc, JmpMode::IfZero), "{text}");

    let rhs = &proc.body[label_pos(proc, ".lazyRhs") + 1..label_pos(proc, ".lazyFin")];
    let releases = rhs.iter().filter(|s| matches!(s, Stmt::Expr(Expr::Decr(_)))).count();
    assert_eq!(releases, 1, "{text}");
    assert!(rhs.iter().any(|s| matches!(s, Stmt::Jmp { expr: Some(Expr::Incr(_)), .. })), "{text}");

    let after = &proc.body[label_pos(proc, ".lazyFin")..];
    let result_released =
        after.iter().any(|s| matches!(s, Stmt::Expr(Expr::Decr(v)) if matches!(**v, Expr::JmpValue)));
    assert!(result_released, "{text}");
}

#[test]
fn lazy_and_without_ref_counting_has_no_refcounts() {
    let (prg, pick) = lazy_program(BinOp::And);
    let opts = CompileOptions { target: CompileTarget::managed(), ..Default::default() };
    let bin = compile_ok(&prg, &opts);
    let proc = procs_of(&bin, pick)[0];
    let text = proc.print_to_string(None);
    assert!(jumps_to_rhs(proc, JmpMode::IfNotZero), "{text}");
    assert_eq!(text.matches("incr(").count(), 0, "{text}");
    assert_eq!(text.matches("decr(").count(), 0, "{text}");
}

#[test]
fn array_destructuring_retains_source_per_element() {
    let mut b = ProgramBuilder::new();
    let string = b.string();
    let strings = b.array_of(string);
    let void = b.void();
    let split = b.function("split", None);
    let params = b.signature(split, &[("pair", strings)], void);
    let first = b.variable("first", string, None, Some(split));
    let last = b.variable("last", string, None, Some(split));
    let init = b.ident(params[0]);
    let pattern = Pattern::Array(vec![Some(first), None, Some(last)]);
    let destructure = b.stmt(StmtKind::Var { bindings: vec![VarBinding::Pattern { pattern, init }] });
    b.body(split, vec![destructure]);
    b.top_level(StmtKind::Function { decl: split });
    let arr = b.expr(ExprKind::Array { elems: vec![] }, strings);
    let call = b.call_fn(split, vec![arr], vec![]);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    let prg = b.finish();

    let bin = compile_ok(&prg, &CompileOptions::default());
    let text = procs_of(&bin, split)[0].print_to_string(None);
    // the source is read once and every element read takes its own reference
    assert_eq!(text.matches("incr($arg0_pair)").count(), 1, "{text}");
    assert_eq!(text.matches("Array_::getAt(").count(), 2, "{text}");
    assert_eq!(text.matches("Array_::getAt(incr($").count(), 2, "{text}");
    assert!(text.contains("_first := ") && text.contains("_last := "), "{text}");
}

#[test]
fn assignment_as_value_takes_extra_reference() {
    let mut b = ProgramBuilder::new();
    let string = b.string();
    let dup = b.function("dup", None);
    let params = b.signature(dup, &[("s", string)], string);
    let y = b.variable("y", string, None, Some(dup));
    let decl_y = b.var_stmt(y);
    let target = b.ident(y);
    let value = b.ident(params[0]);
    let assign = b.assign(target, value);
    let ret = b.ret(Some(assign));
    b.body(dup, vec![decl_y, ret]);
    b.top_level(StmtKind::Function { decl: dup });
    let arg = b.str_lit("x");
    let call = b.call_fn(dup, vec![arg], vec![]);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    let prg = b.finish();

    let bin = compile_ok(&prg, &CompileOptions::default());
    let text = procs_of(&bin, dup)[0].print_to_string(None);
    assert_eq!(text.matches("incr($arg0_s)").count(), 1, "{text}");
    assert!(text.contains("_y := "), "{text}");
    assert!(text.contains("incr(%"), "{text}");
}

#[test]
fn compiling_twice_gives_identical_binaries() {
    let h = hierarchy();
    let opts = CompileOptions { compute_used_symbols: true, ..Default::default() };
    let first = compile_ok(&h.prg, &opts);
    let second = compile_ok(&h.prg, &opts);
    assert_eq!(first.print_to_string(None), second.print_to_string(None));
    assert_eq!(first.used_symbols, second.used_symbols);

    let mut labels: Vec<&str> = first.procs.iter().map(|p| p.label.as_str()).collect();
    let count = labels.len();
    labels.sort();
    labels.dedup();
    assert_eq!(labels.len(), count);
}
