use std::cell::RefCell;
use std::rc::Rc;

use fxhash::FxHashMap;
use pretty::DocAllocator;

use corvid_lang_printer::{Alloc, Builder, Print, PrintCfg, ThemeExt};

use crate::binary::{Binary, VTable};
use crate::exprs::{CallTarget, Expr};
use crate::procedure::Procedure;
use crate::stmts::{JmpMode, Stmt};

/// Numbers shared definitions in order of first appearance.
#[derive(Default)]
struct SharedNames {
    names: RefCell<FxHashMap<usize, usize>>,
}

impl SharedNames {
    /// The number of a shared definition and whether this is its first appearance.
    fn name(&self, ptr: usize) -> (usize, bool) {
        let mut names = self.names.borrow_mut();
        let next = names.len();
        match names.get(&ptr) {
            Some(n) => (*n, false),
            None => {
                names.insert(ptr, next);
                (next, true)
            }
        }
    }
}

fn args_doc<'a>(args: &'a [Expr], names: &SharedNames, alloc: &'a Alloc<'a>) -> Builder<'a> {
    let docs = args.iter().map(|a| expr_doc(a, names, alloc));
    alloc.intersperse(docs, alloc.text(", ")).parens()
}

fn expr_doc<'a>(e: &'a Expr, names: &SharedNames, alloc: &'a Alloc<'a>) -> Builder<'a> {
    match e {
        Expr::Number(n) => alloc.literal(n.to_string()),
        Expr::Pointer(lbl) => alloc.text("&").append(alloc.label(lbl.clone())),
        Expr::RuntimeCall { name, args, mask } => {
            let doc = alloc.runtime(name).append(args_doc(args, names, alloc));
            if *mask != 0 { doc.append(alloc.text(format!("^{mask}"))) } else { doc }
        }
        Expr::ProcCall { target, args } => {
            let head = match target {
                CallTarget::Direct { label, .. } => {
                    alloc.keyword("call ").append(alloc.label(label.clone()))
                }
                CallTarget::Virtual { index } => alloc.keyword("vcall").append(format!("[{index}]")),
                CallTarget::Iface { member, map_method, map_key } => {
                    let doc = alloc.keyword("icall").append(format!("[{member}]"));
                    match map_method {
                        Some(m) => doc.append(format!("<{m}:{map_key}>")),
                        None => doc,
                    }
                }
            };
            head.append(args_doc(args, names, alloc))
        }
        Expr::Shared(def) => {
            let (n, first) = names.name(Rc::as_ptr(def) as usize);
            if first {
                alloc.text(format!("%{n}=")).append(expr_doc(&def.expr, names, alloc).parens())
            } else {
                alloc.text(format!("%{n}"))
            }
        }
        Expr::FieldAccess { object, field } => {
            expr_doc(object, names, alloc).append(format!(".{}", field.name))
        }
        Expr::Store { target, value } => expr_doc(target, names, alloc)
            .append(" := ")
            .append(expr_doc(value, names, alloc)),
        Expr::CellRef(cell) => alloc.text(cell.to_string()),
        Expr::Incr(e) => alloc.keyword("incr").append(expr_doc(e, names, alloc).parens()),
        Expr::Decr(e) => alloc.keyword("decr").append(expr_doc(e, names, alloc).parens()),
        Expr::Sequence(es) => {
            let docs = es.iter().map(|a| expr_doc(a, names, alloc));
            alloc.intersperse(docs, alloc.text("; ")).parens()
        }
        Expr::JmpValue => alloc.keyword("jmpval"),
        Expr::Nop => alloc.keyword("nop"),
    }
}

fn stmt_doc<'a>(s: &'a Stmt, names: &SharedNames, alloc: &'a Alloc<'a>) -> Builder<'a> {
    match s {
        Stmt::Expr(e) => expr_doc(e, names, alloc),
        Stmt::Label(l) => alloc.label(format!("{l}:")),
        Stmt::Jmp { mode, target, expr } => {
            let cond = match mode {
                JmpMode::Always => "",
                JmpMode::IfZero => " if zero",
                JmpMode::IfNotZero => " if not zero",
                JmpMode::IfJmpValEq => " if jmpval ==",
            };
            let doc = alloc.keyword("jmp ").append(alloc.label(target.clone())).append(cond);
            match expr {
                Some(e) => doc.append(" ").append(expr_doc(e, names, alloc)),
                None => doc,
            }
        }
        Stmt::StackEmpty => alloc.comment("; stack empty".to_owned()),
        Stmt::Breakpoint(id) => alloc.keyword("breakpoint").append(format!(" {id}")),
    }
}

impl<'a> Print<'a> for Procedure {
    fn print(&'a self, cfg: &PrintCfg, alloc: &'a Alloc<'a>) -> Builder<'a> {
        let names = SharedNames::default();
        let cells = |label: &str, cells: &[crate::Cell]| {
            let list: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
            format!("{label}: [{}]", list.join(", "))
        };
        let header = alloc
            .keyword("proc ")
            .append(alloc.label(self.label.clone()))
            .append(" ")
            .append(alloc.comment(format!(
                "; {} {} {}",
                cells("args", &self.args),
                cells("locals", &self.locals),
                cells("captured", &self.captured)
            )));
        let body = self.body.iter().map(|s| match s {
            Stmt::Label(_) => alloc.hardline().append(stmt_doc(s, &names, alloc)),
            _ => alloc
                .hardline()
                .append(stmt_doc(s, &names, alloc))
                .nest(cfg.indent),
        });
        header.append(alloc.concat(body))
    }
}

impl<'a> Print<'a> for VTable {
    fn print(&'a self, _cfg: &PrintCfg, alloc: &'a Alloc<'a>) -> Builder<'a> {
        let methods: Vec<String> = self.methods.iter().map(|p| p.to_string()).collect();
        let iface: Vec<String> = self
            .iface_table
            .iter()
            .map(|p| p.map(|p| p.to_string()).unwrap_or_else(|| "null".to_owned()))
            .collect();
        alloc
            .keyword("vtable ")
            .append(alloc.label(self.label.clone()))
            .append(format!(
                " {} fields={} ref_fields={} methods=[{}] iface=[{}]",
                self.class_name,
                self.num_fields,
                self.num_ref_fields,
                methods.join(", "),
                iface.join(", ")
            ))
    }
}

impl<'a> Print<'a> for Binary {
    fn print(&'a self, cfg: &PrintCfg, alloc: &'a Alloc<'a>) -> Builder<'a> {
        let sep = if cfg.omit_proc_sep { alloc.hardline() } else { alloc.hardline().append(alloc.hardline()) };
        let procs = self.procs.iter().map(|p| p.print(cfg, alloc));
        let mut doc = alloc.intersperse(procs, sep.clone());
        if !self.vtables.is_empty() {
            let vtables = self.vtables.iter().map(|v| v.print(cfg, alloc));
            doc = doc.append(sep.clone()).append(alloc.intersperse(vtables, alloc.hardline()));
        }
        let globals = self.globals.iter().enumerate().map(|(i, g)| {
            let offset = self.layout.offsets.get(i).copied().unwrap_or_default();
            alloc.text(format!("global {g} @{offset}"))
        });
        doc = doc
            .append(sep)
            .append(alloc.comment(format!("; globals: {} words", self.layout.words)));
        for g in globals {
            doc = doc.append(alloc.hardline()).append(g);
        }
        for (text, label) in &self.strings {
            doc = doc.append(alloc.hardline()).append(alloc.label(label.clone())).append(format!(" = {text:?}"));
        }
        for (bits, label) in &self.doubles {
            doc = doc
                .append(alloc.hardline())
                .append(alloc.label(label.clone()))
                .append(format!(" = {}", f64::from_bits(*bits)));
        }
        for (i, member) in self.iface_members.iter().enumerate() {
            doc = doc.append(alloc.hardline()).append(alloc.comment(format!("; iface {i} {member}")));
        }
        // breakpoint 0 is a placeholder
        for bp in self.breakpoints.iter().skip(1) {
            doc = doc.append(alloc.hardline()).append(alloc.comment(format!(
                "; breakpoint {} {}:{}:{}",
                bp.id, bp.file, bp.line, bp.character
            )));
        }
        for symbol in &self.used_symbols {
            doc = doc.append(alloc.hardline()).append(alloc.comment(format!("; used {symbol}")));
        }
        doc.append(alloc.hardline())
    }
}

#[cfg(test)]
mod test {
    use corvid_lang_ast::DeclId;
    use corvid_lang_printer::PrintToString;

    use crate::*;

    #[test]
    fn shared_definitions_are_numbered() {
        let mut p = Procedure::new(ProcId(0), Action::Decl(DeclId(2)), "_f__P2".to_owned(), String::new());
        let cell = p.mk_local(VarKey::Temp(0), "x", true, false);
        p.emit_expr(cell.store_by_ref(Expr::rt_call("pxt::mk", vec![])));
        let out = p.print_to_string(None);
        assert!(out.starts_with("proc _f__P2"), "{out}");
        assert!(out.contains("(%0=(pxt::mk()); decr($0_x); $0_x := %0)"), "{out}");
    }
}
