//! Translation of statements and expressions into IR.
//!
//! Every node is lowered into the current procedure of the [`Ctx`]. Errors are caught
//! at each statement and expression, so that one unsupported construct does not hide
//! the diagnostics of its siblings. A failed expression lowers to a zero word.

use corvid_lang_ast::{ExprId, ExprKind, StmtId};
use corvid_lang_ir::Expr;

use crate::ctx::Ctx;
use crate::result::BackendResult;

mod calls;
mod exprs;
mod funcs;
mod literals;
mod ops;
mod stmts;

pub trait Lower {
    type Target;

    fn lower(&self, ctx: &mut Ctx<'_>) -> BackendResult<Self::Target>;
}

impl Ctx<'_> {
    /// Lowers an expression, reporting errors at its location.
    ///
    /// Expressions that are referenced twice while lowering an assignment are lowered
    /// once and shared.
    pub(crate) fn emit_expr(&mut self, expr: ExprId) -> Expr {
        if let Some(cached) = self.ir_cache.get(&expr) {
            return cached.clone();
        }
        let e = &self.prg[expr];
        let res = self.catch_errors(e.file, e.span, |ctx| expr.lower(ctx)).unwrap_or(Expr::Number(0));
        if self.needs_cache.contains(&expr) {
            let shared = Expr::shared(res);
            self.ir_cache.insert(expr, shared.clone());
            return shared;
        }
        res
    }

    pub(crate) fn emit_exprs(&mut self, exprs: &[ExprId]) -> Vec<Expr> {
        exprs.iter().map(|e| self.emit_expr(*e)).collect()
    }

    pub(crate) fn emit_stmt(&mut self, stmt: StmtId) {
        let s = &self.prg[stmt];
        self.catch_errors(s.file, s.span, |ctx| stmt.lower(ctx));
    }

    /// Lowers an expression whose value is dropped.
    pub(crate) fn emit_ignored(&mut self, expr: ExprId) -> BackendResult<Expr> {
        let v = self.emit_expr(expr);
        if self.is_ref_expr(expr)? { Ok(Expr::decr(v)) } else { Ok(v) }
    }

    /// Lowers an expression evaluated for its side effects.
    pub(crate) fn emit_expr_as_stmt(&mut self, expr: ExprId) -> BackendResult {
        if is_noop_expr(&self.prg[expr].kind) {
            return Ok(());
        }
        let v = self.emit_ignored(expr)?;
        self.proc().emit_expr(v);
        self.proc().stack_empty();
        Ok(())
    }
}

/// Expressions without side effects, never worth evaluating as statements.
pub(crate) fn is_noop_expr(kind: &ExprKind) -> bool {
    matches!(
        kind,
        ExprKind::Ident { .. }
            | ExprKind::This
            | ExprKind::Number { .. }
            | ExprKind::String { .. }
            | ExprKind::Boolean { .. }
            | ExprKind::Null
            | ExprKind::Undefined
    )
}
