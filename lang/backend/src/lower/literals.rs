//! Numbers, strings, image literals and the array and object constructors.

use corvid_lang_ast::{DeclId, DeclKind, ExprId, ExprKind, FunctionKind, Type, TypeId};
use corvid_lang_ir::Expr;

use crate::ctx::Ctx;
use crate::result::{BackendError, BackendResult};

use super::calls::{Arg, Receiver};

/// Tagged encodings of the immediate values.
pub(crate) const TAG_UNDEFINED: i64 = 0;
pub(crate) const TAG_NULL: i64 = 6;
pub(crate) const TAG_FALSE: i64 = 10;
pub(crate) const TAG_TRUE: i64 = 66;

const TAGGED_MIN: f64 = -1073741824.0;
const TAGGED_MAX: f64 = 1073741824.0;

fn is_int32(n: f64) -> bool {
    n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64
}

impl Ctx<'_> {
    pub(crate) fn emit_number(&mut self, n: f64) -> BackendResult<Expr> {
        let target = &self.opts.target;
        if target.tagged_ints {
            if n.fract() == 0.0 && (TAGGED_MIN..TAGGED_MAX).contains(&n) && !target.box_debug {
                return Ok(Expr::Number(((n as i64) << 1) | 1));
            }
            return Ok(Expr::Pointer(self.bin.emit_double(n)));
        }
        if !target.floating_point {
            if n.fract() != 0.0 {
                return Err(Box::new(BackendError::Decimals));
            }
            if !is_int32(n) {
                return Err(Box::new(BackendError::NumberRange));
            }
            return Ok(Expr::Number(n as i64));
        }
        if target.ref_counting || !is_int32(n) {
            return Ok(Expr::Pointer(self.bin.emit_double(n)));
        }
        Ok(Expr::Number(n as i64))
    }

    pub(crate) fn emit_bool(&self, value: bool) -> Expr {
        match (self.opts.target.tagged_ints, value) {
            (true, true) => Expr::Number(TAG_TRUE),
            (true, false) => Expr::Number(TAG_FALSE),
            (false, value) => Expr::Number(value as i64),
        }
    }

    pub(crate) fn emit_null(&self) -> Expr {
        if self.opts.target.tagged_ints { Expr::Number(TAG_NULL) } else { Expr::Number(0) }
    }

    pub(crate) fn emit_undefined(&self) -> Expr {
        Expr::Number(TAG_UNDEFINED)
    }

    pub(crate) fn emit_string_literal(&mut self, text: &str) -> Expr {
        if text.is_empty() {
            return Expr::rt_call("String_::mkEmpty", vec![]);
        }
        let label = self.bin.emit_string(text);
        Expr::rt_call("pxt::ptrOfLiteral", vec![Expr::Pointer(label)])
    }

    /// Joins two owned strings.
    fn concat(left: Expr, right: Expr) -> Expr {
        Expr::rt_call_mask("String_::concat", vec![left, right], 3)
    }

    pub(crate) fn emit_template(&mut self, head: &str, spans: &[(ExprId, String)]) -> BackendResult<Expr> {
        let mut acc = self.emit_string_literal(head);
        for (expr, lit) in spans {
            let part = self.emit_as_string(*expr)?;
            acc = Self::concat(acc, part);
            if !lit.is_empty() {
                let lit = self.emit_string_literal(lit);
                acc = Self::concat(acc, lit);
            }
        }
        Ok(acc)
    }

    pub(crate) fn emit_concat(&mut self, left: ExprId, right: ExprId) -> BackendResult<Expr> {
        let left = self.emit_as_string(left)?;
        let right = self.emit_as_string(right)?;
        Ok(Self::concat(left, right))
    }

    /// Converts the value of an expression to an owned string.
    pub(crate) fn emit_as_string(&mut self, expr: ExprId) -> BackendResult<Expr> {
        let prg = self.prg;
        let e = &prg[expr];
        if let ExprKind::String { value } = &e.kind {
            return Ok(self.emit_string_literal(value));
        }
        match &prg[e.ty] {
            Type::Number | Type::Enum { .. } => {
                let v = self.emit_expr(expr);
                Ok(Expr::rt_call_mask("Number_::toString", vec![v], self.ref_bit(expr, 0)?))
            }
            Type::Boolean => {
                let v = self.emit_expr(expr);
                Ok(Expr::rt_call("Boolean_::toString", vec![v]))
            }
            Type::String => Ok(self.emit_expr(expr)),
            Type::Class { .. } | Type::Interface { .. } | Type::This { .. } => {
                let Some(method) = self.find_to_string(e.ty) else {
                    return Err(Box::new(BackendError::LacksToString { name: prg.type_to_string(e.ty) }));
                };
                self.emit_call_core(method, Some(Receiver::of(prg, expr)), Vec::new(), &[], e.ty)
            }
            _ => Err(Box::new(BackendError::ToStringUnknown)),
        }
    }

    fn find_to_string(&self, ty: TypeId) -> Option<DeclId> {
        let prg = self.prg;
        let candidate = match &prg[ty] {
            Type::Class { decl, .. } | Type::This { class: decl } => prg.find_member(*decl, "toString")?,
            Type::Interface { decl, .. } => match &prg[*decl].kind {
                DeclKind::Interface(iface) => {
                    *iface.members.iter().find(|m| prg[**m].name == "toString")?
                }
                _ => return None,
            },
            _ => return None,
        };
        let ok = match &prg[candidate].kind {
            DeclKind::Function(f) => {
                f.fun_kind == FunctionKind::Method && !f.is_static && f.params.is_empty()
            }
            DeclKind::Signature(s) => s.is_method,
            _ => false,
        };
        ok.then_some(candidate)
    }

    /// Bit `idx` of a runtime call mask, set when `expr` yields an owned reference.
    pub(crate) fn ref_bit(&self, expr: ExprId, idx: u32) -> BackendResult<u32> {
        Ok(if self.is_ref_expr(expr)? { 1 << idx } else { 0 })
    }

    /// Encodes an image literal into the binary and returns its label.
    ///
    /// Pixels are separated by whitespace, rows by newlines.
    pub(crate) fn emit_image_literal(&mut self, text: &str) -> BackendResult<String> {
        let default_image = "0 0 0 0 0\n".repeat(5);
        let text = if text.is_empty() { default_image.as_str() } else { text };
        let mut width = None;
        let mut x = 0;
        let mut height = 0;
        let mut pixels = Vec::new();
        for c in text.chars() {
            match c {
                '.' | '_' | '0' => {
                    pixels.push(0);
                    x += 1;
                }
                '#' | '*' | '1' => {
                    pixels.push(1);
                    x += 1;
                }
                '\t' | '\r' | ' ' => {}
                '\n' => {
                    if x > 0 {
                        match width {
                            None => width = Some(x),
                            Some(w) if w != x => {
                                return Err(Box::new(BackendError::ImageWidth { first: w, then: x }));
                            }
                            Some(_) => {}
                        }
                        x = 0;
                        height += 1;
                    }
                }
                _ => return Err(Box::new(BackendError::ImageChar)),
            }
        }
        if x > 0 {
            match width {
                Some(w) if w != x => return Err(Box::new(BackendError::ImageWidth { first: w, then: x })),
                _ => width = Some(x),
            }
            height += 1;
        }
        Ok(self.bin.emit_image(width.unwrap_or(0), height, pixels))
    }

    pub(crate) fn emit_array_literal(&mut self, ty: TypeId, elems: &[ExprId]) -> BackendResult<Expr> {
        let prg = self.prg;
        let flag = match &prg[ty] {
            Type::Array { elem } if matches!(prg[*elem], Type::String) => 3,
            Type::Array { elem } if self.is_ref_type(*elem)? => 1,
            _ => 0,
        };
        let coll = Expr::shared(Expr::rt_call("Array_::mk", vec![Expr::Number(flag)]));
        for elem in elems {
            let is_ref = self.is_ref_expr(*elem)?;
            let v = Expr::shared(self.emit_expr(*elem));
            self.proc().emit_expr(Expr::rt_call("Array_::push", vec![coll.clone(), v.clone()]));
            if is_ref {
                self.proc().emit_expr(Expr::decr(v));
            }
        }
        Ok(coll)
    }

    pub(crate) fn emit_object_literal(&mut self, props: &[(String, ExprId)]) -> BackendResult<Expr> {
        let obj = Expr::shared(Expr::rt_call("pxtrt::mkMap", vec![]));
        for (name, value) in props {
            let method = if self.is_ref_expr(*value)? { "pxtrt::mapSetRef" } else { "pxtrt::mapSet" };
            let key = self.iface_member_id(name);
            let v = self.emit_expr(*value);
            self.proc().emit_expr(Expr::rt_call(
                method,
                vec![Expr::incr(obj.clone()), Expr::Number(key as i64), v],
            ));
        }
        Ok(obj)
    }

    /// Replaces the first argument of an image-literal function by the encoded image.
    pub(crate) fn image_literal_arg(&mut self, args: &mut [Arg]) -> BackendResult {
        let prg = self.prg;
        let Some(first) = args.first_mut() else { return Ok(()) };
        let Arg::Expr(expr) = first else {
            return Err(Box::new(BackendError::ImageLiteralArgument { kind: "computed value".to_owned() }));
        };
        let ExprKind::String { value } = &prg[*expr].kind else {
            return Err(Box::new(BackendError::ImageLiteralArgument {
                kind: prg[*expr].kind.syntax_name().to_owned(),
            }));
        };
        let label = self.emit_image_literal(value)?;
        *first = Arg::Value(Expr::Pointer(label), false);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use corvid_lang_ast::ProgramBuilder;
    use corvid_lang_ir::Expr;

    use crate::ctx::Ctx;
    use crate::options::{CompileOptions, CompileTarget};

    fn with_ctx(target: CompileTarget, f: impl FnOnce(&mut Ctx<'_>)) {
        let prg = ProgramBuilder::new().finish();
        let opts = CompileOptions { target, ..Default::default() };
        let mut ctx = Ctx::new(&prg, &opts);
        f(&mut ctx)
    }

    #[test]
    fn tagged_numbers() {
        with_ctx(CompileTarget::default(), |ctx| {
            assert_eq!(ctx.emit_number(3.0).unwrap().as_number(), Some(7));
            assert_eq!(ctx.emit_number(-1.0).unwrap().as_number(), Some(-1));
            assert!(matches!(ctx.emit_number(0.5).unwrap(), Expr::Pointer(ref l) if l == "_dbl0"));
            assert!(matches!(ctx.emit_number(2e9).unwrap(), Expr::Pointer(ref l) if l == "_dbl1"));
        });
    }

    #[test]
    fn legacy_numbers() {
        with_ctx(CompileTarget::legacy(), |ctx| {
            assert_eq!(ctx.emit_number(3.0).unwrap().as_number(), Some(3));
            assert_eq!(ctx.emit_number(0.5).unwrap_err().code_number(), 9257);
            assert_eq!(ctx.emit_number(1e12).unwrap_err().code_number(), 9258);
        });
    }

    #[test]
    fn managed_numbers_are_words() {
        with_ctx(CompileTarget::managed(), |ctx| {
            assert_eq!(ctx.emit_number(12.0).unwrap().as_number(), Some(12));
            assert!(matches!(ctx.emit_number(1.25).unwrap(), Expr::Pointer(_)));
        });
    }

    #[test]
    fn immediates() {
        with_ctx(CompileTarget::default(), |ctx| {
            assert_eq!(ctx.emit_bool(true).as_number(), Some(66));
            assert_eq!(ctx.emit_bool(false).as_number(), Some(10));
            assert_eq!(ctx.emit_null().as_number(), Some(6));
        });
        with_ctx(CompileTarget::legacy(), |ctx| {
            assert_eq!(ctx.emit_bool(true).as_number(), Some(1));
            assert_eq!(ctx.emit_null().as_number(), Some(0));
        });
    }

    #[test]
    fn image_literals() {
        with_ctx(CompileTarget::default(), |ctx| {
            let label = ctx.emit_image_literal("# . #\n. # .\n").unwrap();
            let img = &ctx.bin.images[0];
            assert_eq!(img.label, label);
            assert_eq!((img.width, img.height), (3, 2));
            assert_eq!(img.pixels, vec![1, 0, 1, 0, 1, 0]);

            ctx.emit_image_literal("").unwrap();
            assert_eq!((ctx.bin.images[1].width, ctx.bin.images[1].height), (5, 5));

            assert_eq!(ctx.emit_image_literal("# #\n#\n").unwrap_err().code_number(), 9205);
            assert_eq!(ctx.emit_image_literal("# x").unwrap_err().code_number(), 9206);
        });
    }
}
