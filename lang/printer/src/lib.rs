//! Prettyprinter for the textual dumps of compiled procedures, vtables and
//! global layouts.
//!
//! IR types implement [`Print`] once; [`PrintExt`] and [`PrintToString`]
//! render them to plain writers, colored terminals or strings.
use std::io;

pub use pretty::DocAllocator;
pub use pretty::termcolor;
pub use pretty::termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

mod render;
mod theme;
mod types;

pub use theme::*;
pub use types::*;

/// Line width of dumps written to files or strings.
pub const DEFAULT_WIDTH: usize = 100;

/// Lay out a printable value and hand the resulting document to `emit`.
fn layout<T, R>(value: &T, cfg: &PrintCfg, emit: impl FnOnce(Builder<'_>) -> R) -> R
where
    T: for<'a> Print<'a>,
{
    let alloc = Alloc::new();
    emit(<T as Print<'_>>::print(value, cfg, &alloc))
}

pub trait PrintExt {
    fn print<W: io::Write>(&self, cfg: &PrintCfg, out: &mut W) -> io::Result<()>;
    fn print_colored<W: WriteColor>(&self, cfg: &PrintCfg, out: &mut W) -> io::Result<()>;
}

impl<T: for<'a> Print<'a>> PrintExt for T {
    fn print<W: io::Write>(&self, cfg: &PrintCfg, out: &mut W) -> io::Result<()> {
        layout(self, cfg, |doc| doc.1.render(cfg.width, out))
    }

    fn print_colored<W: WriteColor>(&self, cfg: &PrintCfg, out: &mut W) -> io::Result<()> {
        let mut target = render::RenderTermcolor::new(out);
        layout(self, cfg, |doc| doc.1.render_raw(cfg.width, &mut target))
    }
}

pub trait PrintToString {
    /// Render without colors, using [`PrintCfg::default`] when no config is given.
    fn print_to_string(&self, cfg: Option<&PrintCfg>) -> String;
}

impl<T: for<'a> Print<'a>> PrintToString for T {
    fn print_to_string(&self, cfg: Option<&PrintCfg>) -> String {
        let default = PrintCfg::default();
        let cfg = cfg.unwrap_or(&default);
        let mut buf = Vec::new();
        // Writing into a `Vec` cannot fail.
        let _ = PrintExt::print(self, cfg, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Line(&'static str, &'static str);

    impl<'a> Print<'a> for Line {
        fn print(&'a self, _cfg: &PrintCfg, alloc: &'a Alloc<'a>) -> Builder<'a> {
            alloc.keyword(self.0).append(alloc.space()).append(alloc.label(self.1.to_owned()))
        }
    }

    #[test]
    fn plain_rendering_drops_annotations() {
        assert_eq!(Line("proc", "_main").print_to_string(None), "proc _main");
    }

    #[test]
    fn missing_values_print_as_null() {
        let none: Option<Line> = None;
        assert_eq!(none.print_to_string(None), "null");
    }
}
