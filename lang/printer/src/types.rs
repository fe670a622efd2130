use pretty::DocAllocator;

#[derive(Debug, Clone, Copy)]
pub enum Anno {
    Keyword,
    Label,
    Runtime,
    Literal,
    Comment,
}

pub type Alloc<'a> = pretty::Arena<'a, Anno>;
pub type Builder<'a> = pretty::DocBuilder<'a, Alloc<'a>, Anno>;

pub trait Print<'a> {
    fn print(&'a self, cfg: &PrintCfg, alloc: &'a Alloc<'a>) -> Builder<'a>;
}

impl<'a, T: Print<'a>> Print<'a> for &T {
    fn print(&'a self, cfg: &PrintCfg, alloc: &'a Alloc<'a>) -> Builder<'a> {
        T::print(self, cfg, alloc)
    }
}

impl<'a, T: Print<'a>> Print<'a> for Option<T> {
    fn print(&'a self, cfg: &PrintCfg, alloc: &'a Alloc<'a>) -> Builder<'a> {
        match self {
            Some(x) => x.print(cfg, alloc),
            None => alloc.text("null").annotate(Anno::Literal),
        }
    }
}

pub struct PrintCfg {
    /// The width of the output terminal/device. Width is used for
    /// the insertion of linebreaks.
    pub width: usize,
    /// How many spaces of indentation are used
    pub indent: isize,
    /// Whether to omit the empty line between procedures.
    pub omit_proc_sep: bool,
}

impl Default for PrintCfg {
    fn default() -> Self {
        Self { width: crate::DEFAULT_WIDTH, indent: 4, omit_proc_sep: false }
    }
}
