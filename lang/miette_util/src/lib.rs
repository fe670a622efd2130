//! Source positions of the input program and their conversion into the span
//! types `miette` uses to underline diagnostics.
pub mod span;

pub use span::*;

pub trait ToMiette {
    type Target;

    fn to_miette(self) -> Self::Target;
}

impl ToMiette for ByteIndex {
    type Target = miette::SourceOffset;

    fn to_miette(self) -> Self::Target {
        self.to_usize().into()
    }
}

impl ToMiette for Span {
    type Target = miette::SourceSpan;

    fn to_miette(self) -> Self::Target {
        miette::SourceSpan::new(self.start.to_miette(), self.len())
    }
}

impl<T: ToMiette> ToMiette for Option<T> {
    type Target = Option<T::Target>;

    fn to_miette(self) -> Self::Target {
        self.map(ToMiette::to_miette)
    }
}
