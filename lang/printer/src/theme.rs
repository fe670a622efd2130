use pretty::DocAllocator;
use pretty::termcolor::{Color, ColorSpec};

use super::types::*;

const KEYWORD: Color = Color::Magenta;
const LABEL: Color = Color::Blue;
const RUNTIME: Color = Color::Green;
const LITERAL: Color = Color::Yellow;
const COMMENT: Color = Color::Cyan;

pub trait ThemeExt<'a> {
    fn keyword(&'a self, text: &'a str) -> Builder<'a>;
    fn label(&'a self, text: String) -> Builder<'a>;
    fn runtime(&'a self, text: &'a str) -> Builder<'a>;
    fn literal(&'a self, text: String) -> Builder<'a>;
    fn comment(&'a self, text: String) -> Builder<'a>;
}

impl<'a> ThemeExt<'a> for Alloc<'a> {
    fn keyword(&'a self, text: &'a str) -> Builder<'a> {
        self.text(text).annotate(Anno::Keyword)
    }

    fn label(&'a self, text: String) -> Builder<'a> {
        self.text(text).annotate(Anno::Label)
    }

    fn runtime(&'a self, text: &'a str) -> Builder<'a> {
        self.text(text).annotate(Anno::Runtime)
    }

    fn literal(&'a self, text: String) -> Builder<'a> {
        self.text(text).annotate(Anno::Literal)
    }

    fn comment(&'a self, text: String) -> Builder<'a> {
        self.text(text).annotate(Anno::Comment)
    }
}

impl Anno {
    pub fn color_spec(&self) -> ColorSpec {
        match self {
            Anno::Keyword => KEYWORD.spec(),
            Anno::Label => LABEL.spec(),
            Anno::Runtime => RUNTIME.spec(),
            Anno::Literal => LITERAL.spec(),
            Anno::Comment => COMMENT.spec(),
        }
    }
}

pub trait ColorExt {
    fn spec(self) -> ColorSpec;
}

impl ColorExt for Color {
    fn spec(self) -> ColorSpec {
        ColorSpec::new().set_fg(Some(self)).clone()
    }
}
