//! Typed view of the `//% key=value` annotations attached to declarations.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallingConvention {
    #[default]
    Plain,
    Async,
    Promise,
}

/// The annotation keys understood by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrKey {
    Shim,
    EnumVal,
    Helper,
    ImageLiteral,
    IndexerGet,
    IndexerSet,
    NoRefCounting,
    Deferred,
    Async,
    Promise,
    /// Editor metadata, accepted and ignored.
    Block,
    BlockId,
    /// `<param>.defl`
    ParamDefl(String),
}

impl AttrKey {
    pub fn parse(key: &str) -> Option<AttrKey> {
        let key = match key {
            "shim" => AttrKey::Shim,
            "enumval" => AttrKey::EnumVal,
            "helper" => AttrKey::Helper,
            "imageLiteral" => AttrKey::ImageLiteral,
            "indexerGet" => AttrKey::IndexerGet,
            "indexerSet" => AttrKey::IndexerSet,
            "noRefCounting" => AttrKey::NoRefCounting,
            "deferred" => AttrKey::Deferred,
            "async" => AttrKey::Async,
            "promise" => AttrKey::Promise,
            "block" => AttrKey::Block,
            "blockId" => AttrKey::BlockId,
            other => match other.strip_suffix(".defl") {
                Some(param) if !param.is_empty() => AttrKey::ParamDefl(param.to_owned()),
                _ => return None,
            },
        };
        Some(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attrs {
    pub shim: Option<String>,
    pub enum_val: Option<String>,
    pub helper: Option<String>,
    /// Width in pixels of one frame of an image literal.
    pub image_literal: Option<u32>,
    pub indexer_get: Option<String>,
    pub indexer_set: Option<String>,
    pub no_ref_counting: bool,
    pub deferred: bool,
    pub calling_convention: CallingConvention,
    pub param_defl: BTreeMap<String, String>,
}

/// A problem found while reading annotations. These never stop compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrWarning {
    UnknownKey(String),
    InvalidValue { key: String, value: String },
}

impl fmt::Display for AttrWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrWarning::UnknownKey(key) => write!(f, "unknown annotation key '{key}'"),
            AttrWarning::InvalidValue { key, value } => {
                write!(f, "invalid value '{value}' for annotation key '{key}'")
            }
        }
    }
}

impl Attrs {
    /// Parse all `//%` lines of a declaration comment.
    pub fn parse(comment: &str) -> (Attrs, Vec<AttrWarning>) {
        let mut attrs = Attrs::default();
        let mut warnings = Vec::new();
        for line in comment.lines() {
            let Some(idx) = line.find("//%") else { continue };
            for (key, value) in tokenize(&line[idx + 3..]) {
                match AttrKey::parse(&key) {
                    Some(k) => attrs.set(k, &key, value, &mut warnings),
                    None => warnings.push(AttrWarning::UnknownKey(key)),
                }
            }
        }
        (attrs, warnings)
    }

    fn set(&mut self, key: AttrKey, raw_key: &str, value: String, warnings: &mut Vec<AttrWarning>) {
        match key {
            AttrKey::Shim => self.shim = Some(value),
            AttrKey::EnumVal => self.enum_val = Some(value),
            AttrKey::Helper => self.helper = Some(value),
            AttrKey::ImageLiteral => match value.parse() {
                Ok(width) => self.image_literal = Some(width),
                Err(_) => warnings
                    .push(AttrWarning::InvalidValue { key: raw_key.to_owned(), value }),
            },
            AttrKey::IndexerGet => self.indexer_get = Some(value),
            AttrKey::IndexerSet => self.indexer_set = Some(value),
            AttrKey::NoRefCounting => self.no_ref_counting = value != "false",
            AttrKey::Deferred => self.deferred = value != "false",
            AttrKey::Async => self.calling_convention = CallingConvention::Async,
            AttrKey::Promise => self.calling_convention = CallingConvention::Promise,
            AttrKey::Block | AttrKey::BlockId => {}
            AttrKey::ParamDefl(param) => {
                self.param_defl.insert(param, value);
            }
        }
    }

    pub fn is_shim(&self) -> bool {
        self.shim.is_some()
    }
}

/// Splits `a=1 b="x y" c` into key/value pairs. Bare keys have the value `true`.
fn tokenize(input: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut chars = input.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| c.is_alphanumeric() || *c == '_' || *c == '.') {
            key.push(c);
        }
        if key.is_empty() {
            // skip garbage up to the next separator
            if chars.next().is_none() {
                break;
            }
            while chars.next_if(|c| !c.is_whitespace()).is_some() {}
            continue;
        }
        if chars.next_if_eq(&'=').is_none() {
            out.push((key, "true".to_owned()));
            continue;
        }
        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    c => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                value.push(c);
            }
        }
        out.push((key, value));
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_known_keys() {
        let (attrs, warnings) =
            Attrs::parse("/** Doc */\n//% shim=control::pause async\n//% x.defl=10 noRefCounting");
        assert!(warnings.is_empty());
        assert_eq!(attrs.shim.as_deref(), Some("control::pause"));
        assert_eq!(attrs.calling_convention, CallingConvention::Async);
        assert_eq!(attrs.param_defl.get("x").map(String::as_str), Some("10"));
        assert!(attrs.no_ref_counting);
    }

    #[test]
    fn quoted_values() {
        let (attrs, _) = Attrs::parse(r#"//% helper="image \"frame\"" enumval=3"#);
        assert_eq!(attrs.helper.as_deref(), Some("image \"frame\""));
        assert_eq!(attrs.enum_val.as_deref(), Some("3"));
    }

    #[test]
    fn unknown_keys_warn() {
        let (attrs, warnings) = Attrs::parse("//% fancy=1 imageLiteral=wide");
        assert_eq!(attrs, Attrs::default());
        assert_eq!(
            warnings,
            vec![
                AttrWarning::UnknownKey("fancy".to_owned()),
                AttrWarning::InvalidValue {
                    key: "imageLiteral".to_owned(),
                    value: "wide".to_owned()
                },
            ]
        );
    }

    #[test]
    fn lines_without_marker_are_ignored() {
        let (attrs, warnings) = Attrs::parse("// shim=foo\n/* deferred */");
        assert!(warnings.is_empty());
        assert!(!attrs.is_shim());
        assert!(!attrs.deferred);
    }
}
