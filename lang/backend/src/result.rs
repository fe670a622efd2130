use std::fmt;

use miette::{LabeledSpan, Severity};
use thiserror::Error;

use corvid_lang_ast::FileId;
use corvid_lang_miette_util::{Span, ToMiette};

/// Errors raised while lowering a program.
///
/// The error code of every variant is the numeric diagnostic code reported to the user.
/// Source locations are attached when the error is caught, see [`Diagnostic`].
#[derive(Error, miette::Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Internal error: {message}")]
    #[diagnostic(code("E9200"))]
    Impossible { message: String },
    #[error("Unsupported type: {ty}")]
    #[diagnostic(code("E9201"))]
    UnsupportedType { ty: String },
    #[error("{syntax} not {}supported{}", future_prefix(.future), alternative_suffix(.alternative))]
    #[diagnostic(code("E9202"))]
    Unhandled { syntax: String, future: bool, alternative: Option<String> },
    #[error("variable has unknown type")]
    #[diagnostic(code("E9203"))]
    UnknownVariableType,
    #[error("void-typed variables not supported")]
    #[diagnostic(code("E9203"))]
    VoidVariable,
    #[error("cannot locate identifier {name}")]
    #[diagnostic(code("E9204"))]
    CannotLocate { name: String },
    #[error(
        "lines in image literal have to have the same width (got {first} and then {then} pixels)"
    )]
    #[diagnostic(code("E9205"))]
    ImageWidth { first: usize, then: usize },
    #[error("Only 0 . _ (off) and 1 # * (on) are allowed in image literals")]
    #[diagnostic(code("E9206"))]
    ImageChar,
    #[error("built-in functions cannot be yet used as values; did you forget ()?")]
    #[diagnostic(code("E9207"))]
    BuiltinAsValue,
    #[error("'this' used outside of a method")]
    #[diagnostic(code("E9208"))]
    ThisOutsideMethod,
    #[error("class field initializers not supported")]
    #[diagnostic(code("E9209"))]
    FieldInitializer,
    #[error("Cannot compute enum value")]
    #[diagnostic(code("E9210"))]
    EnumValue,
    #[error("cannot use method as lambda; did you forget '()' ?")]
    #[diagnostic(code("E9211"))]
    MethodAsLambda,
    #[error("only numbers, null, true and false supported as default arguments")]
    #[diagnostic(code("E9212"))]
    DefaultArgument,
    #[error("cannot compute default value of parameter {name}")]
    #[diagnostic(code("E9213"))]
    DefaultParameter { name: String },
    #[error("Only image literals (string literals) supported here; {kind}")]
    #[diagnostic(code("E9214"))]
    ImageLiteralArgument { kind: String },
    #[error("helpers.{name} not found")]
    #[diagnostic(code("E9215"))]
    HelperNotFound { name: String },
    #[error("helpers.{name} isn't a function")]
    #[diagnostic(code("E9216"))]
    HelperNotFunction { name: String },
    #[error("lambda functions with more than 3 arguments not supported")]
    #[diagnostic(code("E9217"))]
    LambdaArity,
    #[error("to convert X to string use: X + \"\"")]
    #[diagnostic(code("E9219"))]
    StringCall,
    #[error("namespaces cannot be called directly")]
    #[diagnostic(code("E9220"))]
    NamespaceCall,
    #[error("new expression only supported on class types")]
    #[diagnostic(code("E9221"))]
    NewOnNonClass,
    #[error("constructor with arguments not found")]
    #[diagnostic(code("E9222"))]
    ConstructorNotFound,
    #[error("cannot find captured value: {name}")]
    #[diagnostic(code("E9223"))]
    CapturedNotFound { name: String },
    #[error("field {name} not found")]
    #[diagnostic(code("E9224"))]
    FieldNotFound { name: String },
    #[error("don't know how to convert to string")]
    #[diagnostic(code("E9225"))]
    ToStringUnknown,
    #[error("class {name} inherits from itself")]
    #[diagnostic(code("E9227"))]
    CyclicInheritance { name: String },
    #[error("{message}")]
    #[diagnostic(code("E9228"))]
    InvalidHeritage { message: String },
    #[error("cannot find outer loop")]
    #[diagnostic(code("E9230"))]
    NoOuterLoop,
    #[error("continue on non-loop")]
    #[diagnostic(code("E9231"))]
    ContinueNonLoop,
    #[error("generic functions cannot be yet used as values")]
    #[diagnostic(code("E9232"))]
    GenericAsValue,
    #[error("function expressions cannot be generic")]
    #[diagnostic(code("E9233"))]
    GenericFunctionExpression,
    #[error("nested functions cannot be yet generic")]
    #[diagnostic(code("E9234"))]
    GenericClosure,
    #[error("Unknown or undeclared identifier")]
    #[diagnostic(code("E9235"))]
    UnknownIdentifier,
    #[error("no shim for {name}")]
    #[diagnostic(code("E9236"))]
    NoShim { name: String },
    #[error("Unknown property access for {kind}")]
    #[diagnostic(code("E9237"))]
    UnknownPropertyAccess { kind: String },
    #[error("non-numeric indexer on {ty}")]
    #[diagnostic(code("E9238"))]
    NonNumericIndexer { ty: String },
    #[error("unsupported indexer")]
    #[diagnostic(code("E9239"))]
    UnsupportedIndexer,
    #[error("strange method call")]
    #[diagnostic(code("E9241"))]
    StrangeMethodCall,
    #[error("unknown type for new")]
    #[diagnostic(code("E9243"))]
    UnknownNewType,
    #[error("unsupported prefix unary operation {op}")]
    #[diagnostic(code("E9245"))]
    UnsupportedPrefix { op: String },
    #[error("unsupported postfix unary operation {op}")]
    #[diagnostic(code("E9246"))]
    UnsupportedPostfix { op: String },
    #[error("bad field access")]
    #[diagnostic(code("E9247"))]
    BadFieldAccess,
    #[error("bad target identifier")]
    #[diagnostic(code("E9248"))]
    BadTargetIdentifier,
    #[error("bad assignment target")]
    #[diagnostic(code("E9249"))]
    BadAssignmentTarget,
    #[error("unsupported numeric operator {op}")]
    #[diagnostic(code("E9250"))]
    UnsupportedNumericOp { op: String },
    #[error("unknown string operator {op}")]
    #[diagnostic(code("E9251"))]
    UnknownStringOp { op: String },
    #[error("unknown generic operator {op}")]
    #[diagnostic(code("E9252"))]
    UnknownGenericOp { op: String },
    #[error("setter not available")]
    #[diagnostic(code("E9253"))]
    NoSetter,
    #[error("type {name} lacks toString() method")]
    #[diagnostic(code("E9254"))]
    LacksToString { name: String },
    #[error(
        "the overriding method is currently required to have the same number of arguments as the base one"
    )]
    #[diagnostic(code("E9255"))]
    OverrideParamCount,
    #[error("bit sizes are not supported for locals and parameters")]
    #[diagnostic(code("E9256"))]
    LocalBitSize,
    #[error("Decimal numbers are not supported")]
    #[diagnostic(code("E9257"))]
    Decimals,
    #[error("Number is either too big or too small")]
    #[diagnostic(code("E9258"))]
    NumberRange,
    #[error("generic functions cannot be nested in generic scopes")]
    #[diagnostic(code("E9259"))]
    NestedGeneric,
    #[error("{message}")]
    #[diagnostic(code("E9260"), severity(Warning))]
    Annotation { message: String },
    #[error("Cannot cast {from} to {to}: {reason}")]
    #[diagnostic(code("E9261"))]
    InvalidCast { from: String, to: String, reason: String },
    #[error("Invalid target configuration: {message}")]
    #[diagnostic(code("E9263"))]
    InvalidTarget { message: String },
}

fn future_prefix(future: &bool) -> &'static str {
    if *future { "currently " } else { "" }
}

fn alternative_suffix(alternative: &Option<String>) -> String {
    alternative.as_ref().map(|alt| format!(" - {alt}")).unwrap_or_default()
}

impl BackendError {
    pub fn impossible(message: impl Into<String>) -> Box<Self> {
        Box::new(BackendError::Impossible { message: message.into() })
    }

    /// A construct outside of the supported language subset.
    pub fn unhandled(syntax: &str) -> Box<Self> {
        Box::new(BackendError::Unhandled { syntax: syntax.to_owned(), future: false, alternative: None })
    }

    /// A construct that may be supported in a later version.
    pub fn future(syntax: &str) -> Box<Self> {
        Box::new(BackendError::Unhandled { syntax: syntax.to_owned(), future: true, alternative: None })
    }

    pub fn unhandled_with(syntax: &str, alternative: &str) -> Box<Self> {
        Box::new(BackendError::Unhandled {
            syntax: syntax.to_owned(),
            future: false,
            alternative: Some(alternative.to_owned()),
        })
    }

    /// The numeric code reported to the user.
    pub fn code_number(&self) -> u32 {
        use miette::Diagnostic as _;

        self.code()
            .and_then(|code| code.to_string().trim_start_matches('E').parse().ok())
            .unwrap_or(9200)
    }
}

pub type BackendResult<T = ()> = Result<T, Box<BackendError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Error,
    Warning,
    Message,
}

/// A reported problem together with the location it was caught at.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct Diagnostic {
    pub category: Category,
    pub code: u32,
    pub message: String,
    pub file: Option<FileId>,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn from_error(err: &BackendError, file: Option<FileId>, span: Option<Span>) -> Self {
        let category = match err {
            BackendError::Annotation { .. } => Category::Warning,
            _ => Category::Error,
        };
        Diagnostic { category, code: err.code_number(), message: err.to_string(), file, span }
    }

    pub fn is_error(&self) -> bool {
        self.category == Category::Error
    }
}

struct Code(u32);

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl miette::Diagnostic for Diagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(Code(self.code)))
    }

    fn severity(&self) -> Option<Severity> {
        Some(match self.category {
            Category::Error => Severity::Error,
            Category::Warning => Severity::Warning,
            Category::Message => Severity::Advice,
        })
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        Some(Box::new(std::iter::once(LabeledSpan::underline(span.to_miette()))))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn codes_are_numeric() {
        assert_eq!(BackendError::impossible("x").code_number(), 9200);
        assert_eq!(BackendError::NoOuterLoop.code_number(), 9230);
        assert_eq!(BackendError::VoidVariable.code_number(), 9203);
    }

    #[test]
    fn unhandled_messages() {
        assert_eq!(BackendError::unhandled("for in loops").to_string(), "for in loops not supported");
        assert_eq!(
            BackendError::future("for of loops").to_string(),
            "for of loops not currently supported"
        );
        assert_eq!(
            BackendError::unhandled_with("class expressions", "declare a class as class C {}")
                .to_string(),
            "class expressions not supported - declare a class as class C {}"
        );
    }

    #[test]
    fn annotations_are_warnings() {
        let err = BackendError::Annotation { message: "unknown annotation key 'foo'".to_owned() };
        let diag = Diagnostic::from_error(&err, None, None);
        assert_eq!(diag.category, Category::Warning);
        assert_eq!(diag.code, 9260);
        assert!(!diag.is_error());
    }
}
