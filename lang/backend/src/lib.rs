//! Lowering of type-checked programs into the word-level IR.
//!
//! The entry point is [`compile`]. It runs the reachability passes, monomorphizes
//! generic functions per ref-mask, lays out classes and their dispatch tables and
//! assigns offsets to globals.

mod classes;
mod ctx;
mod generics;
mod globals;
mod lower;
mod options;
mod reach;
mod repr;
mod result;
mod subtype;

pub use generics::{TypeBinding, ref_mask, sanitize};
pub use globals::layout_globals;
pub use options::{CompileOptions, CompileTarget};
pub use reach::{CompileResult, compile};
pub use result::{BackendError, BackendResult, Category, Diagnostic};
pub use subtype::{SubtypeChecker, SubtypeResult};
