//! The intermediate representation produced by the backend and consumed by the
//! machine code and byte code emitters.

mod binary;
mod cell;
mod exprs;
mod print;
mod procedure;
mod stmts;

pub use binary::*;
pub use cell::*;
pub use exprs::*;
pub use procedure::*;
pub use stmts::*;
