pub mod attrs;
pub mod builder;
pub mod decls;
pub mod exprs;
pub mod ids;
pub mod program;
pub mod stmts;
pub mod types;

pub use attrs::*;
pub use builder::ProgramBuilder;
pub use decls::*;
pub use exprs::*;
pub use ids::*;
pub use program::*;
pub use stmts::*;
pub use types::*;
