use std::fmt;

use serde_derive::{Deserialize, Serialize};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl From<usize> for $name {
            fn from(idx: usize) -> Self {
                $name(idx as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

arena_id!(
    /// A source file of the program.
    FileId,
    "file"
);
arena_id!(
    /// A declaration. The numeric value is stable for the lifetime of the program
    /// and is used in the labels of compiled procedures.
    DeclId,
    ""
);
arena_id!(StmtId, "stmt");
arena_id!(ExprId, "expr");
arena_id!(TypeId, "type");
