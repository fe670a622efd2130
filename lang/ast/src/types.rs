use serde_derive::{Deserialize, Serialize};

use crate::ids::{DeclId, TypeId};

/// Types as resolved by the front end.
///
/// Types are interned in the [`crate::Program`] and compared by [`TypeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    Any,
    Void,
    Null,
    Undefined,
    Number,
    Boolean,
    String,
    /// An enum declaration; values are numbers at runtime.
    Enum { decl: DeclId },
    Class { decl: DeclId, args: Vec<TypeId> },
    Interface { decl: DeclId, args: Vec<TypeId> },
    /// The type of an anonymous object literal.
    Object { members: Vec<MemberSig> },
    Array { elem: TypeId },
    Function { params: Vec<TypeId>, ret: TypeId },
    /// A reference to a type parameter declaration.
    Param { decl: DeclId },
    /// The polymorphic `this` type inside the given class.
    This { class: DeclId },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberSig {
    pub name: String,
    pub ty: TypeId,
    #[serde(default)]
    pub optional: bool,
}

impl Type {
    /// Classes, interfaces and object literal types.
    pub fn is_structural(&self) -> bool {
        matches!(self, Type::Class { .. } | Type::Interface { .. } | Type::Object { .. })
    }

    /// Types whose values are plain numbers at runtime.
    pub fn is_number_like(&self) -> bool {
        matches!(self, Type::Number | Type::Enum { .. })
    }

    pub fn type_args(&self) -> &[TypeId] {
        match self {
            Type::Class { args, .. } | Type::Interface { args, .. } => args,
            _ => &[],
        }
    }
}

/// Storage width of globals and fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitSize {
    #[default]
    None,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
}

impl BitSize {
    /// Size of a cell with this width in bytes.
    pub fn size_of(self) -> usize {
        match self {
            BitSize::None | BitSize::Int32 => 4,
            BitSize::Int8 | BitSize::UInt8 => 1,
            BitSize::Int16 | BitSize::UInt16 => 2,
        }
    }

    pub fn is_none(self) -> bool {
        self == BitSize::None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bit_sizes() {
        assert_eq!(BitSize::None.size_of(), 4);
        assert_eq!(BitSize::UInt8.size_of(), 1);
        assert_eq!(BitSize::Int16.size_of(), 2);
        assert_eq!(BitSize::Int32.size_of(), 4);
    }

    #[test]
    fn type_serializes_with_kind_tag() {
        let ty = Type::Array { elem: TypeId(3) };
        let json = serde_json::to_string(&ty).unwrap();
        assert_eq!(json, r#"{"kind":"array","elem":3}"#);
        let back: Type = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ty);
    }
}
