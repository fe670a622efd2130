use serde_derive::{Deserialize, Serialize};

use crate::result::{BackendError, BackendResult};

/// Representation choices of the code generator that consumes the IR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileTarget {
    /// Small integers, booleans, `null` and `undefined` are packed into a machine word.
    pub tagged_ints: bool,
    pub floating_point: bool,
    /// `false` for managed runtimes with their own garbage collection.
    pub ref_counting: bool,
    pub is_native: bool,
    pub short_pointers: bool,
    /// Box every number, even when it would fit into a tagged word.
    pub box_debug: bool,
}

impl Default for CompileTarget {
    fn default() -> Self {
        CompileTarget {
            tagged_ints: true,
            floating_point: true,
            ref_counting: true,
            is_native: true,
            short_pointers: false,
            box_debug: false,
        }
    }
}

impl CompileTarget {
    /// Integer-only native targets.
    pub fn legacy() -> Self {
        CompileTarget { tagged_ints: false, floating_point: false, ..Default::default() }
    }

    /// Garbage-collected targets such as a JavaScript runtime.
    pub fn managed() -> Self {
        CompileTarget {
            tagged_ints: false,
            floating_point: true,
            ref_counting: false,
            is_native: false,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> BackendResult {
        if self.box_debug && !self.tagged_ints {
            return Err(Box::new(BackendError::InvalidTarget {
                message: "box_debug requires tagged_ints".to_owned(),
            }));
        }
        if self.short_pointers && !self.is_native {
            return Err(Box::new(BackendError::InvalidTarget {
                message: "short_pointers requires a native target".to_owned(),
            }));
        }
        Ok(())
    }

    /// Whether numbers, booleans and enums live in plain machine words.
    pub fn numbers_are_values(&self) -> bool {
        self.tagged_ints || !self.floating_point
    }

    /// Integer-only targets use the `thumb::` and `Number_::` intrinsics.
    pub fn is_legacy(&self) -> bool {
        !self.tagged_ints && !self.floating_point
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub target: CompileTarget,
    /// Compile every declaration of the user's own files, reachable or not.
    pub test_mode: bool,
    /// Record a breakpoint for every statement.
    pub breakpoints: bool,
    /// Skip breakpoints in library files.
    pub just_my_code: bool,
    pub compute_used_symbols: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn box_debug_needs_tagging() {
        let target = CompileTarget { box_debug: true, ..CompileTarget::legacy() };
        let err = target.validate().unwrap_err();
        assert_eq!(err.code_number(), 9263);
        assert!(CompileTarget { box_debug: true, ..Default::default() }.validate().is_ok());
    }

    #[test]
    fn number_representation() {
        assert!(CompileTarget::default().numbers_are_values());
        assert!(CompileTarget::legacy().numbers_are_values());
        assert!(!CompileTarget::managed().numbers_are_values());
    }
}
