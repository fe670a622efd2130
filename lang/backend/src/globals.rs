//! Placement of global cells in the globals area.

use std::cmp::Reverse;

use corvid_lang_ir::{Binary, GlobalLayout};

pub const WORD_SIZE: usize = 4;

/// Words at the start of the globals area that belong to the runtime.
pub const RESERVED_WORDS: usize = 1;

/// Assigns byte offsets to all globals, widest first, each aligned to its own size.
pub fn layout_globals(bin: &mut Binary) {
    let mut order: Vec<usize> = (0..bin.globals.len()).collect();
    // stable, so globals of equal width keep their creation order
    order.sort_by_key(|idx| Reverse(bin.globals[*idx].bit_size.size_of()));

    let mut offsets = vec![0; bin.globals.len()];
    let mut pos = RESERVED_WORDS * WORD_SIZE;
    for idx in order {
        let size = bin.globals[idx].bit_size.size_of();
        pos = pos.div_ceil(size) * size;
        offsets[idx] = pos;
        pos += size;
    }
    let words = pos.div_ceil(WORD_SIZE);
    log::debug!("Laid out {} globals in {words} words", bin.globals.len());
    bin.layout = GlobalLayout { offsets, words };
}

#[cfg(test)]
mod test {
    use corvid_lang_ast::{BitSize, DeclId};
    use corvid_lang_ir::VarKey;

    use super::*;

    fn global(bin: &mut Binary, n: u32, size: BitSize) {
        bin.add_global(VarKey::Decl(DeclId(n)), &format!("g{n}"), false, size);
    }

    #[test]
    fn empty() {
        let mut bin = Binary::new();
        layout_globals(&mut bin);
        assert_eq!(bin.layout.words, RESERVED_WORDS);
        assert!(bin.layout.offsets.is_empty());
    }

    #[test]
    fn widest_first() {
        let mut bin = Binary::new();
        global(&mut bin, 0, BitSize::UInt8);
        global(&mut bin, 1, BitSize::None);
        global(&mut bin, 2, BitSize::Int16);
        global(&mut bin, 3, BitSize::Int32);
        global(&mut bin, 4, BitSize::Int8);
        layout_globals(&mut bin);
        assert_eq!(bin.layout.offsets, vec![14, 4, 12, 8, 15]);
        assert_eq!(bin.layout.words, 4);
    }

    #[test]
    fn narrow_globals_are_padded_to_a_word() {
        let mut bin = Binary::new();
        global(&mut bin, 0, BitSize::Int16);
        layout_globals(&mut bin);
        assert_eq!(bin.layout.offsets, vec![4]);
        assert_eq!(bin.layout.words, 2);
    }
}
