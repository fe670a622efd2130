use fxhash::FxHashMap;
use indexmap::IndexMap;

use corvid_lang_ast::BitSize;

use crate::cell::{Cell, CellKind, VarKey};
use crate::procedure::{Action, ProcId, Procedure};

/// Dispatch tables of one class instantiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VTable {
    pub class_id: String,
    pub class_name: String,
    pub label: String,
    pub base: Option<String>,
    pub num_fields: usize,
    /// Number of leading reference-counted fields.
    pub num_ref_fields: usize,
    pub methods: Vec<ProcId>,
    /// Indexed by interface member id, `None` where the class has no such member.
    pub iface_table: Vec<Option<ProcId>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLiteral {
    pub label: String,
    pub width: usize,
    pub height: usize,
    /// One byte per pixel, row major.
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub id: usize,
    pub file: String,
    pub start: usize,
    pub length: usize,
    pub line: usize,
    pub character: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalLayout {
    /// Byte offset of every global, indexed like [`Binary::globals`].
    pub offsets: Vec<usize>,
    /// Size of the globals area in words, including the reserved prefix.
    pub words: usize,
}

/// The output image of one compilation.
#[derive(Debug, Clone, Default)]
pub struct Binary {
    pub procs: Vec<Procedure>,
    proc_index: FxHashMap<(Action, String), ProcId>,
    pub globals: Vec<Cell>,
    pub layout: GlobalLayout,
    /// String literal text to label.
    pub strings: IndexMap<String, String>,
    /// Bit pattern of a double literal to label.
    pub doubles: IndexMap<u64, String>,
    pub images: Vec<ImageLiteral>,
    pub vtables: Vec<VTable>,
    /// Names of interface members, indexed by member id.
    pub iface_members: Vec<String>,
    pub breakpoints: Vec<Breakpoint>,
    pub used_symbols: Vec<String>,
    pub final_pass: bool,
}

impl Binary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears everything that is recomputed by each lowering pass.
    pub fn reset(&mut self) {
        self.strings.clear();
        self.doubles.clear();
        self.images.clear();
        self.breakpoints.clear();
        self.used_symbols.clear();
    }

    pub fn add_proc(&mut self, action: Action, label: String, ref_mask: &str) -> ProcId {
        let id = ProcId(self.procs.len() as u32);
        log::trace!("New procedure {label}");
        self.procs.push(Procedure::new(id, action, label, ref_mask.to_owned()));
        self.proc_index.insert((action, ref_mask.to_owned()), id);
        id
    }

    pub fn lookup_proc(&self, action: Action, ref_mask: &str) -> Option<ProcId> {
        self.proc_index.get(&(action, ref_mask.to_owned())).copied()
    }

    pub fn proc(&self, id: ProcId) -> &Procedure {
        &self.procs[id.index()]
    }

    pub fn proc_mut(&mut self, id: ProcId) -> &mut Procedure {
        &mut self.procs[id.index()]
    }

    pub fn add_global(&mut self, key: VarKey, name: &str, is_ref: bool, bit_size: BitSize) -> Cell {
        let cell = Cell {
            key,
            kind: CellKind::Global,
            index: self.globals.len(),
            is_ref,
            by_ref_local: false,
            bit_size,
            name: name.to_owned(),
        };
        self.globals.push(cell.clone());
        cell
    }

    pub fn lookup_global(&self, key: VarKey) -> Option<&Cell> {
        self.globals.iter().find(|c| c.key == key)
    }

    /// The label of a string literal, interned by content.
    pub fn emit_string(&mut self, text: &str) -> String {
        let next = format!("_str{}", self.strings.len());
        self.strings.entry(text.to_owned()).or_insert(next).clone()
    }

    /// The label of a boxed double literal, interned by bit pattern.
    pub fn emit_double(&mut self, value: f64) -> String {
        let next = format!("_dbl{}", self.doubles.len());
        self.doubles.entry(value.to_bits()).or_insert(next).clone()
    }

    pub fn emit_image(&mut self, width: usize, height: usize, pixels: Vec<u8>) -> String {
        let label = format!("_img{}", self.images.len());
        self.images.push(ImageLiteral { label: label.clone(), width, height, pixels });
        label
    }

    pub fn vtable(&self, class_id: &str) -> Option<&VTable> {
        self.vtables.iter().find(|v| v.class_id == class_id)
    }

    /// Procedures compiled from the given declaration, in creation order.
    pub fn procs_for(&self, action: Action) -> impl Iterator<Item = &Procedure> {
        self.procs.iter().filter(move |p| p.action == action)
    }

    pub fn resolve(&mut self) {
        self.procs.iter_mut().for_each(Procedure::resolve)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use corvid_lang_ast::DeclId;

    #[test]
    fn literals_are_interned() {
        let mut bin = Binary::new();
        assert_eq!(bin.emit_string("a"), "_str0");
        assert_eq!(bin.emit_string("b"), "_str1");
        assert_eq!(bin.emit_string("a"), "_str0");
        assert_eq!(bin.emit_double(1.5), "_dbl0");
        assert_eq!(bin.emit_double(1.5), "_dbl0");
        bin.reset();
        assert_eq!(bin.emit_string("b"), "_str0");
    }

    #[test]
    fn procs_are_keyed_by_action_and_mask() {
        let mut bin = Binary::new();
        let action = Action::Decl(DeclId(4));
        let r = bin.add_proc(action, "_id__P4_R".to_owned(), "_R");
        let p = bin.add_proc(action, "_id__P4_P".to_owned(), "_P");
        assert_eq!(bin.lookup_proc(action, "_R"), Some(r));
        assert_eq!(bin.lookup_proc(action, "_P"), Some(p));
        assert_eq!(bin.lookup_proc(action, ""), None);
        assert_eq!(bin.procs_for(action).count(), 2);
    }
}
