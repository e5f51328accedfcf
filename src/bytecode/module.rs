use crate::bytecode::ir::AttrKind;
use crate::bytecode::op::Instruction;
use crate::bytecode::resource::ResourcePool;
use serde::{Deserialize, Serialize};

/// A callable scope in the export table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    /// Identifier id of the name; `None` for anonymous function literals.
    pub name: Option<u32>,

    /// Absolute address of the first instruction, set by the linker.
    pub address: u32,

    /// Identifier ids of the declared arguments.
    pub args: Vec<u32>,
}

impl ExportEntry {
    pub fn named(name: u32) -> Self {
        Self {
            name: Some(name),
            address: 0,
            args: Vec::new(),
        }
    }

    pub fn blank(args: Vec<u32>) -> Self {
        Self {
            name: None,
            address: 0,
            args,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.name.is_none()
    }
}

/// A line attribute carried over to its absolute address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugAttr {
    pub address: u32,
    pub kind: AttrKind,
    pub res_id: u32,
}

/// A compiled bytecode module.
///
/// Holds the linear text section, the export table and the resource table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    pub text: Vec<Instruction>,

    /// One entry per code block, in block order.
    pub exports: Vec<ExportEntry>,

    pub resources: ResourcePool,

    /// Entry addresses of built-in procedures installed ahead of user code.
    pub builtins: Vec<u32>,

    pub debug: Vec<DebugAttr>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a built-in procedure to the text section and returns its
    /// index in the built-in table.
    pub fn install_builtin(&mut self, code: &[Instruction]) -> u32 {
        let entry = self.text.len() as u32;
        self.text.extend_from_slice(code);
        self.builtins.push(entry);
        (self.builtins.len() - 1) as u32
    }

    /// Export entry whose code starts at `address`.
    pub fn export_at(&self, address: u32) -> Option<&ExportEntry> {
        self.exports.iter().find(|e| e.address == address)
    }

    /// The first export with the given name.
    pub fn find_export(&self, name: &[u8]) -> Option<&ExportEntry> {
        let id = self.resources.find_identifier(name)?;
        self.exports.iter().find(|e| e.name == Some(id))
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::bytecode::disasm::write_module(f, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::op::Opcode;

    #[test]
    fn test_install_builtin_records_entry() {
        let mut module = Module::new();
        let first = module.install_builtin(&[
            Instruction::new(Opcode::Dup, 0),
            Instruction::new(Opcode::Return, 0),
        ]);
        let second = module.install_builtin(&[Instruction::new(Opcode::Return, 0)]);

        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(module.builtins, vec![0, 2]);
        assert_eq!(module.text.len(), 3);
    }

    #[test]
    fn test_blank_and_named_exports() {
        assert!(ExportEntry::blank(vec![]).is_blank());
        assert!(!ExportEntry::named(3).is_blank());
    }

    #[test]
    fn test_find_export_by_name() {
        let mut module = Module::new();
        let main = module.resources.intern_identifier(b"main");
        module.exports.push(ExportEntry::blank(vec![]));
        module.exports.push(ExportEntry {
            name: Some(main),
            address: 9,
            args: vec![],
        });

        assert_eq!(module.find_export(b"main").map(|e| e.address), Some(9));
        assert_eq!(module.export_at(9).and_then(|e| e.name), Some(main));
    }

    #[test]
    fn test_serde_snapshot_keeps_interning() {
        let mut module = Module::new();
        let hi = module.resources.intern_string(b"hi");
        let main = module.resources.intern_identifier(b"main");
        module.text.push(Instruction::new(Opcode::Push, hi));
        module.exports.push(ExportEntry::named(main));
        module.debug.push(DebugAttr {
            address: 0,
            kind: AttrKind::Variable,
            res_id: main,
        });

        let bytes = postcard::to_allocvec(&module).unwrap();
        let mut restored: Module = postcard::from_bytes(&bytes).unwrap();

        assert_eq!(restored.text, module.text);
        assert_eq!(restored.exports, module.exports);
        assert_eq!(restored.debug, module.debug);
        assert_eq!(restored.resources.intern_string(b"hi"), hi);
        assert_eq!(restored.resources.len(), 2);
    }
}
