use crate::bytecode::ir::BlockList;
use crate::bytecode::module::Module;

/// State shared by the generator and the linker for one compilation.
///
/// Block `i` belongs to export entry `export_base + i`.
#[derive(Debug)]
pub struct Context<'m> {
    pub blocks: BlockList,
    pub module: &'m mut Module,
    pub export_base: usize,
}

impl<'m> Context<'m> {
    /// Starts a context whose blocks follow the exports already in `module`.
    pub fn new(module: &'m mut Module) -> Self {
        let export_base = module.exports.len();
        Self {
            blocks: BlockList::new(),
            module,
            export_base,
        }
    }

    /// Export entries belonging to this context's blocks.
    pub fn own_exports(&self) -> usize {
        self.module.exports.len().saturating_sub(self.export_base)
    }

    pub fn is_consistent(&self) -> bool {
        self.own_exports() == self.blocks.len()
    }
}
