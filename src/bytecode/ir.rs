use crate::bytecode::compile_error::CompileError;
use crate::bytecode::op::{Instruction, Opcode};
use serde::{Deserialize, Serialize};

/// How a line's operand is resolved when its block is linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reloc {
    /// Used verbatim.
    Absolute,
    /// Offset within the owning block; rebased by the block's start address.
    BlockRelative,
    /// Index into the block list; replaced by that block's entry address.
    Lambda,
    /// Index into the module's built-in table; replaced by its entry address.
    Builtin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrKind {
    /// The line reads or writes the variable with this identifier id.
    Variable,
    /// The line binds the argument with this identifier id.
    Argument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAttr {
    pub kind: AttrKind,
    pub res_id: u32,
}

/// One not-yet-linked instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub opcode: Opcode,
    pub operand: u32,
    pub reloc: Reloc,
    pub attrs: Vec<LineAttr>,
}

impl Line {
    pub fn new(opcode: Opcode, operand: u32, reloc: Reloc) -> Self {
        Self {
            opcode,
            operand,
            reloc,
            attrs: Vec::new(),
        }
    }

    pub fn instruction(&self) -> Instruction {
        Instruction::new(self.opcode, self.operand)
    }
}

/// A floating code block: the instructions of one function scope before it
/// has been assigned an address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    lines: Vec<Line>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Position the next appended line will occupy.
    pub fn instrument_number(&self) -> u32 {
        self.lines.len() as u32
    }

    pub fn append(&mut self, opcode: Opcode, operand: u32) {
        self.append_reloc(opcode, operand, Reloc::Absolute);
    }

    pub fn append_reloc(&mut self, opcode: Opcode, operand: u32, reloc: Reloc) {
        self.lines.push(Line::new(opcode, operand, reloc));
    }

    /// Attaches an attribute to the most recently appended line.
    pub fn tag_last(&mut self, kind: AttrKind, res_id: u32) {
        if let Some(line) = self.lines.last_mut() {
            line.attrs.push(LineAttr { kind, res_id });
        }
    }

    /// Splices a line in before position `pos`.
    ///
    /// Every block-relative operand pointing past `pos` is shifted by one so
    /// that jumps inside the block keep their targets.
    pub fn insert_at(
        &mut self,
        pos: u32,
        opcode: Opcode,
        operand: u32,
        reloc: Reloc,
    ) -> Result<(), CompileError> {
        let index = pos as usize;
        if index > self.lines.len() {
            return Err(CompileError::internal(format!(
                "insert position {} out of range (block has {} lines)",
                pos,
                self.lines.len()
            )));
        }

        for line in &mut self.lines {
            if line.reloc == Reloc::BlockRelative && line.operand > pos {
                line.operand += 1;
            }
        }
        self.lines.insert(index, Line::new(opcode, operand, reloc));

        Ok(())
    }

    /// Points the line at `from` to position `to`.
    pub fn link(&mut self, from: u32, to: u32) -> Result<(), CompileError> {
        let len = self.lines.len();
        let line = self.lines.get_mut(from as usize).ok_or_else(|| {
            CompileError::internal(format!(
                "link source {} out of range (block has {} lines)",
                from, len
            ))
        })?;
        line.operand = to;
        Ok(())
    }

    /// Appends an already resolved instruction sequence.
    pub fn append_template(&mut self, code: &[Instruction]) {
        self.lines.extend(
            code.iter()
                .map(|ins| Line::new(ins.opcode, ins.operand, Reloc::Absolute)),
        );
    }
}

/// All blocks of one compilation, in the order their export entries appear.
#[derive(Debug, Clone, Default)]
pub struct BlockList {
    blocks: Vec<Block>,
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next appended block will receive.
    pub fn next_index(&self) -> u32 {
        self.blocks.len() as u32
    }

    pub fn append(&mut self, block: Block) -> u32 {
        self.blocks.push(block);
        (self.blocks.len() - 1) as u32
    }

    /// Claims the next index with an empty block, to be filled later.
    pub fn reserve(&mut self) -> u32 {
        self.append(Block::new())
    }

    pub fn fill(&mut self, index: u32, block: Block) -> Result<(), CompileError> {
        let slot = self.blocks.get_mut(index as usize).ok_or_else(|| {
            CompileError::internal(format!("no reserved block at index {}", index))
        })?;
        *slot = block;
        Ok(())
    }

    pub fn get(&self, index: u32) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    /// Total number of lines across all blocks.
    pub fn line_count(&self) -> usize {
        self.blocks.iter().map(Block::len).sum()
    }
}
