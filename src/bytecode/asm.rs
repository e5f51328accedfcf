use crate::bytecode::compile_error::CompileError;
use crate::bytecode::op::{Instruction, Opcode};
use std::collections::HashMap;
use tracing::trace;

// =============================================================================
// MICRO-ASSEMBLER - Template expansion with local labels
// =============================================================================

/// A label local to one [`Template`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Emit one instruction.
    Op(Opcode, u32),
    /// Mark the position of the next emitted instruction. Occupies no slot.
    Place(Label),
    /// Emit a relative jump to a label.
    Jump(Opcode, Label),
}

/// An ordered list of directives for one control construct.
///
/// ```text
/// let mut t = Template::new();
/// let done = t.new_label();
/// t.jump(Opcode::Jmpcr, done).op(Opcode::Drop).label(done);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Template {
    directives: Vec<Directive>,
    next_label: u32,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Instruction without a meaningful operand.
    pub fn op(&mut self, opcode: Opcode) -> &mut Self {
        self.op_with(opcode, 0)
    }

    pub fn op_with(&mut self, opcode: Opcode, operand: u32) -> &mut Self {
        self.directives.push(Directive::Op(opcode, operand));
        self
    }

    pub fn label(&mut self, label: Label) -> &mut Self {
        self.directives.push(Directive::Place(label));
        self
    }

    pub fn jump(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        self.directives.push(Directive::Jump(opcode, label));
        self
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }
}

/// Resolves a template into a position independent instruction sequence.
///
/// Jump operands become the signed distance from the jump to its label.
pub fn assemble(template: &Template) -> Result<Vec<Instruction>, CompileError> {
    let mut positions: HashMap<Label, u32> = HashMap::new();
    let mut pc = 0u32;

    for directive in template.directives() {
        match *directive {
            Directive::Op(..) | Directive::Jump(..) => pc += 1,
            Directive::Place(label) => {
                if positions.insert(label, pc).is_some() {
                    return Err(CompileError::internal(format!(
                        "label {} placed twice",
                        label.0
                    )));
                }
            }
        }
    }

    let mut code = Vec::with_capacity(pc as usize);
    for directive in template.directives() {
        match *directive {
            Directive::Op(opcode, operand) => code.push(Instruction::new(opcode, operand)),
            Directive::Place(_) => {}
            Directive::Jump(opcode, label) => {
                if !opcode.is_relative_jump() {
                    return Err(CompileError::internal(format!(
                        "{} cannot target a label",
                        opcode
                    )));
                }
                let target = *positions.get(&label).ok_or_else(|| {
                    CompileError::internal(format!("label {} is never placed", label.0))
                })?;
                let here = code.len() as i64;
                let displacement = (i64::from(target) - here) as i32;
                trace!(label = label.0, from = here, displacement, "resolved label");
                code.push(Instruction::new(opcode, displacement as u32));
            }
        }
    }

    Ok(code)
}
