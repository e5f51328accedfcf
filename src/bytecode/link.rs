use tracing::debug;

use crate::bytecode::{
    compile_error::CompileError,
    context::Context,
    ir::Reloc,
    module::DebugAttr,
    op::Instruction,
};

/// Merges the context's blocks into the module's text section.
///
/// The first pass lays the blocks out back to back after any text already
/// present, records each block's start in its export entry and rebases
/// block-relative operands. The second pass resolves function literal and
/// built-in references, which need every start address to be known.
#[tracing::instrument(level = "debug", skip_all, fields(blocks = ctx.blocks.len()))]
pub fn link(ctx: Context<'_>) -> Result<(), CompileError> {
    let Context {
        blocks,
        module,
        export_base,
    } = ctx;
    let text_base = module.text.len();

    for (index, block) in blocks.iter().enumerate() {
        let start = module.text.len() as u32;
        let entry = module.exports.get_mut(export_base + index).ok_or_else(|| {
            CompileError::internal(format!("block {} has no export entry", index))
        })?;
        entry.address = start;

        for line in block.lines() {
            let address = module.text.len() as u32;
            let operand = match line.reloc {
                Reloc::BlockRelative => line.operand.checked_add(start).ok_or_else(|| {
                    CompileError::internal(format!("relative operand overflow at {}", address))
                })?,
                Reloc::Absolute | Reloc::Lambda | Reloc::Builtin => line.operand,
            };
            module.text.push(Instruction::new(line.opcode, operand));
            module.debug.extend(line.attrs.iter().map(|attr| DebugAttr {
                address,
                kind: attr.kind,
                res_id: attr.res_id,
            }));
        }
    }

    let lines = blocks.iter().flat_map(|block| block.lines());
    for (address, line) in (text_base..).zip(lines) {
        let target = match line.reloc {
            Reloc::Lambda => module
                .exports
                .get(export_base + line.operand as usize)
                .map(|entry| entry.address)
                .ok_or_else(|| {
                    CompileError::internal(format!(
                        "function literal {} has no export entry",
                        line.operand
                    ))
                })?,
            Reloc::Builtin => module
                .builtins
                .get(line.operand as usize)
                .copied()
                .ok_or_else(|| {
                    CompileError::internal(format!("unknown built-in {}", line.operand))
                })?,
            Reloc::Absolute | Reloc::BlockRelative => continue,
        };
        module.text[address].operand = target;
    }

    debug!(
        text = module.text.len(),
        exports = module.exports.len(),
        "link complete"
    );
    Ok(())
}
