use crate::bytecode::module::{ExportEntry, Module};
use crate::bytecode::op::{FastLib, Instruction, Opcode};
use crate::bytecode::resource::Resource;
use std::collections::HashMap;
use std::fmt::{self, Write};

/// Return disassembly of a linked module as a String
pub fn disassemble(module: &Module) -> String {
    module.to_string()
}

/// Write a listing of the text section, annotated with export entries,
/// built-ins and jump targets.
pub fn write_module<W: Write>(out: &mut W, module: &Module) -> fmt::Result {
    writeln!(out, "=== MODULE ===")?;
    writeln!(
        out,
        "{} instructions, {} exports, {} resources",
        module.text.len(),
        module.exports.len(),
        module.resources.len()
    )?;

    let jump_targets = collect_jump_targets(&module.text);

    for (ip, ins) in module.text.iter().enumerate() {
        let ip = ip as u32;

        for (n, _) in module.builtins.iter().enumerate().filter(|(_, a)| **a == ip) {
            write_banner(out, &format!("builtin[{}]", n))?;
        }
        for entry in module.exports.iter().filter(|e| e.address == ip) {
            write_banner(out, &export_label(module, entry))?;
        }

        let is_target = jump_targets.contains(&ip);
        if is_target {
            writeln!(out, "      ┌──────────────────────────────────")?;
        }
        write!(out, "{:04} {}", ip, if is_target { "► " } else { "  " })?;
        write_instruction(out, module, ip, ins)?;
        writeln!(out)?;
    }

    if !module.resources.is_empty() {
        writeln!(out)?;
        writeln!(out, "=== RESOURCES ===")?;
        for (id, resource) in module.resources.iter() {
            writeln!(out, "  #{:<4} {}", id, resource)?;
        }
    }

    Ok(())
}

fn write_banner<W: Write>(out: &mut W, title: &str) -> fmt::Result {
    writeln!(out, "════════════════════════════════════════")?;
    writeln!(out, " {}", title)?;
    writeln!(out, "════════════════════════════════════════")
}

fn export_label(module: &Module, entry: &ExportEntry) -> String {
    let name = match entry.name.and_then(|id| module.resources.get(id)) {
        Some(resource) => resource.to_string(),
        None => "<lambda>".to_string(),
    };
    let args: Vec<String> = entry
        .args
        .iter()
        .map(|&id| match module.resources.get(id) {
            Some(resource) => resource.to_string(),
            None => format!("#{}", id),
        })
        .collect();
    format!("{}({})", name, args.join(", "))
}

fn collect_jump_targets(text: &[Instruction]) -> Vec<u32> {
    let mut targets = Vec::new();

    for (ip, ins) in text.iter().enumerate() {
        let target = match ins.opcode {
            Opcode::Jmp | Opcode::Jmpc => Some(ins.operand),
            _ => ins.jump_target(ip as u32),
        };
        if let Some(target) = target {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    targets
}

fn write_instruction<W: Write>(
    out: &mut W,
    module: &Module,
    ip: u32,
    ins: &Instruction,
) -> fmt::Result {
    let mnemonic = ins.opcode.mnemonic();

    match ins.opcode {
        Opcode::Jmpr | Opcode::Jmpcr => {
            let offset = ins.displacement();
            let direction = if offset < 0 { "↑" } else { "↓" };
            match ins.jump_target(ip) {
                Some(target) => write!(
                    out,
                    "{:<11} {:+} {} (→ {:04})",
                    mnemonic, offset, direction, target
                ),
                None => write!(out, "{:<11} {:+} (out of range)", mnemonic, offset),
            }
        }
        Opcode::Jmp | Opcode::Jmpc => write!(out, "{:<11} → {:04}", mnemonic, ins.operand),
        Opcode::LambdaMk => {
            let label = module
                .exports
                .iter()
                .find(|e| e.address == ins.operand)
                .map(|e| export_label(module, e))
                .unwrap_or_else(|| "?".to_string());
            write!(out, "{:<11} → {:04} ; {}", mnemonic, ins.operand, label)
        }
        Opcode::FastLib => match FastLib::from_operand(ins.operand) {
            Some(lib) => write!(out, "{:<11} {}", mnemonic, lib.name()),
            None => write!(out, "{:<11} ?{}", mnemonic, ins.operand),
        },
        op if op.takes_resource() => match module.resources.get(ins.operand) {
            Some(Resource::None) => write!(out, "{:<11} none", mnemonic),
            Some(resource) => write!(out, "{:<11} #{:<4} ; {}", mnemonic, ins.operand, resource),
            None => write!(out, "{:<11} #{:<4} ; ?", mnemonic, ins.operand),
        },
        _ => write!(out, "{}", mnemonic),
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Opcode frequencies, most frequent first.
pub fn opcode_counts(text: &[Instruction]) -> Vec<(Opcode, usize)> {
    let mut counts: HashMap<Opcode, usize> = HashMap::new();
    for ins in text {
        *counts.entry(ins.opcode).or_insert(0) += 1;
    }

    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.mnemonic().cmp(b.0.mnemonic())));
    counts
}
