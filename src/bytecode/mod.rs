pub mod asm;
pub mod compile;
pub mod compile_error;
pub mod context;
pub mod disasm;
pub mod ir;
pub mod link;
pub mod module;
pub mod op;
pub mod resource;

pub use compile::{Compiler, CompilerConfig};
pub use compile_error::CompileError;
pub use context::Context;
pub use link::link;
pub use module::{ExportEntry, Module};
pub use op::{Instruction, Opcode};
