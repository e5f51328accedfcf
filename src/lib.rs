//! Front end for the False stack language: a byte-level scanner, a
//! generator lowering tokens into relocatable code blocks, and a linker
//! that lays the blocks out in a module's text section.
//!
//! ```text
//! let module = mfalse::compile(b"[1+]f: 2f;!.")?;
//! println!("{}", module);
//! ```

pub mod bytecode;
pub mod frontend;

use thiserror::Error;

use crate::bytecode::{CompileError, Compiler, CompilerConfig, Module};
use crate::frontend::{Lexer, LexerConfig, LexerError};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub lexer: LexerConfig,
    pub compiler: CompilerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Lexer(#[from] LexerError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Compiles a source buffer into a fresh module with default settings.
pub fn compile(source: &[u8]) -> Result<Module, Error> {
    compile_with(source, &Config::default())
}

pub fn compile_with(source: &[u8], config: &Config) -> Result<Module, Error> {
    let mut module = Module::new();
    compile_into(source, config, &mut module)?;
    Ok(module)
}

/// Compiles into an existing module, after any built-ins or exports it
/// already holds.
pub fn compile_into(source: &[u8], config: &Config, module: &mut Module) -> Result<(), Error> {
    let tokens = Lexer::with_config(source, &config.lexer).tokenize_clean()?;
    Compiler::with_config(source, &tokens, module, config.compiler.clone()).compile()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::op::{Instruction, Opcode};
    use crate::frontend::EolStyle;

    #[test]
    fn test_compile_simple_program() {
        let module = compile(b"[1+]f: 2f;!.").unwrap();

        assert_eq!(module.exports.len(), 2);
        assert!(module.find_export(b"main").is_some());
        assert_eq!(module.text.last(), Some(&Instruction::new(Opcode::Return, 0)));
    }

    #[test]
    fn test_lexer_errors_surface() {
        let err = compile(b"1 2 \x01").unwrap_err();
        assert!(matches!(err, Error::Lexer(_)));
        assert_eq!(err.to_string(), "1:5: undefined token");
    }

    #[test]
    fn test_generation_errors_surface() {
        let err = compile(b"\n  a 1").unwrap_err();
        match err {
            Error::Compile(e) => assert_eq!(e.position(), Some((2, 5))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_config_is_applied() {
        let config = Config {
            lexer: LexerConfig {
                eol: Some(EolStyle::Cr),
            },
            compiler: CompilerConfig {
                main_name: "entry".to_string(),
                ..CompilerConfig::default()
            },
        };
        // under Cr each byte of \r\n closes a line
        let err = compile_with(b"\r\nb", &config).unwrap_err();
        assert!(matches!(
            err,
            Error::Compile(CompileError::Generation { line: 3, .. })
        ));

        let module = compile_with(b"1.", &Config::default());
        assert!(module.is_err());
        let module = compile_with(b"1$.", &config).unwrap();
        assert!(module.find_export(b"entry").is_some());
        assert!(module.find_export(b"main").is_none());
    }

    #[test]
    fn test_compile_into_keeps_builtins() {
        let mut module = Module::new();
        module.install_builtin(&[Instruction::new(Opcode::Return, 0)]);
        compile_into(b"\"hi\"", &Config::default(), &mut module).unwrap();

        assert_eq!(module.text[0], Instruction::new(Opcode::Return, 0));
        assert_eq!(module.exports[0].address, 1);
    }

    #[test]
    fn test_failed_compile_into_commits_nothing() {
        let mut module = Module::new();
        module.install_builtin(&[Instruction::new(Opcode::Return, 0)]);

        assert!(compile_into(b"[1][2] a +", &Config::default(), &mut module).is_err());
        assert!(compile_into(b"a +", &Config::default(), &mut module).is_err());
        assert!(module.exports.is_empty());
        assert!(module.resources.is_empty());
        assert!(module.debug.is_empty());
        assert_eq!(module.text.len(), 1);

        compile_into(b"1 .", &Config::default(), &mut module).unwrap();
        assert_eq!(module.exports.len(), 1);
        assert_eq!(module.find_export(b"main").map(|e| e.address), Some(1));
    }
}
