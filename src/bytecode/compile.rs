use tracing::{debug, trace};

use crate::{
    bytecode::{
        asm::{Template, assemble},
        compile_error::CompileError,
        context::Context,
        ir::{AttrKind, Block, Reloc},
        link::link,
        module::{ExportEntry, Module},
        op::{FastLib, Opcode},
    },
    frontend::token::{Radix, Span, Spanned, Token},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Export name of the top-level block.
    pub main_name: String,

    /// Name bound to a function literal's argument.
    pub arg_name: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            main_name: "main".to_string(),
            arg_name: "arg".to_string(),
        }
    }
}

/// Lowers a token stream into relocatable blocks, skipping trivia.
pub struct Compiler<'a, 'm> {
    source: &'a [u8],
    tokens: &'a [Spanned],
    cursor: usize,
    ctx: Context<'m>,
    config: CompilerConfig,
}

impl<'a, 'm> Compiler<'a, 'm> {
    pub fn new(source: &'a [u8], tokens: &'a [Spanned], module: &'m mut Module) -> Self {
        Self::with_config(source, tokens, module, CompilerConfig::default())
    }

    pub fn with_config(
        source: &'a [u8],
        tokens: &'a [Spanned],
        module: &'m mut Module,
        config: CompilerConfig,
    ) -> Self {
        Self {
            source,
            tokens,
            cursor: 0,
            ctx: Context::new(module),
            config,
        }
    }

    /// Generates and links in one go.
    ///
    /// Works on a copy of the module and writes it back only on success, so
    /// a failed compilation leaves the module as it was.
    pub fn compile(self) -> Result<(), CompileError> {
        let Compiler {
            source,
            tokens,
            ctx,
            config,
            ..
        } = self;
        let module = ctx.module;

        let mut scratch = module.clone();
        Compiler::with_config(source, tokens, &mut scratch, config)
            .generate()
            .and_then(link)?;

        *module = scratch;
        Ok(())
    }

    /// Generates every block without linking.
    ///
    /// The top-level block takes the first slot of the returned context and
    /// function literals follow in the order their closing `]` is reached.
    #[tracing::instrument(level = "debug", skip_all, fields(tokens = self.tokens.len()))]
    pub fn generate(mut self) -> Result<Context<'m>, CompileError> {
        let main_index = self.ctx.blocks.reserve();
        let main_name = self
            .ctx
            .module
            .resources
            .intern_identifier(self.config.main_name.as_bytes());
        self.ctx.module.exports.push(ExportEntry::named(main_name));

        let mut main = Block::new();
        let end = self.generate_block(&mut main)?;
        if end.token == Token::RBracket {
            return Err(CompileError::unmatched_close(end.span));
        }

        let none = self.ctx.module.resources.intern_none();
        main.append(Opcode::Push, none);
        main.append(Opcode::Return, 0);
        self.ctx.blocks.fill(main_index, main)?;

        if !self.ctx.is_consistent() {
            return Err(CompileError::internal(format!(
                "{} blocks but {} export entries",
                self.ctx.blocks.len(),
                self.ctx.own_exports()
            )));
        }

        debug!(
            blocks = self.ctx.blocks.len(),
            lines = self.ctx.blocks.line_count(),
            resources = self.ctx.module.resources.len(),
            "generation complete"
        );
        Ok(self.ctx)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Emits code into `block` until `]` or end of input, returning the
    /// token that stopped it.
    fn generate_block(&mut self, block: &mut Block) -> Result<Spanned, CompileError> {
        loop {
            let tok = self.next_token();
            match tok.token {
                Token::Eof | Token::RBracket => return Ok(tok),
                // skipped by next_token
                Token::Whitespace | Token::Newline | Token::Comment => {}

                Token::Integer(radix) => {
                    let value = self.integer_value(&tok, radix)?;
                    let id = self.int(value);
                    block.append(Opcode::Push, id);
                }
                Token::Float(_) => {
                    let text = String::from_utf8_lossy(self.lexeme(&tok)?).into_owned();
                    return Err(CompileError::at(
                        tok.span,
                        format!(
                            "'{}' is a floating point literal; only integers are supported",
                            text
                        ),
                    ));
                }
                Token::String => {
                    let lexeme = self.lexeme(&tok)?;
                    let raw = lexeme.get(1..lexeme.len().saturating_sub(1)).unwrap_or(&[]);
                    let id = self.ctx.module.resources.intern_string(&unescape(raw));
                    block.append(Opcode::Push, id);
                    block.append(Opcode::Print, 0);
                }
                Token::Char => {
                    let value = self.char_value(&tok)?;
                    let id = self.int(value);
                    block.append(Opcode::Push, id);
                }
                Token::Variable => self.variable(block, &tok)?,

                Token::Plus => block.append(Opcode::Add, 0),
                Token::Minus => block.append(Opcode::Sub, 0),
                Token::Star => block.append(Opcode::Mul, 0),
                Token::Slash => block.append(Opcode::Div, 0),
                Token::Neg => block.append(Opcode::Neg, 0),
                Token::Dup => block.append(Opcode::Dup, 0),
                Token::Drop => block.append(Opcode::Drop, 0),
                Token::PrintInt => block.append(Opcode::Print, 0),

                Token::PrintChar => block.append(Opcode::FastLib, FastLib::PutChar as u32),
                Token::ReadChar => block.append(Opcode::FastLib, FastLib::GetChar as u32),
                Token::Flush => block.append(Opcode::FastLib, FastLib::Flush as u32),

                Token::Eq => self.expand(block, |c, t| c.compare(t, Opcode::Eq))?,
                Token::Lt => self.expand(block, |c, t| c.compare(t, Opcode::Lt))?,
                Token::Gt => self.expand(block, |c, t| c.compare(t, Opcode::Gt))?,
                Token::And => self.expand(block, |c, t| c.logical(t, Opcode::AndL))?,
                Token::Or => self.expand(block, |c, t| c.logical(t, Opcode::OrL))?,
                Token::Not => self.expand(block, Self::not)?,

                Token::Swap => self.expand(block, Self::swap)?,
                Token::Rot => self.expand(block, Self::rotate)?,
                Token::Pick => self.expand(block, Self::pick)?,

                Token::Get | Token::Assign => {
                    return Err(CompileError::at(
                        tok.span,
                        format!("'{}' must follow a variable", tok.token),
                    ));
                }

                Token::LBracket => self.lambda(block, &tok)?,
                Token::Apply => self.expand(block, Self::apply)?,
                Token::If => self.expand(block, Self::if_then)?,
                Token::While => self.expand(block, Self::while_loop)?,
            }
        }
    }

    /// The next token that is not whitespace, a newline or a comment.
    fn next_token(&mut self) -> Spanned {
        while let Some(&tok) = self.tokens.get(self.cursor) {
            self.cursor += 1;
            if !tok.token.is_trivia() {
                return tok;
            }
        }

        let (line, col) = self
            .tokens
            .last()
            .map(|t| (t.span.line, t.span.col))
            .unwrap_or((1, 1));
        Spanned {
            token: Token::Eof,
            span: Span {
                start: self.source.len(),
                end: self.source.len(),
                line,
                col,
            },
        }
    }

    fn lexeme(&self, tok: &Spanned) -> Result<&'a [u8], CompileError> {
        self.source.get(tok.span.start..tok.span.end).ok_or_else(|| {
            CompileError::internal(format!(
                "token span {}..{} outside source",
                tok.span.start, tok.span.end
            ))
        })
    }

    fn int(&mut self, value: i32) -> u32 {
        self.ctx.module.resources.intern_integer(value)
    }

    fn none(&mut self) -> u32 {
        self.ctx.module.resources.intern_none()
    }

    // =========================================================================
    // Literals and variables
    // =========================================================================

    fn integer_value(&self, tok: &Spanned, radix: Radix) -> Result<i32, CompileError> {
        let lexeme = self.lexeme(tok)?;
        let digits = lexeme.get(radix.prefix_len()..).unwrap_or(&[]);
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| i32::from_str_radix(s, radix.base()).ok())
            .ok_or_else(|| {
                CompileError::at(
                    tok.span,
                    format!("'{}' is an invalid integer", String::from_utf8_lossy(lexeme)),
                )
            })
    }

    /// Code point of a character literal; a lone non-UTF-8 byte stands for
    /// itself.
    fn char_value(&self, tok: &Spanned) -> Result<i32, CompileError> {
        let lexeme = self.lexeme(tok)?;
        let glyph = lexeme.get(1..).unwrap_or(&[]);
        let value = match glyph {
            [byte] => Some(u32::from(*byte)),
            _ => std::str::from_utf8(glyph)
                .ok()
                .and_then(|s| s.chars().next())
                .map(u32::from),
        };
        value.map(|v| v as i32).ok_or_else(|| {
            CompileError::at(tok.span, "character literal is not a valid UTF-8 glyph")
        })
    }

    fn variable(&mut self, block: &mut Block, tok: &Spanned) -> Result<(), CompileError> {
        let name = self.lexeme(tok)?;
        let id = self.ctx.module.resources.intern_identifier(name);

        let access = self.next_token();
        match access.token {
            Token::Get => {
                block.append(Opcode::PushM, id);
                block.tag_last(AttrKind::Variable, id);
                block.append(Opcode::Slv, 0);
            }
            Token::Assign => {
                block.append(Opcode::PopM, id);
                block.tag_last(AttrKind::Variable, id);
            }
            other => return Err(CompileError::dangling_variable(access.span, other.name())),
        }
        Ok(())
    }

    /// `[ ... ]`: the body goes into a fresh block; the enclosing block
    /// receives a reference to it.
    fn lambda(&mut self, block: &mut Block, open: &Spanned) -> Result<(), CompileError> {
        let arg = self
            .ctx
            .module
            .resources
            .intern_identifier(self.config.arg_name.as_bytes());

        let mut body = Block::new();
        body.append(Opcode::Argc, arg);
        body.tag_last(AttrKind::Argument, arg);
        body.append(Opcode::Push, arg);

        let end = self.generate_block(&mut body)?;
        if end.token != Token::RBracket {
            return Err(CompileError::unterminated_lambda(open.span));
        }
        body.append(Opcode::Return, 0);

        let index = self.ctx.blocks.next_index();
        block.append_reloc(Opcode::LambdaMk, index, Reloc::Lambda);
        self.ctx.blocks.append(body);
        self.ctx.module.exports.push(ExportEntry::blank(vec![arg]));
        trace!(index, line = open.span.line, col = open.span.col, "function literal");

        Ok(())
    }

    // =========================================================================
    // Template expansions
    // =========================================================================

    fn expand(
        &mut self,
        block: &mut Block,
        build: impl FnOnce(&mut Self, &mut Template),
    ) -> Result<(), CompileError> {
        let mut template = Template::new();
        build(self, &mut template);
        block.append_template(&assemble(&template)?);
        Ok(())
    }

    /// Pushes the canonical boolean: `-1` when reached through `is_true`,
    /// `0` otherwise.
    fn compare(&mut self, t: &mut Template, cmp: Opcode) {
        let (zero, one) = (self.int(0), self.int(1));
        let (truthy, done) = (t.new_label(), t.new_label());
        t.op(cmp)
            .jump(Opcode::Jmpcr, truthy)
            .op_with(Opcode::Push, zero)
            .jump(Opcode::Jmpr, done)
            .label(truthy)
            .op_with(Opcode::Push, one)
            .op(Opcode::Neg)
            .label(done);
    }

    fn logical(&mut self, t: &mut Template, op: Opcode) {
        let (zero, one, two) = (self.int(0), self.int(1), self.int(2));
        let (falsy, done) = (t.new_label(), t.new_label());
        t.op_with(Opcode::Push, zero)
            .op(Opcode::Ne)
            .op_with(Opcode::Push, two)
            .op(Opcode::Pick)
            .op_with(Opcode::Push, zero)
            .op(Opcode::Ne)
            .op(op)
            .op(Opcode::NotL)
            .jump(Opcode::Jmpcr, falsy)
            .op_with(Opcode::Push, one)
            .op(Opcode::Neg)
            .jump(Opcode::Jmpr, done)
            .label(falsy)
            .op_with(Opcode::Push, zero)
            .label(done);
    }

    fn not(&mut self, t: &mut Template) {
        let (zero, one) = (self.int(0), self.int(1));
        let (truthy, done) = (t.new_label(), t.new_label());
        t.op_with(Opcode::Push, zero)
            .op(Opcode::Ne)
            .jump(Opcode::Jmpcr, truthy)
            .op_with(Opcode::Push, one)
            .op(Opcode::Neg)
            .jump(Opcode::Jmpr, done)
            .label(truthy)
            .op_with(Opcode::Push, zero)
            .label(done);
    }

    fn swap(&mut self, t: &mut Template) {
        let two = self.int(2);
        t.op_with(Opcode::Push, two).op(Opcode::Reverse);
    }

    fn rotate(&mut self, t: &mut Template) {
        let three = self.int(3);
        t.op_with(Opcode::Push, three).op(Opcode::Pick);
    }

    fn pick(&mut self, t: &mut Template) {
        t.op(Opcode::PickCp);
    }

    /// ( value fn -- ret )
    fn apply(&mut self, t: &mut Template) {
        let (one, two) = (self.int(1), self.int(2));
        t.op_with(Opcode::Push, one)
            .op_with(Opcode::Push, two)
            .op(Opcode::Pick)
            .op(Opcode::CallC);
    }

    /// ( guard fn -- ), calls `fn` with no argument when guard is nonzero.
    fn if_then(&mut self, t: &mut Template) {
        let (zero, one, two, three) = (self.int(0), self.int(1), self.int(2), self.int(3));
        let none = self.none();
        let (taken, done) = (t.new_label(), t.new_label());
        t.op_with(Opcode::Push, two)
            .op(Opcode::Pick)
            .op_with(Opcode::Push, zero)
            .op(Opcode::Ne)
            .jump(Opcode::Jmpcr, taken)
            .op(Opcode::Drop)
            .jump(Opcode::Jmpr, done)
            .label(taken)
            .op_with(Opcode::Push, none)
            .op_with(Opcode::Push, one)
            .op_with(Opcode::Push, three)
            .op(Opcode::Pick)
            .op(Opcode::CallC)
            .op(Opcode::Drop)
            .label(done);
    }

    /// ( cond body -- ), re-evaluates a copy of `cond` before each pass.
    fn while_loop(&mut self, t: &mut Template) {
        let (zero, one, two, three) = (self.int(0), self.int(1), self.int(2), self.int(3));
        let none = self.none();
        let (head, body, exit) = (t.new_label(), t.new_label(), t.new_label());
        t.label(head)
            .op_with(Opcode::Push, two)
            .op(Opcode::PickCp)
            .op_with(Opcode::Push, none)
            .op_with(Opcode::Push, one)
            .op_with(Opcode::Push, three)
            .op(Opcode::Pick)
            .op(Opcode::CallC)
            .op_with(Opcode::Push, zero)
            .op(Opcode::Ne)
            .jump(Opcode::Jmpcr, body)
            .jump(Opcode::Jmpr, exit)
            .label(body)
            .op(Opcode::Dup)
            .op_with(Opcode::Push, none)
            .op_with(Opcode::Push, one)
            .op_with(Opcode::Push, three)
            .op(Opcode::Pick)
            .op(Opcode::CallC)
            .op(Opcode::Drop)
            .jump(Opcode::Jmpr, head)
            .label(exit)
            .op(Opcode::Drop)
            .op(Opcode::Drop);
    }
}

/// Decodes backslash escapes in a string literal body.
///
/// Unknown escapes are kept as written, backslash included.
pub fn unescape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut bytes = raw.iter().copied();

    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(b'n') => out.push(b'\n'),
            Some(b't') => out.push(b'\t'),
            Some(b'r') => out.push(b'\r'),
            Some(b'0') => out.push(0),
            Some(b'\\') => out.push(b'\\'),
            Some(b'"') => out.push(b'"'),
            Some(other) => out.extend_from_slice(&[b'\\', other]),
            None => out.push(b'\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::ir::BlockList;
    use crate::bytecode::op::Instruction;
    use crate::bytecode::resource::Resource;
    use crate::frontend::lexer::Lexer;
    use pretty_assertions::assert_eq;

    fn generate(source: &str) -> Result<(Module, BlockList), CompileError> {
        let tokens = Lexer::new(source.as_bytes()).tokenize_clean().unwrap();
        let mut module = Module::new();
        let blocks = Compiler::new(source.as_bytes(), &tokens, &mut module)
            .generate()?
            .blocks;
        Ok((module, blocks))
    }

    fn opcodes(blocks: &BlockList, index: u32) -> Vec<Opcode> {
        blocks
            .get(index)
            .unwrap()
            .lines()
            .iter()
            .map(|l| l.opcode)
            .collect()
    }

    fn resolved(blocks: &BlockList, index: u32) -> Vec<Instruction> {
        blocks
            .get(index)
            .unwrap()
            .lines()
            .iter()
            .map(|l| l.instruction())
            .collect()
    }

    fn int_id(module: &mut Module, value: i32) -> u32 {
        module.resources.intern_integer(value)
    }

    // =========================================================================
    // Literals
    // =========================================================================

    #[test]
    fn test_string_is_pushed_then_printed() {
        let (mut module, blocks) = generate("\"hi\"").unwrap();
        let id = module.resources.intern_string(b"hi");
        let none = module.resources.intern_none();

        assert_eq!(blocks.len(), 1);
        assert_eq!(
            resolved(&blocks, 0),
            vec![
                Instruction::new(Opcode::Push, id),
                Instruction::new(Opcode::Print, 0),
                Instruction::new(Opcode::Push, none),
                Instruction::new(Opcode::Return, 0),
            ]
        );
    }

    #[test]
    fn test_string_escapes_are_decoded() {
        let (module, _) = generate(r#""a\nb\"c\q""#).unwrap();
        assert!(
            module
                .resources
                .iter()
                .any(|(_, r)| *r == Resource::String(b"a\nb\"c\\q".to_vec()))
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(br"\t\r\0\\"), b"\t\r\0\\".to_vec());
        assert_eq!(unescape(br"x\"), b"x\\".to_vec());
        assert_eq!(unescape(b""), Vec::<u8>::new());
    }

    #[test]
    fn test_integers_in_every_radix() {
        let (mut module, blocks) = generate("0b101 017 42 0x1F 0").unwrap();
        let expected: Vec<Instruction> = [5, 15, 42, 31, 0]
            .into_iter()
            .map(|v| Instruction::new(Opcode::Push, int_id(&mut module, v)))
            .collect();
        assert_eq!(&resolved(&blocks, 0)[..5], &expected[..]);
    }

    #[test]
    fn test_integer_overflow_is_generation_error() {
        let err = generate("1 99999999999").unwrap_err();
        assert_eq!(err.position(), Some((1, 3)));
        assert!(err.to_string().contains("invalid integer"));
    }

    #[test]
    fn test_float_is_rejected() {
        let err = generate("1.5").unwrap_err();
        assert!(matches!(err, CompileError::Generation { .. }));
        assert!(err.to_string().contains("floating point"));
    }

    #[test]
    fn test_char_literals_push_code_points() {
        let (mut module, blocks) = generate("`A`ø").unwrap();
        let a = int_id(&mut module, 65);
        let o = int_id(&mut module, 0xF8);
        assert_eq!(
            &resolved(&blocks, 0)[..2],
            &[
                Instruction::new(Opcode::Push, a),
                Instruction::new(Opcode::Push, o),
            ]
        );
    }

    // =========================================================================
    // Operators
    // =========================================================================

    #[test]
    fn test_one_to_one_operators() {
        let (_, blocks) = generate("+-*/_$%.").unwrap();
        assert_eq!(
            &opcodes(&blocks, 0)[..8],
            &[
                Opcode::Add,
                Opcode::Sub,
                Opcode::Mul,
                Opcode::Div,
                Opcode::Neg,
                Opcode::Dup,
                Opcode::Drop,
                Opcode::Print,
            ]
        );
    }

    #[test]
    fn test_fast_io_operators() {
        let (_, blocks) = generate(",^ß").unwrap();
        let lines = resolved(&blocks, 0);
        assert_eq!(
            &lines[..3],
            &[
                Instruction::new(Opcode::FastLib, FastLib::PutChar as u32),
                Instruction::new(Opcode::FastLib, FastLib::GetChar as u32),
                Instruction::new(Opcode::FastLib, FastLib::Flush as u32),
            ]
        );
    }

    #[test]
    fn test_comparison_expansion() {
        let (mut module, blocks) = generate("=").unwrap();
        let zero = int_id(&mut module, 0);
        let one = int_id(&mut module, 1);
        assert_eq!(
            &resolved(&blocks, 0)[..6],
            &[
                Instruction::new(Opcode::Eq, 0),
                Instruction::new(Opcode::Jmpcr, 3),
                Instruction::new(Opcode::Push, zero),
                Instruction::new(Opcode::Jmpr, 3),
                Instruction::new(Opcode::Push, one),
                Instruction::new(Opcode::Neg, 0),
            ]
        );
    }

    #[test]
    fn test_logical_expansions() {
        let (_, blocks) = generate("&|~").unwrap();
        let ops = opcodes(&blocks, 0);
        assert_eq!(
            &ops[..14],
            &[
                Opcode::Push,
                Opcode::Ne,
                Opcode::Push,
                Opcode::Pick,
                Opcode::Push,
                Opcode::Ne,
                Opcode::AndL,
                Opcode::NotL,
                Opcode::Jmpcr,
                Opcode::Push,
                Opcode::Neg,
                Opcode::Jmpr,
                Opcode::Push,
                Opcode::Push,
            ]
        );
        assert_eq!(ops[19], Opcode::OrL);
        assert_eq!(
            &ops[26..34],
            &[
                Opcode::Push,
                Opcode::Ne,
                Opcode::Jmpcr,
                Opcode::Push,
                Opcode::Neg,
                Opcode::Jmpr,
                Opcode::Push,
                Opcode::Push,
            ]
        );
    }

    #[test]
    fn test_stack_shuffles() {
        let (mut module, blocks) = generate("\\@ø").unwrap();
        let two = int_id(&mut module, 2);
        let three = int_id(&mut module, 3);
        assert_eq!(
            &resolved(&blocks, 0)[..5],
            &[
                Instruction::new(Opcode::Push, two),
                Instruction::new(Opcode::Reverse, 0),
                Instruction::new(Opcode::Push, three),
                Instruction::new(Opcode::Pick, 0),
                Instruction::new(Opcode::PickCp, 0),
            ]
        );
    }

    // =========================================================================
    // Variables
    // =========================================================================

    #[test]
    fn test_variable_read_and_assign() {
        let (mut module, blocks) = generate("1a: a;").unwrap();
        let a = module.resources.intern_identifier(b"a");
        let block = blocks.get(0).unwrap();
        let lines: Vec<_> = block.lines()[1..4].iter().map(|l| l.instruction()).collect();
        assert_eq!(
            lines,
            vec![
                Instruction::new(Opcode::PopM, a),
                Instruction::new(Opcode::PushM, a),
                Instruction::new(Opcode::Slv, 0),
            ]
        );
        assert_eq!(block.lines()[1].attrs[0].kind, AttrKind::Variable);
        assert_eq!(block.lines()[2].attrs[0].res_id, a);
    }

    #[test]
    fn test_variable_without_access_fails_at_next_token() {
        let err = generate("a +").unwrap_err();
        assert_eq!(err.position(), Some((1, 3)));
        assert!(err.to_string().contains("found '+'"));

        let err = generate("a").unwrap_err();
        assert!(err.to_string().contains("EOF"));
    }

    #[test]
    fn test_trivia_between_variable_and_access() {
        let source = b"1 a {store} :\n a\t;";
        let tokens = Lexer::new(source).tokenize().unwrap();
        let mut module = Module::new();
        let blocks = Compiler::new(source, &tokens, &mut module)
            .generate()
            .unwrap()
            .blocks;

        let (_, clean) = generate("1 a {store} :\n a\t;").unwrap();
        assert_eq!(resolved(&blocks, 0), resolved(&clean, 0));
        assert_eq!(
            &opcodes(&blocks, 0)[..4],
            &[Opcode::Push, Opcode::PopM, Opcode::PushM, Opcode::Slv]
        );
    }

    #[test]
    fn test_stray_access_operator_fails() {
        let err = generate("1 ;").unwrap_err();
        assert_eq!(err.position(), Some((1, 3)));
    }

    // =========================================================================
    // Function literals
    // =========================================================================

    #[test]
    fn test_applied_literal_makes_two_blocks() {
        let (mut module, blocks) = generate("[1]!").unwrap();
        let arg = module.resources.intern_identifier(b"arg");
        let main = module.resources.intern_identifier(b"main");

        assert_eq!(blocks.len(), 2);
        assert_eq!(module.exports.len(), 2);
        assert_eq!(module.exports[0].name, Some(main));
        assert!(module.exports[1].is_blank());
        assert_eq!(module.exports[1].args, vec![arg]);

        let first = &blocks.get(0).unwrap().lines()[0];
        assert_eq!(first.opcode, Opcode::LambdaMk);
        assert_eq!(first.reloc, Reloc::Lambda);
        assert_eq!(first.operand, 1);

        assert_eq!(
            opcodes(&blocks, 1),
            vec![Opcode::Argc, Opcode::Push, Opcode::Push, Opcode::Return]
        );
        assert_eq!(
            &opcodes(&blocks, 0)[1..5],
            &[Opcode::Push, Opcode::Push, Opcode::Pick, Opcode::CallC]
        );
    }

    #[test]
    fn test_nested_literals_are_appended_depth_first() {
        let (module, blocks) = generate("[[1]![2]!]![3]").unwrap();
        assert_eq!(blocks.len(), 5);
        assert_eq!(module.exports.len(), 5);

        let refs = |index: u32| -> Vec<u32> {
            blocks
                .get(index)
                .unwrap()
                .lines()
                .iter()
                .filter(|l| l.reloc == Reloc::Lambda)
                .map(|l| l.operand)
                .collect()
        };
        // inner literals close before their parent
        assert_eq!(refs(3), vec![1, 2]);
        assert_eq!(refs(0), vec![3, 4]);
        assert!(refs(1).is_empty());
    }

    #[test]
    fn test_unmatched_close_bracket() {
        let err = generate("1 ]").unwrap_err();
        assert!(err.to_string().contains("unmatched ']'"));
        assert_eq!(err.position(), Some((1, 3)));
    }

    #[test]
    fn test_unterminated_literal_points_at_open_bracket() {
        let err = generate("1 [2 [3]").unwrap_err();
        assert!(err.to_string().contains("unterminated function literal"));
        assert_eq!(err.position(), Some((1, 3)));
    }

    #[test]
    fn test_custom_names() {
        let source = b"[1]";
        let tokens = Lexer::new(source).tokenize_clean().unwrap();
        let mut module = Module::new();
        let config = CompilerConfig {
            main_name: "start".to_string(),
            arg_name: "x".to_string(),
        };
        Compiler::with_config(source, &tokens, &mut module, config)
            .generate()
            .unwrap();

        assert!(module.find_export(b"start").is_some());
        let x = module.resources.find_identifier(b"x");
        assert_eq!(module.exports[1].args, vec![x.unwrap()]);
    }

    // =========================================================================
    // Control flow
    // =========================================================================

    #[test]
    fn test_if_expansion() {
        let (mut module, blocks) = generate("1[2]?").unwrap();
        let none = module.resources.intern_none();
        let code = resolved(&blocks, 0);
        // skip PUSH 1 and LAMBDAMK
        let expansion = &code[2..16];
        assert_eq!(expansion[4], Instruction::new(Opcode::Jmpcr, 3));
        assert_eq!(expansion[5].opcode, Opcode::Drop);
        assert_eq!(expansion[6], Instruction::new(Opcode::Jmpr, 7));
        assert_eq!(expansion[7], Instruction::new(Opcode::Push, none));
        assert_eq!(expansion[11].opcode, Opcode::CallC);
        assert_eq!(expansion[12].opcode, Opcode::Drop);
        assert_eq!(code[15].opcode, Opcode::Push);
        assert_eq!(code[16].opcode, Opcode::Return);
    }

    #[test]
    fn test_while_body_call_needs_truthy_branch() {
        let (_, blocks) = generate("[0][1]#").unwrap();
        let code = resolved(&blocks, 0);
        let base = 2;
        let expansion = &code[base..base + 21];

        let calls: Vec<usize> = expansion
            .iter()
            .enumerate()
            .filter(|(_, i)| i.opcode == Opcode::CallC)
            .map(|(n, _)| n)
            .collect();
        assert_eq!(calls, vec![6, 16]);

        // the conditional jump is the only way into the body
        let branch = expansion[9];
        assert_eq!(branch.opcode, Opcode::Jmpcr);
        assert_eq!(branch.jump_target(9), Some(11));
        assert_eq!(expansion[10].opcode, Opcode::Jmpr);
        assert_eq!(expansion[10].jump_target(10), Some(19));

        let entries_into_body = expansion
            .iter()
            .enumerate()
            .filter_map(|(n, i)| i.jump_target(n as u32))
            .filter(|&t| (11..=18).contains(&t))
            .count();
        assert_eq!(entries_into_body, 1);

        // loops back to the condition
        assert_eq!(expansion[18].jump_target(18), Some(0));
        assert_eq!(expansion[19].opcode, Opcode::Drop);
        assert_eq!(expansion[20].opcode, Opcode::Drop);
    }

    #[test]
    fn test_failed_compile_leaves_module_untouched() {
        let mut module = Module::new();
        module.install_builtin(&[Instruction::new(Opcode::Return, 0)]);

        let source = b"[1][2] a +";
        let tokens = Lexer::new(source).tokenize_clean().unwrap();
        let err = Compiler::new(source, &tokens, &mut module).compile();
        assert!(err.is_err());

        assert!(module.exports.is_empty());
        assert!(module.resources.is_empty());
        assert!(module.debug.is_empty());
        assert_eq!(module.text, vec![Instruction::new(Opcode::Return, 0)]);
    }

    #[test]
    fn test_exports_follow_existing_entries() {
        let source = b"[1]";
        let tokens = Lexer::new(source).tokenize_clean().unwrap();
        let mut module = Module::new();
        module.exports.push(ExportEntry::blank(vec![]));

        let ctx = Compiler::new(source, &tokens, &mut module).generate().unwrap();
        assert_eq!(ctx.export_base, 1);
        assert!(ctx.is_consistent());
    }
}
