use thiserror::Error;
use tracing::debug;

use crate::frontend::token::{Radix, Span, Spanned, Token};

/// A scanning error with source location.
///
/// `line` and `col` are 1-based and point at the first byte of the lexeme
/// that could not be completed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{col}: {message}")]
pub struct LexerError {
    pub message: String,
    pub line: u32,
    pub col: u32,
}

/// Line-break convention of a source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EolStyle {
    /// `\n`
    Lf,
    /// `\r`
    Cr,
    /// `\r\n`
    CrLf,
}

impl EolStyle {
    /// Picks the convention of the first line break in `source`; `Lf` when
    /// there is none.
    pub fn detect(source: &[u8]) -> Self {
        match source.iter().position(|&b| b == b'\r' || b == b'\n') {
            Some(i) if source[i] == b'\n' => EolStyle::Lf,
            Some(i) if source.get(i + 1) == Some(&b'\n') => EolStyle::CrLf,
            Some(_) => EolStyle::Cr,
            None => EolStyle::Lf,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LexerConfig {
    /// Forces a line-break convention instead of detecting it.
    pub eol: Option<EolStyle>,
}

/// Total encoded length of a multi-byte glyph given its lead byte.
pub fn glyph_width(lead: u8) -> Option<usize> {
    match lead {
        0xC0..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF7 => Some(4),
        _ => None,
    }
}

// UTF-8 encodings of the two non-ASCII operators: `ø` (pick) and `ß` (flush).
const GLYPH_LEAD: u8 = 0xC3;
const GLYPH_PICK: u8 = 0xB8;
const GLYPH_FLUSH: u8 = 0x9F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Eol,
    Comment,
    Glyph,
    Zero,
    BinaryPrefix,
    Binary,
    Octal,
    HexPrefix,
    Hex,
    Decimal,
    FloatBinary,
    FloatOctal,
    FloatDecimal,
    FloatHex,
    Char,
    String,
    StringEscape,
}

/// Outcome of feeding one byte to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Consume the byte and stay in (or move to) the given state.
    Keep(State),
    /// Consume `n` bytes starting at the current one and finish.
    Take(usize),
    /// Finish without consuming the current byte.
    Back,
    /// Finish and also give back the byte before the current one.
    Retreat,
    Fail(&'static str),
}

fn is_octal(ch: u8) -> bool {
    matches!(ch, b'0'..=b'7')
}

fn is_binary(ch: u8) -> bool {
    matches!(ch, b'0' | b'1')
}

fn operator(ch: u8) -> Option<Token> {
    let token = match ch {
        b'+' => Token::Plus,
        b'-' => Token::Minus,
        b'*' => Token::Star,
        b'/' => Token::Slash,
        b'_' => Token::Neg,
        b'=' => Token::Eq,
        b'>' => Token::Gt,
        b'<' => Token::Lt,
        b'&' => Token::And,
        b'|' => Token::Or,
        b'~' => Token::Not,
        b':' => Token::Assign,
        b';' => Token::Get,
        b'[' => Token::LBracket,
        b']' => Token::RBracket,
        b'!' => Token::Apply,
        b'$' => Token::Dup,
        b'%' => Token::Drop,
        b'\\' => Token::Swap,
        b'@' => Token::Rot,
        b'?' => Token::If,
        b'#' => Token::While,
        b'.' => Token::PrintInt,
        b',' => Token::PrintChar,
        b'^' => Token::ReadChar,
        _ => return None,
    };
    Some(token)
}

fn step(state: State, ch: u8, token: &mut Token, eol: EolStyle) -> Step {
    match state {
        State::Init => match ch {
            b'\r' | b'\n' => {
                *token = Token::Newline;
                if eol == EolStyle::CrLf && ch == b'\r' {
                    Step::Keep(State::Eol)
                } else {
                    Step::Take(1)
                }
            }
            b' ' | b'\t' => {
                *token = Token::Whitespace;
                Step::Take(1)
            }
            b'{' => {
                *token = Token::Comment;
                Step::Keep(State::Comment)
            }
            b'`' => {
                *token = Token::Char;
                Step::Keep(State::Char)
            }
            b'"' => {
                *token = Token::String;
                Step::Keep(State::String)
            }
            b'0' => {
                *token = Token::Integer(Radix::Decimal);
                Step::Keep(State::Zero)
            }
            b'1'..=b'9' => {
                *token = Token::Integer(Radix::Decimal);
                Step::Keep(State::Decimal)
            }
            GLYPH_LEAD => Step::Keep(State::Glyph),
            ch if ch.is_ascii_alphabetic() => {
                *token = Token::Variable;
                Step::Take(1)
            }
            ch => match operator(ch) {
                Some(op) => {
                    *token = op;
                    Step::Take(1)
                }
                None => Step::Fail("undefined token"),
            },
        },

        State::Eol => {
            if ch == b'\n' {
                Step::Take(1)
            } else {
                Step::Back
            }
        }

        State::Comment => {
            if ch == b'}' {
                Step::Take(1)
            } else {
                Step::Keep(State::Comment)
            }
        }

        State::Glyph => match ch {
            GLYPH_PICK => {
                *token = Token::Pick;
                Step::Take(1)
            }
            GLYPH_FLUSH => {
                *token = Token::Flush;
                Step::Take(1)
            }
            _ => Step::Fail("undefined token"),
        },

        // =====================================================================
        // Numbers
        // =====================================================================
        State::Zero => match ch {
            b'b' | b'B' => Step::Keep(State::BinaryPrefix),
            b'x' | b'X' => Step::Keep(State::HexPrefix),
            ch if is_octal(ch) => {
                *token = Token::Integer(Radix::Octal);
                Step::Keep(State::Octal)
            }
            b'.' => {
                *token = Token::Float(Radix::Decimal);
                Step::Keep(State::FloatDecimal)
            }
            // plain decimal zero
            _ => Step::Back,
        },
        State::BinaryPrefix => {
            if is_binary(ch) {
                *token = Token::Integer(Radix::Binary);
                Step::Keep(State::Binary)
            } else {
                Step::Retreat
            }
        }
        State::HexPrefix => {
            if ch.is_ascii_hexdigit() {
                *token = Token::Integer(Radix::Hexadecimal);
                Step::Keep(State::Hex)
            } else {
                Step::Retreat
            }
        }
        State::Binary => integer_step(ch, is_binary(ch), Radix::Binary, token),
        State::Octal => integer_step(ch, is_octal(ch), Radix::Octal, token),
        State::Decimal => integer_step(ch, ch.is_ascii_digit(), Radix::Decimal, token),
        State::Hex => integer_step(ch, ch.is_ascii_hexdigit(), Radix::Hexadecimal, token),
        State::FloatBinary => fraction_step(state, is_binary(ch)),
        State::FloatOctal => fraction_step(state, is_octal(ch)),
        State::FloatDecimal => fraction_step(state, ch.is_ascii_digit()),
        State::FloatHex => fraction_step(state, ch.is_ascii_hexdigit()),

        // =====================================================================
        // Character and string literals
        // =====================================================================
        State::Char => Step::Take(glyph_width(ch).unwrap_or(1)),
        State::String => match ch {
            b'"' => Step::Take(1),
            b'\\' => Step::Keep(State::StringEscape),
            _ => Step::Keep(State::String),
        },
        // the escaped byte is kept verbatim; decoding happens in the generator
        State::StringEscape => Step::Keep(State::String),
    }
}

fn integer_step(ch: u8, is_digit: bool, radix: Radix, token: &mut Token) -> Step {
    if is_digit {
        return Step::Keep(integer_state(radix));
    }
    if ch == b'.' {
        *token = Token::Float(radix);
        return Step::Keep(float_state(radix));
    }
    Step::Back
}

fn fraction_step(state: State, is_digit: bool) -> Step {
    if is_digit {
        Step::Keep(state)
    } else {
        Step::Back
    }
}

fn integer_state(radix: Radix) -> State {
    match radix {
        Radix::Binary => State::Binary,
        Radix::Octal => State::Octal,
        Radix::Decimal => State::Decimal,
        Radix::Hexadecimal => State::Hex,
    }
}

fn float_state(radix: Radix) -> State {
    match radix {
        Radix::Binary => State::FloatBinary,
        Radix::Octal => State::FloatOctal,
        Radix::Decimal => State::FloatDecimal,
        Radix::Hexadecimal => State::FloatHex,
    }
}

pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
    eol: EolStyle,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self::with_config(source, &LexerConfig::default())
    }

    pub fn with_config(source: &'a [u8], config: &LexerConfig) -> Self {
        Lexer {
            source,
            pos: 0,
            line: 1,
            col: 1,
            eol: config.eol.unwrap_or_else(|| EolStyle::detect(source)),
        }
    }

    pub fn eol_style(&self) -> EolStyle {
        self.eol
    }

    fn error(&self, message: &str) -> LexerError {
        LexerError {
            message: message.to_string(),
            line: self.line,
            col: self.col,
        }
    }

    /// End offset of a lexeme whose state machine ran out of input.
    fn finish_at_eof(&self, state: State, end: usize) -> Result<usize, LexerError> {
        match state {
            State::BinaryPrefix | State::HexPrefix => Ok(end - 1),
            State::Comment => Err(self.error("unterminated comment")),
            State::Char => Err(self.error("unterminated character literal")),
            State::String | State::StringEscape => Err(self.error("unterminated string literal")),
            State::Glyph => Err(self.error("undefined token")),
            _ => Ok(end),
        }
    }

    fn newline(&mut self) {
        self.line += 1;
        self.col = 1;
    }

    fn advance_position(&mut self, lexeme: &[u8]) {
        let mut i = 0;
        while i < lexeme.len() {
            match lexeme[i] {
                b'\r' if self.eol == EolStyle::CrLf && lexeme.get(i + 1) == Some(&b'\n') => {
                    self.newline();
                    i += 2;
                }
                b'\r' | b'\n' => {
                    self.newline();
                    i += 1;
                }
                _ => {
                    self.col += 1;
                    i += 1;
                }
            }
        }
    }

    /// Runs the state machine from `Init` over the bytes at the cursor and
    /// returns exactly one token.
    fn eat_token(&mut self) -> Result<Spanned, LexerError> {
        let source = self.source;
        let start = self.pos;
        let mut p = start;
        let mut state = State::Init;
        let mut token = Token::Eof;

        let end = loop {
            let Some(&ch) = source.get(p) else {
                break self.finish_at_eof(state, p)?;
            };

            match step(state, ch, &mut token, self.eol) {
                Step::Keep(next) => {
                    state = next;
                    p += 1;
                }
                Step::Take(n) => {
                    if p + n > source.len() {
                        return Err(self.error("truncated glyph in character literal"));
                    }
                    break p + n;
                }
                Step::Back => break p,
                Step::Retreat => break p - 1,
                Step::Fail(message) => return Err(self.error(message)),
            }
        };

        let span = Span {
            start,
            end,
            line: self.line,
            col: self.col,
        };
        self.advance_position(&source[start..end]);
        self.pos = end;

        Ok(Spanned { token, span })
    }

    /// Scans the whole buffer, trivia included, terminated by `Eof`.
    #[tracing::instrument(level = "debug", skip_all, fields(len = self.source.len()))]
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexerError> {
        let mut tokens = Vec::new();

        while self.pos < self.source.len() {
            tokens.push(self.eat_token()?);
        }

        tokens.push(Spanned {
            token: Token::Eof,
            span: Span {
                start: self.pos,
                end: self.pos,
                line: self.line,
                col: self.col,
            },
        });

        debug!(tokens = tokens.len(), eol = ?self.eol, "scan complete");
        Ok(tokens)
    }

    /// Like [`Lexer::tokenize`] with whitespace, line breaks and comments removed.
    pub fn tokenize_clean(&mut self) -> Result<Vec<Spanned>, LexerError> {
        let tokens = self.tokenize()?;
        Ok(tokens
            .into_iter()
            .filter(|t| !t.token.is_trivia())
            .collect())
    }
}
