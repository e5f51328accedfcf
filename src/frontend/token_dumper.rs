use crate::frontend::token::{Spanned, Token};
use std::fmt::{self, Write};

/// Renders a token stream one token per line, for inspecting the scanner.
pub struct TokenDumper {
    pub color: bool,
    pub show_lexeme: bool, // if false, prints the token kind only
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_lexeme: true,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn kinds_only(mut self) -> Self {
        self.show_lexeme = false;
        self
    }

    pub fn dump(&self, source: &[u8], tokens: &[Spanned]) -> String {
        self.listing(source, tokens).to_string()
    }

    /// A displayable view of `tokens`.
    pub fn listing<'a>(&'a self, source: &'a [u8], tokens: &'a [Spanned]) -> Listing<'a> {
        Listing {
            dumper: self,
            source,
            tokens,
        }
    }

    pub fn write_to<W: Write>(
        &self,
        out: &mut W,
        source: &[u8],
        tokens: &[Spanned],
    ) -> fmt::Result {
        for s in tokens {
            self.write_one(out, source, s)?;
        }
        Ok(())
    }

    fn write_one<W: Write>(&self, out: &mut W, source: &[u8], s: &Spanned) -> fmt::Result {
        let kind = self.kind(&s.token);
        let colr = if self.color { self.color(&s.token) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        write!(
            out,
            "[{:02}:{:02}] {}{:<8} {}",
            s.span.line,
            s.span.col,
            colr,
            kind,
            s.token.name()
        )?;
        if self.show_lexeme && !matches!(s.token, Token::Newline | Token::Eof) {
            let lexeme = source.get(s.span.start..s.span.end).unwrap_or(&[]);
            write!(out, " {:?}", String::from_utf8_lossy(lexeme))?;
        }
        writeln!(out, "{}", reset)
    }

    fn kind(&self, t: &Token) -> &'static str {
        use Token::*;
        match t {
            // trivia
            Whitespace => "SPACE",
            Newline => "NEWLINE",
            Comment => "COMMENT",
            Eof => "EOF",

            // literals
            Integer(_) => "INT",
            Float(_) => "FLOAT",
            String => "STRING",
            Char => "CHAR",

            Variable => "VAR",
            Get | Assign => "ACCESS",

            // structure
            LBracket | RBracket => "BRACKET",
            Apply | If | While => "CONTROL",

            Plus | Minus | Star | Slash | Neg => "OP",
            Eq | Lt | Gt | And | Or | Not => "CMP",
            Dup | Drop | Swap | Rot | Pick => "STACK",
            PrintInt | PrintChar | ReadChar | Flush => "IO",
        }
    }

    fn color(&self, t: &Token) -> &'static str {
        use Token::*;
        match t {
            Whitespace | Newline | Comment | Eof => Self::DIM,
            String | Char => Self::GRN,
            Integer(_) | Float(_) => Self::CYN,
            Variable => Self::YEL,
            Plus | Minus | Star | Slash | Neg => Self::MAG,
            Eq | Lt | Gt | And | Or | Not => Self::MAG,
            _ => Self::RESET,
        }
    }
}

pub struct Listing<'a> {
    dumper: &'a TokenDumper,
    source: &'a [u8],
    tokens: &'a [Spanned],
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.dumper.write_to(f, self.source, self.tokens)
    }
}
