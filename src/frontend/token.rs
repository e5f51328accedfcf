/// Numeric base of an integer or floating literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Radix {
    Binary,
    Octal,
    Decimal,
    Hexadecimal,
}

impl Radix {
    pub fn base(self) -> u32 {
        match self {
            Radix::Binary => 2,
            Radix::Octal => 8,
            Radix::Decimal => 10,
            Radix::Hexadecimal => 16,
        }
    }

    /// Length of the prefix (`0b`, `0`, `0x`) preceding the digits.
    pub fn prefix_len(self) -> usize {
        match self {
            Radix::Binary | Radix::Hexadecimal => 2,
            Radix::Octal => 1,
            Radix::Decimal => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    // Literals
    Integer(Radix),
    Float(Radix),
    String,
    Char,

    // Single-letter variable name
    Variable,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Neg,

    // Stack operations
    Dup,
    Drop,
    Swap,
    Rot,
    Pick,

    // Comparison
    Eq,
    Lt,
    Gt,

    // Logic
    And,
    Or,
    Not,

    // I/O
    PrintInt,
    PrintChar,
    ReadChar,
    Flush,

    // Variable access
    Get,
    Assign,

    // Function literals and control flow
    LBracket,
    RBracket,
    Apply,
    If,
    While,

    // Trivia
    Whitespace,
    Newline,
    Comment,

    Eof,
}

impl Token {
    /// Whitespace, line breaks and comments; the generator skips them.
    pub fn is_trivia(&self) -> bool {
        matches!(self, Token::Whitespace | Token::Newline | Token::Comment)
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Token::Integer(_) | Token::Float(_) | Token::String | Token::Char
        )
    }

    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Token::Integer(Radix::Binary) => "binary integer",
            Token::Integer(Radix::Octal) => "octal integer",
            Token::Integer(Radix::Decimal) => "decimal integer",
            Token::Integer(Radix::Hexadecimal) => "hexadecimal integer",
            Token::Float(Radix::Binary) => "binary float",
            Token::Float(Radix::Octal) => "octal float",
            Token::Float(Radix::Decimal) => "decimal float",
            Token::Float(Radix::Hexadecimal) => "hexadecimal float",
            Token::String => "string",
            Token::Char => "character",
            Token::Variable => "variable",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Neg => "_",
            Token::Dup => "$",
            Token::Drop => "%",
            Token::Swap => "\\",
            Token::Rot => "@",
            Token::Pick => "pick",
            Token::Eq => "=",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::And => "&",
            Token::Or => "|",
            Token::Not => "~",
            Token::PrintInt => ".",
            Token::PrintChar => ",",
            Token::ReadChar => "^",
            Token::Flush => "flush",
            Token::Get => ";",
            Token::Assign => ":",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Apply => "!",
            Token::If => "?",
            Token::While => "#",
            Token::Whitespace => "whitespace",
            Token::Newline => "newline",
            Token::Comment => "comment",
            Token::Eof => "EOF",
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Location of a lexeme: byte range into the source plus its 1-based start
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub col: u32,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

impl Spanned {
    /// The raw lexeme, delimiters included.
    pub fn lexeme<'s>(&self, source: &'s [u8]) -> &'s [u8] {
        &source[self.span.start..self.span.end]
    }
}
