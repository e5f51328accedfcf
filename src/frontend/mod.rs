pub mod lexer;
pub mod token;
pub mod token_dumper;

pub use lexer::{EolStyle, Lexer, LexerConfig, LexerError};
pub use token::{Radix, Span, Spanned, Token};
