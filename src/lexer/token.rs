use serde::{Deserialize, Serialize};

/// A single token from the source code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The type of token
    pub kind: TokenKind,
    /// Original text of the token
    pub lexeme: String,
    /// Line number where token starts (1-indexed)
    pub line: usize,
    /// Column number where token starts (1-indexed)
    pub column: usize,
}

impl Token {
    /// Creates a new token with the given properties
    pub fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Token {
            kind,
            lexeme,
            line,
            column,
        }
    }
}

/// All token types the reader understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    /// Integer literal
    Integer(i64),
    /// Floating-point literal
    Float(f64),
    /// String literal, escapes already processed
    String(String),
    /// Character literal such as `\a` or `\newline`
    Char(char),
    /// `true`
    True,
    /// `false`
    False,
    /// `nil`
    Nil,

    // Names
    /// Symbol, possibly namespace-qualified (`ns/name`)
    Symbol(String),
    /// Keyword without the leading colon
    Keyword(String),

    // Delimiters
    /// (
    LeftParen,
    /// )
    RightParen,
    /// [
    LeftBracket,
    /// ]
    RightBracket,
    /// {
    LeftBrace,
    /// }
    RightBrace,
    /// #{
    HashBrace,

    // Reader macros
    /// '
    Quote,
    /// `
    Backtick,
    /// ~
    Tilde,
    /// ~@
    TildeAt,
    /// ^
    Caret,
    /// @
    At,
    /// #'
    HashQuote,
    /// #_
    HashUnderscore,

    /// End of input
    Eof,
}

impl TokenKind {
    /// Whether this token closes a collection
    pub fn is_closer(&self) -> bool {
        matches!(
            self,
            TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace
        )
    }
}
