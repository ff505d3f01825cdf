use super::token::{Token, TokenKind};
use crate::error::{Error, Result};

/// Scanner for reader syntax
pub struct SExprScanner {
    /// Source code as character vector
    source: Vec<char>,
    /// Accumulated tokens
    tokens: Vec<Token>,
    /// Start position of current token
    start: usize,
    /// Current position in source
    current: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
    /// Line and column where the current token starts
    start_line: usize,
    start_column: usize,
}

impl SExprScanner {
    /// Creates a new scanner from source code
    pub fn new(source: &str) -> Self {
        SExprScanner {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scans all tokens from source code and returns them as a vector
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_line = self.line;
            self.start_column = self.column;
            self.scan_token()?;
        }

        self.tokens.push(Token::new(
            TokenKind::Eof,
            String::new(),
            self.line,
            self.column,
        ));

        Ok(std::mem::take(&mut self.tokens))
    }

    fn scan_token(&mut self) -> Result<()> {
        let c = self.advance();

        match c {
            // Commas are whitespace
            ' ' | '\r' | '\t' | ',' => {}
            '\n' => {
                self.line += 1;
                self.column = 1;
            }

            ';' => self.skip_line_comment(),

            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '[' => self.add_token(TokenKind::LeftBracket),
            ']' => self.add_token(TokenKind::RightBracket),
            '{' => self.add_token(TokenKind::LeftBrace),
            '}' => self.add_token(TokenKind::RightBrace),

            '\'' => self.add_token(TokenKind::Quote),
            '`' => self.add_token(TokenKind::Backtick),
            '^' => self.add_token(TokenKind::Caret),
            '@' => self.add_token(TokenKind::At),
            '~' => {
                if self.match_char('@') {
                    self.add_token(TokenKind::TildeAt);
                } else {
                    self.add_token(TokenKind::Tilde);
                }
            }

            '#' => self.scan_dispatch()?,
            '"' => self.scan_string()?,
            '\\' => self.scan_char()?,
            ':' => self.scan_keyword()?,

            c if c.is_ascii_digit() => self.scan_number()?,
            '+' | '-' if self.peek().is_ascii_digit() => self.scan_number()?,

            c if c.is_whitespace() => {}
            _ => self.scan_symbol()?,
        }

        Ok(())
    }

    fn scan_dispatch(&mut self) -> Result<()> {
        match self.peek() {
            '{' => {
                self.advance();
                self.add_token(TokenKind::HashBrace);
            }
            '\'' => {
                self.advance();
                self.add_token(TokenKind::HashQuote);
            }
            '_' => {
                self.advance();
                self.add_token(TokenKind::HashUnderscore);
            }
            '\0' => return Err(self.error("EOF while reading dispatch macro")),
            other => {
                return Err(self.error(format!("No dispatch macro for: {}", other)));
            }
        }
        Ok(())
    }

    fn skip_line_comment(&mut self) {
        while self.peek() != '\n' && !self.is_at_end() {
            self.advance();
        }
    }

    fn scan_string(&mut self) -> Result<()> {
        let mut value = String::new();

        loop {
            if self.is_at_end() {
                return Err(self.error("EOF while reading string"));
            }
            let c = self.advance();
            match c {
                '"' => break,
                '\n' => {
                    self.line += 1;
                    self.column = 1;
                    value.push(c);
                }
                '\\' => {
                    if self.is_at_end() {
                        return Err(self.error("EOF while reading string"));
                    }
                    let escaped = self.advance();
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        'b' => '\u{8}',
                        'f' => '\u{c}',
                        '0' => '\0',
                        '\\' => '\\',
                        '"' => '"',
                        'u' => self.scan_unicode_escape()?,
                        other => {
                            return Err(
                                self.error(format!("Unsupported escape character: \\{}", other))
                            )
                        }
                    });
                }
                _ => value.push(c),
            }
        }

        self.add_token(TokenKind::String(value));
        Ok(())
    }

    fn scan_unicode_escape(&mut self) -> Result<char> {
        let mut digits = String::new();
        for _ in 0..4 {
            if !self.peek().is_ascii_hexdigit() {
                return Err(self.error("Invalid unicode escape: expected 4 hex digits"));
            }
            digits.push(self.advance());
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(format!("Invalid unicode escape: \\u{}", digits)))
    }

    fn scan_char(&mut self) -> Result<()> {
        if self.is_at_end() {
            return Err(self.error("EOF while reading character"));
        }
        // The first character is always part of the literal, even a delimiter
        let first = self.advance();
        let mut text = String::from(first);
        while !is_delimiter(self.peek()) {
            text.push(self.advance());
        }

        let c = if text.chars().count() == 1 {
            first
        } else {
            match text.as_str() {
                "newline" => '\n',
                "space" => ' ',
                "tab" => '\t',
                "return" => '\r',
                "backspace" => '\u{8}',
                "formfeed" => '\u{c}',
                _ if text.starts_with('u') && text.len() == 5 => {
                    u32::from_str_radix(&text[1..], 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| self.error(format!("Invalid unicode character: \\{}", text)))?
                }
                _ => return Err(self.error(format!("Unsupported character: \\{}", text))),
            }
        };

        self.add_token(TokenKind::Char(c));
        Ok(())
    }

    fn scan_keyword(&mut self) -> Result<()> {
        // `::name` reads as `:name`; there is no auto-resolution against the current namespace
        self.match_char(':');
        let mut name = String::new();
        while !is_delimiter(self.peek()) {
            name.push(self.advance());
        }
        if name.is_empty() || name.ends_with('/') || name.starts_with('/') && name.len() > 1 {
            return Err(self.error(format!("Invalid token: :{}", name)));
        }
        self.add_token(TokenKind::Keyword(name));
        Ok(())
    }

    fn scan_number(&mut self) -> Result<()> {
        while !is_delimiter(self.peek()) {
            self.advance();
        }
        let text: String = self.source[self.start..self.current].iter().collect();

        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(&text)),
        };

        let kind = if let Some(hex) = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
        {
            let n = i64::from_str_radix(hex, 16)
                .map_err(|_| self.error(format!("Invalid number: {}", text)))?;
            TokenKind::Integer(if negative { -n } else { n })
        } else if digits.contains(['.', 'e', 'E']) {
            let f: f64 = text
                .parse()
                .map_err(|_| self.error(format!("Invalid number: {}", text)))?;
            TokenKind::Float(f)
        } else {
            let n: i64 = text
                .parse()
                .map_err(|_| self.error(format!("Invalid number: {}", text)))?;
            TokenKind::Integer(n)
        };

        self.add_token(kind);
        Ok(())
    }

    fn scan_symbol(&mut self) -> Result<()> {
        while !is_delimiter(self.peek()) {
            self.advance();
        }
        let text: String = self.source[self.start..self.current].iter().collect();

        let kind = match text.as_str() {
            "nil" => TokenKind::Nil,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ if text.len() > 1 && (text.ends_with('/') || text.starts_with('/')) => {
                return Err(self.error(format!("Invalid token: {}", text)));
            }
            _ => TokenKind::Symbol(text),
        };
        self.add_token(kind);
        Ok(())
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        self.column += 1;
        c
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current]
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            false
        } else {
            self.current += 1;
            self.column += 1;
            true
        }
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(
            kind,
            lexeme,
            self.start_line,
            self.start_column,
        ));
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::SyntaxError {
            line: self.start_line,
            col: self.start_column,
            message: message.into(),
        }
    }
}

/// Characters that end a symbol, number or keyword
fn is_delimiter(c: char) -> bool {
    c == '\0'
        || c.is_whitespace()
        || matches!(
            c,
            ',' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';' | '@' | '^' | '`' | '~' | '\\'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        SExprScanner::new(source)
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_sexpr() {
        let tokens = kinds("(+ 1 2)");
        assert_eq!(
            tokens,
            vec![
                TokenKind::LeftParen,
                TokenKind::Symbol("+".into()),
                TokenKind::Integer(1),
                TokenKind::Integer(2),
                TokenKind::RightParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_commas_are_whitespace() {
        let tokens = kinds("{:a 1, :b 2}");
        assert_eq!(tokens.len(), 7);
        assert_eq!(tokens[1], TokenKind::Keyword("a".into()));
        assert_eq!(tokens[4], TokenKind::Integer(2));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("-42")[0], TokenKind::Integer(-42));
        assert_eq!(kinds("+7")[0], TokenKind::Integer(7));
        assert_eq!(kinds("2.5")[0], TokenKind::Float(2.5));
        assert_eq!(kinds("1e3")[0], TokenKind::Float(1000.0));
        assert_eq!(kinds("0xff")[0], TokenKind::Integer(255));
        assert_eq!(kinds("-")[0], TokenKind::Symbol("-".into()));
        assert!(SExprScanner::new("12abc").scan_tokens().is_err());
    }

    #[test]
    fn test_symbols_with_punctuation() {
        let tokens = kinds("set! a->b *dyn* x# clojure.core/+ .method Type. ns/x");
        assert_eq!(tokens[0], TokenKind::Symbol("set!".into()));
        assert_eq!(tokens[1], TokenKind::Symbol("a->b".into()));
        assert_eq!(tokens[2], TokenKind::Symbol("*dyn*".into()));
        assert_eq!(tokens[3], TokenKind::Symbol("x#".into()));
        assert_eq!(tokens[4], TokenKind::Symbol("clojure.core/+".into()));
        assert_eq!(tokens[5], TokenKind::Symbol(".method".into()));
        assert_eq!(tokens[6], TokenKind::Symbol("Type.".into()));
    }

    #[test]
    fn test_reader_macros() {
        let tokens = kinds("'a `(~b ~@c) #'v @d ^:k #{1} #_x");
        assert_eq!(tokens[0], TokenKind::Quote);
        assert_eq!(tokens[2], TokenKind::Backtick);
        assert_eq!(tokens[4], TokenKind::Tilde);
        assert_eq!(tokens[6], TokenKind::TildeAt);
        assert_eq!(tokens[9], TokenKind::HashQuote);
        assert_eq!(tokens[11], TokenKind::At);
        assert_eq!(tokens[13], TokenKind::Caret);
        assert_eq!(tokens[15], TokenKind::HashBrace);
        assert_eq!(tokens[18], TokenKind::HashUnderscore);
    }

    #[test]
    fn test_strings_and_chars() {
        let tokens = kinds(r#""a\nb\"c" \a \newline \( \A"#);
        assert_eq!(tokens[0], TokenKind::String("a\nb\"c".into()));
        assert_eq!(tokens[1], TokenKind::Char('a'));
        assert_eq!(tokens[2], TokenKind::Char('\n'));
        assert_eq!(tokens[3], TokenKind::Char('('));
        assert_eq!(tokens[4], TokenKind::Char('A'));
    }

    #[test]
    fn test_positions() {
        let tokens = SExprScanner::new("; comment\n  (foo)").scan_tokens().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::LeftParen);
        assert_eq!((tokens[0].line, tokens[0].column), (2, 3));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 4));
    }

    #[test]
    fn test_unterminated_string() {
        let err = SExprScanner::new("\"abc").scan_tokens().unwrap_err();
        assert!(matches!(err, Error::SyntaxError { line: 1, col: 1, .. }));
    }
}
