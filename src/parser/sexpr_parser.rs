use std::collections::HashMap;
use std::sync::Arc;

use im::{OrdMap, OrdSet};

use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};
use crate::runtime::{merge_meta, symbol, Keyword, Meta, Symbol, Value};

/// Reader: turns tokens into forms
///
/// Lists carry `{:line :column :file}` metadata. Reader macros expand here: `'x`, `#'x`,
/// `@x`, `~x` and `~@x` become two-element lists, `^m x` attaches metadata and `` `x ``
/// is rewritten into the `seq`/`concat`/`list` calls that rebuild the template.
pub struct SExprParser {
    tokens: Vec<Token>,
    current: usize,
    source_name: Arc<str>,
}

impl SExprParser {
    /// Creates a parser over `tokens`
    pub fn new(tokens: Vec<Token>) -> Self {
        SExprParser {
            tokens,
            current: 0,
            source_name: Arc::from("NO_SOURCE_FILE"),
        }
    }

    /// Sets the `:file` recorded in list metadata
    pub fn with_source_name(mut self, name: &str) -> Self {
        self.source_name = Arc::from(name);
        self
    }

    /// Reads every top-level form
    pub fn parse(&mut self) -> Result<Vec<Value>> {
        let mut forms = Vec::new();

        while !self.is_at_end() {
            if self.check(&TokenKind::HashUnderscore) {
                self.advance();
                self.read_form()?;
                continue;
            }
            forms.push(self.read_form()?);
        }

        Ok(forms)
    }

    fn read_form(&mut self) -> Result<Value> {
        let token = self.advance();

        let form = match token.kind {
            TokenKind::Eof => return Err(Error::UnexpectedEof),
            TokenKind::Integer(n) => Value::Int(n),
            TokenKind::Float(f) => Value::Float(f),
            TokenKind::String(ref s) => Value::string(s),
            TokenKind::Char(c) => Value::Char(c),
            TokenKind::True => Value::Bool(true),
            TokenKind::False => Value::Bool(false),
            TokenKind::Nil => Value::Nil,
            TokenKind::Symbol(ref name) => Value::Symbol(Symbol::intern(name)),
            TokenKind::Keyword(ref name) => Value::Keyword(Keyword::intern(name)),

            TokenKind::LeftParen => {
                let items = self.read_delimited(&TokenKind::RightParen, &token)?;
                Value::list(items).with_meta(Some(self.position(&token)))?
            }
            TokenKind::LeftBracket => {
                Value::vector(self.read_delimited(&TokenKind::RightBracket, &token)?)
            }
            TokenKind::LeftBrace => self.read_map(&token)?,
            TokenKind::HashBrace => self.read_set(&token)?,

            TokenKind::Quote => self.wrap("quote")?,
            TokenKind::HashQuote => self.wrap("var")?,
            TokenKind::At => self.wrap("deref")?,
            TokenKind::Tilde => self.wrap("unquote")?,
            TokenKind::TildeAt => self.wrap("unquote-splicing")?,
            TokenKind::Backtick => {
                let template = self.read_form()?;
                let mut gensyms = HashMap::new();
                syntax_quote(&template, &mut gensyms)?
            }
            TokenKind::Caret => self.read_meta(&token)?,
            TokenKind::HashUnderscore => {
                self.read_form()?;
                self.read_form()?
            }

            TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                return Err(syntax_error(
                    &token,
                    format!("Unmatched delimiter: {}", token.lexeme),
                ))
            }
        };

        Ok(form)
    }

    /// Reads forms up to `closer`, honoring `#_` discards
    fn read_delimited(&mut self, closer: &TokenKind, open: &Token) -> Result<Vec<Value>> {
        let mut items = Vec::new();

        loop {
            let kind = self.peek().kind.clone();
            match kind {
                TokenKind::Eof => {
                    return Err(syntax_error(
                        open,
                        format!("EOF while reading, starting at line {}", open.line),
                    ))
                }
                ref k if k == closer => {
                    self.advance();
                    break;
                }
                ref k if k.is_closer() => {
                    let token = self.advance();
                    return Err(syntax_error(
                        &token,
                        format!("Unmatched delimiter: {}", token.lexeme),
                    ));
                }
                TokenKind::HashUnderscore => {
                    self.advance();
                    self.read_form()?;
                }
                _ => items.push(self.read_form()?),
            }
        }

        Ok(items)
    }

    fn read_map(&mut self, open: &Token) -> Result<Value> {
        let items = self.read_delimited(&TokenKind::RightBrace, open)?;
        if items.len() % 2 != 0 {
            return Err(syntax_error(
                open,
                "Map literal must contain an even number of forms",
            ));
        }

        let mut entries = OrdMap::new();
        let mut pairs = items.into_iter();
        while let (Some(key), Some(val)) = (pairs.next(), pairs.next()) {
            if entries.contains_key(&key) {
                return Err(syntax_error(open, format!("Duplicate key: {}", key)));
            }
            entries.insert(key, val);
        }
        Ok(Value::map(entries))
    }

    fn read_set(&mut self, open: &Token) -> Result<Value> {
        let items = self.read_delimited(&TokenKind::RightBrace, open)?;
        let mut set = OrdSet::new();
        for item in items {
            if set.insert(item.clone()).is_some() {
                return Err(syntax_error(open, format!("Duplicate key: {}", item)));
            }
        }
        Ok(Value::from(set))
    }

    fn wrap(&mut self, head: &str) -> Result<Value> {
        let form = self.read_form()?;
        Ok(Value::list([Value::symbol(head), form]))
    }

    fn read_meta(&mut self, caret: &Token) -> Result<Value> {
        let meta_form = self.read_form()?;
        let meta: Meta = match &meta_form {
            Value::Keyword(_) => OrdMap::unit(meta_form.clone(), Value::Bool(true)),
            Value::Symbol(_) | Value::String(_) => {
                OrdMap::unit(Value::keyword("tag"), meta_form.clone())
            }
            Value::Map(m) => m.entries.clone(),
            _ => {
                return Err(syntax_error(
                    caret,
                    "Metadata must be Symbol, Keyword, String or Map",
                ))
            }
        };

        let target = self.read_form()?;
        match target {
            Value::Symbol(_) | Value::List(_) | Value::Vector(_) | Value::Map(_) | Value::Set(_) => {
                let merged = merge_meta(target.meta(), Some(&meta));
                target.with_meta(merged)
            }
            _ => Err(syntax_error(
                caret,
                "Metadata can only be applied to IMetas",
            )),
        }
    }

    fn position(&self, token: &Token) -> Meta {
        let mut meta = Meta::new();
        meta.insert(Value::keyword("line"), Value::Int(token.line as i64));
        meta.insert(Value::keyword("column"), Value::Int(token.column as i64));
        meta.insert(
            Value::keyword("file"),
            Value::String(self.source_name.clone()),
        );
        meta
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.current.min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.current < self.tokens.len() {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }
}

fn syntax_error(token: &Token, message: impl Into<String>) -> Error {
    Error::SyntaxError {
        line: token.line,
        col: token.column,
        message: message.into(),
    }
}

// Syntax-quote

fn quote(form: Value) -> Value {
    Value::list([Value::symbol("quote"), form])
}

fn call(head: &str, args: impl IntoIterator<Item = Value>) -> Value {
    Value::list(std::iter::once(Value::symbol(head)).chain(args))
}

/// Operand of `(head x)` when `form` is such a list
fn unquoted<'v>(form: &'v Value, head: &str) -> Option<&'v Value> {
    match form {
        Value::List(list) if list.items.len() == 2 => match &list.items[0] {
            Value::Symbol(sym) if sym.ns().is_none() && sym.name() == head => list.items.get(1),
            _ => None,
        },
        _ => None,
    }
}

/// Rewrites a syntax-quoted template into code that builds it
///
/// Symbols are not namespace-qualified. `name#` symbols become one fresh symbol per template.
fn syntax_quote(form: &Value, gensyms: &mut HashMap<Arc<str>, Symbol>) -> Result<Value> {
    if let Some(inner) = unquoted(form, "unquote") {
        return Ok(inner.clone());
    }
    if unquoted(form, "unquote-splicing").is_some() {
        return Err(Error::ParseError(
            "unquote-splicing used outside of a list".to_string(),
        ));
    }

    Ok(match form {
        Value::Symbol(sym) => {
            let name = sym.name();
            if sym.ns().is_none() && name.len() > 1 && name.ends_with('#') {
                let base = &name[..name.len() - 1];
                let generated = gensyms
                    .entry(sym.name_arc())
                    .or_insert_with(|| {
                        Symbol::simple(&format!("{}__{}__auto__", base, symbol::next_id()))
                    })
                    .clone();
                quote(Value::Symbol(generated))
            } else {
                quote(Value::Symbol(sym.with_meta(None)))
            }
        }
        Value::List(list) if list.items.is_empty() => call("list", []),
        Value::List(list) => call(
            "seq",
            [call("concat", expand_items(list.items.iter(), gensyms)?)],
        ),
        Value::Vector(v) => call(
            "apply",
            [
                Value::symbol("vector"),
                call("seq", [call("concat", expand_items(v.items.iter(), gensyms)?)]),
            ],
        ),
        Value::Map(m) => {
            let flat: Vec<Value> = m
                .entries
                .iter()
                .flat_map(|(k, v)| [k.clone(), v.clone()])
                .collect();
            call(
                "apply",
                [
                    Value::symbol("hash-map"),
                    call("seq", [call("concat", expand_items(flat.iter(), gensyms)?)]),
                ],
            )
        }
        Value::Set(s) => call(
            "apply",
            [
                Value::symbol("hash-set"),
                call("seq", [call("concat", expand_items(s.items.iter(), gensyms)?)]),
            ],
        ),
        Value::Nil
        | Value::Bool(_)
        | Value::Int(_)
        | Value::Float(_)
        | Value::Char(_)
        | Value::String(_)
        | Value::Keyword(_) => form.clone(),
        other => quote(other.clone()),
    })
}

fn expand_items<'v>(
    items: impl Iterator<Item = &'v Value>,
    gensyms: &mut HashMap<Arc<str>, Symbol>,
) -> Result<Vec<Value>> {
    items
        .map(|item| {
            if let Some(inner) = unquoted(item, "unquote") {
                Ok(call("list", [inner.clone()]))
            } else if let Some(inner) = unquoted(item, "unquote-splicing") {
                Ok(inner.clone())
            } else {
                Ok(call("list", [syntax_quote(item, gensyms)?]))
            }
        })
        .collect()
}
