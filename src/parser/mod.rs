//! Reader
//!
//! Turns the token stream into forms: plain `Value`s, with source positions recorded as
//! list metadata and reader macros already expanded.

mod sexpr_parser;

pub use sexpr_parser::SExprParser;

use crate::error::Result;
use crate::lexer::SExprScanner;
use crate::runtime::Value;

/// Reads every form in `source`, tagging lists with `source_name`
pub fn read_str(source: &str, source_name: &str) -> Result<Vec<Value>> {
    let tokens = SExprScanner::new(source).scan_tokens()?;
    SExprParser::new(tokens)
        .with_source_name(source_name)
        .parse()
}
