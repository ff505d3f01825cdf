//! Persistent collection values
//!
//! Lists and vectors share an `im::Vector`; maps and sets use the ordered `im` variants so
//! iteration order is the total order of their keys.

use im::{OrdMap, OrdSet, Vector as ImVector};

use super::Value;

/// Metadata map attached to symbols, collections and fns
pub type Meta = OrdMap<Value, Value>;

/// Reader metadata keys that describe a form's position rather than the value
pub const SOURCE_KEYS: [&str; 4] = ["file", "line", "column", "end-line"];

/// List (and seq) value
#[derive(Clone, Default)]
pub struct List {
    /// Elements, head first
    pub items: ImVector<Value>,
    /// Attached metadata
    pub meta: Option<Meta>,
}

/// Vector value
#[derive(Clone, Default)]
pub struct Vector {
    /// Elements
    pub items: ImVector<Value>,
    /// Attached metadata
    pub meta: Option<Meta>,
}

/// Map value
#[derive(Clone, Default)]
pub struct Map {
    /// Entries in key order
    pub entries: OrdMap<Value, Value>,
    /// Attached metadata
    pub meta: Option<Meta>,
}

/// Set value
#[derive(Clone, Default)]
pub struct Set {
    /// Members in order
    pub items: OrdSet<Value>,
    /// Attached metadata
    pub meta: Option<Meta>,
}

impl List {
    /// List without metadata
    pub fn new(items: ImVector<Value>) -> Self {
        List { items, meta: None }
    }
}

impl Vector {
    /// Vector without metadata
    pub fn new(items: ImVector<Value>) -> Self {
        Vector { items, meta: None }
    }
}

impl Map {
    /// Map without metadata
    pub fn new(entries: OrdMap<Value, Value>) -> Self {
        Map { entries, meta: None }
    }
}

impl Set {
    /// Set without metadata
    pub fn new(items: OrdSet<Value>) -> Self {
        Set { items, meta: None }
    }
}

/// Drops position keys from reader metadata; `None` when nothing else remains
pub fn elide_source_keys(meta: Option<&Meta>) -> Option<Meta> {
    let mut meta = meta?.clone();
    for key in SOURCE_KEYS {
        meta.remove(&Value::keyword(key));
    }
    if meta.is_empty() {
        None
    } else {
        Some(meta)
    }
}

/// Left-biased merge of two optional metadata maps; entries of `overlay` win
pub fn merge_meta(base: Option<&Meta>, overlay: Option<&Meta>) -> Option<Meta> {
    match (base, overlay) {
        (None, None) => None,
        (Some(m), None) | (None, Some(m)) => Some(m.clone()),
        (Some(base), Some(overlay)) => Some(overlay.clone().union(base.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elide_source_keys() {
        let mut meta = Meta::new();
        meta.insert(Value::keyword("line"), Value::Int(3));
        meta.insert(Value::keyword("column"), Value::Int(1));
        assert!(elide_source_keys(Some(&meta)).is_none());

        meta.insert(Value::keyword("tag"), Value::symbol("String"));
        let kept = elide_source_keys(Some(&meta)).unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_merge_meta_overlay_wins() {
        let base = Meta::unit(Value::keyword("doc"), Value::string("old"));
        let overlay = Meta::unit(Value::keyword("doc"), Value::string("new"));
        let merged = merge_meta(Some(&base), Some(&overlay)).unwrap();
        assert_eq!(
            merged.get(&Value::keyword("doc")),
            Some(&Value::string("new"))
        );
    }
}
