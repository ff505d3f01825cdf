use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use super::collections::Meta;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide counter behind `gensym` and reader auto-gensyms
pub fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

/// Symbol: a name with an optional namespace qualifier
///
/// Equality, ordering and hashing look only at `(namespace, name)`; metadata rides along.
#[derive(Clone)]
pub struct Symbol {
    ns: Option<Arc<str>>,
    name: Arc<str>,
    meta: Option<Meta>,
}

impl Symbol {
    /// Parses `"name"` or `"ns/name"`; a lone `/` is the division symbol
    pub fn intern(text: &str) -> Self {
        match text.find('/') {
            Some(idx) if idx > 0 && idx + 1 < text.len() => {
                Symbol::qualified(&text[..idx], &text[idx + 1..])
            }
            _ => Symbol::simple(text),
        }
    }

    /// Unqualified symbol
    pub fn simple(name: &str) -> Self {
        Symbol {
            ns: None,
            name: Arc::from(name),
            meta: None,
        }
    }

    /// Namespace-qualified symbol
    pub fn qualified(ns: &str, name: &str) -> Self {
        Symbol {
            ns: Some(Arc::from(ns)),
            name: Arc::from(name),
            meta: None,
        }
    }

    /// Fresh unqualified symbol `prefix` followed by a unique number
    pub fn gensym(prefix: &str) -> Self {
        Symbol::simple(&format!("{}{}", prefix, next_id()))
    }

    /// Name part
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the name part
    pub fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    /// Namespace qualifier, if any
    pub fn ns(&self) -> Option<&str> {
        self.ns.as_deref()
    }

    /// Attached metadata
    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    /// Copy of this symbol carrying `meta`
    pub fn with_meta(&self, meta: Option<Meta>) -> Self {
        Symbol {
            ns: self.ns.clone(),
            name: self.name.clone(),
            meta,
        }
    }

    /// Same name with the namespace dropped
    pub fn without_ns(&self) -> Self {
        Symbol {
            ns: None,
            name: self.name.clone(),
            meta: self.meta.clone(),
        }
    }

    /// A binding symbol has no namespace and no `.` in its name
    pub fn is_valid_binding(&self) -> bool {
        self.ns.is_none() && !self.name.contains('.')
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.ns == other.ns && self.name == other.name
    }
}

impl Eq for Symbol {}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ns
            .cmp(&other.ns)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ns.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Keyword: a self-evaluating symbolic constant
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Keyword {
    ns: Option<Arc<str>>,
    name: Arc<str>,
}

impl Keyword {
    /// Parses `"name"` or `"ns/name"` (without the leading colon)
    pub fn intern(text: &str) -> Self {
        match text.find('/') {
            Some(idx) if idx > 0 && idx + 1 < text.len() => Keyword {
                ns: Some(Arc::from(&text[..idx])),
                name: Arc::from(&text[idx + 1..]),
            },
            _ => Keyword {
                ns: None,
                name: Arc::from(text),
            },
        }
    }

    /// Name part
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace qualifier, if any
    pub fn ns(&self) -> Option<&str> {
        self.ns.as_deref()
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns {
            Some(ns) => write!(f, ":{}/{}", ns, self.name),
            None => write!(f, ":{}", self.name),
        }
    }
}

impl fmt::Debug for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Value;

    #[test]
    fn test_intern_splits_namespace() {
        let sym = Symbol::intern("clojure.core/map");
        assert_eq!(sym.ns(), Some("clojure.core"));
        assert_eq!(sym.name(), "map");

        let div = Symbol::intern("/");
        assert_eq!(div.ns(), None);
        assert_eq!(div.name(), "/");
    }

    #[test]
    fn test_equality_ignores_meta() {
        let meta = Meta::unit(Value::keyword("dynamic"), Value::Bool(true));
        let plain = Symbol::simple("x");
        let tagged = plain.with_meta(Some(meta));
        assert_eq!(plain, tagged);
        assert!(tagged.meta().is_some());
    }

    #[test]
    fn test_gensym_is_unique() {
        assert_ne!(Symbol::gensym("G__"), Symbol::gensym("G__"));
        assert!(Symbol::gensym("p__").name().starts_with("p__"));
    }

    #[test]
    fn test_binding_validity() {
        assert!(Symbol::simple("x").is_valid_binding());
        assert!(Symbol::simple("&").is_valid_binding());
        assert!(!Symbol::simple("a.b").is_valid_binding());
        assert!(!Symbol::qualified("user", "x").is_valid_binding());
    }
}
