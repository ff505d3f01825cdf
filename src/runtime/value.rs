use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use im::{OrdMap, OrdSet, Vector as ImVector};

use super::collections::{List, Map, Meta, Set, Vector};
use super::function::Closure;
use super::host::{Exception, HostObject, HostType};
use super::namespace::Namespace;
use super::symbol::{Keyword, Symbol};
use super::var::Var;
use crate::error::{Error, Result};
use crate::tools::Tool;

/// Runtime value representation
///
/// Forms produced by the reader are values too: the analyzer consumes the same type the
/// evaluator returns.
#[derive(Clone)]
pub enum Value {
    // Primitives
    /// The nil value
    Nil,
    /// Boolean value
    Bool(bool),
    /// 64-bit integer value
    Int(i64),
    /// 64-bit floating-point value
    Float(f64),
    /// Character value
    Char(char),
    /// Immutable string value
    String(Arc<str>),

    // Names
    /// Symbol
    Symbol(Symbol),
    /// Keyword
    Keyword(Keyword),

    // Collections (im-backed, cheap to clone)
    /// List
    List(Arc<List>),
    /// Vector
    Vector(Arc<Vector>),
    /// Map
    Map(Arc<Map>),
    /// Set
    Set(Arc<Set>),

    // Callables
    /// Closure produced by `fn*`
    Fn(Arc<Closure>),
    /// Function implemented in Rust
    Native(Arc<dyn Tool>),

    // Global store
    /// First-class Var reference
    Var(Arc<Var>),
    /// Namespace
    Namespace(Arc<Namespace>),

    // Host
    /// Host type, usable in `new`, `catch` and `instance?`
    Class(Arc<HostType>),
    /// Instance of a host type
    Object(Arc<HostObject>),
    /// Exception object
    Exception(Arc<Exception>),
}

impl Value {
    /// Creates a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    /// Creates a keyword value from `"name"` or `"ns/name"`
    pub fn keyword(name: &str) -> Self {
        Value::Keyword(Keyword::intern(name))
    }

    /// Creates a symbol value from `"name"` or `"ns/name"`
    pub fn symbol(name: &str) -> Self {
        Value::Symbol(Symbol::intern(name))
    }

    /// Creates a list value
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Arc::new(List::new(items.into_iter().collect())))
    }

    /// Creates a vector value
    pub fn vector(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Vector(Arc::new(Vector::new(items.into_iter().collect())))
    }

    /// Creates a map value from key/value pairs; later keys win
    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Map(Arc::new(Map::new(entries.into_iter().collect())))
    }

    /// Creates a set value
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(Arc::new(Set::new(items.into_iter().collect())))
    }

    /// The empty list
    pub fn empty_list() -> Self {
        Value::List(Arc::new(List::default()))
    }

    /// Returns the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "long",
            Value::Float(_) => "double",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Keyword(_) => "keyword",
            Value::List(_) => "list",
            Value::Vector(_) => "vector",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Fn(_) => "fn",
            Value::Native(_) => "native-fn",
            Value::Var(_) => "var",
            Value::Namespace(_) => "namespace",
            Value::Class(_) => "class",
            Value::Object(_) => "object",
            Value::Exception(_) => "exception",
        }
    }

    /// Everything except `nil` and `false` is truthy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// True for `nil`
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Attached metadata, if this kind of value carries any
    pub fn meta(&self) -> Option<&Meta> {
        match self {
            Value::Symbol(s) => s.meta(),
            Value::List(l) => l.meta.as_ref(),
            Value::Vector(v) => v.meta.as_ref(),
            Value::Map(m) => m.meta.as_ref(),
            Value::Set(s) => s.meta.as_ref(),
            Value::Fn(f) => f.meta(),
            _ => None,
        }
    }

    /// Copy of this value carrying `meta`
    pub fn with_meta(&self, meta: Option<Meta>) -> Result<Value> {
        Ok(match self {
            Value::Symbol(s) => Value::Symbol(s.with_meta(meta)),
            Value::List(l) => Value::List(Arc::new(List {
                items: l.items.clone(),
                meta,
            })),
            Value::Vector(v) => Value::Vector(Arc::new(Vector {
                items: v.items.clone(),
                meta,
            })),
            Value::Map(m) => Value::Map(Arc::new(Map {
                entries: m.entries.clone(),
                meta,
            })),
            Value::Set(s) => Value::Set(Arc::new(Set {
                items: s.items.clone(),
                meta,
            })),
            Value::Fn(f) => Value::Fn(Arc::new(f.with_meta(meta))),
            other => {
                return Err(Error::TypeError {
                    expected: "value supporting metadata".to_string(),
                    got: other.type_name().to_string(),
                })
            }
        })
    }

    // Type conversion methods

    /// Converts value to a 64-bit integer
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            Value::Float(f) => Ok(*f as i64),
            Value::Char(c) => Ok(*c as i64),
            _ => Err(Error::type_error("long", self)),
        }
    }

    /// Converts value to a 64-bit floating-point number
    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Int(n) => Ok(*n as f64),
            _ => Err(Error::type_error("double", self)),
        }
    }

    /// Returns a reference to the string value
    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(Error::type_error("string", self)),
        }
    }

    /// Returns the symbol inside, if any
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the map entries inside, if any
    pub fn as_map(&self) -> Option<&OrdMap<Value, Value>> {
        match self {
            Value::Map(m) => Some(&m.entries),
            _ => None,
        }
    }

    /// True for lists (the shape of special forms and calls)
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// True for lists and vectors
    pub fn is_sequential(&self) -> bool {
        matches!(self, Value::List(_) | Value::Vector(_))
    }

    /// True when the value can be applied to arguments
    pub fn is_fn(&self) -> bool {
        matches!(self, Value::Fn(_) | Value::Native(_))
    }

    /// Elements of a list or vector without copying the backing store
    pub fn sequential_items(&self) -> Option<&ImVector<Value>> {
        match self {
            Value::List(l) => Some(&l.items),
            Value::Vector(v) => Some(&v.items),
            _ => None,
        }
    }

    /// Elements in sequence order: map entries become `[k v]` vectors, strings yield chars
    pub fn seq_items(&self) -> Result<Vec<Value>> {
        Ok(match self {
            Value::Nil => Vec::new(),
            Value::List(l) => l.items.iter().cloned().collect(),
            Value::Vector(v) => v.items.iter().cloned().collect(),
            Value::Map(m) => m
                .entries
                .iter()
                .map(|(k, v)| Value::vector([k.clone(), v.clone()]))
                .collect(),
            Value::Set(s) => s.items.iter().cloned().collect(),
            Value::String(s) => s.chars().map(Value::Char).collect(),
            other => return Err(Error::type_error("seqable collection", other)),
        })
    }

    /// Number of elements
    pub fn count(&self) -> Result<usize> {
        Ok(match self {
            Value::Nil => 0,
            Value::List(l) => l.items.len(),
            Value::Vector(v) => v.items.len(),
            Value::Map(m) => m.entries.len(),
            Value::Set(s) => s.items.len(),
            Value::String(s) => s.chars().count(),
            other => return Err(Error::type_error("countable collection", other)),
        })
    }

    /// Text for `str`: strings and chars unquoted, nil empty, everything else printed
    pub fn to_str_value(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::String(s) => s.to_string(),
            Value::Char(c) => c.to_string(),
            other => other.to_string(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Nil => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Char(_) => 4,
            Value::String(_) => 5,
            Value::Symbol(_) => 6,
            Value::Keyword(_) => 7,
            Value::List(_) | Value::Vector(_) => 8,
            Value::Map(_) => 9,
            Value::Set(_) => 10,
            Value::Fn(_) => 11,
            Value::Native(_) => 12,
            Value::Var(_) => 13,
            Value::Namespace(_) => 14,
            Value::Class(_) => 15,
            Value::Object(_) => 16,
            Value::Exception(_) => 17,
        }
    }

    fn identity(&self) -> usize {
        match self {
            Value::Fn(a) => Arc::as_ptr(a) as *const () as usize,
            Value::Native(a) => Arc::as_ptr(a) as *const () as usize,
            Value::Var(a) => Arc::as_ptr(a) as *const () as usize,
            Value::Namespace(a) => Arc::as_ptr(a) as *const () as usize,
            Value::Class(a) => Arc::as_ptr(a) as *const () as usize,
            Value::Object(a) => Arc::as_ptr(a) as *const () as usize,
            Value::Exception(a) => Arc::as_ptr(a) as *const () as usize,
            _ => 0,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order used by maps and sets
///
/// Values of different kinds order by kind; lists and vectors share a kind and compare
/// element-wise, so `[1 2]` equals `(1 2)`. Reference values compare by identity.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_rank = self.rank().cmp(&other.rank());
        if by_rank != Ordering::Equal {
            return by_rank;
        }
        match (self, other) {
            (Value::Nil, Value::Nil) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Char(a), Value::Char(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Symbol(a), Value::Symbol(b)) => a.cmp(b),
            (Value::Keyword(a), Value::Keyword(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.entries.cmp(&b.entries),
            (Value::Set(a), Value::Set(b)) => a.items.cmp(&b.items),
            (a, b) => match (a.sequential_items(), b.sequential_items()) {
                (Some(xs), Some(ys)) => xs.iter().cmp(ys.iter()),
                _ => a.identity().cmp(&b.identity()),
            },
        }
    }
}

fn write_seq<'a>(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: impl Iterator<Item = &'a Value>,
    close: &str,
) -> fmt::Result {
    write!(f, "{}", open)?;
    for (i, val) in items.enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", val)?;
    }
    write!(f, "{}", close)
}

/// Readable printing, the way `pr-str` shows values
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(fl) => {
                if fl.is_finite() && fl.fract() == 0.0 {
                    write!(f, "{:.1}", fl)
                } else {
                    write!(f, "{}", fl)
                }
            }
            Value::Char(c) => match c {
                '\n' => write!(f, "\\newline"),
                ' ' => write!(f, "\\space"),
                '\t' => write!(f, "\\tab"),
                c => write!(f, "\\{}", c),
            },
            Value::String(s) => write!(f, "{:?}", s),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::Keyword(k) => write!(f, "{}", k),
            Value::List(l) => write_seq(f, "(", l.items.iter(), ")"),
            Value::Vector(v) => write_seq(f, "[", v.items.iter(), "]"),
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Set(s) => write_seq(f, "#{", s.items.iter(), "}"),
            Value::Fn(c) => match c.name() {
                Some(name) => write!(f, "#<fn {}>", name),
                None => write!(f, "#<fn>"),
            },
            Value::Native(t) => write!(f, "#<native-fn {}>", t.name()),
            Value::Var(v) => write!(f, "{}", v),
            Value::Namespace(ns) => write!(f, "#namespace[{}]", ns.name()),
            Value::Class(t) => write!(f, "{}", t.name()),
            Value::Object(o) => write!(f, "#object[{}]", o.host_type().name()),
            Value::Exception(e) => write!(
                f,
                "#error[{} {:?}]",
                e.host_type().name(),
                e.message().unwrap_or("")
            ),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl From<ImVector<Value>> for Value {
    fn from(items: ImVector<Value>) -> Self {
        Value::Vector(Arc::new(Vector::new(items)))
    }
}

impl From<OrdSet<Value>> for Value {
    fn from(items: OrdSet<Value>) -> Self {
        Value::Set(Arc::new(Set::new(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::string("").is_truthy());
        assert!(Value::empty_list().is_truthy());
    }

    #[test]
    fn test_sequential_equality() {
        let list = Value::list([Value::Int(1), Value::Int(2)]);
        let vector = Value::vector([Value::Int(1), Value::Int(2)]);
        assert_eq!(list, vector);
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Nil, Value::Bool(false));
    }

    #[test]
    fn test_display_readable() {
        let v = Value::vector([
            Value::Int(1),
            Value::string("a"),
            Value::keyword("k"),
            Value::Nil,
            Value::Float(2.0),
        ]);
        assert_eq!(v.to_string(), "[1 \"a\" :k nil 2.0]");
        assert_eq!(
            Value::map([(Value::keyword("a"), Value::Int(1))]).to_string(),
            "{:a 1}"
        );
    }

    #[test]
    fn test_str_value() {
        assert_eq!(Value::string("hi").to_str_value(), "hi");
        assert_eq!(Value::Nil.to_str_value(), "");
        assert_eq!(Value::keyword("a").to_str_value(), ":a");
    }

    #[test]
    fn test_meta_ignored_by_equality() {
        let plain = Value::vector([Value::Int(1)]);
        let tagged = plain
            .with_meta(Some(Meta::unit(Value::keyword("tag"), Value::Bool(true))))
            .unwrap();
        assert_eq!(plain, tagged);
        assert!(tagged.meta().is_some());
    }
}
