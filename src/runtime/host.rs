//! Minimal host type model
//!
//! Host types stand in for platform classes: they give `new`, `.`, `set!` on fields, catch
//! clauses and `Type/member` something concrete to resolve against. Types are registered by
//! name in a [`HostRegistry`] and may be added from Rust.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::Value;
use crate::error::{Error, Result};
use crate::tools::NativeFn;

/// Instance method: receives the target and the call arguments
pub type NativeMethod = Arc<dyn Fn(&Value, &[Value]) -> Result<Value> + Send + Sync>;

/// Host type (class)
pub struct HostType {
    name: String,
    parent: Option<Arc<HostType>>,
    fields: Vec<(String, Value)>,
    methods: HashMap<String, NativeMethod>,
    statics: HashMap<String, Value>,
}

impl HostType {
    /// Starts a type definition
    pub fn builder(name: impl Into<String>) -> HostTypeBuilder {
        HostTypeBuilder {
            ty: HostType {
                name: name.into(),
                parent: None,
                fields: Vec::new(),
                methods: HashMap::new(),
                statics: HashMap::new(),
            },
        }
    }

    /// Simple type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Supertype
    pub fn parent(&self) -> Option<&Arc<HostType>> {
        self.parent.as_ref()
    }

    /// True when `self` is `other` or inherits from it
    pub fn is_subtype_of(&self, other: &HostType) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty.name == other.name {
                return true;
            }
            current = ty.parent.as_deref();
        }
        false
    }

    /// Instance method, searched up the parent chain
    pub fn method(&self, name: &str) -> Option<&NativeMethod> {
        self.methods
            .get(name)
            .or_else(|| self.parent.as_ref().and_then(|p| p.method(name)))
    }

    /// Static member, searched up the parent chain
    pub fn static_member(&self, name: &str) -> Option<Value> {
        self.statics
            .get(name)
            .cloned()
            .or_else(|| self.parent.as_ref().and_then(|p| p.static_member(name)))
    }

    /// Declared fields with their defaults, inherited fields first
    pub fn field_defaults(&self) -> Vec<(String, Value)> {
        let mut fields = self
            .parent
            .as_ref()
            .map(|p| p.field_defaults())
            .unwrap_or_default();
        fields.extend(self.fields.iter().cloned());
        fields
    }
}

impl fmt::Debug for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Builder for [`HostType`]
pub struct HostTypeBuilder {
    ty: HostType,
}

impl HostTypeBuilder {
    /// Sets the supertype
    pub fn parent(mut self, parent: &Arc<HostType>) -> Self {
        self.ty.parent = Some(parent.clone());
        self
    }

    /// Declares a mutable field
    pub fn field(mut self, name: &str, default: Value) -> Self {
        self.ty.fields.push((name.to_string(), default));
        self
    }

    /// Adds an instance method
    pub fn method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.ty.methods.insert(name.to_string(), Arc::new(f));
        self
    }

    /// Adds a static member
    pub fn static_value(mut self, name: &str, value: Value) -> Self {
        self.ty.statics.insert(name.to_string(), value);
        self
    }

    /// Finishes the type
    pub fn build(self) -> Arc<HostType> {
        Arc::new(self.ty)
    }
}

/// Instance of a host type with a mutable field table
pub struct HostObject {
    ty: Arc<HostType>,
    fields: RwLock<HashMap<String, Value>>,
}

impl HostObject {
    /// Instance with every declared field at its default
    pub fn new(ty: Arc<HostType>) -> Self {
        let fields = ty.field_defaults().into_iter().collect();
        HostObject {
            ty,
            fields: RwLock::new(fields),
        }
    }

    /// Type of this object
    pub fn host_type(&self) -> &Arc<HostType> {
        &self.ty
    }

    /// Field value
    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    /// Whether the type declares `name`
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.read().contains_key(name)
    }

    /// Assigns a declared field
    pub fn set_field(&self, name: &str, value: Value) -> Result<Value> {
        let mut fields = self.fields.write();
        match fields.get_mut(name) {
            Some(slot) => {
                *slot = value.clone();
                Ok(value)
            }
            None => Err(Error::illegal_argument(format!(
                "no such field: {} for class {}",
                name,
                self.ty.name()
            ))),
        }
    }
}

/// Exception object
pub struct Exception {
    ty: Arc<HostType>,
    message: Option<String>,
    data: Option<Value>,
    cause: Option<Value>,
}

impl Exception {
    /// Exception of type `ty`
    pub fn new(
        ty: Arc<HostType>,
        message: Option<String>,
        data: Option<Value>,
        cause: Option<Value>,
    ) -> Self {
        Exception {
            ty,
            message,
            data,
            cause,
        }
    }

    /// Type of this exception
    pub fn host_type(&self) -> &Arc<HostType> {
        &self.ty
    }

    /// Message, if any
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// `ex-data` map, if any
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Wrapped cause, if any
    pub fn cause(&self) -> Option<&Value> {
        self.cause.as_ref()
    }
}

/// Registry of host types by name
pub struct HostRegistry {
    types: DashMap<String, Arc<HostType>>,
    object: Arc<HostType>,
    runtime_exception: Arc<HostType>,
}

impl HostRegistry {
    /// Registry holding the built-in types
    pub fn new() -> Self {
        let object = HostType::builder("Object").build();
        let throwable = HostType::builder("Throwable")
            .parent(&object)
            .method("getMessage", |this, _| match this {
                Value::Exception(e) => Ok(e.message().map_or(Value::Nil, Value::string)),
                other => Err(Error::type_error("Throwable", other)),
            })
            .method("getData", |this, _| match this {
                Value::Exception(e) => Ok(e.data().cloned().unwrap_or(Value::Nil)),
                other => Err(Error::type_error("Throwable", other)),
            })
            .method("getCause", |this, _| match this {
                Value::Exception(e) => Ok(e.cause().cloned().unwrap_or(Value::Nil)),
                other => Err(Error::type_error("Throwable", other)),
            })
            .build();
        let exception = HostType::builder("Exception").parent(&throwable).build();
        let error = HostType::builder("Error").parent(&throwable).build();
        let runtime_exception = HostType::builder("RuntimeException")
            .parent(&exception)
            .build();

        let registry = HostRegistry {
            types: DashMap::new(),
            object: object.clone(),
            runtime_exception: runtime_exception.clone(),
        };

        for ty in [object.clone(), throwable, exception, error.clone()] {
            registry.register(ty);
        }
        registry.register(runtime_exception.clone());
        for name in [
            "IllegalArgumentException",
            "IllegalStateException",
            "ArithmeticException",
            "ClassCastException",
            "IndexOutOfBoundsException",
            "UnsupportedOperationException",
            "ExceptionInfo",
        ] {
            registry.register(HostType::builder(name).parent(&runtime_exception).build());
        }
        registry.register(HostType::builder("StackOverflowError").parent(&error).build());

        for name in [
            "Boolean",
            "Character",
            "Symbol",
            "Keyword",
            "PersistentList",
            "PersistentVector",
            "PersistentMap",
            "PersistentSet",
            "Fn",
            "Var",
            "Namespace",
            "Class",
        ] {
            registry.register(HostType::builder(name).parent(&object).build());
        }
        registry.register(
            HostType::builder("Long")
                .parent(&object)
                .static_value("MAX_VALUE", Value::Int(i64::MAX))
                .static_value("MIN_VALUE", Value::Int(i64::MIN))
                .build(),
        );
        registry.register(
            HostType::builder("Double")
                .parent(&object)
                .static_value("MAX_VALUE", Value::Float(f64::MAX))
                .build(),
        );
        registry.register(string_type(&object));
        registry.register(
            HostType::builder("Math")
                .parent(&object)
                .static_value("PI", Value::Float(std::f64::consts::PI))
                .static_value(
                    "abs",
                    Value::Native(Arc::new(NativeFn::new("abs", Some(1), |args| {
                        match &args[0] {
                            Value::Int(n) => n.checked_abs().map(Value::Int).ok_or_else(|| {
                                Error::Arithmetic("integer overflow".to_string())
                            }),
                            Value::Float(f) => Ok(Value::Float(f.abs())),
                            other => Err(Error::type_error("number", other)),
                        }
                    }))),
                )
                .build(),
        );
        registry
    }

    /// Adds or replaces a type under its name
    pub fn register(&self, ty: Arc<HostType>) {
        self.types.insert(ty.name().to_string(), ty);
    }

    /// Type named `name`; the `java.lang.` prefix is optional
    pub fn resolve_type(&self, name: &str) -> Option<Arc<HostType>> {
        let name = name.strip_prefix("java.lang.").unwrap_or(name);
        self.types.get(name).map(|entry| entry.value().clone())
    }

    /// All registered types, sorted by name
    pub fn types(&self) -> Vec<Arc<HostType>> {
        let mut all: Vec<_> = self.types.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Runtime type of `value`; nil has none
    pub fn type_of(&self, value: &Value) -> Option<Arc<HostType>> {
        let name = match value {
            Value::Nil => return None,
            Value::Object(o) => return Some(o.host_type().clone()),
            Value::Exception(e) => return Some(e.host_type().clone()),
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "Long",
            Value::Float(_) => "Double",
            Value::Char(_) => "Character",
            Value::String(_) => "String",
            Value::Symbol(_) => "Symbol",
            Value::Keyword(_) => "Keyword",
            Value::List(_) => "PersistentList",
            Value::Vector(_) => "PersistentVector",
            Value::Map(_) => "PersistentMap",
            Value::Set(_) => "PersistentSet",
            Value::Fn(_) | Value::Native(_) => "Fn",
            Value::Var(_) => "Var",
            Value::Namespace(_) => "Namespace",
            Value::Class(_) => "Class",
        };
        Some(self.resolve_type(name).unwrap_or_else(|| self.object.clone()))
    }

    /// `instance?` check; `Object` accepts every value except `nil`
    pub fn is_instance(&self, class: &HostType, value: &Value) -> bool {
        if value.is_nil() {
            return false;
        }
        if class.name() == self.object.name() {
            return true;
        }
        self.type_of(value)
            .map_or(false, |ty| ty.is_subtype_of(class))
    }

    /// `Type/member` lookup
    pub fn static_member(&self, type_name: &str, member: &str) -> Option<Value> {
        self.resolve_type(type_name)?.static_member(member)
    }

    /// Exception value of the named type; unknown names fall back to `RuntimeException`
    pub fn new_exception(&self, type_name: &str, message: String, data: Option<Value>) -> Value {
        let ty = self
            .resolve_type(type_name)
            .unwrap_or_else(|| self.runtime_exception.clone());
        Value::Exception(Arc::new(Exception::new(ty, Some(message), data, None)))
    }

    /// `(. target -field)`
    pub fn field(&self, target: &Value, name: &str) -> Result<Value> {
        match target {
            Value::Object(o) => o.get_field(name).ok_or_else(|| {
                Error::illegal_argument(format!(
                    "no such field: {} for class {}",
                    name,
                    o.host_type().name()
                ))
            }),
            Value::Class(ty) => ty.static_member(name).ok_or_else(|| {
                Error::illegal_argument(format!(
                    "no such field: {} for class {}",
                    name,
                    ty.name()
                ))
            }),
            other => Err(Error::illegal_argument(format!(
                "no such field: {} for class {}",
                name,
                self.type_name_of(other)
            ))),
        }
    }

    /// `(set! (. target -field) value)`
    pub fn set_field(&self, target: &Value, name: &str, value: Value) -> Result<Value> {
        match target {
            Value::Object(o) => o.set_field(name, value),
            other => Err(Error::illegal_argument(format!(
                "cannot assign field {} of {}",
                name,
                self.type_name_of(other)
            ))),
        }
    }

    /// `(. target method args...)`
    pub fn call_method(&self, target: &Value, name: &str, args: &[Value]) -> Result<Value> {
        if let Value::Class(ty) = target {
            if let Some(member) = ty.static_member(name) {
                return crate::runtime::function::apply(&member, args.to_vec());
            }
        }
        let method = self
            .type_of(target)
            .and_then(|ty| ty.method(name).cloned())
            .ok_or_else(|| {
                Error::illegal_argument(format!(
                    "no matching method {} found taking {} args for class {}",
                    name,
                    args.len(),
                    self.type_name_of(target)
                ))
            })?;
        method(target, args)
    }

    /// `(. target member)`: a field when the target has one, else a zero-arg method
    pub fn interop(&self, target: &Value, member: &str) -> Result<Value> {
        match target {
            Value::Object(o) if o.has_field(member) => self.field(target, member),
            Value::Class(ty) => match ty.static_member(member) {
                Some(value) if !value.is_fn() => Ok(value),
                _ => self.call_method(target, member, &[]),
            },
            _ => self.call_method(target, member, &[]),
        }
    }

    /// `(new Type args...)`
    pub fn instantiate(&self, class: &Arc<HostType>, args: &[Value]) -> Result<Value> {
        if !args.is_empty() {
            return Err(Error::Unsupported("new with args unsupported".to_string()));
        }
        let throwable = self.resolve_type("Throwable");
        if throwable.map_or(false, |t| class.is_subtype_of(&t)) {
            return Ok(Value::Exception(Arc::new(Exception::new(
                class.clone(),
                None,
                None,
                None,
            ))));
        }
        Ok(Value::Object(Arc::new(HostObject::new(class.clone()))))
    }

    fn type_name_of(&self, value: &Value) -> String {
        self.type_of(value)
            .map_or_else(|| "nil".to_string(), |ty| ty.name().to_string())
    }
}

impl Default for HostRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn this_str(this: &Value) -> Result<&str> {
    this.as_str()
}

fn string_type(object: &Arc<HostType>) -> Arc<HostType> {
    HostType::builder("String")
        .parent(object)
        .method("length", |this, _| {
            Ok(Value::Int(this_str(this)?.chars().count() as i64))
        })
        .method("toUpperCase", |this, _| {
            Ok(Value::string(this_str(this)?.to_uppercase()))
        })
        .method("toLowerCase", |this, _| {
            Ok(Value::string(this_str(this)?.to_lowercase()))
        })
        .method("trim", |this, _| Ok(Value::string(this_str(this)?.trim())))
        .method("substring", |this, args| {
            let chars: Vec<char> = this_str(this)?.chars().collect();
            let bound = |v: Option<&Value>, default: usize| -> Result<usize> {
                match v {
                    None => Ok(default),
                    Some(v) => {
                        let idx = v.as_int()?;
                        if idx < 0 || idx as usize > chars.len() {
                            Err(Error::IndexOutOfBounds {
                                index: idx,
                                length: chars.len(),
                            })
                        } else {
                            Ok(idx as usize)
                        }
                    }
                }
            };
            let start = bound(args.first(), 0)?;
            let end = bound(args.get(1), chars.len())?;
            if start > end {
                return Err(Error::IndexOutOfBounds {
                    index: start as i64,
                    length: end,
                });
            }
            Ok(Value::string(chars[start..end].iter().collect::<String>()))
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_hierarchy() {
        let host = HostRegistry::new();
        let ex = host.new_exception("IllegalArgumentException", "bad".to_string(), None);
        let runtime = host.resolve_type("RuntimeException").unwrap();
        let info = host.resolve_type("ExceptionInfo").unwrap();

        assert!(host.is_instance(&runtime, &ex));
        assert!(!host.is_instance(&info, &ex));
        assert!(host.is_instance(&host.resolve_type("java.lang.Throwable").unwrap(), &ex));
    }

    #[test]
    fn test_value_types() {
        let host = HostRegistry::new();
        let long = host.resolve_type("Long").unwrap();
        assert!(host.is_instance(&long, &Value::Int(42)));
        assert!(!host.is_instance(&long, &Value::Float(4.2)));
        assert!(host.type_of(&Value::Nil).is_none());
        assert!(!host.is_instance(&host.resolve_type("Object").unwrap(), &Value::Nil));
    }

    #[test]
    fn test_statics() {
        let host = HostRegistry::new();
        assert_eq!(
            host.static_member("Long", "MAX_VALUE"),
            Some(Value::Int(i64::MAX))
        );
        assert!(host.static_member("Math", "nope").is_none());
    }

    #[test]
    fn test_string_methods() {
        let host = HostRegistry::new();
        let s = Value::string("  Hello ");
        assert_eq!(host.call_method(&s, "trim", &[]).unwrap(), Value::string("Hello"));
        assert_eq!(host.interop(&s, "length").unwrap(), Value::Int(8));
        assert_eq!(
            host.call_method(&Value::string("hello"), "substring", &[Value::Int(1), Value::Int(3)])
                .unwrap(),
            Value::string("el")
        );
    }

    #[test]
    fn test_object_fields() {
        let host = HostRegistry::new();
        let object = host.resolve_type("Object").unwrap();
        let point = HostType::builder("Point")
            .parent(&object)
            .field("x", Value::Int(0))
            .build();
        host.register(point.clone());

        let p = host.instantiate(&point, &[]).unwrap();
        host.set_field(&p, "x", Value::Int(5)).unwrap();
        assert_eq!(host.field(&p, "x").unwrap(), Value::Int(5));
        assert!(host.set_field(&p, "y", Value::Int(1)).is_err());
        assert!(matches!(
            host.instantiate(&point, &[Value::Int(1)]),
            Err(Error::Unsupported(_))
        ));
    }
}
