//! Reflection cache
//!
//! Maps `Type.name` keys to resolved member handles. Handles are type-bound:
//! an entry never holds a receiver, the receiver is supplied at invocation.
//!
//! Three tables live here:
//! - methods: key -> overloads, unique by full signature
//! - fields: key -> one field handle
//! - types: type name -> type reference, for every type already discovered

use std::fmt;

use rustc_hash::FxHashMap;
use tether_sdk::{ForeignRuntime, ReturnKind};

/// How a member handle was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Resolved as an instance member
    Instance,
    /// Resolved as a type-level member
    Static,
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Instance => write!(f, "instance"),
            Binding::Static => write!(f, "static"),
        }
    }
}

/// Build the cache key for a member of a type
pub fn member_key(type_name: &str, member: &str) -> String {
    format!("{}.{}", type_name, member)
}

/// One resolved method overload
#[derive(Debug, Clone)]
pub struct MethodEntry<T, H> {
    /// Name of the declaring type
    pub owner: String,
    /// Method name
    pub name: String,
    /// Parameter signature, e.g. `(ILjava/lang/String;)`
    pub params: String,
    /// Parameter tokens, split out of `params`
    pub param_tokens: Vec<String>,
    /// Full signature used to resolve the handle
    pub descriptor: String,
    /// Kind of value the method returns
    pub return_kind: ReturnKind,
    /// Instance or static
    pub binding: Binding,
    /// Type the handle was resolved against
    pub class: T,
    /// Resolved handle
    pub handle: H,
}

/// One resolved field
#[derive(Debug, Clone)]
pub struct FieldEntry<T, H> {
    /// Name of the declaring type
    pub owner: String,
    /// Field name
    pub name: String,
    /// Type token of the field
    pub token: String,
    /// Kind of value the field holds
    pub kind: ReturnKind,
    /// Instance or static
    pub binding: Binding,
    /// Type the handle was resolved against
    pub class: T,
    /// Resolved handle
    pub handle: H,
}

/// Method entry for a given runtime
pub type RuntimeMethod<R> = MethodEntry<<R as ForeignRuntime>::Type, <R as ForeignRuntime>::Method>;

/// Field entry for a given runtime
pub type RuntimeField<R> = FieldEntry<<R as ForeignRuntime>::Type, <R as ForeignRuntime>::Field>;

/// Symbol to handle caches for one runtime connection
pub struct ReflectionCache<R: ForeignRuntime> {
    methods: FxHashMap<String, Vec<RuntimeMethod<R>>>,
    fields: FxHashMap<String, RuntimeField<R>>,
    types: FxHashMap<String, R::Type>,
}

impl<R: ForeignRuntime> ReflectionCache<R> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            methods: FxHashMap::default(),
            fields: FxHashMap::default(),
            types: FxHashMap::default(),
        }
    }

    /// Insert a method overload under `type_name`.
    ///
    /// Returns `false` when an overload with the same full signature is
    /// already present; the existing entry is kept.
    pub fn insert_method(&mut self, type_name: &str, entry: RuntimeMethod<R>) -> bool {
        let overloads = self
            .methods
            .entry(member_key(type_name, &entry.name))
            .or_default();
        if overloads.iter().any(|e| e.descriptor == entry.descriptor) {
            return false;
        }
        overloads.push(entry);
        true
    }

    /// Insert a field under `type_name`; returns `false` if the key exists.
    pub fn insert_field(&mut self, type_name: &str, entry: RuntimeField<R>) -> bool {
        let key = member_key(type_name, &entry.name);
        if self.fields.contains_key(&key) {
            return false;
        }
        self.fields.insert(key, entry);
        true
    }

    /// Whether an overload with this full signature is cached
    pub fn has_method(&self, type_name: &str, name: &str, descriptor: &str) -> bool {
        self.methods(type_name, name)
            .map(|overloads| overloads.iter().any(|e| e.descriptor == descriptor))
            .unwrap_or(false)
    }

    /// Overloads cached for `type_name.name`
    pub fn methods(&self, type_name: &str, name: &str) -> Option<&[RuntimeMethod<R>]> {
        self.methods
            .get(&member_key(type_name, name))
            .map(Vec::as_slice)
    }

    /// Field cached for `type_name.name`
    pub fn field(&self, type_name: &str, name: &str) -> Option<&RuntimeField<R>> {
        self.fields.get(&member_key(type_name, name))
    }

    /// Record a type as discovered. Returns `false` if it already was.
    pub fn mark_type(&mut self, type_name: &str, ty: R::Type) -> bool {
        if self.types.contains_key(type_name) {
            return false;
        }
        self.types.insert(type_name.to_string(), ty);
        true
    }

    /// Whether a type has been discovered
    pub fn is_discovered(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Type reference recorded for a discovered type
    pub fn type_ref(&self, type_name: &str) -> Option<&R::Type> {
        self.types.get(type_name)
    }

    /// Number of distinct method keys
    pub fn method_keys(&self) -> usize {
        self.methods.len()
    }

    /// Number of method overloads across all keys
    pub fn method_count(&self) -> usize {
        self.methods.values().map(Vec::len).sum()
    }

    /// Number of cached fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Number of discovered types
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Sorted `key descriptor [static]` lines, methods then fields
    pub fn listing(&self) -> Vec<String> {
        let mut methods: Vec<String> = self
            .methods
            .iter()
            .flat_map(|(key, overloads)| {
                overloads
                    .iter()
                    .map(move |e| listing_line(key, &e.descriptor, e.binding))
            })
            .collect();
        methods.sort();

        let mut fields: Vec<String> = self
            .fields
            .iter()
            .map(|(key, e)| listing_line(key, &e.token, e.binding))
            .collect();
        fields.sort();

        methods.extend(fields);
        methods
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.methods.clear();
        self.fields.clear();
        self.types.clear();
    }
}

impl<R: ForeignRuntime> Default for ReflectionCache<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn listing_line(key: &str, descriptor: &str, binding: Binding) -> String {
    match binding {
        Binding::Instance => format!("{} {}", key, descriptor),
        Binding::Static => format!("{} {} static", key, descriptor),
    }
}
