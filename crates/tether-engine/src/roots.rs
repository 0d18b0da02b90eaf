//! Root receiver table
//!
//! Holds the pinned objects instructions start from. Each root gets a numeric
//! handle and, optionally, a name that instructions can use as their first
//! segment.

use rustc_hash::FxHashMap;

/// Numeric handle of a registered root
pub type RootHandle = u64;

struct RootEntry<O> {
    name: Option<String>,
    object: O,
}

/// Registry mapping handles and names to pinned root objects.
///
/// Handles are auto-incrementing, starting at 1. The first root registered
/// becomes the default until another is chosen.
pub struct RootTable<O> {
    entries: FxHashMap<RootHandle, RootEntry<O>>,
    names: FxHashMap<String, RootHandle>,
    default: Option<RootHandle>,
    next_id: RootHandle,
}

impl<O> RootTable<O> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            names: FxHashMap::default(),
            default: None,
            next_id: 1,
        }
    }

    /// Insert an object and return its handle.
    ///
    /// A named root replaces any earlier root of the same name; the displaced
    /// object is returned so the caller can release it.
    pub fn insert(&mut self, name: Option<&str>, object: O) -> (RootHandle, Option<O>) {
        let id = self.next_id;
        self.next_id += 1;

        let displaced = name
            .and_then(|n| self.names.get(n).copied())
            .and_then(|old| self.remove(old));

        if let Some(n) = name {
            self.names.insert(n.to_string(), id);
        }
        self.entries.insert(
            id,
            RootEntry {
                name: name.map(str::to_string),
                object,
            },
        );
        if self.default.is_none() {
            self.default = Some(id);
        }
        (id, displaced)
    }

    /// Object registered under a handle
    pub fn get(&self, id: RootHandle) -> Option<&O> {
        self.entries.get(&id).map(|e| &e.object)
    }

    /// Handle registered under a name
    pub fn by_name(&self, name: &str) -> Option<RootHandle> {
        self.names.get(name).copied()
    }

    /// Current default root
    pub fn default_root(&self) -> Option<RootHandle> {
        self.default
    }

    /// Choose the default root; returns `false` for an unknown handle.
    pub fn set_default(&mut self, id: RootHandle) -> bool {
        if !self.entries.contains_key(&id) {
            return false;
        }
        self.default = Some(id);
        true
    }

    /// Remove a root, returning its object.
    pub fn remove(&mut self, id: RootHandle) -> Option<O> {
        let entry = self.entries.remove(&id)?;
        if let Some(name) = &entry.name {
            self.names.remove(name);
        }
        if self.default == Some(id) {
            self.default = self.entries.keys().min().copied();
        }
        Some(entry.object)
    }

    /// Sorted names of all named roots, the default marked with `*`
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .names
            .iter()
            .map(|(name, id)| {
                if self.default == Some(*id) {
                    format!("{} *", name)
                } else {
                    name.clone()
                }
            })
            .collect();
        names.sort();
        names
    }

    /// Number of registered roots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no roots are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every root, returning the objects
    pub fn drain(&mut self) -> Vec<O> {
        self.names.clear();
        self.default = None;
        self.entries.drain().map(|(_, e)| e.object).collect()
    }
}

impl<O> Default for RootTable<O> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_start_at_one() {
        let mut table = RootTable::new();
        let (a, _) = table.insert(None, "a");
        let (b, _) = table.insert(Some("b"), "b");
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(table.get(b), Some(&"b"));
        assert_eq!(table.by_name("b"), Some(b));
    }

    #[test]
    fn test_first_root_is_default() {
        let mut table = RootTable::new();
        let (a, _) = table.insert(Some("a"), 1);
        let (b, _) = table.insert(Some("b"), 2);
        assert_eq!(table.default_root(), Some(a));
        assert!(table.set_default(b));
        assert_eq!(table.default_root(), Some(b));
        assert!(!table.set_default(99));
        assert_eq!(table.names(), vec!["a".to_string(), "b *".to_string()]);
    }

    #[test]
    fn test_named_root_replacement_displaces() {
        let mut table = RootTable::new();
        let (first, _) = table.insert(Some("client"), 10);
        let (second, displaced) = table.insert(Some("client"), 20);
        assert_eq!(displaced, Some(10));
        assert!(table.get(first).is_none());
        assert_eq!(table.by_name("client"), Some(second));
        assert_eq!(table.default_root(), Some(second));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_drain() {
        let mut table = RootTable::new();
        table.insert(Some("a"), 1);
        table.insert(None, 2);
        let mut drained = table.drain();
        drained.sort();
        assert_eq!(drained, vec![1, 2]);
        assert!(table.is_empty());
        assert_eq!(table.default_root(), None);
    }
}
