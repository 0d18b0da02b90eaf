//! Engine: one runtime connection, its cache, and its roots
//!
//! The engine is single-threaded. [`crate::bridge::Bridge`] moves it onto a
//! worker thread when several callers share it.

use tether_sdk::{ForeignRuntime, NativeValue};
use tracing::{debug, info};

use crate::cache::{member_key, Binding, ReflectionCache};
use crate::config::RootSpec;
use crate::discovery::{discover_type, settle, DiscoveryOptions, DiscoveryReport};
use crate::error::{BridgeError, BridgeResult};
use crate::roots::{RootHandle, RootTable};

/// Reflection cache and chain interpreter bound to one foreign runtime
pub struct Engine<R: ForeignRuntime> {
    pub(crate) runtime: R,
    pub(crate) cache: ReflectionCache<R>,
    pub(crate) roots: RootTable<R::Object>,
    pub(crate) root_specs: Vec<RootSpec>,
    pub(crate) options: DiscoveryOptions,
}

impl<R: ForeignRuntime> Engine<R> {
    /// Create an engine over `runtime`
    pub fn new(runtime: R, options: DiscoveryOptions) -> Self {
        Self {
            runtime,
            cache: ReflectionCache::new(),
            roots: RootTable::new(),
            root_specs: Vec::new(),
            options,
        }
    }

    /// Declare roots that are resolved on first use
    pub fn declare_roots(&mut self, specs: impl IntoIterator<Item = RootSpec>) {
        self.root_specs.extend(specs);
    }

    /// Pin `object` and register it as a root.
    ///
    /// A named root replaces, and releases, an earlier root of the same name.
    pub fn register_root(&mut self, name: Option<&str>, object: &R::Object) -> BridgeResult<RootHandle> {
        let result = self.runtime.pin(object);
        let pinned = settle(&mut self.runtime, result)?;
        let (id, displaced) = self.roots.insert(name, pinned);
        if let Some(old) = displaced {
            self.runtime.release(old);
        }
        debug!(root = id, name = name.unwrap_or("-"), "root registered");
        Ok(id)
    }

    /// Make `id` the root for unlabeled instructions
    pub fn set_default_root(&mut self, id: RootHandle) -> BridgeResult<()> {
        if self.roots.set_default(id) {
            Ok(())
        } else {
            Err(BridgeError::UnknownRoot(id.to_string()))
        }
    }

    /// Unregister a root and release its pinned reference
    pub fn remove_root(&mut self, id: RootHandle) -> BridgeResult<()> {
        let object = self
            .roots
            .remove(id)
            .ok_or_else(|| BridgeError::UnknownRoot(id.to_string()))?;
        self.runtime.release(object);
        Ok(())
    }

    /// Read a root from the static field named by `spec` and register it.
    pub fn resolve_root(&mut self, spec: &RootSpec) -> BridgeResult<RootHandle> {
        let result = self.runtime.find_type(&spec.type_name);
        let ty = settle(&mut self.runtime, result)?;
        let result = self.runtime.type_name(&ty);
        let type_name = settle(&mut self.runtime, result)?;

        discover_type(&mut self.runtime, &mut self.cache, &ty, &self.options, 0)?;

        let key = member_key(&type_name, &spec.field);
        let entry = self
            .cache
            .field(&type_name, &spec.field)
            .cloned()
            .ok_or_else(|| BridgeError::MemberNotFound {
                type_name: type_name.clone(),
                member: spec.field.clone(),
            })?;
        if entry.binding != Binding::Static {
            return Err(BridgeError::ResolutionFailure {
                type_name,
                member: spec.field.clone(),
                signature: entry.token,
            });
        }

        let result = self
            .runtime
            .read_field(&entry.handle, &entry.class, None, &entry.kind);
        let object = match self.capture(result, &key)? {
            NativeValue::Object(object) => object,
            NativeValue::Null => return Err(BridgeError::NullReceiver { member: key }),
            other => {
                return Err(BridgeError::NotAReceiver {
                    member: key,
                    kind: other.type_name().to_string(),
                })
            }
        };

        let id = self.register_root(Some(&spec.name), &object)?;
        if spec.default {
            self.roots.set_default(id);
        }
        info!(root = %spec.name, field = %key, "root resolved");
        Ok(id)
    }

    /// Discover the members of `object`'s concrete type
    pub fn discover(&mut self, object: &R::Object) -> BridgeResult<DiscoveryReport> {
        let result = self.runtime.type_of(object);
        let ty = settle(&mut self.runtime, result)?;
        discover_type(&mut self.runtime, &mut self.cache, &ty, &self.options, 0)
    }

    /// The reflection cache
    pub fn cache(&self) -> &ReflectionCache<R> {
        &self.cache
    }

    /// The underlying runtime
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// The underlying runtime, mutably
    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// The root table
    pub fn roots(&self) -> &RootTable<R::Object> {
        &self.roots
    }

    /// Discovery options in effect
    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Release every root and drop every cached handle.
    ///
    /// Runs on drop as well; calling it twice is harmless.
    pub fn teardown(&mut self) {
        let roots = self.roots.drain();
        let released = roots.len();
        for object in roots {
            self.runtime.release(object);
        }
        let methods = self.cache.method_count();
        self.cache.clear();
        if released > 0 || methods > 0 {
            debug!(roots = released, methods, "engine torn down");
        }
    }
}

impl<R: ForeignRuntime> Drop for Engine<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRuntime;
    use serde_json::json;

    fn runtime() -> SimRuntime {
        SimRuntime::from_value(json!({
            "types": [
                { "name": "app.Base",
                  "methods": [ { "name": "getId", "returns": "int", "body": { "kind": "const", "value": 7 } } ] },
                { "name": "app.Leaf", "super": "app.Base",
                  "methods": [ { "name": "getName", "returns": "java.lang.String", "body": { "kind": "const", "value": "leaf" } } ],
                  "fields": [
                    { "name": "MAIN", "type": "app.Leaf", "static": true, "value": { "ref": 1 } },
                    { "name": "NONE", "type": "app.Leaf", "static": true },
                    { "name": "size", "type": "int", "value": 2 }
                  ] }
            ],
            "objects": [ { "id": 1, "type": "app.Leaf" }, { "id": 2, "type": "app.Leaf" } ],
            "roots": { "leaf": 1, "other": 2 }
        }))
        .unwrap()
    }

    fn root_spec(name: &str, field: &str) -> RootSpec {
        RootSpec {
            name: name.to_string(),
            type_name: "app.Leaf".to_string(),
            field: field.to_string(),
            default: false,
        }
    }

    #[test]
    fn test_inherited_members_need_supertype_walk() {
        let rt = runtime();
        let leaf = rt.root("leaf").unwrap();
        let options = DiscoveryOptions {
            walk_supertypes: false,
            ..DiscoveryOptions::default()
        };
        let mut engine = Engine::new(rt, options);
        assert_eq!(engine.evaluate("getName()", &leaf).unwrap(), "leaf");
        assert!(matches!(
            engine.evaluate("getId()", &leaf),
            Err(BridgeError::MemberNotFound { ref type_name, ref member })
                if type_name == "app.Leaf" && member == "getId"
        ));

        let rt = runtime();
        let mut engine = Engine::new(rt, DiscoveryOptions::default());
        assert_eq!(engine.evaluate("getId()", &leaf).unwrap(), "7");
    }

    #[test]
    fn test_remove_root_releases_pin() {
        let rt = runtime();
        let leaf = rt.root("leaf").unwrap();
        let other = rt.root("other").unwrap();
        let mut engine = Engine::new(rt, DiscoveryOptions::default());

        let first = engine.register_root(Some("a"), &leaf).unwrap();
        let second = engine.register_root(None, &other).unwrap();
        assert_eq!(engine.roots().default_root(), Some(first));
        engine.set_default_root(second).unwrap();
        assert_eq!(engine.roots().default_root(), Some(second));

        engine.remove_root(second).unwrap();
        assert_eq!(engine.runtime().stats().live_pins(), 1);
        assert!(matches!(engine.remove_root(second), Err(BridgeError::UnknownRoot(_))));
        assert!(matches!(engine.set_default_root(99), Err(BridgeError::UnknownRoot(_))));
    }

    #[test]
    fn test_resolve_root_requires_static_object_field() {
        let mut engine = Engine::new(runtime(), DiscoveryOptions::default());

        let id = engine.resolve_root(&root_spec("main", "MAIN")).unwrap();
        assert_eq!(engine.roots().by_name("main"), Some(id));

        assert!(matches!(
            engine.resolve_root(&root_spec("none", "NONE")),
            Err(BridgeError::NullReceiver { ref member }) if member == "app.Leaf.NONE"
        ));
        assert!(matches!(
            engine.resolve_root(&root_spec("size", "size")),
            Err(BridgeError::ResolutionFailure { .. })
        ));
        assert!(matches!(
            engine.resolve_root(&root_spec("gone", "MISSING")),
            Err(BridgeError::MemberNotFound { .. })
        ));
        assert!(!engine.runtime_mut().has_pending_fault());
    }

    #[test]
    fn test_teardown_is_repeatable() {
        let rt = runtime();
        let leaf = rt.root("leaf").unwrap();
        let mut engine = Engine::new(rt, DiscoveryOptions::default());
        engine.register_root(Some("leaf"), &leaf).unwrap();
        engine.discover(&leaf).unwrap();

        engine.teardown();
        engine.teardown();
        assert!(engine.roots().is_empty());
        assert_eq!(engine.cache().method_count(), 0);
        assert_eq!(engine.runtime().stats().live_pins(), 0);
    }
}
