//! Member discovery
//!
//! Enumerates a type's declared methods and fields through the runtime,
//! derives their signatures, resolves handles, and seeds the cache. Errors on
//! a single member are logged and skipped; discovery itself only fails when
//! the type cannot be named.

use tether_sdk::{ForeignRuntime, ReturnKind, RuntimeError, RuntimeResult};
use tracing::{debug, warn};

use crate::cache::{Binding, FieldEntry, MethodEntry, ReflectionCache, RuntimeField, RuntimeMethod};
use crate::error::{BridgeError, BridgeResult};
use crate::signature;

/// Knobs for a discovery pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// How many levels of object-typed return types to seed eagerly
    pub eager_depth: usize,
    /// Whether inherited members are keyed under the concrete type too
    pub walk_supertypes: bool,
    /// Upper bound on supertypes walked per type
    pub max_supertypes: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            eager_depth: 1,
            walk_supertypes: true,
            max_supertypes: 16,
        }
    }
}

/// What a discovery pass added to the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Types newly recorded as discovered
    pub types: usize,
    /// Method overloads inserted
    pub methods: usize,
    /// Fields inserted
    pub fields: usize,
    /// Members skipped after a descriptor or resolution error
    pub skipped: usize,
}

impl DiscoveryReport {
    fn merge(&mut self, other: DiscoveryReport) {
        self.types += other.types;
        self.methods += other.methods;
        self.fields += other.fields;
        self.skipped += other.skipped;
    }
}

/// Clear any pending fault after a failed runtime call.
///
/// The fault description, when there is one, replaces the original error.
pub(crate) fn settle<R: ForeignRuntime, T>(rt: &mut R, result: RuntimeResult<T>) -> RuntimeResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => match rt.take_fault() {
            Some(description) => Err(RuntimeError::Fault(description)),
            None => Err(err),
        },
    }
}

/// Discover `ty` and, up to `options.eager_depth`, the object types its
/// methods return. A type already in the cache's type table is skipped,
/// which also terminates cycles.
pub fn discover_type<R: ForeignRuntime>(
    rt: &mut R,
    cache: &mut ReflectionCache<R>,
    ty: &R::Type,
    options: &DiscoveryOptions,
    depth: usize,
) -> BridgeResult<DiscoveryReport> {
    let result = rt.type_name(ty);
    let type_name = settle(rt, result)?;

    let mut report = DiscoveryReport::default();
    if !cache.mark_type(&type_name, ty.clone()) {
        return Ok(report);
    }
    report.types += 1;
    debug!(type_name = %type_name, depth, "discovering type");

    let mut nested = Vec::new();
    for level in hierarchy(rt, ty, options) {
        discover_methods(rt, cache, ty, &type_name, &level, &mut report, &mut nested);
        discover_fields(rt, cache, ty, &type_name, &level, &mut report);
    }

    debug!(
        type_name = %type_name,
        methods = report.methods,
        fields = report.fields,
        skipped = report.skipped,
        "type discovered"
    );

    if depth < options.eager_depth {
        for nested_ty in nested {
            match discover_type(rt, cache, &nested_ty, options, depth + 1) {
                Ok(sub) => report.merge(sub),
                Err(err) => warn!(error = %err, "skipping nested type"),
            }
        }
    }

    Ok(report)
}

/// `ty` followed by its supertypes, bounded by the options
fn hierarchy<R: ForeignRuntime>(rt: &mut R, ty: &R::Type, options: &DiscoveryOptions) -> Vec<R::Type> {
    let mut levels = vec![ty.clone()];
    if !options.walk_supertypes {
        return levels;
    }

    let mut current = ty.clone();
    while levels.len() <= options.max_supertypes {
        let result = rt.super_type(&current);
        match settle(rt, result) {
            Ok(Some(parent)) => {
                levels.push(parent.clone());
                current = parent;
            }
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "cannot read supertype");
                break;
            }
        }
    }
    levels
}

fn discover_methods<R: ForeignRuntime>(
    rt: &mut R,
    cache: &mut ReflectionCache<R>,
    ty: &R::Type,
    type_name: &str,
    level: &R::Type,
    report: &mut DiscoveryReport,
    nested: &mut Vec<R::Type>,
) {
    let result = rt.declared_methods(level);
    let members = match settle(rt, result) {
        Ok(members) => members,
        Err(err) => {
            warn!(type_name, error = %err, "cannot enumerate methods");
            return;
        }
    };

    for member in &members {
        match describe_method(rt, cache, ty, type_name, member) {
            Ok(Some((entry, return_type))) => {
                if matches!(entry.return_kind, ReturnKind::Object(ref name) if !name.starts_with('[')) {
                    nested.push(return_type);
                }
                if cache.insert_method(type_name, entry) {
                    report.methods += 1;
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(type_name, error = %err, "skipping method");
                report.skipped += 1;
            }
        }
    }
}

/// Read, encode, and resolve one method. `Ok(None)` means an overload with
/// the same signature is already cached.
fn describe_method<R: ForeignRuntime>(
    rt: &mut R,
    cache: &ReflectionCache<R>,
    ty: &R::Type,
    type_name: &str,
    member: &R::Member,
) -> BridgeResult<Option<(RuntimeMethod<R>, R::Type)>> {
    let result = rt.method_name(member);
    let name = settle(rt, result)?;
    let result = rt.method_param_types(member);
    let param_types = settle(rt, result)?;
    let result = rt.method_return_type(member);
    let return_type = settle(rt, result)?;

    let mut param_names = Vec::with_capacity(param_types.len());
    for param in &param_types {
        let result = rt.type_name(param);
        param_names.push(settle(rt, result)?);
    }
    let result = rt.type_name(&return_type);
    let return_name = settle(rt, result)?;

    let params = signature::parameter_list_to_signature(&param_names)?;
    let return_token = signature::class_to_signature_token(&return_name)?;
    let descriptor = format!("{}{}", params, return_token);

    if cache.has_method(type_name, &name, &descriptor) {
        return Ok(None);
    }

    let result = rt.method_declaring_type(member);
    let declaring = settle(rt, result)?;
    let result = rt.type_name(&declaring);
    let owner = settle(rt, result)?;

    let (handle, binding) = resolve_method(rt, ty, type_name, &name, &descriptor)?;

    let entry = MethodEntry {
        owner,
        name,
        param_tokens: signature::parse_parameter_tokens(&params)?,
        params,
        return_kind: signature::return_kind(&return_token)?,
        descriptor,
        binding,
        class: ty.clone(),
        handle,
    };
    Ok(Some((entry, return_type)))
}

/// Instance first, static on failure.
fn resolve_method<R: ForeignRuntime>(
    rt: &mut R,
    ty: &R::Type,
    type_name: &str,
    name: &str,
    descriptor: &str,
) -> BridgeResult<(R::Method, Binding)> {
    let result = rt.resolve_instance_method(ty, name, descriptor);
    if let Ok(handle) = settle(rt, result) {
        return Ok((handle, Binding::Instance));
    }
    let result = rt.resolve_static_method(ty, name, descriptor);
    if let Ok(handle) = settle(rt, result) {
        return Ok((handle, Binding::Static));
    }
    Err(BridgeError::ResolutionFailure {
        type_name: type_name.to_string(),
        member: name.to_string(),
        signature: descriptor.to_string(),
    })
}

fn discover_fields<R: ForeignRuntime>(
    rt: &mut R,
    cache: &mut ReflectionCache<R>,
    ty: &R::Type,
    type_name: &str,
    level: &R::Type,
    report: &mut DiscoveryReport,
) {
    let result = rt.declared_fields(level);
    let fields = match settle(rt, result) {
        Ok(fields) => fields,
        Err(err) => {
            warn!(type_name, error = %err, "cannot enumerate fields");
            return;
        }
    };

    for field in &fields {
        match describe_field(rt, cache, ty, type_name, field) {
            Ok(Some(entry)) => {
                if cache.insert_field(type_name, entry) {
                    report.fields += 1;
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(type_name, error = %err, "skipping field");
                report.skipped += 1;
            }
        }
    }
}

fn describe_field<R: ForeignRuntime>(
    rt: &mut R,
    cache: &ReflectionCache<R>,
    ty: &R::Type,
    type_name: &str,
    field: &R::FieldRef,
) -> BridgeResult<Option<RuntimeField<R>>> {
    let result = rt.field_name(field);
    let name = settle(rt, result)?;
    // A subtype's field shadows any inherited one with the same name
    if cache.field(type_name, &name).is_some() {
        return Ok(None);
    }

    let result = rt.field_type(field);
    let field_type = settle(rt, result)?;
    let result = rt.type_name(&field_type);
    let field_type_name = settle(rt, result)?;
    let token = signature::class_to_signature_token(&field_type_name)?;
    if token == "V" {
        return Err(signature::DescriptorError::Malformed(field_type_name).into());
    }

    let result = rt.field_declaring_type(field);
    let declaring = settle(rt, result)?;
    let result = rt.type_name(&declaring);
    let owner = settle(rt, result)?;

    let result = rt.resolve_instance_field(ty, &name, &token);
    let (handle, binding) = match settle(rt, result) {
        Ok(handle) => (handle, Binding::Instance),
        Err(_) => {
            let result = rt.resolve_static_field(ty, &name, &token);
            match settle(rt, result) {
                Ok(handle) => (handle, Binding::Static),
                Err(_) => {
                    return Err(BridgeError::ResolutionFailure {
                        type_name: type_name.to_string(),
                        member: name,
                        signature: token,
                    })
                }
            }
        }
    };

    Ok(Some(FieldEntry {
        owner,
        name,
        kind: signature::return_kind(&token)?,
        token,
        binding,
        class: ty.clone(),
        handle,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimRuntime, SimType};
    use serde_json::{json, Value};

    fn discover(graph: Value, type_name: &str, options: DiscoveryOptions) -> (ReflectionCache<SimRuntime>, DiscoveryReport) {
        let mut rt = SimRuntime::from_value(graph).unwrap();
        let mut cache = ReflectionCache::new();
        let report = discover_type(&mut rt, &mut cache, &SimType::named(type_name), &options, 0).unwrap();
        (cache, report)
    }

    fn cyclic() -> Value {
        json!({
            "types": [
                { "name": "app.A",
                  "methods": [ { "name": "getB", "returns": "app.B" } ] },
                { "name": "app.B",
                  "methods": [
                    { "name": "getA", "returns": "app.A" },
                    { "name": "getC", "returns": "app.C" }
                  ] },
                { "name": "app.C",
                  "methods": [ { "name": "getA", "returns": "app.A" } ] }
            ]
        })
    }

    fn layered() -> Value {
        json!({
            "types": [
                { "name": "app.Base",
                  "methods": [ { "name": "getId", "returns": "int" } ] },
                { "name": "app.Mid", "super": "app.Base",
                  "methods": [ { "name": "getMid", "returns": "int" } ] },
                { "name": "app.Leaf", "super": "app.Mid",
                  "methods": [ { "name": "getLeaf", "returns": "int" } ] }
            ]
        })
    }

    #[test]
    fn test_deep_eager_seeding_terminates_on_cycles() {
        let options = DiscoveryOptions {
            eager_depth: 50,
            ..DiscoveryOptions::default()
        };
        let (cache, report) = discover(cyclic(), "app.A", options);
        assert_eq!(report.types, 3);
        assert_eq!(report.methods, 4);
        assert!(cache.is_discovered("app.C"));
    }

    #[test]
    fn test_eager_depth_bounds_seeding() {
        let options = DiscoveryOptions {
            eager_depth: 1,
            ..DiscoveryOptions::default()
        };
        let (cache, report) = discover(cyclic(), "app.A", options);
        assert_eq!(report.types, 2);
        assert!(cache.is_discovered("app.B"));
        assert!(!cache.is_discovered("app.C"));
    }

    #[test]
    fn test_inherited_members_keyed_under_concrete_type() {
        let (cache, _) = discover(layered(), "app.Leaf", DiscoveryOptions::default());
        assert!(cache.has_method("app.Leaf", "getLeaf", "()I"));
        assert!(cache.has_method("app.Leaf", "getMid", "()I"));
        assert!(cache.has_method("app.Leaf", "getId", "()I"));
        assert_eq!(cache.methods("app.Leaf", "getId").unwrap()[0].owner, "app.Base");
    }

    #[test]
    fn test_supertype_walk_disabled() {
        let options = DiscoveryOptions {
            walk_supertypes: false,
            ..DiscoveryOptions::default()
        };
        let (cache, report) = discover(layered(), "app.Leaf", options);
        assert_eq!(report.methods, 1);
        assert!(cache.methods("app.Leaf", "getMid").is_none());
        assert!(cache.methods("app.Leaf", "getId").is_none());
    }

    #[test]
    fn test_supertype_walk_is_bounded() {
        let options = DiscoveryOptions {
            max_supertypes: 1,
            ..DiscoveryOptions::default()
        };
        let (cache, _) = discover(layered(), "app.Leaf", options);
        assert!(cache.has_method("app.Leaf", "getMid", "()I"));
        assert!(cache.methods("app.Leaf", "getId").is_none());

        let options = DiscoveryOptions {
            max_supertypes: 0,
            ..DiscoveryOptions::default()
        };
        let (cache, report) = discover(layered(), "app.Leaf", options);
        assert_eq!(report.methods, 1);
        assert!(cache.methods("app.Leaf", "getMid").is_none());
    }

    #[test]
    fn test_malformed_descriptors_skip_only_their_member() {
        let graph = json!({
            "types": [
                { "name": "app.Odd",
                  "methods": [
                    { "name": "ok", "returns": "int", "body": { "kind": "const", "value": 1 } },
                    { "name": "weird", "returns": "bad name" },
                    { "name": "generic", "params": ["java.util.List<java.lang.String>"], "returns": "int" },
                    { "name": "label", "returns": "java.lang.String" }
                  ],
                  "fields": [
                    { "name": "n", "type": "int", "value": 3 },
                    { "name": "broken", "type": "also bad" }
                  ] }
            ]
        });
        let (cache, report) = discover(graph, "app.Odd", DiscoveryOptions::default());
        assert_eq!(report.skipped, 3);
        assert_eq!(report.methods, 2);
        assert_eq!(report.fields, 1);
        assert!(cache.has_method("app.Odd", "ok", "()I"));
        assert!(cache.has_method("app.Odd", "label", "()Ljava/lang/String;"));
        assert!(cache.methods("app.Odd", "weird").is_none());
        assert!(cache.methods("app.Odd", "generic").is_none());
        assert!(cache.field("app.Odd", "n").is_some());
        assert!(cache.field("app.Odd", "broken").is_none());
    }

    #[test]
    fn test_settle_prefers_fault_description() {
        let mut rt = SimRuntime::from_value(json!({})).unwrap();
        rt.raise("java.lang.LinkageError: gone");
        let result: RuntimeResult<()> = Err(RuntimeError::FaultPending);
        let err = settle(&mut rt, result).unwrap_err();
        assert!(matches!(err, RuntimeError::Fault(ref d) if d.contains("LinkageError")));
        assert!(!rt.has_pending_fault());
    }
}
