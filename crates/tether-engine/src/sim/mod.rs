//! Simulated managed runtime
//!
//! [`SimRuntime`] implements [`ForeignRuntime`] over an in-memory object graph
//! loaded from JSON (see [`graph`]). It follows JVM conventions closely enough
//! to exercise the engine: failed lookups leave a pending fault, and every
//! call made while a fault is pending is refused and counted.

pub mod graph;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde_json::Value;
use tether_sdk::{ForeignRuntime, NativeValue, ReturnKind, RuntimeError, RuntimeResult};

use crate::signature;
use graph::{ref_id, Body, FieldSpec, GraphSpec, MethodSpec, TypeSpec};

/// Type names every graph can use without declaring them
const BUILTIN_TYPES: [&str; 11] = [
    "void",
    "int",
    "long",
    "boolean",
    "double",
    "byte",
    "short",
    "char",
    "float",
    "java.lang.String",
    "java.lang.Object",
];

/// Bound on supertype chains, in case a graph declares a cycle
const MAX_LINEAGE: usize = 64;

const STRING_TYPE: &str = "java.lang.String";

/// Field of a boxed string holding its text
const STRING_VALUE: &str = "value";

/// Graph loading errors
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Failed to read graph file
    #[error("Failed to read graph {path}: {source}")]
    Io {
        /// File that could not be read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Graph is not valid JSON for the schema
    #[error("Failed to parse graph: {0}")]
    Json(#[from] serde_json::Error),

    /// Graph is inconsistent
    #[error("Invalid graph: {0}")]
    Invalid(String),
}

/// Type reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimType(String);

impl SimType {
    /// Reference a type by name
    pub fn named(name: impl Into<String>) -> Self {
        SimType(name.into())
    }

    /// The type's name
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Object reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimObject(pub u64);

/// Declared method, as enumerated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimMember {
    ty: String,
    index: usize,
}

/// Declared field, as enumerated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimFieldRef {
    ty: String,
    index: usize,
}

/// Resolved method handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimMethod {
    ty: String,
    index: usize,
    is_static: bool,
}

impl SimMethod {
    /// Handle for method `index` declared on `ty`
    pub fn new(ty: impl Into<String>, index: usize, is_static: bool) -> Self {
        Self {
            ty: ty.into(),
            index,
            is_static,
        }
    }
}

/// Resolved field handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimField {
    ty: String,
    index: usize,
    is_static: bool,
}

/// Call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// `declared_methods` / `declared_fields` calls
    pub enumerations: usize,
    /// Method and field resolutions attempted
    pub resolutions: usize,
    /// Method invocations
    pub invocations: usize,
    /// Field reads
    pub field_reads: usize,
    /// References pinned
    pub pins: usize,
    /// References released
    pub releases: usize,
    /// Calls refused because a fault was pending
    pub calls_while_faulted: usize,
}

impl SimStats {
    /// Pinned references not yet released
    pub fn live_pins(&self) -> usize {
        self.pins.saturating_sub(self.releases)
    }
}

struct ObjectState {
    type_name: String,
    fields: BTreeMap<String, Value>,
    display: Option<String>,
}

/// In-memory runtime over a JSON object graph
pub struct SimRuntime {
    types: FxHashMap<String, TypeSpec>,
    objects: FxHashMap<u64, ObjectState>,
    roots: BTreeMap<String, u64>,
    /// Boxed strings by text
    strings: FxHashMap<String, u64>,
    next_id: u64,
    fault: Option<String>,
    stats: SimStats,
}

impl SimRuntime {
    /// Build a runtime from a parsed graph
    pub fn from_spec(spec: GraphSpec) -> Result<Self, SimError> {
        let mut types = FxHashMap::default();
        for ty in spec.types {
            if is_builtin(&ty.name) {
                return Err(SimError::Invalid(format!("Cannot redeclare builtin type {}", ty.name)));
            }
            let name = ty.name.clone();
            if types.insert(name.clone(), ty).is_some() {
                return Err(SimError::Invalid(format!("Duplicate type {}", name)));
            }
        }

        for ty in types.values() {
            if let Some(parent) = &ty.super_type {
                if !types.contains_key(parent) && parent != "java.lang.Object" {
                    return Err(SimError::Invalid(format!(
                        "Type {} extends unknown type {}",
                        ty.name, parent
                    )));
                }
            }
        }

        let mut objects = FxHashMap::default();
        for object in spec.objects {
            if !types.contains_key(&object.type_name) {
                return Err(SimError::Invalid(format!(
                    "Object {} has undeclared type {}",
                    object.id, object.type_name
                )));
            }
            let state = ObjectState {
                type_name: object.type_name,
                fields: object.fields,
                display: object.display,
            };
            if objects.insert(object.id, state).is_some() {
                return Err(SimError::Invalid(format!("Duplicate object id {}", object.id)));
            }
        }

        let dangling = objects
            .values()
            .flat_map(|o| o.fields.values())
            .chain(types.values().flat_map(|t| t.fields.iter().map(|f| &f.value)))
            .filter_map(ref_id)
            .find(|id| !objects.contains_key(id));
        if let Some(id) = dangling {
            return Err(SimError::Invalid(format!("Reference to unknown object {}", id)));
        }

        for (name, id) in &spec.roots {
            if !objects.contains_key(id) {
                return Err(SimError::Invalid(format!("Root {} references unknown object {}", name, id)));
            }
        }

        types.insert(STRING_TYPE.to_string(), string_type());
        let next_id = objects.keys().max().map_or(1, |max| max + 1);

        Ok(Self {
            types,
            objects,
            roots: spec.roots,
            strings: FxHashMap::default(),
            next_id,
            fault: None,
            stats: SimStats::default(),
        })
    }

    /// Build a runtime from a JSON value
    pub fn from_value(value: Value) -> Result<Self, SimError> {
        Self::from_spec(serde_json::from_value(value)?)
    }

    /// Build a runtime from JSON text
    pub fn from_json_str(text: &str) -> Result<Self, SimError> {
        Self::from_spec(serde_json::from_str(text)?)
    }

    /// Load a graph file
    pub fn load(path: &Path) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Object registered under a root name
    pub fn root(&self, name: &str) -> Option<SimObject> {
        self.roots.get(name).copied().map(SimObject)
    }

    /// All roots, sorted by name
    pub fn roots(&self) -> Vec<(String, SimObject)> {
        self.roots
            .iter()
            .map(|(name, id)| (name.clone(), SimObject(*id)))
            .collect()
    }

    /// Call counters so far
    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// Current value of an instance field, as stored in the graph
    pub fn field_value(&self, object: SimObject, field: &str) -> Option<&Value> {
        self.objects.get(&object.0)?.fields.get(field)
    }

    /// Leave a fault pending, as a callback into the runtime might
    pub fn raise(&mut self, message: impl Into<String>) {
        self.fault = Some(message.into());
    }

    fn guard(&mut self) -> RuntimeResult<()> {
        if self.fault.is_some() {
            self.stats.calls_while_faulted += 1;
            return Err(RuntimeError::FaultPending);
        }
        Ok(())
    }

    fn fail(&mut self, message: String) -> RuntimeError {
        self.fault = Some(message.clone());
        RuntimeError::Fault(message)
    }

    fn type_spec(&self, name: &str) -> RuntimeResult<Option<&TypeSpec>> {
        match self.types.get(name) {
            Some(spec) => Ok(Some(spec)),
            None if is_builtin(name) => Ok(None),
            None => Err(RuntimeError::NotFound(format!("type {}", name))),
        }
    }

    /// `name` and its declared supertypes, most derived first
    fn lineage(&self, name: &str) -> Vec<&TypeSpec> {
        let mut chain = Vec::new();
        let mut current = self.types.get(name);
        while let Some(spec) = current {
            if chain.len() >= MAX_LINEAGE {
                break;
            }
            chain.push(spec);
            current = spec.super_type.as_deref().and_then(|s| self.types.get(s));
        }
        chain
    }

    fn method_spec(&self, ty: &str, index: usize) -> RuntimeResult<&MethodSpec> {
        self.types
            .get(ty)
            .and_then(|t| t.methods.get(index))
            .ok_or_else(|| RuntimeError::NotFound(format!("method #{} of {}", index, ty)))
    }

    fn field_spec(&self, ty: &str, index: usize) -> RuntimeResult<&FieldSpec> {
        self.types
            .get(ty)
            .and_then(|t| t.fields.get(index))
            .ok_or_else(|| RuntimeError::NotFound(format!("field #{} of {}", index, ty)))
    }

    fn object(&self, object: &SimObject) -> RuntimeResult<&ObjectState> {
        self.objects
            .get(&object.0)
            .ok_or_else(|| RuntimeError::NotFound(format!("object {}", object.0)))
    }

    fn resolve_method(&mut self, ty: &SimType, name: &str, sig: &str, want_static: bool) -> RuntimeResult<SimMethod> {
        self.guard()?;
        self.stats.resolutions += 1;
        let found = self.lineage(&ty.0).into_iter().find_map(|spec| {
            spec.methods.iter().position(|m| {
                m.name == name
                    && !m.hidden
                    && m.is_static == want_static
                    && signature::full_signature(&m.params, &m.returns).ok().as_deref() == Some(sig)
            })
            .map(|index| SimMethod::new(spec.name.clone(), index, want_static))
        });
        found.ok_or_else(|| self.fail(format!("java.lang.NoSuchMethodError: {}", name)))
    }

    fn resolve_field(&mut self, ty: &SimType, name: &str, sig: &str, want_static: bool) -> RuntimeResult<SimField> {
        self.guard()?;
        self.stats.resolutions += 1;
        let found = self.lineage(&ty.0).into_iter().find_map(|spec| {
            spec.fields
                .iter()
                .position(|f| {
                    f.name == name
                        && f.is_static == want_static
                        && signature::class_to_signature_token(&f.type_name).ok().as_deref() == Some(sig)
                })
                .map(|index| SimField {
                    ty: spec.name.clone(),
                    index,
                    is_static: want_static,
                })
        });
        found.ok_or_else(|| self.fail(format!("java.lang.NoSuchFieldError: {}", name)))
    }

    /// Instance field value, falling back to the declared default
    fn instance_value(&self, object: &SimObject, field: &str) -> RuntimeResult<Value> {
        let state = self.object(object)?;
        if let Some(value) = state.fields.get(field) {
            return Ok(value.clone());
        }
        Ok(self
            .lineage(&state.type_name)
            .into_iter()
            .flat_map(|t| t.fields.iter())
            .find(|f| f.name == field && !f.is_static)
            .map(|f| f.value.clone())
            .unwrap_or(Value::Null))
    }

    fn static_value(&self, ty: &str, field: &str) -> Value {
        self.lineage(ty)
            .into_iter()
            .flat_map(|t| t.fields.iter())
            .find(|f| f.name == field && f.is_static)
            .map(|f| f.value.clone())
            .unwrap_or(Value::Null)
    }

    /// Convert a graph value to a native value of the named type
    fn to_native(&self, value: &Value, type_name: &str) -> RuntimeResult<NativeValue<SimObject>> {
        let mismatch = || RuntimeError::TypeMismatch {
            expected: type_name.to_string(),
            got: value.to_string(),
        };
        let native = match type_name {
            "void" => NativeValue::Void,
            "int" => NativeValue::Int(value.as_i64().and_then(|v| i32::try_from(v).ok()).ok_or_else(mismatch)?),
            "long" => NativeValue::Long(value.as_i64().ok_or_else(mismatch)?),
            "short" => NativeValue::Short(value.as_i64().and_then(|v| i16::try_from(v).ok()).ok_or_else(mismatch)?),
            "byte" => NativeValue::Byte(value.as_i64().and_then(|v| i8::try_from(v).ok()).ok_or_else(mismatch)?),
            "boolean" => NativeValue::Bool(value.as_bool().ok_or_else(mismatch)?),
            "double" => NativeValue::Double(value.as_f64().ok_or_else(mismatch)?),
            "float" => NativeValue::Float(value.as_f64().ok_or_else(mismatch)? as f32),
            "char" => {
                let units: Vec<u16> = value.as_str().ok_or_else(mismatch)?.encode_utf16().collect();
                match units.as_slice() {
                    [unit] => NativeValue::Char(*unit),
                    _ => return Err(mismatch()),
                }
            }
            _ => match value {
                Value::Null => NativeValue::Null,
                Value::String(s) => NativeValue::Str(s.clone()),
                other => {
                    let id = ref_id(other).ok_or_else(mismatch)?;
                    self.object(&SimObject(id))?;
                    NativeValue::Object(SimObject(id))
                }
            },
        };
        Ok(native)
    }

    /// Object holding `text`, allocated on first use
    fn box_string(&mut self, text: String) -> SimObject {
        if let Some(id) = self.strings.get(&text) {
            return SimObject(*id);
        }
        let id = self.next_id;
        self.next_id += 1;
        let mut fields = BTreeMap::new();
        fields.insert(STRING_VALUE.to_string(), Value::String(text.clone()));
        self.objects.insert(
            id,
            ObjectState {
                type_name: STRING_TYPE.to_string(),
                fields,
                display: Some(text.clone()),
            },
        );
        self.strings.insert(text, id);
        SimObject(id)
    }

    /// Check a result against the declared kind. Text behind a wider
    /// reference type is handed out as a string object.
    fn check_fits(&mut self, value: NativeValue<SimObject>, kind: &ReturnKind) -> RuntimeResult<NativeValue<SimObject>> {
        let value = match (value, kind) {
            (NativeValue::Str(text), ReturnKind::Object(_)) => NativeValue::Object(self.box_string(text)),
            (value, _) => value,
        };
        if value.fits(kind) {
            Ok(value)
        } else {
            Err(RuntimeError::TypeMismatch {
                expected: kind.to_string(),
                got: value.type_name().to_string(),
            })
        }
    }
}

fn is_builtin(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name) || name.starts_with('[')
}

/// Members every boxed string answers to
fn string_type() -> TypeSpec {
    let method = |name: &str, returns: &str, body: Body| MethodSpec {
        name: name.to_string(),
        params: Vec::new(),
        returns: returns.to_string(),
        is_static: false,
        hidden: false,
        body,
    };
    TypeSpec {
        name: STRING_TYPE.to_string(),
        super_type: Some("java.lang.Object".to_string()),
        methods: vec![
            method(
                "length",
                "int",
                Body::Length {
                    field: STRING_VALUE.to_string(),
                },
            ),
            method(
                "isEmpty",
                "boolean",
                Body::IsEmpty {
                    field: STRING_VALUE.to_string(),
                },
            ),
            method(
                "toString",
                STRING_TYPE,
                Body::Field {
                    name: STRING_VALUE.to_string(),
                },
            ),
        ],
        fields: Vec::new(),
    }
}

impl ForeignRuntime for SimRuntime {
    type Type = SimType;
    type Member = SimMember;
    type FieldRef = SimFieldRef;
    type Method = SimMethod;
    type Field = SimField;
    type Object = SimObject;

    fn type_of(&mut self, object: &SimObject) -> RuntimeResult<SimType> {
        self.guard()?;
        Ok(SimType(self.object(object)?.type_name.clone()))
    }

    fn type_name(&mut self, ty: &SimType) -> RuntimeResult<String> {
        self.guard()?;
        Ok(ty.0.clone())
    }

    fn super_type(&mut self, ty: &SimType) -> RuntimeResult<Option<SimType>> {
        self.guard()?;
        Ok(self
            .type_spec(&ty.0)?
            .and_then(|spec| spec.super_type.clone())
            .map(SimType))
    }

    fn find_type(&mut self, name: &str) -> RuntimeResult<SimType> {
        self.guard()?;
        if self.types.contains_key(name) || is_builtin(name) {
            Ok(SimType(name.to_string()))
        } else {
            Err(self.fail(format!("java.lang.NoClassDefFoundError: {}", name)))
        }
    }

    fn declared_methods(&mut self, ty: &SimType) -> RuntimeResult<Vec<SimMember>> {
        self.guard()?;
        self.stats.enumerations += 1;
        let count = self.type_spec(&ty.0)?.map_or(0, |spec| spec.methods.len());
        Ok((0..count)
            .map(|index| SimMember {
                ty: ty.0.clone(),
                index,
            })
            .collect())
    }

    fn method_name(&mut self, member: &SimMember) -> RuntimeResult<String> {
        self.guard()?;
        Ok(self.method_spec(&member.ty, member.index)?.name.clone())
    }

    fn method_param_types(&mut self, member: &SimMember) -> RuntimeResult<Vec<SimType>> {
        self.guard()?;
        let spec = self.method_spec(&member.ty, member.index)?;
        Ok(spec.params.iter().cloned().map(SimType).collect())
    }

    fn method_return_type(&mut self, member: &SimMember) -> RuntimeResult<SimType> {
        self.guard()?;
        Ok(SimType(self.method_spec(&member.ty, member.index)?.returns.clone()))
    }

    fn method_declaring_type(&mut self, member: &SimMember) -> RuntimeResult<SimType> {
        self.guard()?;
        Ok(SimType(member.ty.clone()))
    }

    fn declared_fields(&mut self, ty: &SimType) -> RuntimeResult<Vec<SimFieldRef>> {
        self.guard()?;
        self.stats.enumerations += 1;
        let count = self.type_spec(&ty.0)?.map_or(0, |spec| spec.fields.len());
        Ok((0..count)
            .map(|index| SimFieldRef {
                ty: ty.0.clone(),
                index,
            })
            .collect())
    }

    fn field_name(&mut self, field: &SimFieldRef) -> RuntimeResult<String> {
        self.guard()?;
        Ok(self.field_spec(&field.ty, field.index)?.name.clone())
    }

    fn field_type(&mut self, field: &SimFieldRef) -> RuntimeResult<SimType> {
        self.guard()?;
        Ok(SimType(self.field_spec(&field.ty, field.index)?.type_name.clone()))
    }

    fn field_declaring_type(&mut self, field: &SimFieldRef) -> RuntimeResult<SimType> {
        self.guard()?;
        Ok(SimType(field.ty.clone()))
    }

    fn resolve_instance_method(&mut self, ty: &SimType, name: &str, signature: &str) -> RuntimeResult<SimMethod> {
        self.resolve_method(ty, name, signature, false)
    }

    fn resolve_static_method(&mut self, ty: &SimType, name: &str, signature: &str) -> RuntimeResult<SimMethod> {
        self.resolve_method(ty, name, signature, true)
    }

    fn resolve_instance_field(&mut self, ty: &SimType, name: &str, signature: &str) -> RuntimeResult<SimField> {
        self.resolve_field(ty, name, signature, false)
    }

    fn resolve_static_field(&mut self, ty: &SimType, name: &str, signature: &str) -> RuntimeResult<SimField> {
        self.resolve_field(ty, name, signature, true)
    }

    fn invoke(
        &mut self,
        method: &SimMethod,
        _class: &SimType,
        receiver: Option<&SimObject>,
        kind: &ReturnKind,
        args: &[NativeValue<SimObject>],
    ) -> RuntimeResult<NativeValue<SimObject>> {
        self.guard()?;
        self.stats.invocations += 1;

        let spec = self.method_spec(&method.ty, method.index)?.clone();
        let receiver = match (method.is_static, receiver) {
            (true, _) => None,
            (false, Some(object)) => {
                self.object(object)?;
                Some(*object)
            }
            (false, None) => return Err(self.fail("java.lang.NullPointerException".to_string())),
        };
        if args.len() != spec.params.len() {
            return Err(self.fail(format!(
                "java.lang.IllegalArgumentException: {} expects {} arguments",
                spec.name,
                spec.params.len()
            )));
        }

        let value = match &spec.body {
            Body::Void => NativeValue::Void,
            Body::Const { value } => self.to_native(value, &spec.returns)?,
            Body::Field { name } => {
                let stored = match receiver {
                    Some(object) => self.instance_value(&object, name)?,
                    None => self.static_value(&method.ty, name),
                };
                self.to_native(&stored, &spec.returns)?
            }
            Body::Increment { field } | Body::Touch { field } => {
                let Some(object) = receiver else {
                    return Err(self.fail("java.lang.IllegalStateException: static increment".to_string()));
                };
                let next = self.instance_value(&object, field)?.as_i64().unwrap_or(0) + 1;
                if let Some(state) = self.objects.get_mut(&object.0) {
                    state.fields.insert(field.clone(), Value::from(next));
                }
                if matches!(spec.body, Body::Touch { .. }) {
                    NativeValue::Object(object)
                } else {
                    self.to_native(&Value::from(next), &spec.returns)?
                }
            }
            Body::Arg { index } => match args.get(*index) {
                Some(arg) => arg.clone(),
                None => {
                    return Err(self.fail(format!(
                        "java.lang.ArrayIndexOutOfBoundsException: {}",
                        index
                    )))
                }
            },
            Body::Length { field } | Body::IsEmpty { field } => {
                let text = match receiver {
                    Some(object) => self.instance_value(&object, field)?,
                    None => Value::Null,
                };
                let Some(text) = text.as_str() else {
                    return Err(self.fail("java.lang.NullPointerException".to_string()));
                };
                let length = text.encode_utf16().count();
                let result = if matches!(spec.body, Body::IsEmpty { .. }) {
                    Value::Bool(length == 0)
                } else {
                    Value::from(length)
                };
                self.to_native(&result, &spec.returns)?
            }
            Body::Fault { message } => return Err(self.fail(message.clone())),
        };

        self.check_fits(value, kind)
    }

    fn read_field(
        &mut self,
        field: &SimField,
        _class: &SimType,
        receiver: Option<&SimObject>,
        kind: &ReturnKind,
    ) -> RuntimeResult<NativeValue<SimObject>> {
        self.guard()?;
        self.stats.field_reads += 1;

        let spec = self.field_spec(&field.ty, field.index)?.clone();
        let stored = if field.is_static {
            spec.value.clone()
        } else {
            match receiver {
                Some(object) => self.instance_value(object, &spec.name)?,
                None => return Err(self.fail("java.lang.NullPointerException".to_string())),
            }
        };
        let value = self.to_native(&stored, &spec.type_name)?;
        self.check_fits(value, kind)
    }

    fn stringify(&mut self, object: &SimObject) -> RuntimeResult<String> {
        self.guard()?;
        let state = self.object(object)?;
        // A toString override that throws surfaces as a fault
        let thrown = self.lineage(&state.type_name).into_iter().find_map(|spec| {
            spec.methods
                .iter()
                .find(|m| m.name == "toString" && m.params.is_empty() && !m.is_static)
                .map(|m| match &m.body {
                    Body::Fault { message } => Some(message.clone()),
                    _ => None,
                })
        });
        let text = state
            .display
            .clone()
            .unwrap_or_else(|| format!("{}@{:x}", state.type_name, object.0));
        match thrown {
            Some(Some(message)) => Err(self.fail(message)),
            _ => Ok(text),
        }
    }

    fn pin(&mut self, object: &SimObject) -> RuntimeResult<SimObject> {
        self.guard()?;
        self.object(object)?;
        self.stats.pins += 1;
        Ok(*object)
    }

    fn release(&mut self, _object: SimObject) {
        self.stats.releases += 1;
    }

    fn has_pending_fault(&mut self) -> bool {
        self.fault.is_some()
    }

    fn take_fault(&mut self) -> Option<String> {
        self.fault.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn runtime() -> SimRuntime {
        SimRuntime::from_value(json!({
            "types": [
                { "name": "app.Counter",
                  "methods": [
                    { "name": "next", "returns": "int", "body": { "kind": "increment", "field": "count" } },
                    { "name": "boom", "returns": "int", "body": { "kind": "fault", "message": "java.lang.IllegalStateException: boom" } }
                  ],
                  "fields": [ { "name": "count", "type": "int", "value": 0 } ] }
            ],
            "objects": [ { "id": 1, "type": "app.Counter" } ],
            "roots": { "counter": 1 }
        }))
        .unwrap()
    }

    #[test]
    fn test_resolve_and_invoke() {
        let mut rt = runtime();
        let ty = SimType::named("app.Counter");
        let next = rt.resolve_instance_method(&ty, "next", "()I").unwrap();
        let counter = rt.root("counter").unwrap();
        let v = rt.invoke(&next, &ty, Some(&counter), &ReturnKind::Int, &[]).unwrap();
        assert_eq!(v, NativeValue::Int(1));
        assert_eq!(rt.field_value(counter, "count"), Some(&json!(1)));
        assert_eq!(rt.stats().invocations, 1);
    }

    #[test]
    fn test_failed_resolution_leaves_fault() {
        let mut rt = runtime();
        let ty = SimType::named("app.Counter");
        assert!(rt.resolve_static_method(&ty, "next", "()I").is_err());
        assert!(rt.has_pending_fault());

        // Everything but the fault primitives is refused until cleared
        assert!(matches!(rt.type_name(&ty), Err(RuntimeError::FaultPending)));
        assert_eq!(rt.stats().calls_while_faulted, 1);

        assert_eq!(rt.take_fault().as_deref(), Some("java.lang.NoSuchMethodError: next"));
        assert!(rt.type_name(&ty).is_ok());
    }

    #[test]
    fn test_fault_body() {
        let mut rt = runtime();
        let ty = SimType::named("app.Counter");
        let boom = rt.resolve_instance_method(&ty, "boom", "()I").unwrap();
        let counter = rt.root("counter").unwrap();
        let err = rt.invoke(&boom, &ty, Some(&counter), &ReturnKind::Int, &[]).unwrap_err();
        assert!(err.is_fault());
        assert!(rt.take_fault().unwrap().contains("boom"));
    }

    #[test]
    fn test_invalid_graphs() {
        assert!(matches!(
            SimRuntime::from_value(json!({ "objects": [ { "id": 1, "type": "x.Missing" } ] })),
            Err(SimError::Invalid(_))
        ));
        assert!(matches!(
            SimRuntime::from_value(json!({ "roots": { "r": 5 } })),
            Err(SimError::Invalid(_))
        ));
        assert!(matches!(
            SimRuntime::from_value(json!({
                "types": [ { "name": "a.A", "fields": [ { "name": "f", "type": "a.A", "value": { "ref": 9 } } ] } ]
            })),
            Err(SimError::Invalid(_))
        ));
        assert!(matches!(SimRuntime::from_json_str("{"), Err(SimError::Json(_))));
    }

    #[test]
    fn test_text_behind_object_type_is_boxed() {
        let mut rt = SimRuntime::from_value(json!({
            "types": [
                { "name": "app.Box",
                  "methods": [
                    { "name": "get", "returns": "java.lang.Object", "body": { "kind": "const", "value": "abc" } }
                  ] }
            ],
            "objects": [ { "id": 4, "type": "app.Box" } ],
            "roots": { "box": 4 }
        }))
        .unwrap();
        let ty = SimType::named("app.Box");
        let get = rt.resolve_instance_method(&ty, "get", "()Ljava/lang/Object;").unwrap();
        let kind = ReturnKind::Object("java.lang.Object".to_string());
        let first = rt.invoke(&get, &ty, Some(&SimObject(4)), &kind, &[]).unwrap();
        let NativeValue::Object(text) = first else {
            panic!("expected a string object, got {:?}", first);
        };
        assert_eq!(text, SimObject(5));
        assert_eq!(rt.type_of(&text).unwrap().name(), "java.lang.String");
        assert_eq!(rt.stringify(&text).unwrap(), "abc");

        // Same text, same object
        let again = rt.invoke(&get, &ty, Some(&SimObject(4)), &kind, &[]).unwrap();
        assert_eq!(again, NativeValue::Object(text));

        let string_ty = SimType::named("java.lang.String");
        let length = rt.resolve_instance_method(&string_ty, "length", "()I").unwrap();
        let n = rt.invoke(&length, &string_ty, Some(&text), &ReturnKind::Int, &[]).unwrap();
        assert_eq!(n, NativeValue::Int(3));
    }

    #[test]
    fn test_stringify_default() {
        let mut rt = runtime();
        assert_eq!(rt.stringify(&SimObject(1)).unwrap(), "app.Counter@1");
    }
}
