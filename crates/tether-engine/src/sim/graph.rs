//! JSON description of a simulated object graph
//!
//! ```json
//! {
//!   "types": [
//!     { "name": "app.Player", "super": "app.Entity",
//!       "methods": [
//!         { "name": "getName", "returns": "java.lang.String",
//!           "body": { "kind": "field", "name": "name" } }
//!       ],
//!       "fields": [ { "name": "name", "type": "java.lang.String" } ] }
//!   ],
//!   "objects": [
//!     { "id": 1, "type": "app.Player", "fields": { "name": "Alice" } }
//!   ],
//!   "roots": { "player": 1 }
//! }
//! ```
//!
//! Object references inside values are written `{ "ref": <id> }`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

/// Whole graph
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphSpec {
    /// Declared types
    #[serde(default)]
    pub types: Vec<TypeSpec>,
    /// Live objects
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    /// Named entry points: name -> object id
    #[serde(default)]
    pub roots: BTreeMap<String, u64>,
}

/// One declared type
#[derive(Debug, Clone, Deserialize)]
pub struct TypeSpec {
    /// Fully qualified name
    pub name: String,
    /// Direct supertype
    #[serde(rename = "super", default)]
    pub super_type: Option<String>,
    /// Declared methods
    #[serde(default)]
    pub methods: Vec<MethodSpec>,
    /// Declared fields
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

/// One declared method
#[derive(Debug, Clone, Deserialize)]
pub struct MethodSpec {
    /// Method name
    pub name: String,
    /// Parameter type names
    #[serde(default)]
    pub params: Vec<String>,
    /// Return type name
    #[serde(default = "default_returns")]
    pub returns: String,
    /// Type-level method
    #[serde(default, rename = "static")]
    pub is_static: bool,
    /// Enumerated but never resolvable
    #[serde(default)]
    pub hidden: bool,
    /// What the method does when invoked
    #[serde(default)]
    pub body: Body,
}

/// One declared field
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSpec {
    /// Field name
    pub name: String,
    /// Field type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Type-level field
    #[serde(default, rename = "static")]
    pub is_static: bool,
    /// Static value, or the default for instances that do not set it
    #[serde(default)]
    pub value: Value,
}

/// One live object
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectSpec {
    /// Object id, referenced as `{ "ref": id }`
    pub id: u64,
    /// Concrete type
    #[serde(rename = "type")]
    pub type_name: String,
    /// Instance field values
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    /// Default string conversion
    #[serde(default)]
    pub display: Option<String>,
}

/// Method behavior
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Body {
    /// Return nothing
    #[default]
    Void,
    /// Return a constant
    Const {
        /// The constant
        value: Value,
    },
    /// Return a field of the receiver (or a static field for static methods)
    Field {
        /// Field name
        name: String,
    },
    /// Add one to an int field of the receiver and return the new value
    Increment {
        /// Field name
        field: String,
    },
    /// Add one to an int field of the receiver and return the receiver
    Touch {
        /// Field name
        field: String,
    },
    /// Return the argument at `index`
    Arg {
        /// Argument position
        index: usize,
    },
    /// Return the length of a string field of the receiver, in UTF-16 units
    Length {
        /// Field name
        field: String,
    },
    /// Return whether a string field of the receiver is empty
    IsEmpty {
        /// Field name
        field: String,
    },
    /// Raise a fault
    Fault {
        /// Fault description
        message: String,
    },
}

fn default_returns() -> String {
    "void".to_string()
}

/// Object id inside a `{ "ref": id }` value
pub fn ref_id(value: &Value) -> Option<u64> {
    value.as_object()?.get("ref")?.as_u64()
}
