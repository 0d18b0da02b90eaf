//! ForeignRuntime trait - abstract introspection and invocation
//!
//! Defines the interface a managed runtime must provide to the bridge. The
//! engine programs against this trait only; it never sees JNI types or the
//! simulated runtime's internals.
//!
//! # Faults
//!
//! Any call may leave a fault pending (an exception, in JVM terms). While a
//! fault is pending the runtime's behavior for every call except
//! [`has_pending_fault`](ForeignRuntime::has_pending_fault) and
//! [`take_fault`](ForeignRuntime::take_fault) is undefined, so callers must
//! clear it first.
//!
//! # Lifetimes
//!
//! `Type` references returned by the runtime stay valid until dropped.
//! `Object` references are only guaranteed valid for the current call chain;
//! [`pin`](ForeignRuntime::pin) promotes one to a process-lifetime reference
//! that stays valid until [`release`](ForeignRuntime::release).

use std::fmt;

use crate::error::RuntimeResult;
use crate::kind::ReturnKind;
use crate::value::NativeValue;

/// Introspection and invocation services of a foreign managed runtime.
pub trait ForeignRuntime {
    /// Reference to a runtime type (a `Class` in JVM terms)
    type Type: Clone + fmt::Debug;
    /// Reference to a declared method, as returned by enumeration
    type Member;
    /// Reference to a declared field, as returned by enumeration
    type FieldRef;
    /// Resolved, invocable method handle; not bound to any receiver
    type Method: Clone + fmt::Debug;
    /// Resolved, readable field handle; not bound to any receiver
    type Field: Clone + fmt::Debug;
    /// Reference to a runtime object
    type Object: Clone + fmt::Debug;

    // ========================================================================
    // Types
    // ========================================================================

    /// Get the actual (most derived) type of an object
    fn type_of(&mut self, object: &Self::Object) -> RuntimeResult<Self::Type>;

    /// Get a type's fully qualified name in host form (`com.example.Foo`)
    fn type_name(&mut self, ty: &Self::Type) -> RuntimeResult<String>;

    /// Get a type's direct supertype, `None` at the root of the hierarchy
    fn super_type(&mut self, ty: &Self::Type) -> RuntimeResult<Option<Self::Type>>;

    /// Look a type up by fully qualified name
    fn find_type(&mut self, name: &str) -> RuntimeResult<Self::Type>;

    // ========================================================================
    // Method enumeration
    // ========================================================================

    /// Enumerate the methods declared directly on a type
    fn declared_methods(&mut self, ty: &Self::Type) -> RuntimeResult<Vec<Self::Member>>;

    /// Name of a declared method
    fn method_name(&mut self, member: &Self::Member) -> RuntimeResult<String>;

    /// Parameter types of a declared method, in order
    fn method_param_types(&mut self, member: &Self::Member) -> RuntimeResult<Vec<Self::Type>>;

    /// Return type of a declared method
    fn method_return_type(&mut self, member: &Self::Member) -> RuntimeResult<Self::Type>;

    /// Type that declares the method
    fn method_declaring_type(&mut self, member: &Self::Member) -> RuntimeResult<Self::Type>;

    // ========================================================================
    // Field enumeration
    // ========================================================================

    /// Enumerate the fields declared directly on a type
    fn declared_fields(&mut self, ty: &Self::Type) -> RuntimeResult<Vec<Self::FieldRef>>;

    /// Name of a declared field
    fn field_name(&mut self, field: &Self::FieldRef) -> RuntimeResult<String>;

    /// Type of a declared field
    fn field_type(&mut self, field: &Self::FieldRef) -> RuntimeResult<Self::Type>;

    /// Type that declares the field
    fn field_declaring_type(&mut self, field: &Self::FieldRef) -> RuntimeResult<Self::Type>;

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolve an instance method by name and full signature (`(I)Ljava/lang/String;`)
    fn resolve_instance_method(
        &mut self,
        ty: &Self::Type,
        name: &str,
        signature: &str,
    ) -> RuntimeResult<Self::Method>;

    /// Resolve a static method by name and full signature
    fn resolve_static_method(
        &mut self,
        ty: &Self::Type,
        name: &str,
        signature: &str,
    ) -> RuntimeResult<Self::Method>;

    /// Resolve an instance field by name and type token
    fn resolve_instance_field(
        &mut self,
        ty: &Self::Type,
        name: &str,
        signature: &str,
    ) -> RuntimeResult<Self::Field>;

    /// Resolve a static field by name and type token
    fn resolve_static_field(
        &mut self,
        ty: &Self::Type,
        name: &str,
        signature: &str,
    ) -> RuntimeResult<Self::Field>;

    // ========================================================================
    // Invocation
    // ========================================================================

    /// Invoke a resolved method.
    ///
    /// `class` is the type the handle was resolved against. `receiver` is
    /// required for instance methods and ignored for static ones. `kind`
    /// selects the call variant and the shape of the returned value.
    fn invoke(
        &mut self,
        method: &Self::Method,
        class: &Self::Type,
        receiver: Option<&Self::Object>,
        kind: &ReturnKind,
        args: &[NativeValue<Self::Object>],
    ) -> RuntimeResult<NativeValue<Self::Object>>;

    /// Read a resolved field
    fn read_field(
        &mut self,
        field: &Self::Field,
        class: &Self::Type,
        receiver: Option<&Self::Object>,
        kind: &ReturnKind,
    ) -> RuntimeResult<NativeValue<Self::Object>>;

    /// Default string conversion of an object (`String.valueOf` in JVM terms)
    fn stringify(&mut self, object: &Self::Object) -> RuntimeResult<String>;

    // ========================================================================
    // Reference lifetime
    // ========================================================================

    /// Promote an object reference to a process-lifetime reference
    fn pin(&mut self, object: &Self::Object) -> RuntimeResult<Self::Object>;

    /// Release a reference obtained from [`pin`](ForeignRuntime::pin)
    fn release(&mut self, object: Self::Object);

    // ========================================================================
    // Faults
    // ========================================================================

    /// Check whether a fault is pending
    fn has_pending_fault(&mut self) -> bool;

    /// Capture and clear the pending fault, returning its description.
    ///
    /// Returns `None` when no fault was pending. After this call the runtime
    /// accepts further calls again.
    fn take_fault(&mut self) -> Option<String>;
}
