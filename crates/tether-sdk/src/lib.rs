//! Tether SDK - foreign runtime interface
//!
//! This crate provides the minimal types and traits a managed runtime needs to
//! implement to be driven by the tether engine, without depending on the
//! engine itself.
//!
//! # Example
//!
//! ```ignore
//! use tether_sdk::{ForeignRuntime, NativeValue, ReturnKind};
//!
//! fn call_zero_arg<R: ForeignRuntime>(
//!     rt: &mut R,
//!     method: &R::Method,
//!     class: &R::Type,
//!     receiver: &R::Object,
//! ) -> Option<i32> {
//!     match rt.invoke(method, class, Some(receiver), &ReturnKind::Int, &[]) {
//!         Ok(NativeValue::Int(i)) => Some(i),
//!         _ => {
//!             rt.take_fault();
//!             None
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod kind;
pub mod runtime;
pub mod value;

pub use error::{RuntimeError, RuntimeResult};
pub use kind::ReturnKind;
pub use runtime::ForeignRuntime;
pub use value::NativeValue;
