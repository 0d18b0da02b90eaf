//! Tether engine
//!
//! Evaluates dotted call chains such as `player.getStats().getLevel()`
//! against a live managed runtime through a reflection-driven cache.
//!
//! # Architecture
//!
//! ```text
//! Instruction text → Parser → Chain interpreter → Reply
//!                                  │
//!                     Reflection cache (type.member → overloads)
//!                                  │
//!                         ForeignRuntime (JNI, sim)
//! ```
//!
//! - [`signature`] - type descriptors and signature tokens
//! - [`instruction`] - instruction grammar
//! - [`discovery`] / [`cache`] - member discovery and the two-level cache
//! - [`Engine`] - one runtime connection with its roots
//! - [`Bridge`] / [`transport`] - worker thread and line protocol
//! - [`sim`] - in-memory runtime for tests and offline use

#![warn(missing_docs)]

pub mod bridge;
pub mod cache;
pub mod config;
pub mod convert;
pub mod discovery;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod instruction;
mod interp;
pub mod reply;
pub mod roots;
pub mod signature;
pub mod sim;
pub mod transport;

pub use bridge::{Bridge, BridgeHandle, Evaluator, PONG};
pub use cache::{Binding, FieldEntry, MethodEntry, ReflectionCache};
pub use config::{BridgeConfig, ConfigError, DiscoveryConfig, LogConfig, RootSpec, TransportConfig, CONFIG_ENV};
pub use convert::{Converted, NULL_TEXT, VOID_TEXT};
pub use discovery::{discover_type, DiscoveryOptions, DiscoveryReport};
pub use dispatch::{Dispatcher, Pending, Submitter, TaskQueue};
pub use engine::Engine;
pub use error::{BridgeError, BridgeResult};
pub use instruction::{Hop, HopKind, Instruction, Literal, ParseError};
pub use reply::Reply;
pub use roots::{RootHandle, RootTable};
pub use signature::DescriptorError;
pub use sim::{SimError, SimRuntime, SimStats};
pub use transport::{Client, Frame, Server, TransportError};

// Re-export the runtime interface so hosts need only one dependency
pub use tether_sdk::{ForeignRuntime, NativeValue, ReturnKind, RuntimeError, RuntimeResult};
