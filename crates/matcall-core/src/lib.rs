//! Call MATLAB-engine functions and classes from Rust.
//!
//! A [`Session`] owns the connection to an [`Engine`]. Host values are
//! converted with [`codec`], engine functions are wrapped in [`MatFunction`],
//! and engine class instances come back as [`MatObject`] proxies whose
//! properties and methods are discovered at runtime.

pub mod class_proxy;
pub mod codec;
pub mod dtype;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod host;
pub mod mat_struct;
pub mod session;
pub mod text;
pub mod value;
pub mod workspace;

pub use class_proxy::{clear_class_registry, Attribute, BoundMethod, ClassDescriptor, MatObject};
pub use codec::{to_engine_value, to_host_value};
pub use dtype::{DType, ElementKind};
pub use engine::{Engine, EngineResult};
pub use error::{EngineError, MatcallError, Result};
pub use evaluator::ArityHint;
pub use function::MatFunction;
pub use host::{Column, DataTable, HostArray, HostValue};
pub use mat_struct::MatStruct;
pub use session::Session;
pub use value::{ArrayData, CellArray, Callee, EngineArray, EngineValue, ObjectHandle, StructValue};
pub use workspace::Workspace;
