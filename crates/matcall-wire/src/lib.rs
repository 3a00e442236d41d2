//! Line-delimited JSON transport to an engine process.
//!
//! [`StdioEngine`] spawns the engine bridge and implements
//! [`matcall_core::Engine`] on top of [`protocol`].

pub mod client;
pub mod protocol;

pub use client::{StdioEngine, WireEngine, SHUTDOWN_GRACE};
pub use protocol::{Operation, Outcome, Request, Response};

use matcall_core::EngineError;
use thiserror::Error;

/// Identifier attached to engine errors caused by the channel rather than the engine.
pub const TRANSPORT_IDENTIFIER: &str = "matcall:transport";

#[derive(Error, Debug)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Engine(EngineError),
}
