//! Named access to the engine workspace.

use std::sync::Arc;

use log::debug;

use crate::codec::{to_engine_value, to_host_value};
use crate::error::{MatcallError, Result};
use crate::function::MatFunction;
use crate::host::HostValue;
use crate::session::Session;

const UNDEFINED_FUNCTION: &str = "MATLAB:UndefinedFunction";

/// Engine workspace seen from the host.
///
/// Reading a name tries the workspace variables first and then the engine's
/// callables, so `workspace.get("sqrt")` yields a [`MatFunction`].
#[derive(Debug, Clone)]
pub struct Workspace {
    session: Arc<Session>,
}

impl Workspace {
    pub fn new(session: Arc<Session>) -> Self {
        Workspace { session }
    }

    pub fn get(&self, name: &str) -> Result<HostValue> {
        match self.session.workspace_get(name) {
            Ok(Some(value)) => return to_host_value(&self.session, value),
            Ok(None) => {}
            Err(err) if is_unknown_name(&err) => {
                debug!("Workspace lookup of {name} failed: {err}")
            }
            Err(err) => return Err(err),
        }
        match MatFunction::new(&self.session, name, -1) {
            Ok(function) => Ok(HostValue::Function(function)),
            Err(err) if is_unknown_name(&err) => {
                debug!("{name} is not a callable either: {err}");
                Err(MatcallError::Unresolved {
                    name: name.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    }

    pub fn set(&self, name: &str, value: impl Into<HostValue>) -> Result<()> {
        let value = to_engine_value(&self.session, &value.into())?;
        self.session.workspace_set(name, value)
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        self.session.workspace_contains(name)
    }
}

fn is_unknown_name(err: &MatcallError) -> bool {
    match err {
        MatcallError::NameNotFound { .. } => true,
        MatcallError::Engine(err) => err.identifier() == Some(UNDEFINED_FUNCTION),
        _ => false,
    }
}
