//! Host-side proxy for an engine callable.

use std::fmt;
use std::sync::Arc;

use log::debug;
use once_cell::sync::OnceCell;

use crate::codec::{to_engine_value, to_host_value};
use crate::error::{MatcallError, Result};
use crate::host::HostValue;
use crate::session::Session;
use crate::text::remove_html;
use crate::value::{Callee, EngineValue, ObjectHandle};

/// An engine function, anonymous function or class constructor.
///
/// Clones share the same handle and documentation cache.
#[derive(Clone)]
pub struct MatFunction {
    inner: Arc<FunctionInner>,
}

struct FunctionInner {
    session: Arc<Session>,
    handle: ObjectHandle,
    name: String,
    nargout: usize,
    doc: OnceCell<String>,
}

impl MatFunction {
    /// Resolve a function by name, or build an anonymous function from `@...` text.
    ///
    /// A negative `nargout` asks the engine for the declared output count.
    pub fn new(session: &Arc<Session>, name: &str, nargout: i32) -> Result<Self> {
        let handle = if name.starts_with('@') {
            evaluate_handle(session, name)?
        } else {
            if session.exist(name)? == 0 {
                return Err(MatcallError::NameNotFound {
                    name: name.to_string(),
                });
            }
            evaluate_handle(session, &format!("@{name}"))?
        };
        Self::build(session, handle, name.to_string(), nargout)
    }

    /// Wrap an existing function handle returned by the engine.
    pub fn from_handle(session: &Arc<Session>, handle: ObjectHandle, nargout: i32) -> Result<Self> {
        let name = session.canonical_text(&handle)?;
        Self::build(session, handle, name, nargout)
    }

    fn build(session: &Arc<Session>, handle: ObjectHandle, name: String, nargout: i32) -> Result<Self> {
        let nargout = resolve_nargout(session, &name, nargout)?;
        debug!("Function {name} resolved with nargout={nargout}");
        Ok(MatFunction {
            inner: Arc::new(FunctionInner {
                session: Arc::clone(session),
                handle,
                name,
                nargout,
                doc: OnceCell::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Name without the leading `@` of anonymous functions.
    pub fn short_name(&self) -> &str {
        self.inner.name.trim_start_matches('@')
    }

    pub fn nargout(&self) -> usize {
        self.inner.nargout
    }

    pub fn handle(&self) -> ObjectHandle {
        self.inner.handle
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    pub fn call(&self, args: &[HostValue]) -> Result<HostValue> {
        let session = &self.inner.session;
        let args = args
            .iter()
            .map(|arg| to_engine_value(session, arg))
            .collect::<Result<Vec<_>>>()?;
        let outputs = session.call(&Callee::Handle(self.inner.handle), &args, self.inner.nargout)?;
        to_host_value(session, EngineValue::from_outputs(outputs))
    }

    /// Help text from the engine with hyperlink markup removed. Fetched once.
    pub fn doc(&self) -> Result<&str> {
        self.inner
            .doc
            .get_or_try_init(|| {
                let text = self.inner.session.eval_to_text(&format!("help {}", self.inner.name))?;
                Ok::<_, MatcallError>(remove_html(&text))
            })
            .map(String::as_str)
    }
}

fn evaluate_handle(session: &Session, code: &str) -> Result<ObjectHandle> {
    match session.evaluate_one(code)? {
        EngineValue::Handle(handle) => Ok(handle),
        other => Err(MatcallError::unexpected("a function handle", other)),
    }
}

fn resolve_nargout(session: &Session, name: &str, nargout: i32) -> Result<usize> {
    if nargout >= 0 {
        return Ok(nargout as usize);
    }
    if name.starts_with('@') {
        return Ok(1);
    }
    let declared = session.declared_arity(name)?;
    Ok(if declared < 0 { 1 } else { declared as usize })
}

impl fmt::Display for MatFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MatFunction<{}>", self.inner.name)
    }
}

impl fmt::Debug for MatFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatFunction")
            .field("name", &self.inner.name)
            .field("handle", &self.inner.handle)
            .field("nargout", &self.inner.nargout)
            .finish()
    }
}

impl PartialEq for MatFunction {
    fn eq(&self, other: &Self) -> bool {
        self.inner.handle == other.inner.handle && self.inner.name == other.inner.name
    }
}
