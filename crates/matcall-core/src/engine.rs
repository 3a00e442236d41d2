//! Contract of the engine process this crate talks to.

use std::path::Path;

use crate::error::EngineError;
use crate::value::{Callee, EngineValue, ObjectHandle, StructValue};

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// A live engine session.
///
/// Implementations are driven from one thread at a time: [`crate::Session`]
/// holds a lock around every request. Calls that produce values return one
/// [`EngineValue`] per requested output, so `nargout == 0` yields an empty
/// vector.
pub trait Engine: Send {
    /// Evaluate an expression or statement.
    fn evaluate(&mut self, code: &str, nargout: usize) -> EngineResult<Vec<EngineValue>>;

    /// Call a named function or a function handle (`feval`).
    fn call(
        &mut self,
        callee: &Callee,
        args: &[EngineValue],
        nargout: usize,
    ) -> EngineResult<Vec<EngineValue>>;

    /// Evaluate and capture the console text instead of values (`evalc`).
    fn eval_to_text(&mut self, code: &str) -> EngineResult<String>;

    fn add_search_path(&mut self, path: &Path) -> EngineResult<()>;

    /// Declared output count of a function; negative means variable.
    fn declared_arity(&mut self, name: &str) -> EngineResult<i32>;

    /// Source text of a function handle (`func2str`).
    fn canonical_text(&mut self, handle: &ObjectHandle) -> EngineResult<String>;

    fn property_names(&mut self, class_name: &str) -> EngineResult<Vec<String>>;

    fn method_names(&mut self, class_name: &str) -> EngineResult<Vec<String>>;

    /// Convert an engine table to a struct of columns.
    fn table_to_record(&mut self, table: &EngineValue, to_scalar: bool)
        -> EngineResult<StructValue>;

    /// Convert a struct of Nx1 columns to an engine table.
    fn record_to_table(&mut self, record: StructValue) -> EngineResult<EngineValue>;

    fn workspace_get(&mut self, name: &str) -> EngineResult<Option<EngineValue>>;

    fn workspace_set(&mut self, name: &str, value: EngineValue) -> EngineResult<()>;

    fn workspace_contains(&mut self, name: &str) -> EngineResult<bool>;
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn evaluate(&mut self, code: &str, nargout: usize) -> EngineResult<Vec<EngineValue>> {
        (**self).evaluate(code, nargout)
    }

    fn call(
        &mut self,
        callee: &Callee,
        args: &[EngineValue],
        nargout: usize,
    ) -> EngineResult<Vec<EngineValue>> {
        (**self).call(callee, args, nargout)
    }

    fn eval_to_text(&mut self, code: &str) -> EngineResult<String> {
        (**self).eval_to_text(code)
    }

    fn add_search_path(&mut self, path: &Path) -> EngineResult<()> {
        (**self).add_search_path(path)
    }

    fn declared_arity(&mut self, name: &str) -> EngineResult<i32> {
        (**self).declared_arity(name)
    }

    fn canonical_text(&mut self, handle: &ObjectHandle) -> EngineResult<String> {
        (**self).canonical_text(handle)
    }

    fn property_names(&mut self, class_name: &str) -> EngineResult<Vec<String>> {
        (**self).property_names(class_name)
    }

    fn method_names(&mut self, class_name: &str) -> EngineResult<Vec<String>> {
        (**self).method_names(class_name)
    }

    fn table_to_record(
        &mut self,
        table: &EngineValue,
        to_scalar: bool,
    ) -> EngineResult<StructValue> {
        (**self).table_to_record(table, to_scalar)
    }

    fn record_to_table(&mut self, record: StructValue) -> EngineResult<EngineValue> {
        (**self).record_to_table(record)
    }

    fn workspace_get(&mut self, name: &str) -> EngineResult<Option<EngineValue>> {
        (**self).workspace_get(name)
    }

    fn workspace_set(&mut self, name: &str, value: EngineValue) -> EngineResult<()> {
        (**self).workspace_set(name, value)
    }

    fn workspace_contains(&mut self, name: &str) -> EngineResult<bool> {
        (**self).workspace_contains(name)
    }
}
