//! The single serialized channel to an engine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::engine::{Engine, EngineResult};
use crate::error::{MatcallError, Result};
use crate::evaluator;
use crate::function::MatFunction;
use crate::host::HostValue;
use crate::text::remove_html;
use crate::value::{Callee, EngineValue, ObjectHandle, StructValue};
use crate::workspace::Workspace;

/// Environment variable holding extra search paths added on start.
pub const SEARCH_PATH_ENV: &str = "MATLABPATH";

/// Owner of the engine connection.
///
/// Every engine request takes the lock for exactly one round trip, so
/// proxies on different threads may share a session freely.
pub struct Session {
    engine: Mutex<Box<dyn Engine>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(engine: impl Engine + 'static) -> Arc<Self> {
        Arc::new(Session {
            engine: Mutex::new(Box::new(engine)),
        })
    }

    /// Create a session and register startup search paths: `search_paths`
    /// followed by the entries of `MATLABPATH`. Missing directories are skipped.
    pub fn start(
        engine: impl Engine + 'static,
        search_paths: &[PathBuf],
        recursive: bool,
    ) -> Result<Arc<Self>> {
        let session = Session::new(engine);
        let mut paths: IndexSet<PathBuf> = search_paths.iter().cloned().collect();
        if let Some(env_paths) = std::env::var_os(SEARCH_PATH_ENV) {
            paths.extend(std::env::split_paths(&env_paths).filter(|p| !p.as_os_str().is_empty()));
        }
        for path in &paths {
            if !path.exists() {
                warn!("Skipping missing search path {}", path.display());
                continue;
            }
            session.addpath(path, recursive)?;
        }
        info!("Engine session ready ({} startup search paths)", paths.len());
        Ok(session)
    }

    fn with_engine<T>(&self, request: impl FnOnce(&mut dyn Engine) -> EngineResult<T>) -> Result<T> {
        let mut engine = self.engine.lock();
        request(engine.as_mut()).map_err(MatcallError::from)
    }

    pub fn evaluate(&self, code: &str, nargout: usize) -> Result<Vec<EngineValue>> {
        self.with_engine(|e| e.evaluate(code, nargout))
    }

    pub fn call(&self, callee: &Callee, args: &[EngineValue], nargout: usize) -> Result<Vec<EngineValue>> {
        self.with_engine(|e| e.call(callee, args, nargout))
    }

    pub fn eval_to_text(&self, code: &str) -> Result<String> {
        self.with_engine(|e| e.eval_to_text(code))
    }

    pub fn add_search_path(&self, path: &Path) -> Result<()> {
        self.with_engine(|e| e.add_search_path(path))
    }

    pub fn declared_arity(&self, name: &str) -> Result<i32> {
        self.with_engine(|e| e.declared_arity(name))
    }

    pub fn canonical_text(&self, handle: &ObjectHandle) -> Result<String> {
        self.with_engine(|e| e.canonical_text(handle))
    }

    pub fn property_names(&self, class_name: &str) -> Result<Vec<String>> {
        self.with_engine(|e| e.property_names(class_name))
    }

    pub fn method_names(&self, class_name: &str) -> Result<Vec<String>> {
        self.with_engine(|e| e.method_names(class_name))
    }

    pub fn table_to_record(&self, table: &EngineValue, to_scalar: bool) -> Result<StructValue> {
        self.with_engine(|e| e.table_to_record(table, to_scalar))
    }

    pub fn record_to_table(&self, record: StructValue) -> Result<EngineValue> {
        self.with_engine(|e| e.record_to_table(record))
    }

    pub fn workspace_get(&self, name: &str) -> Result<Option<EngineValue>> {
        self.with_engine(|e| e.workspace_get(name))
    }

    pub fn workspace_set(&self, name: &str, value: EngineValue) -> Result<()> {
        self.with_engine(|e| e.workspace_set(name, value))
    }

    pub fn workspace_contains(&self, name: &str) -> Result<bool> {
        self.with_engine(|e| e.workspace_contains(name))
    }

    /// Evaluate with one output and return it.
    pub fn evaluate_one(&self, code: &str) -> Result<EngineValue> {
        self.evaluate(code, 1).map(EngineValue::from_outputs)
    }

    /// Call a function by name with one output and return it.
    pub fn call_one(&self, name: &str, args: &[EngineValue]) -> Result<EngineValue> {
        self.call(&Callee::name(name), args, 1)
            .map(EngineValue::from_outputs)
    }

    /// Engine class name of an object (`class(obj)`).
    pub fn class_of(&self, handle: &ObjectHandle) -> Result<String> {
        match self.call_one("class", &[EngineValue::Handle(*handle)])? {
            EngineValue::Str(name) => Ok(name),
            other => Err(MatcallError::unexpected("a class name", other)),
        }
    }

    /// Result of `exist(name)`; zero means the engine does not know the name.
    pub fn exist(&self, name: &str) -> Result<i32> {
        let reply = self.call_one("exist", &[EngineValue::from(name)])?;
        reply
            .as_f64()
            .map(|code| code as i32)
            .ok_or_else(|| MatcallError::unexpected("a numeric exist code", reply))
    }

    /// Evaluate an expression, inferring the output count when `nargout` is negative.
    pub fn eval(self: &Arc<Self>, input: &str, nargout: i32) -> Result<HostValue> {
        evaluator::eval(self, input, nargout)
    }

    /// Build a function proxy from a function name or from the path of a `.m` file.
    ///
    /// For a file, its directory is added to the search path first (recursively
    /// when asked) and the file stem becomes the function name.
    pub fn translate(self: &Arc<Self>, target: &str, nargout: i32, recursive: bool) -> Result<MatFunction> {
        let path = Path::new(target);
        let is_script = path.exists() && path.extension().is_some_and(|ext| ext == "m");
        let name = if is_script {
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            };
            self.addpath(&dir, recursive)?;
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .ok_or_else(|| MatcallError::NameNotFound {
                    name: target.to_string(),
                })?
        } else {
            if recursive {
                warn!("'recursive' does nothing when a function name is given ({target})");
            }
            target.to_string()
        };
        MatFunction::new(self, &name, nargout)
    }

    /// Add a directory to the engine search path.
    ///
    /// With `recursive`, every directory under `path` (itself included) that
    /// directly holds a `.m` file is added instead. Returns the directories added.
    pub fn addpath(&self, path: impl AsRef<Path>, recursive: bool) -> Result<Vec<PathBuf>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MatcallError::PathNotFound(path.to_path_buf()));
        }
        let dirs = if recursive {
            directories_with_sources(path)?
        } else {
            vec![path.to_path_buf()]
        };
        for dir in &dirs {
            self.add_search_path(dir)?;
            debug!("Added search path {}", dir.display());
        }
        Ok(dirs)
    }

    /// Evaluate code for its console output.
    ///
    /// Returns `None` when the code ends with `;`, like the engine prompt does.
    pub fn run(&self, code: &str) -> Result<Option<String>> {
        let text = self.eval_to_text(code)?;
        if code.trim_end().ends_with(';') {
            Ok(None)
        } else {
            Ok(Some(remove_html(&text)))
        }
    }

    pub fn workspace(self: &Arc<Self>) -> Workspace {
        Workspace::new(Arc::clone(self))
    }
}

fn directories_with_sources(root: &Path) -> Result<Vec<PathBuf>> {
    let scan_error = |reason: String| MatcallError::PathScan {
        path: root.to_path_buf(),
        reason,
    };
    let pattern = format!("{}/**/*.m", glob::Pattern::escape(&root.to_string_lossy()));
    let entries = glob::glob(&pattern).map_err(|e| scan_error(e.to_string()))?;

    let mut dirs = IndexSet::new();
    for entry in entries {
        let file = entry.map_err(|e| scan_error(e.to_string()))?;
        if let Some(parent) = file.parent() {
            dirs.insert(parent.to_path_buf());
        }
    }
    Ok(dirs.into_iter().collect())
}
