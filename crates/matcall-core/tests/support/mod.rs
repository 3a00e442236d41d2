#![allow(dead_code)]

//! Scripted in-memory engine for integration tests.
//!
//! It understands just enough of the engine language to drive the proxies:
//! `@name`, `x = <literal or call>`, `sym.prop`, `sym.prop=<literal>;`,
//! `lhs == <literal>`, `name(args)` and bare variable names.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use matcall_core::{
    ArrayData, Callee, Engine, EngineArray, EngineError, EngineResult, EngineValue,
    ObjectHandle, Session, StructValue,
};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub enum Object {
    Function { text: String },
    Instance {
        class: String,
        props: IndexMap<String, EngineValue>,
    },
    Table(StructValue),
}

#[derive(Debug, Clone, Default)]
pub struct ClassDef {
    pub properties: Vec<(String, EngineValue)>,
    pub methods: Vec<String>,
}

#[derive(Debug, Default)]
pub struct State {
    pub workspace: IndexMap<String, EngineValue>,
    pub objects: HashMap<u64, Object>,
    pub classes: HashMap<String, ClassDef>,
    pub search_paths: Vec<PathBuf>,
    pub evaluated: Vec<String>,
    pub workspace_sets: usize,
    pub introspections: usize,
    pub help_requests: usize,
    next_handle: u64,
}

/// Builtins and their declared output counts.
const FUNCTIONS: &[(&str, i32)] = &[
    ("class", 1),
    ("exist", 1),
    ("sqrt", 1),
    ("identity", 1),
    ("swap", 2),
    ("disp", 0),
    ("varargout_fn", -1),
];

fn undefined(name: &str) -> EngineError {
    EngineError::new(format!("Error: Undefined function or variable '{name}'."))
        .with_identifier("MATLAB:UndefinedFunction")
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn numeric(value: &EngineValue) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

/// Split an argument list on top-level commas.
fn split_args(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = text[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

pub fn parse_literal(text: &str) -> Option<EngineValue> {
    let text = text.trim();
    match text {
        "true" => return Some(EngineValue::Bool(true)),
        "false" => return Some(EngineValue::Bool(false)),
        _ => {}
    }
    if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Some(EngineValue::Str(inner.replace("''", "'")));
    }
    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        let items = split_args(inner);
        if !items.is_empty() && items.iter().all(|i| *i == "true" || *i == "false") {
            let flags: Vec<bool> = items.iter().map(|i| *i == "true").collect();
            let n = flags.len();
            return EngineArray::new_2d(ArrayData::Logical(flags), 1, n)
                .ok()
                .map(EngineValue::Array);
        }
        let values: Option<Vec<f64>> = items.iter().map(|i| i.parse().ok()).collect();
        return values.map(|v| EngineValue::Array(EngineArray::row(v)));
    }
    text.parse::<f64>().ok().map(EngineValue::Num)
}

impl State {
    fn alloc(&mut self, object: Object) -> EngineValue {
        self.next_handle += 1;
        let id = self.next_handle;
        self.objects.insert(id, object);
        EngineValue::Handle(ObjectHandle::new(id))
    }

    fn object(&self, value: &EngineValue) -> EngineResult<&Object> {
        match value {
            EngineValue::Handle(h) => self
                .objects
                .get(&h.id)
                .ok_or_else(|| EngineError::new("Error: Invalid or deleted object.")),
            other => Err(EngineError::new(format!("Error: Expected an object, got {other}."))),
        }
    }

    fn instance_props(&mut self, value: &EngineValue) -> EngineResult<(String, &mut IndexMap<String, EngineValue>)> {
        let EngineValue::Handle(h) = value else {
            return Err(EngineError::new("Error: Expected an object."));
        };
        match self.objects.get_mut(&h.id) {
            Some(Object::Instance { class, props }) => Ok((class.clone(), props)),
            _ => Err(EngineError::new("Error: Not a class instance.")),
        }
    }

    fn source_file(&self, name: &str) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .map(|dir| dir.join(format!("{name}.m")))
            .find(|file| file.is_file())
    }

    fn knows(&self, name: &str) -> bool {
        FUNCTIONS.iter().any(|(f, _)| *f == name)
            || self.classes.contains_key(name)
            || self.source_file(name).is_some()
    }

    fn declared(&self, name: &str) -> EngineResult<i32> {
        if let Some((_, n)) = FUNCTIONS.iter().find(|(f, _)| *f == name) {
            return Ok(*n);
        }
        if self.knows(name) {
            return Ok(1);
        }
        Err(undefined(name))
    }

    fn class_name(&self, value: &EngineValue) -> String {
        match value {
            EngineValue::Handle(_) => match self.object(value) {
                Ok(Object::Function { .. }) => "function_handle".to_string(),
                Ok(Object::Table(_)) => "table".to_string(),
                Ok(Object::Instance { class, .. }) => class.clone(),
                Err(_) => "handle".to_string(),
            },
            EngineValue::Bool(_) => "logical".to_string(),
            EngineValue::Str(_) => "char".to_string(),
            EngineValue::Array(a) => a.kind().class_name().to_string(),
            EngineValue::Cell(_) => "cell".to_string(),
            EngineValue::Struct(_) => "struct".to_string(),
            _ => "double".to_string(),
        }
    }

    fn resolve_arg(&self, text: &str) -> EngineResult<EngineValue> {
        if let Some(value) = parse_literal(text) {
            return Ok(value);
        }
        self.workspace.get(text).cloned().ok_or_else(|| undefined(text))
    }

    fn dispatch(&mut self, name: &str, args: &[EngineValue]) -> EngineResult<Vec<EngineValue>> {
        let first = args.first().cloned().unwrap_or(EngineValue::Empty);
        match name {
            "class" => return Ok(vec![EngineValue::Str(self.class_name(&first))]),
            "exist" => {
                let target = first.as_str().unwrap_or_default();
                let code = if self.workspace.contains_key(target) {
                    1.0
                } else if self.knows(target) {
                    2.0
                } else {
                    0.0
                };
                return Ok(vec![EngineValue::Num(code)]);
            }
            "sqrt" => return Ok(vec![EngineValue::Num(numeric(&first).sqrt())]),
            "identity" => return Ok(vec![first]),
            "swap" => {
                let second = args.get(1).cloned().unwrap_or(EngineValue::Empty);
                return Ok(vec![second, first]);
            }
            "disp" => return Ok(vec![]),
            "varargout_fn" => return Ok(vec![EngineValue::Num(1.0)]),
            _ => {}
        }
        if let Some(def) = self.classes.get(name).cloned() {
            let mut props: IndexMap<String, EngineValue> = def.properties.into_iter().collect();
            if let (Some(arg), Some(slot)) = (args.first(), props.values_mut().next()) {
                *slot = arg.clone();
            }
            return Ok(vec![self.alloc(Object::Instance {
                class: name.to_string(),
                props,
            })]);
        }
        let is_method = match self.object(&first) {
            Ok(Object::Instance { class, .. }) => self
                .classes
                .get(class)
                .is_some_and(|c| c.methods.iter().any(|m| m == name)),
            _ => false,
        };
        if is_method {
            return self.invoke_method(&first, name, &args[1..]);
        }
        if self.source_file(name).is_some() {
            return Ok(vec![EngineValue::Str(format!("{name} ran"))]);
        }
        Err(undefined(name))
    }

    fn invoke_method(
        &mut self,
        target: &EngineValue,
        method: &str,
        rest: &[EngineValue],
    ) -> EngineResult<Vec<EngineValue>> {
        let (class, props) = self.instance_props(target)?;
        let arg = rest.first().map(numeric).unwrap_or(0.0);
        let value = props.get("value").map(numeric).unwrap_or(0.0);
        let out = match method {
            "get" => {
                let key = rest.first().and_then(EngineValue::as_str).unwrap_or_default();
                props.get(key).cloned().unwrap_or(EngineValue::Empty)
            }
            "set" => {
                let key = rest.first().and_then(EngineValue::as_str).unwrap_or_default();
                let new = rest.get(1).cloned().unwrap_or(EngineValue::Empty);
                props.insert(key.to_string(), new);
                return Ok(vec![]);
            }
            "plus" => EngineValue::Num(value + arg),
            "minus" => EngineValue::Num(value - arg),
            "times" => EngineValue::Num(value * arg),
            "rdivide" => EngineValue::Num(value / arg),
            "uminus" => EngineValue::Num(-value),
            "double" => EngineValue::Num(value),
            "char" => EngineValue::Str(format!("{class}({value})")),
            other => EngineValue::Str(format!("{class}.{other}")),
        };
        Ok(vec![out])
    }

    fn eval(&mut self, code: &str) -> EngineResult<Vec<EngineValue>> {
        let code = code.trim();
        self.evaluated.push(code.to_string());

        if let Some(rest) = code.strip_prefix('@') {
            if is_identifier(rest) {
                if !self.knows(rest) {
                    return Err(undefined(rest));
                }
                return Ok(vec![self.alloc(Object::Function {
                    text: rest.to_string(),
                })]);
            }
            return Ok(vec![self.alloc(Object::Function {
                text: code.to_string(),
            })]);
        }

        if let Some((lhs, rhs)) = code.split_once("==") {
            let left = self.resolve_arg(lhs.trim())?;
            let right = self.resolve_arg(rhs.trim())?;
            return Ok(vec![EngineValue::Bool(numeric(&left) == numeric(&right))]);
        }

        let statement = code.strip_suffix(';').unwrap_or(code);
        if let Some((lhs, rhs)) = statement.split_once('=') {
            let value = match parse_literal(rhs) {
                Some(value) => value,
                None => self
                    .eval(rhs)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| EngineError::new("Error: Right-hand side has no value."))?,
            };
            let lhs = lhs.trim();
            if let Some((sym, prop)) = lhs.split_once('.') {
                let target = self.workspace.get(sym).cloned().ok_or_else(|| undefined(sym))?;
                let (_, props) = self.instance_props(&target)?;
                props.insert(prop.to_string(), value);
            } else {
                self.workspace.insert(lhs.to_string(), value);
            }
            return Ok(vec![]);
        }

        if let Some((name, rest)) = statement.split_once('(') {
            let inner = rest.strip_suffix(')').unwrap_or(rest);
            let args = split_args(inner)
                .into_iter()
                .map(|a| self.resolve_arg(a))
                .collect::<EngineResult<Vec<_>>>()?;
            return self.dispatch(name.trim(), &args);
        }

        if let Some(value) = parse_literal(statement) {
            return Ok(vec![value]);
        }

        if let Some((sym, prop)) = statement.split_once('.') {
            let target = self.workspace.get(sym).cloned().ok_or_else(|| undefined(sym))?;
            let (class, props) = self.instance_props(&target)?;
            return props.get(prop).cloned().map(|v| vec![v]).ok_or_else(|| {
                EngineError::new(format!("Error: Unrecognized property '{prop}' for class '{class}'."))
            });
        }

        self.resolve_arg(statement).map(|v| vec![v])
    }
}

fn select_outputs(mut outputs: Vec<EngineValue>, nargout: usize) -> EngineResult<Vec<EngineValue>> {
    if outputs.len() < nargout {
        return Err(EngineError::new("Error: Too many output arguments.")
            .with_identifier("MATLAB:TooManyOutputs"));
    }
    outputs.truncate(nargout);
    Ok(outputs)
}

#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<State>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class; the first property receives the constructor argument.
    pub fn with_class(self, name: &str, properties: &[(&str, EngineValue)], methods: &[&str]) -> Self {
        self.state.lock().classes.insert(
            name.to_string(),
            ClassDef {
                properties: properties
                    .iter()
                    .map(|(n, v)| (n.to_string(), v.clone()))
                    .collect(),
                methods: methods.iter().map(|m| m.to_string()).collect(),
            },
        );
        self
    }

    pub fn state(&self) -> Arc<Mutex<State>> {
        Arc::clone(&self.state)
    }

    /// Wrap in a session and keep a handle on the engine state.
    pub fn into_session(self) -> (Arc<Session>, Arc<Mutex<State>>) {
        let state = self.state();
        (Session::new(self), state)
    }
}

pub fn session() -> (Arc<Session>, Arc<Mutex<State>>) {
    FakeEngine::new().into_session()
}

impl Engine for FakeEngine {
    fn evaluate(&mut self, code: &str, nargout: usize) -> EngineResult<Vec<EngineValue>> {
        let outputs = self.state.lock().eval(code)?;
        select_outputs(outputs, nargout)
    }

    fn call(&mut self, callee: &Callee, args: &[EngineValue], nargout: usize) -> EngineResult<Vec<EngineValue>> {
        let mut state = self.state.lock();
        let outputs = match callee {
            Callee::Name(name) => state.dispatch(name, args)?,
            Callee::Handle(handle) => {
                let text = match state.objects.get(&handle.id) {
                    Some(Object::Function { text }) => text.clone(),
                    _ => return Err(EngineError::new("Error: Not a function handle.")),
                };
                if is_identifier(&text) {
                    state.dispatch(&text, args)?
                } else {
                    // anonymous functions act as identity
                    args.first().cloned().into_iter().collect()
                }
            }
        };
        select_outputs(outputs, nargout)
    }

    fn eval_to_text(&mut self, code: &str) -> EngineResult<String> {
        let mut state = self.state.lock();
        if let Some(name) = code.strip_prefix("help ") {
            state.help_requests += 1;
            return Ok(if state.knows(name) {
                format!(
                    " {name}  Scripted documentation.\n    See also <a href=\"matlab:help disp\">disp</a>, identity.\n"
                )
            } else {
                format!("{name} not found.\n")
            });
        }
        let outputs = state.eval(code)?;
        let statement = code.trim().trim_end_matches(';');
        match statement.split_once('=') {
            Some((lhs, _)) if !statement.contains("==") => {
                let lhs = lhs.trim();
                let shown = state.workspace.get(lhs).map(|v| v.to_string()).unwrap_or_default();
                Ok(format!("{lhs} =\n\n    {shown}\n"))
            }
            _ => Ok(outputs
                .first()
                .map(|v| format!("ans =\n\n    {v}\n"))
                .unwrap_or_default()),
        }
    }

    fn add_search_path(&mut self, path: &Path) -> EngineResult<()> {
        self.state.lock().search_paths.push(path.to_path_buf());
        Ok(())
    }

    fn declared_arity(&mut self, name: &str) -> EngineResult<i32> {
        self.state.lock().declared(name)
    }

    fn canonical_text(&mut self, handle: &ObjectHandle) -> EngineResult<String> {
        match self.state.lock().objects.get(&handle.id) {
            Some(Object::Function { text }) => Ok(text.clone()),
            _ => Err(EngineError::new("Error: Not a function handle.")),
        }
    }

    fn property_names(&mut self, class_name: &str) -> EngineResult<Vec<String>> {
        let mut state = self.state.lock();
        state.introspections += 1;
        state
            .classes
            .get(class_name)
            .map(|c| c.properties.iter().map(|(n, _)| n.clone()).collect())
            .ok_or_else(|| undefined(class_name))
    }

    fn method_names(&mut self, class_name: &str) -> EngineResult<Vec<String>> {
        self.state
            .lock()
            .classes
            .get(class_name)
            .map(|c| c.methods.clone())
            .ok_or_else(|| undefined(class_name))
    }

    fn table_to_record(&mut self, table: &EngineValue, _to_scalar: bool) -> EngineResult<StructValue> {
        match self.state.lock().object(table)? {
            Object::Table(columns) => Ok(columns.clone()),
            _ => Err(EngineError::new("Error: Not a table.")),
        }
    }

    fn record_to_table(&mut self, record: StructValue) -> EngineResult<EngineValue> {
        Ok(self.state.lock().alloc(Object::Table(record)))
    }

    fn workspace_get(&mut self, name: &str) -> EngineResult<Option<EngineValue>> {
        Ok(self.state.lock().workspace.get(name).cloned())
    }

    fn workspace_set(&mut self, name: &str, value: EngineValue) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.workspace_sets += 1;
        state.workspace.insert(name.to_string(), value);
        Ok(())
    }

    fn workspace_contains(&mut self, name: &str) -> EngineResult<bool> {
        Ok(self.state.lock().workspace.contains_key(name))
    }
}

/// Engine whose connection is gone: every request fails the way a broken
/// transport reports it.
pub struct DeadEngine;

pub const TRANSPORT_ID: &str = "matcall:transport";

fn connection_lost<T>() -> EngineResult<T> {
    Err(EngineError::new("Protocol error: engine closed the connection").with_identifier(TRANSPORT_ID))
}

impl Engine for DeadEngine {
    fn evaluate(&mut self, _code: &str, _nargout: usize) -> EngineResult<Vec<EngineValue>> {
        connection_lost()
    }

    fn call(&mut self, _callee: &Callee, _args: &[EngineValue], _nargout: usize) -> EngineResult<Vec<EngineValue>> {
        connection_lost()
    }

    fn eval_to_text(&mut self, _code: &str) -> EngineResult<String> {
        connection_lost()
    }

    fn add_search_path(&mut self, _path: &Path) -> EngineResult<()> {
        connection_lost()
    }

    fn declared_arity(&mut self, _name: &str) -> EngineResult<i32> {
        connection_lost()
    }

    fn canonical_text(&mut self, _handle: &ObjectHandle) -> EngineResult<String> {
        connection_lost()
    }

    fn property_names(&mut self, _class_name: &str) -> EngineResult<Vec<String>> {
        connection_lost()
    }

    fn method_names(&mut self, _class_name: &str) -> EngineResult<Vec<String>> {
        connection_lost()
    }

    fn table_to_record(&mut self, _table: &EngineValue, _to_scalar: bool) -> EngineResult<StructValue> {
        connection_lost()
    }

    fn record_to_table(&mut self, _record: StructValue) -> EngineResult<EngineValue> {
        connection_lost()
    }

    fn workspace_get(&mut self, _name: &str) -> EngineResult<Option<EngineValue>> {
        connection_lost()
    }

    fn workspace_set(&mut self, _name: &str, _value: EngineValue) -> EngineResult<()> {
        connection_lost()
    }

    fn workspace_contains(&mut self, _name: &str) -> EngineResult<bool> {
        connection_lost()
    }
}
