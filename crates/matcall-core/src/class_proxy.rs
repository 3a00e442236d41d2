//! Proxies for engine class instances whose shape is discovered at runtime.
//!
//! The first time a class is seen its properties and methods are queried and
//! recorded in a [`ClassDescriptor`]; every later instance of that class
//! reuses the descriptor from the process-wide registry.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use log::debug;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;

use crate::codec::{table_from_columns, to_engine_value, to_host_value};
use crate::error::{MatcallError, Result};
use crate::function::MatFunction;
use crate::host::{float_literal, HostValue};
use crate::session::Session;
use crate::value::{Callee, EngineValue, ObjectHandle};

/// Engine operator methods and the host names they are exposed under.
pub const OPERATOR_TABLE: &[(&str, &[&str])] = &[
    ("plus", &["add", "radd"]),
    ("minus", &["sub", "rsub"]),
    ("times", &["mul", "rmul"]),
    ("rdivide", &["truediv"]),
    ("uminus", &["neg"]),
    ("eq", &["eq"]),
    ("gt", &["gt"]),
    ("ge", &["ge"]),
    ("lt", &["lt"]),
    ("le", &["le"]),
    ("ne", &["ne"]),
    ("power", &["pow"]),
    ("char", &["to_text"]),
    ("double", &["to_float", "double"]),
    ("and", &["and"]),
    ("or", &["or"]),
    ("not", &["not"]),
];

/// Host names under which an engine method is reachable.
pub fn host_method_names(engine_name: &str) -> Vec<&str> {
    OPERATOR_TABLE
        .iter()
        .find(|(name, _)| *name == engine_name)
        .map(|(_, hosts)| hosts.to_vec())
        .unwrap_or_else(|| vec![engine_name])
}

/// Introspected shape of one engine class.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    engine_name: String,
    flat_name: String,
    properties: IndexSet<String>,
    /// host name -> engine method name
    methods: IndexMap<String, String>,
}

impl ClassDescriptor {
    fn introspect(session: &Session, engine_name: &str) -> Result<Self> {
        let properties = session.property_names(engine_name)?.into_iter().collect();
        let mut methods = IndexMap::new();
        for engine_method in session.method_names(engine_name)? {
            for host in host_method_names(&engine_method) {
                methods.insert(host.to_string(), engine_method.clone());
            }
        }
        Ok(ClassDescriptor {
            engine_name: engine_name.to_string(),
            flat_name: flatten_class_name(engine_name),
            properties,
            methods,
        })
    }

    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    pub fn flat_name(&self) -> &str {
        &self.flat_name
    }

    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(String::as_str)
    }

    /// Host-visible method names.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains(name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Engine method behind a host method name.
    pub fn engine_method(&self, host_name: &str) -> Option<&str> {
        self.methods.get(host_name).map(String::as_str)
    }
}

/// `pkg.sub.Name` -> `pkg_sub_Name`
pub fn flatten_class_name(engine_name: &str) -> String {
    engine_name.replace('.', "_")
}

static CLASS_REGISTRY: Lazy<RwLock<HashMap<String, Arc<ClassDescriptor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);

/// Longest identifier the engine accepts (`namelengthmax`).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Workspace symbol for instance `id`, with the class prefix cut to fit
/// [`MAX_IDENTIFIER_LEN`].
fn workspace_symbol(flat_name: &str, id: u64) -> String {
    let suffix = format!("_{id:x}");
    let budget = MAX_IDENTIFIER_LEN.saturating_sub(suffix.len());
    let prefix: String = flat_name.chars().take(budget).collect();
    format!("{prefix}{suffix}")
}

/// Forget every introspected class, e.g. after restarting the engine.
pub fn clear_class_registry() {
    CLASS_REGISTRY.write().clear();
}

/// Flattened names of the classes introspected so far.
pub fn registered_classes() -> Vec<String> {
    let mut names: Vec<String> = CLASS_REGISTRY.read().keys().cloned().collect();
    names.sort();
    names
}

fn descriptor_for(session: &Session, engine_name: &str) -> Result<Arc<ClassDescriptor>> {
    let flat_name = flatten_class_name(engine_name);
    if let Some(found) = CLASS_REGISTRY.read().get(&flat_name) {
        return Ok(Arc::clone(found));
    }
    debug!("Introspecting engine class {engine_name}");
    let descriptor = Arc::new(ClassDescriptor::introspect(session, engine_name)?);
    let mut registry = CLASS_REGISTRY.write();
    Ok(Arc::clone(registry.entry(flat_name).or_insert(descriptor)))
}

/// Turn an engine object handle into the matching host value.
///
/// Function handles become [`MatFunction`]s and tables become
/// [`crate::DataTable`]s; every other class gets a [`MatObject`] proxy.
pub fn resolve_handle(session: &Arc<Session>, handle: ObjectHandle) -> Result<HostValue> {
    let class_name = session.class_of(&handle)?;
    match class_name.as_str() {
        "function_handle" => Ok(HostValue::Function(MatFunction::from_handle(session, handle, -1)?)),
        "table" => {
            let columns = session.table_to_record(&EngineValue::Handle(handle), true)?;
            Ok(HostValue::Table(table_from_columns(session, columns)?))
        }
        _ => {
            let descriptor = descriptor_for(session, &class_name)?;
            Ok(HostValue::Object(MatObject::new(session, descriptor, handle)))
        }
    }
}

/// Proxy for one engine class instance.
///
/// Clones refer to the same instance and share its workspace symbol.
#[derive(Clone)]
pub struct MatObject {
    inner: Arc<ObjectInner>,
}

struct ObjectInner {
    session: Arc<Session>,
    descriptor: Arc<ClassDescriptor>,
    handle: ObjectHandle,
    symbol: OnceCell<String>,
}

/// Result of a dynamic attribute lookup on a [`MatObject`].
#[derive(Debug, Clone)]
pub enum Attribute {
    Value(HostValue),
    Method(BoundMethod),
}

impl MatObject {
    fn new(session: &Arc<Session>, descriptor: Arc<ClassDescriptor>, handle: ObjectHandle) -> Self {
        MatObject {
            inner: Arc::new(ObjectInner {
                session: Arc::clone(session),
                descriptor,
                handle,
                symbol: OnceCell::new(),
            }),
        }
    }

    pub fn descriptor(&self) -> &ClassDescriptor {
        &self.inner.descriptor
    }

    pub fn class_name(&self) -> &str {
        self.inner.descriptor.engine_name()
    }

    pub fn handle(&self) -> ObjectHandle {
        self.inner.handle
    }

    /// Workspace symbol, if one has been allocated.
    pub fn symbol(&self) -> Option<&str> {
        self.inner.symbol.get().map(String::as_str)
    }

    /// Store the instance in the engine workspace under a fresh symbol.
    /// Runs at most once per instance.
    pub fn bind(&self) -> Result<&str> {
        self.inner
            .symbol
            .get_or_try_init(|| {
                let id = NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed);
                let symbol = workspace_symbol(self.inner.descriptor.flat_name(), id);
                self.inner
                    .session
                    .workspace_set(&symbol, EngineValue::Handle(self.inner.handle))?;
                debug!("Bound {} instance to {symbol}", self.class_name());
                Ok::<_, MatcallError>(symbol)
            })
            .map(String::as_str)
    }

    fn check_property(&self, name: &str) -> Result<()> {
        if self.inner.descriptor.has_property(name) {
            Ok(())
        } else {
            Err(self.attribute_not_found(name))
        }
    }

    fn attribute_not_found(&self, name: &str) -> MatcallError {
        MatcallError::AttributeNotFound {
            class_name: self.class_name().to_string(),
            name: name.to_string(),
        }
    }

    /// Read a property.
    pub fn get(&self, property: &str) -> Result<HostValue> {
        self.check_property(property)?;
        if self.inner.descriptor.has_method("get") {
            return self.call("get", &[HostValue::from(property)]);
        }
        let symbol = self.bind()?;
        let outputs = self
            .inner
            .session
            .evaluate(&format!("{symbol}.{property}"), 1)?;
        to_host_value(&self.inner.session, EngineValue::from_outputs(outputs))
    }

    /// Assign a property.
    ///
    /// Without a `set` method only values with an inline literal form can be
    /// assigned: booleans, numbers, strings and one-dimensional arrays.
    pub fn set(&self, name: &str, value: impl Into<HostValue>) -> Result<()> {
        if self.inner.descriptor.has_method(name) {
            return Err(MatcallError::ImmutableMethod {
                class_name: self.class_name().to_string(),
                method: name.to_string(),
            });
        }
        self.check_property(name)?;
        let value = value.into();
        if self.inner.descriptor.has_method("set") {
            self.call_with_nargout("set", &[HostValue::from(name), value], 0)?;
            return Ok(());
        }
        let literal = property_literal(&value).ok_or_else(|| {
            MatcallError::UnsupportedPropertyAssignment {
                class_name: self.class_name().to_string(),
                property: name.to_string(),
            }
        })?;
        let symbol = self.bind()?;
        self.inner
            .session
            .evaluate(&format!("{symbol}.{name}={literal};"), 0)?;
        Ok(())
    }

    pub fn method(&self, name: &str) -> Result<BoundMethod> {
        let engine_name = self
            .inner
            .descriptor
            .engine_method(name)
            .ok_or_else(|| self.attribute_not_found(name))?;
        Ok(BoundMethod {
            object: self.clone(),
            engine_name: engine_name.to_string(),
        })
    }

    /// Call a method with one output.
    pub fn call(&self, method: &str, args: &[HostValue]) -> Result<HostValue> {
        self.call_with_nargout(method, args, 1)
    }

    pub fn call_with_nargout(&self, method: &str, args: &[HostValue], nargout: usize) -> Result<HostValue> {
        self.method(method)?.call_with_nargout(args, nargout)
    }

    /// Look up a name the way attribute access does: methods first, then properties.
    pub fn attr(&self, name: &str) -> Result<Attribute> {
        if self.inner.descriptor.has_method(name) {
            return self.method(name).map(Attribute::Method);
        }
        self.get(name).map(Attribute::Value)
    }
}

/// Inline engine literal for a property value.
fn property_literal(value: &HostValue) -> Option<String> {
    match value {
        HostValue::Bool(b) => Some(b.to_string()),
        HostValue::Int(i) => Some(i.to_string()),
        HostValue::Float(x) => Some(float_literal(*x)),
        HostValue::Str(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        HostValue::Array(array) => array.literal(),
        _ => None,
    }
}

impl fmt::Display for MatObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> object at 0x{:x}", self.class_name(), self.inner.handle.id)
    }
}

impl fmt::Debug for MatObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatObject")
            .field("class", &self.class_name())
            .field("handle", &self.inner.handle)
            .field("symbol", &self.symbol())
            .finish()
    }
}

impl PartialEq for MatObject {
    fn eq(&self, other: &Self) -> bool {
        self.inner.handle == other.inner.handle
    }
}

/// A method of one instance, called as `method(instance, args...)`.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    object: MatObject,
    engine_name: String,
}

impl BoundMethod {
    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    pub fn call(&self, args: &[HostValue]) -> Result<HostValue> {
        self.call_with_nargout(args, 1)
    }

    pub fn call_with_nargout(&self, args: &[HostValue], nargout: usize) -> Result<HostValue> {
        let session = &self.object.inner.session;
        let mut engine_args = Vec::with_capacity(args.len() + 1);
        engine_args.push(EngineValue::Handle(self.object.inner.handle));
        for arg in args {
            engine_args.push(to_engine_value(session, arg)?);
        }
        let outputs = session.call(&Callee::name(self.engine_name.as_str()), &engine_args, nargout)?;
        to_host_value(session, EngineValue::from_outputs(outputs))
    }
}

macro_rules! operator_impl {
    ($trait:ident, $method:ident, $host:literal) => {
        impl<T: Into<HostValue>> $trait<T> for &MatObject {
            type Output = Result<HostValue>;

            fn $method(self, rhs: T) -> Self::Output {
                self.call($host, &[rhs.into()])
            }
        }
    };
}

operator_impl!(Add, add, "add");
operator_impl!(Sub, sub, "sub");
operator_impl!(Mul, mul, "mul");
operator_impl!(Div, div, "truediv");

impl Neg for &MatObject {
    type Output = Result<HostValue>;

    fn neg(self) -> Self::Output {
        self.call("neg", &[])
    }
}
