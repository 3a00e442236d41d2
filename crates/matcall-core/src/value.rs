//! Engine-side value model.
//!
//! Everything here mirrors what travels to and from the engine session:
//! primitives, column-major numeric arrays, cells, structs, and opaque
//! handles to engine objects.

use std::fmt;

use indexmap::IndexMap;
use num_complex::{Complex32, Complex64};
use serde::{Deserialize, Serialize};

use crate::dtype::ElementKind;
use crate::error::{MatcallError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EngineValue {
    /// No value (zero outputs, or an empty result).
    Empty,
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
    Array(EngineArray),
    Cell(CellArray),
    Struct(StructValue),
    /// Several outputs of one multi-output call.
    Tuple(Vec<EngineValue>),
    /// Reference to an engine object; its class is only known after introspection.
    Handle(ObjectHandle),
    /// Payload the transport could not classify; forwarded untouched.
    Raw(serde_json::Value),
}

impl EngineValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            EngineValue::Empty => "empty",
            EngineValue::Bool(_) => "logical",
            EngineValue::Int(_) => "int",
            EngineValue::Num(_) => "double",
            EngineValue::Str(_) => "char",
            EngineValue::Array(_) => "array",
            EngineValue::Cell(_) => "cell",
            EngineValue::Struct(_) => "struct",
            EngineValue::Tuple(_) => "tuple",
            EngineValue::Handle(_) => "object",
            EngineValue::Raw(_) => "raw",
        }
    }

    /// Gather the outputs of one engine request into a single value.
    pub fn from_outputs(mut outputs: Vec<EngineValue>) -> EngineValue {
        match outputs.len() {
            0 => EngineValue::Empty,
            1 => outputs.remove(0),
            _ => EngineValue::Tuple(outputs),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EngineValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric reading used for engine replies such as `exist` and `nargout`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EngineValue::Num(n) => Some(*n),
            EngineValue::Int(i) => Some(*i as f64),
            EngineValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            EngineValue::Array(arr) if arr.numel() == 1 => arr.element_f64(0),
            _ => None,
        }
    }
}

impl From<bool> for EngineValue {
    fn from(b: bool) -> Self {
        EngineValue::Bool(b)
    }
}

impl From<i64> for EngineValue {
    fn from(i: i64) -> Self {
        EngineValue::Int(i)
    }
}

impl From<f64> for EngineValue {
    fn from(f: f64) -> Self {
        EngineValue::Num(f)
    }
}

impl From<&str> for EngineValue {
    fn from(s: &str) -> Self {
        EngineValue::Str(s.to_string())
    }
}

impl From<String> for EngineValue {
    fn from(s: String) -> Self {
        EngineValue::Str(s)
    }
}

impl From<EngineArray> for EngineValue {
    fn from(a: EngineArray) -> Self {
        EngineValue::Array(a)
    }
}

impl From<StructValue> for EngineValue {
    fn from(s: StructValue) -> Self {
        EngineValue::Struct(s)
    }
}

impl From<ObjectHandle> for EngineValue {
    fn from(h: ObjectHandle) -> Self {
        EngineValue::Handle(h)
    }
}

/// Opaque reference to an object living in the engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHandle {
    pub id: u64,
}

impl ObjectHandle {
    pub fn new(id: u64) -> Self {
        Self { id }
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<object 0x{:x}>", self.id)
    }
}

/// Target of an engine function call: a function name or a function handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Callee {
    Name(String),
    Handle(ObjectHandle),
}

impl Callee {
    pub fn name(name: impl Into<String>) -> Self {
        Callee::Name(name.into())
    }
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Name(name) => f.write_str(name),
            Callee::Handle(handle) => write!(f, "{handle}"),
        }
    }
}

/// Typed element storage of an engine array, column-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", content = "data", rename_all = "snake_case")]
pub enum ArrayData {
    Logical(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Single(Vec<f32>),
    Double(Vec<f64>),
    ComplexSingle(Vec<Complex32>),
    ComplexDouble(Vec<Complex64>),
}

macro_rules! with_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::Logical($v) => $body,
            ArrayData::Int8($v) => $body,
            ArrayData::Int16($v) => $body,
            ArrayData::Int32($v) => $body,
            ArrayData::Int64($v) => $body,
            ArrayData::UInt8($v) => $body,
            ArrayData::UInt16($v) => $body,
            ArrayData::UInt32($v) => $body,
            ArrayData::UInt64($v) => $body,
            ArrayData::Single($v) => $body,
            ArrayData::Double($v) => $body,
            ArrayData::ComplexSingle($v) => $body,
            ArrayData::ComplexDouble($v) => $body,
        }
    };
}

impl ArrayData {
    pub fn kind(&self) -> ElementKind {
        match self {
            ArrayData::Logical(_) => ElementKind::Logical,
            ArrayData::Int8(_) => ElementKind::Int8,
            ArrayData::Int16(_) => ElementKind::Int16,
            ArrayData::Int32(_) => ElementKind::Int32,
            ArrayData::Int64(_) => ElementKind::Int64,
            ArrayData::UInt8(_) => ElementKind::UInt8,
            ArrayData::UInt16(_) => ElementKind::UInt16,
            ArrayData::UInt32(_) => ElementKind::UInt32,
            ArrayData::UInt64(_) => ElementKind::UInt64,
            ArrayData::Single(_) => ElementKind::Single,
            ArrayData::Double(_) => ElementKind::Double,
            ArrayData::ComplexSingle(_) => ElementKind::ComplexSingle,
            ArrayData::ComplexDouble(_) => ElementKind::ComplexDouble,
        }
    }

    pub fn len(&self) -> usize {
        with_data!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// N-dimensional engine array in column-major (Fortran) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineArray {
    pub shape: Vec<usize>,
    pub data: ArrayData,
}

impl EngineArray {
    pub fn new(data: ArrayData, shape: Vec<usize>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(MatcallError::ShapeMismatch {
                len: data.len(),
                shape,
            });
        }
        Ok(EngineArray { shape, data })
    }

    pub fn new_2d(data: ArrayData, rows: usize, cols: usize) -> Result<Self> {
        Self::new(data, vec![rows, cols])
    }

    /// 1xN row vector of doubles.
    pub fn row(values: Vec<f64>) -> Self {
        let n = values.len();
        EngineArray {
            shape: vec![1, n],
            data: ArrayData::Double(values),
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.data.kind()
    }

    pub fn is_complex(&self) -> bool {
        self.kind().is_complex()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    pub fn cols(&self) -> usize {
        self.shape.get(1).copied().unwrap_or(1)
    }

    /// Real part of one element as f64, for counts and flags.
    pub fn element_f64(&self, index: usize) -> Option<f64> {
        match &self.data {
            ArrayData::Logical(v) => v.get(index).map(|b| if *b { 1.0 } else { 0.0 }),
            ArrayData::Int8(v) => v.get(index).map(|x| *x as f64),
            ArrayData::Int16(v) => v.get(index).map(|x| *x as f64),
            ArrayData::Int32(v) => v.get(index).map(|x| *x as f64),
            ArrayData::Int64(v) => v.get(index).map(|x| *x as f64),
            ArrayData::UInt8(v) => v.get(index).map(|x| *x as f64),
            ArrayData::UInt16(v) => v.get(index).map(|x| *x as f64),
            ArrayData::UInt32(v) => v.get(index).map(|x| *x as f64),
            ArrayData::UInt64(v) => v.get(index).map(|x| *x as f64),
            ArrayData::Single(v) => v.get(index).map(|x| *x as f64),
            ArrayData::Double(v) => v.get(index).copied(),
            ArrayData::ComplexSingle(v) => v.get(index).map(|c| c.re as f64),
            ArrayData::ComplexDouble(v) => v.get(index).map(|c| c.re),
        }
    }
}

impl fmt::Display for EngineArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.shape.iter().map(|d| d.to_string()).collect();
        write!(f, "{} {}", dims.join("x"), self.kind())
    }
}

/// Engine cell array; `data` is stored row by row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellArray {
    pub data: Vec<EngineValue>,
    pub rows: usize,
    pub cols: usize,
}

impl CellArray {
    pub fn new(data: Vec<EngineValue>, rows: usize, cols: usize) -> Result<Self> {
        if rows * cols != data.len() {
            return Err(MatcallError::ShapeMismatch {
                len: data.len(),
                shape: vec![rows, cols],
            });
        }
        Ok(CellArray { data, rows, cols })
    }

    pub fn row(data: Vec<EngineValue>) -> Self {
        let cols = data.len();
        CellArray { data, rows: 1, cols }
    }

    pub fn column(data: Vec<EngineValue>) -> Self {
        let rows = data.len();
        CellArray { data, rows, cols: 1 }
    }

    pub fn is_vector(&self) -> bool {
        self.rows <= 1 || self.cols <= 1
    }

    pub fn get(&self, row: usize, col: usize) -> Result<&EngineValue> {
        if row >= self.rows || col >= self.cols {
            return Err(MatcallError::unexpected(
                format!("cell index within {}x{}", self.rows, self.cols),
                format!("({row}, {col})"),
            ));
        }
        Ok(&self.data[row * self.cols + col])
    }
}

/// Scalar engine struct with ordered fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructValue {
    pub fields: IndexMap<String, EngineValue>,
}

impl StructValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: EngineValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&EngineValue> {
        self.fields.get(name)
    }
}

impl FromIterator<(String, EngineValue)> for StructValue {
    fn from_iter<I: IntoIterator<Item = (String, EngineValue)>>(iter: I) -> Self {
        StructValue {
            fields: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for EngineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineValue::Empty => write!(f, "[]"),
            EngineValue::Bool(b) => write!(f, "{}", if *b { 1 } else { 0 }),
            EngineValue::Int(i) => write!(f, "{i}"),
            EngineValue::Num(n) => write!(f, "{n}"),
            EngineValue::Str(s) => write!(f, "'{s}'"),
            EngineValue::Array(a) => write!(f, "<{a}>"),
            EngineValue::Cell(c) => write!(f, "{{{}x{} cell}}", c.rows, c.cols),
            EngineValue::Struct(s) => write!(f, "struct(fields={})", s.fields.len()),
            EngineValue::Tuple(items) => write!(f, "({} outputs)", items.len()),
            EngineValue::Handle(h) => write!(f, "{h}"),
            EngineValue::Raw(raw) => write!(f, "{raw}"),
        }
    }
}
