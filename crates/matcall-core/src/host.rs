//! Host-side value model: what Rust callers hand in and get back.

use std::any::Any;
use std::convert::TryFrom;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use half::f16;
use indexmap::IndexMap;
use ndarray::{Array1, ArrayD, Axis, IxDyn, ShapeBuilder};
use num_complex::{Complex32, Complex64};

use crate::class_proxy::MatObject;
use crate::dtype::{DType, BASIC_TYPES};
use crate::error::{MatcallError, Result};
use crate::function::MatFunction;
use crate::mat_struct::MatStruct;
use crate::value::{ArrayData, EngineArray, EngineValue};

#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex64),
    Str(String),
    Array(HostArray),
    List(Vec<HostValue>),
    /// Generic mapping; keys must be strings to reach the engine.
    Dict(Vec<(HostValue, HostValue)>),
    Record(MatStruct),
    Table(DataTable),
    Path(PathBuf),
    Function(MatFunction),
    Object(MatObject),
    /// Value that is already in engine form.
    Engine(EngineValue),
    /// Arbitrary host object with no engine representation.
    Opaque(OpaqueValue),
}

impl HostValue {
    pub fn type_name(&self) -> &str {
        match self {
            HostValue::None => "none",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Complex(_) => "complex",
            HostValue::Str(_) => "str",
            HostValue::Array(_) => "ndarray",
            HostValue::List(_) => "list",
            HostValue::Dict(_) => "dict",
            HostValue::Record(_) => "MatStruct",
            HostValue::Table(_) => "DataTable",
            HostValue::Path(_) => "path",
            HostValue::Function(_) => "MatFunction",
            HostValue::Object(_) => "MatObject",
            HostValue::Engine(_) => "engine value",
            HostValue::Opaque(o) => o.type_name,
        }
    }

    /// True for the scalar kinds that cross the boundary unchanged.
    pub fn is_basic(&self) -> bool {
        BASIC_TYPES.contains(&self.type_name())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, HostValue::None)
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        HostValue::Opaque(OpaqueValue {
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        })
    }

    pub fn as_array(&self) -> Option<&HostArray> {
        match self {
            HostValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&MatStruct> {
        match self {
            HostValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&MatObject> {
        match self {
            HostValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&MatFunction> {
        match self {
            HostValue::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Host object of a type the codec does not know.
#[derive(Clone)]
pub struct OpaqueValue {
    pub type_name: &'static str,
    pub value: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueValue({})", self.type_name)
    }
}

impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

/// ndarray-backed host array in standard (row-major) order.
#[derive(Debug, Clone, PartialEq)]
pub enum HostArray {
    Bool(ArrayD<bool>),
    Int8(ArrayD<i8>),
    Int16(ArrayD<i16>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    UInt8(ArrayD<u8>),
    UInt16(ArrayD<u16>),
    UInt32(ArrayD<u32>),
    UInt64(ArrayD<u64>),
    Float16(ArrayD<f16>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
    Complex64(ArrayD<Complex32>),
    Complex128(ArrayD<Complex64>),
    Str(ArrayD<String>),
}

macro_rules! with_array {
    ($arr:expr, $a:ident => $body:expr) => {
        match $arr {
            HostArray::Bool($a) => $body,
            HostArray::Int8($a) => $body,
            HostArray::Int16($a) => $body,
            HostArray::Int32($a) => $body,
            HostArray::Int64($a) => $body,
            HostArray::UInt8($a) => $body,
            HostArray::UInt16($a) => $body,
            HostArray::UInt32($a) => $body,
            HostArray::UInt64($a) => $body,
            HostArray::Float16($a) => $body,
            HostArray::Float32($a) => $body,
            HostArray::Float64($a) => $body,
            HostArray::Complex64($a) => $body,
            HostArray::Complex128($a) => $body,
            HostArray::Str($a) => $body,
        }
    };
}

macro_rules! map_array {
    ($arr:expr, $a:ident => $body:expr) => {
        match $arr {
            HostArray::Bool($a) => HostArray::Bool($body),
            HostArray::Int8($a) => HostArray::Int8($body),
            HostArray::Int16($a) => HostArray::Int16($body),
            HostArray::Int32($a) => HostArray::Int32($body),
            HostArray::Int64($a) => HostArray::Int64($body),
            HostArray::UInt8($a) => HostArray::UInt8($body),
            HostArray::UInt16($a) => HostArray::UInt16($body),
            HostArray::UInt32($a) => HostArray::UInt32($body),
            HostArray::UInt64($a) => HostArray::UInt64($body),
            HostArray::Float16($a) => HostArray::Float16($body),
            HostArray::Float32($a) => HostArray::Float32($body),
            HostArray::Float64($a) => HostArray::Float64($body),
            HostArray::Complex64($a) => HostArray::Complex64($body),
            HostArray::Complex128($a) => HostArray::Complex128($body),
            HostArray::Str($a) => HostArray::Str($body),
        }
    };
}

/// Column-major copy of a row-major array.
fn fortran_order<T: Clone>(a: &ArrayD<T>) -> Vec<T> {
    a.t().iter().cloned().collect()
}

fn from_fortran<T>(shape: &[usize], data: Vec<T>) -> Result<ArrayD<T>> {
    let len = data.len();
    ArrayD::from_shape_vec(IxDyn(shape).f(), data).map_err(|_| MatcallError::ShapeMismatch {
        len,
        shape: shape.to_vec(),
    })
}

fn squeeze_2d<T>(a: ArrayD<T>) -> ArrayD<T> {
    if a.ndim() != 2 {
        return a;
    }
    if a.shape()[0] == 1 {
        a.index_axis_move(Axis(0), 0)
    } else if a.shape()[1] == 1 {
        a.index_axis_move(Axis(1), 0)
    } else {
        a
    }
}

fn flatten<T: Clone>(a: ArrayD<T>) -> ArrayD<T> {
    Array1::from_iter(a.iter().cloned()).into_dyn()
}

impl HostArray {
    pub fn dtype(&self) -> DType {
        match self {
            HostArray::Bool(_) => DType::Bool,
            HostArray::Int8(_) => DType::Int8,
            HostArray::Int16(_) => DType::Int16,
            HostArray::Int32(_) => DType::Int32,
            HostArray::Int64(_) => DType::Int64,
            HostArray::UInt8(_) => DType::UInt8,
            HostArray::UInt16(_) => DType::UInt16,
            HostArray::UInt32(_) => DType::UInt32,
            HostArray::UInt64(_) => DType::UInt64,
            HostArray::Float16(_) => DType::Float16,
            HostArray::Float32(_) => DType::Float32,
            HostArray::Float64(_) => DType::Float64,
            HostArray::Complex64(_) => DType::Complex64,
            HostArray::Complex128(_) => DType::Complex128,
            HostArray::Str(_) => DType::Str,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        with_array!(self, a => a.ndim())
    }

    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Engine shape: scalars become 1x1, vectors become 1xN rows.
    fn engine_shape(&self) -> Vec<usize> {
        match self.shape() {
            [] => vec![1, 1],
            [n] => vec![1, *n],
            dims => dims.to_vec(),
        }
    }

    fn column_major_data(&self) -> Result<ArrayData> {
        Ok(match self {
            HostArray::Bool(a) => ArrayData::Logical(fortran_order(a)),
            HostArray::Int8(a) => ArrayData::Int8(fortran_order(a)),
            HostArray::Int16(a) => ArrayData::Int16(fortran_order(a)),
            HostArray::Int32(a) => ArrayData::Int32(fortran_order(a)),
            HostArray::Int64(a) => ArrayData::Int64(fortran_order(a)),
            HostArray::UInt8(a) => ArrayData::UInt8(fortran_order(a)),
            HostArray::UInt16(a) => ArrayData::UInt16(fortran_order(a)),
            HostArray::UInt32(a) => ArrayData::UInt32(fortran_order(a)),
            HostArray::UInt64(a) => ArrayData::UInt64(fortran_order(a)),
            HostArray::Float16(a) => {
                ArrayData::Single(a.t().iter().map(|h| h.to_f32()).collect())
            }
            HostArray::Float32(a) => ArrayData::Single(fortran_order(a)),
            HostArray::Float64(a) => ArrayData::Double(fortran_order(a)),
            HostArray::Complex64(a) => ArrayData::ComplexSingle(fortran_order(a)),
            HostArray::Complex128(a) => ArrayData::ComplexDouble(fortran_order(a)),
            HostArray::Str(_) => {
                return Err(MatcallError::UnsupportedDType {
                    dtype: DType::Str,
                })
            }
        })
    }

    /// Convert into a column-major engine array of the mapped element class.
    pub fn to_engine(&self) -> Result<EngineArray> {
        let data = self.column_major_data()?;
        EngineArray::new(data, self.engine_shape())
    }

    /// Convert into an Nx1 engine column, flattening in row-major order.
    pub fn to_engine_column(&self) -> Result<EngineArray> {
        let flat = self.clone().flattened();
        let data = flat.column_major_data()?;
        EngineArray::new(data, vec![flat.len(), 1])
    }

    /// Rebuild a host array from engine storage, preserving its full shape.
    pub fn from_engine(array: EngineArray) -> Result<Self> {
        let EngineArray { shape, data } = array;
        Ok(match data {
            ArrayData::Logical(v) => HostArray::Bool(from_fortran(&shape, v)?),
            ArrayData::Int8(v) => HostArray::Int8(from_fortran(&shape, v)?),
            ArrayData::Int16(v) => HostArray::Int16(from_fortran(&shape, v)?),
            ArrayData::Int32(v) => HostArray::Int32(from_fortran(&shape, v)?),
            ArrayData::Int64(v) => HostArray::Int64(from_fortran(&shape, v)?),
            ArrayData::UInt8(v) => HostArray::UInt8(from_fortran(&shape, v)?),
            ArrayData::UInt16(v) => HostArray::UInt16(from_fortran(&shape, v)?),
            ArrayData::UInt32(v) => HostArray::UInt32(from_fortran(&shape, v)?),
            ArrayData::UInt64(v) => HostArray::UInt64(from_fortran(&shape, v)?),
            ArrayData::Single(v) => HostArray::Float32(from_fortran(&shape, v)?),
            ArrayData::Double(v) => HostArray::Float64(from_fortran(&shape, v)?),
            ArrayData::ComplexSingle(v) => HostArray::Complex64(from_fortran(&shape, v)?),
            ArrayData::ComplexDouble(v) => HostArray::Complex128(from_fortran(&shape, v)?),
        })
    }

    /// Row and column vectors become one-dimensional; other shapes are kept.
    pub fn squeeze_vector(self) -> Self {
        map_array!(self, a => squeeze_2d(a))
    }

    pub fn flattened(self) -> Self {
        map_array!(self, a => flatten(a))
    }

    /// Inline engine literal for one-dimensional numeric and logical arrays.
    pub fn literal(&self) -> Option<String> {
        if self.ndim() != 1 {
            return None;
        }
        let items: Vec<String> = match self {
            HostArray::Bool(a) => a.iter().map(|b| b.to_string()).collect(),
            HostArray::Int8(a) => a.iter().map(|x| x.to_string()).collect(),
            HostArray::Int16(a) => a.iter().map(|x| x.to_string()).collect(),
            HostArray::Int32(a) => a.iter().map(|x| x.to_string()).collect(),
            HostArray::Int64(a) => a.iter().map(|x| x.to_string()).collect(),
            HostArray::UInt8(a) => a.iter().map(|x| x.to_string()).collect(),
            HostArray::UInt16(a) => a.iter().map(|x| x.to_string()).collect(),
            HostArray::UInt32(a) => a.iter().map(|x| x.to_string()).collect(),
            HostArray::UInt64(a) => a.iter().map(|x| x.to_string()).collect(),
            HostArray::Float16(a) => a.iter().map(|x| float_literal(x.to_f64())).collect(),
            HostArray::Float32(a) => a.iter().map(|x| float_literal(*x as f64)).collect(),
            HostArray::Float64(a) => a.iter().map(|x| float_literal(*x)).collect(),
            HostArray::Complex64(a) => a
                .iter()
                .map(|c| complex_literal(c.re as f64, c.im as f64))
                .collect(),
            HostArray::Complex128(a) => a.iter().map(|c| complex_literal(c.re, c.im)).collect(),
            HostArray::Str(_) => return None,
        };
        Some(format!("[{}]", items.join(", ")))
    }
}

/// Engine spelling of a floating-point literal.
pub(crate) fn float_literal(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_negative() { "-Inf" } else { "Inf" }.to_string()
    } else {
        value.to_string()
    }
}

fn complex_literal(re: f64, im: f64) -> String {
    if im.is_sign_negative() {
        format!("{}-{}i", float_literal(re), float_literal(-im))
    } else {
        format!("{}+{}i", float_literal(re), float_literal(im))
    }
}

impl fmt::Display for HostArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        with_array!(self, a => write!(f, "{a}"))
    }
}

macro_rules! host_array_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<ArrayD<$ty>> for HostArray {
                fn from(a: ArrayD<$ty>) -> Self {
                    HostArray::$variant(a)
                }
            }

            impl From<Vec<$ty>> for HostArray {
                fn from(v: Vec<$ty>) -> Self {
                    HostArray::$variant(Array1::from_vec(v).into_dyn())
                }
            }

            impl From<Vec<$ty>> for Column {
                fn from(v: Vec<$ty>) -> Self {
                    Column::Array(HostArray::from(v))
                }
            }
        )*
    };
}

host_array_from! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f16 => Float16,
    f32 => Float32,
    f64 => Float64,
    Complex32 => Complex64,
    Complex64 => Complex128,
    String => Str,
}

/// One column of a [`DataTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Array(HostArray),
    /// Heterogeneous column, e.g. text; sent to the engine as a cell column.
    Values(Vec<HostValue>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Array(a) => a.len(),
            Column::Values(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_array(&self) -> Option<&HostArray> {
        match self {
            Column::Array(a) => Some(a),
            Column::Values(_) => None,
        }
    }
}

impl From<HostArray> for Column {
    fn from(a: HostArray) -> Self {
        Column::Array(a)
    }
}

impl From<Vec<HostValue>> for Column {
    fn from(values: Vec<HostValue>) -> Self {
        Column::Values(values)
    }
}

/// Host tabular value: named columns of equal length, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: IndexMap<String, Column>,
}

impl DataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a column; one-dimensional columns are enforced by flattening.
    pub fn insert(&mut self, name: impl Into<String>, column: impl Into<Column>) {
        let column = match column.into() {
            Column::Array(a) => Column::Array(a.flattened()),
            other => other,
        };
        self.columns.insert(name.into(), column);
    }

    pub fn with_column(mut self, name: impl Into<String>, column: impl Into<Column>) -> Self {
        self.insert(name, column);
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &Column)> {
        self.columns.iter()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.values().map(Column::len).max().unwrap_or(0)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }
}

impl fmt::Display for DataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DataTable with {} rows x {} columns:", self.n_rows(), self.n_columns())?;
        for (name, column) in &self.columns {
            match column {
                Column::Array(a) => writeln!(f, "    {name}: {} {a}", a.dtype())?,
                Column::Values(v) => writeln!(f, "    {name}: values (length {})", v.len())?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::None => Ok(()),
            HostValue::Bool(b) => write!(f, "{b}"),
            HostValue::Int(i) => write!(f, "{i}"),
            HostValue::Float(x) => write!(f, "{}", float_literal(*x)),
            HostValue::Complex(c) => write!(f, "{}", complex_literal(c.re, c.im)),
            HostValue::Str(s) => write!(f, "{s}"),
            HostValue::Array(a) => write!(f, "{a}"),
            HostValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            HostValue::Dict(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            HostValue::Record(r) => write!(f, "{r}"),
            HostValue::Table(t) => write!(f, "{t}"),
            HostValue::Path(p) => write!(f, "{}", p.display()),
            HostValue::Function(func) => write!(f, "{func}"),
            HostValue::Object(obj) => write!(f, "{obj}"),
            HostValue::Engine(v) => write!(f, "{v}"),
            HostValue::Opaque(o) => write!(f, "<{}>", o.type_name),
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<i32> for HostValue {
    fn from(i: i32) -> Self {
        HostValue::Int(i as i64)
    }
}

impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        HostValue::Int(i)
    }
}

impl From<f64> for HostValue {
    fn from(x: f64) -> Self {
        HostValue::Float(x)
    }
}

impl From<Complex64> for HostValue {
    fn from(c: Complex64) -> Self {
        HostValue::Complex(c)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Str(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Str(s)
    }
}

impl From<HostArray> for HostValue {
    fn from(a: HostArray) -> Self {
        HostValue::Array(a)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(items: Vec<HostValue>) -> Self {
        HostValue::List(items)
    }
}

impl From<MatStruct> for HostValue {
    fn from(s: MatStruct) -> Self {
        HostValue::Record(s)
    }
}

impl From<DataTable> for HostValue {
    fn from(t: DataTable) -> Self {
        HostValue::Table(t)
    }
}

impl From<PathBuf> for HostValue {
    fn from(p: PathBuf) -> Self {
        HostValue::Path(p)
    }
}

impl From<MatFunction> for HostValue {
    fn from(f: MatFunction) -> Self {
        HostValue::Function(f)
    }
}

impl From<MatObject> for HostValue {
    fn from(o: MatObject) -> Self {
        HostValue::Object(o)
    }
}

impl From<EngineValue> for HostValue {
    fn from(v: EngineValue) -> Self {
        HostValue::Engine(v)
    }
}

impl TryFrom<&HostValue> for f64 {
    type Error = String;
    fn try_from(v: &HostValue) -> std::result::Result<Self, Self::Error> {
        match v {
            HostValue::Float(x) => Ok(*x),
            HostValue::Int(i) => Ok(*i as f64),
            HostValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            _ => Err(format!("cannot convert {} to f64", v.type_name())),
        }
    }
}

impl TryFrom<&HostValue> for i64 {
    type Error = String;
    fn try_from(v: &HostValue) -> std::result::Result<Self, Self::Error> {
        match v {
            HostValue::Int(i) => Ok(*i),
            HostValue::Float(x) if x.fract() == 0.0 => Ok(*x as i64),
            HostValue::Bool(b) => Ok(*b as i64),
            _ => Err(format!("cannot convert {} to i64", v.type_name())),
        }
    }
}

impl TryFrom<&HostValue> for bool {
    type Error = String;
    fn try_from(v: &HostValue) -> std::result::Result<Self, Self::Error> {
        match v {
            HostValue::Bool(b) => Ok(*b),
            HostValue::Int(i) => Ok(*i != 0),
            HostValue::Float(x) => Ok(*x != 0.0),
            _ => Err(format!("cannot convert {} to bool", v.type_name())),
        }
    }
}

impl TryFrom<&HostValue> for String {
    type Error = String;
    fn try_from(v: &HostValue) -> std::result::Result<Self, Self::Error> {
        match v {
            HostValue::Str(s) => Ok(s.clone()),
            HostValue::Path(p) => Ok(p.display().to_string()),
            _ => Err(format!("cannot convert {} to String", v.type_name())),
        }
    }
}
