//! Static tables between host array dtypes and engine element classes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element type of a host (ndarray-backed) array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
    Complex64,
    Complex128,
    /// Arrays of strings have no engine numeric counterpart.
    Str,
}

impl DType {
    pub fn name(&self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::UInt32 => "uint32",
            DType::UInt64 => "uint64",
            DType::Float16 => "float16",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
            DType::Str => "str",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element class of an engine numeric/logical array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Logical,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Single,
    Double,
    ComplexSingle,
    ComplexDouble,
}

impl ElementKind {
    /// MATLAB class name reported by `class()` for arrays of this kind.
    pub fn class_name(&self) -> &'static str {
        match self {
            ElementKind::Logical => "logical",
            ElementKind::Int8 => "int8",
            ElementKind::Int16 => "int16",
            ElementKind::Int32 => "int32",
            ElementKind::Int64 => "int64",
            ElementKind::UInt8 => "uint8",
            ElementKind::UInt16 => "uint16",
            ElementKind::UInt32 => "uint32",
            ElementKind::UInt64 => "uint64",
            ElementKind::Single | ElementKind::ComplexSingle => "single",
            ElementKind::Double | ElementKind::ComplexDouble => "double",
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, ElementKind::ComplexSingle | ElementKind::ComplexDouble)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_complex() {
            write!(f, "complex {}", self.class_name())
        } else {
            f.write_str(self.class_name())
        }
    }
}

/// Host dtype to engine element class. Float16 widens to single.
pub const DTYPE_MAP: &[(DType, ElementKind)] = &[
    (DType::Bool, ElementKind::Logical),
    (DType::Int8, ElementKind::Int8),
    (DType::Int16, ElementKind::Int16),
    (DType::Int32, ElementKind::Int32),
    (DType::Int64, ElementKind::Int64),
    (DType::UInt8, ElementKind::UInt8),
    (DType::UInt16, ElementKind::UInt16),
    (DType::UInt32, ElementKind::UInt32),
    (DType::UInt64, ElementKind::UInt64),
    (DType::Float16, ElementKind::Single),
    (DType::Float32, ElementKind::Single),
    (DType::Float64, ElementKind::Double),
    (DType::Complex64, ElementKind::ComplexSingle),
    (DType::Complex128, ElementKind::ComplexDouble),
];

/// Engine element class to host dtype.
pub const DTYPE_MAP_INV: &[(ElementKind, DType)] = &[
    (ElementKind::Logical, DType::Bool),
    (ElementKind::Int8, DType::Int8),
    (ElementKind::Int16, DType::Int16),
    (ElementKind::Int32, DType::Int32),
    (ElementKind::Int64, DType::Int64),
    (ElementKind::UInt8, DType::UInt8),
    (ElementKind::UInt16, DType::UInt16),
    (ElementKind::UInt32, DType::UInt32),
    (ElementKind::UInt64, DType::UInt64),
    (ElementKind::Single, DType::Float32),
    (ElementKind::Double, DType::Float64),
    (ElementKind::ComplexSingle, DType::Complex64),
    (ElementKind::ComplexDouble, DType::Complex128),
];

/// Host scalar kinds that cross the boundary without conversion.
pub const BASIC_TYPES: &[&str] = &["bool", "int", "float", "str"];

pub fn engine_kind_for(dtype: DType) -> Option<ElementKind> {
    DTYPE_MAP
        .iter()
        .find(|(host, _)| *host == dtype)
        .map(|(_, kind)| *kind)
}

pub fn host_dtype_for(kind: ElementKind) -> DType {
    DTYPE_MAP_INV
        .iter()
        .find(|(engine, _)| *engine == kind)
        .map(|(_, dtype)| *dtype)
        .unwrap_or(DType::Float64)
}
