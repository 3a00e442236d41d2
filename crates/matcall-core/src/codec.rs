//! Conversion between host values and engine values.

use std::sync::Arc;

use num_complex::Complex64;

use crate::class_proxy;
use crate::error::{MatcallError, Result};
use crate::host::{Column, DataTable, HostArray, HostValue};
use crate::mat_struct::MatStruct;
use crate::session::Session;
use crate::value::{ArrayData, CellArray, EngineArray, EngineValue, StructValue};

/// Convert a host value into its engine form.
///
/// Only tables need the session: the engine builds them from a struct of columns.
pub fn to_engine_value(session: &Session, value: &HostValue) -> Result<EngineValue> {
    Ok(match value {
        HostValue::None => EngineValue::Empty,
        HostValue::Bool(b) => EngineValue::Bool(*b),
        HostValue::Int(i) => EngineValue::Int(*i),
        HostValue::Float(x) => EngineValue::Num(*x),
        HostValue::Str(s) => EngineValue::Str(s.clone()),
        HostValue::Complex(c) => {
            EngineValue::Array(EngineArray::new_2d(ArrayData::ComplexDouble(vec![*c]), 1, 1)?)
        }
        HostValue::Array(array) => EngineValue::Array(array.to_engine()?),
        HostValue::List(items) => {
            let cells = items
                .iter()
                .map(|item| to_engine_value(session, item))
                .collect::<Result<Vec<_>>>()?;
            EngineValue::Cell(CellArray::row(cells))
        }
        HostValue::Dict(pairs) => {
            let mut record = StructValue::new();
            for (key, item) in pairs {
                let HostValue::Str(name) = key else {
                    return Err(MatcallError::NonStringKey {
                        key_type: key.type_name().to_string(),
                    });
                };
                record.insert(name.clone(), to_engine_value(session, item)?);
            }
            EngineValue::Struct(record)
        }
        HostValue::Record(record) => EngineValue::Struct(record_to_engine(session, record)?),
        HostValue::Table(table) => session.record_to_table(table_columns(session, table)?)?,
        HostValue::Path(path) => EngineValue::Str(path.display().to_string()),
        HostValue::Function(function) => EngineValue::Handle(function.handle()),
        HostValue::Object(object) => EngineValue::Handle(object.handle()),
        HostValue::Engine(native) => native.clone(),
        HostValue::Opaque(opaque) => {
            return Err(MatcallError::UnsupportedType {
                type_name: opaque.type_name.to_string(),
            })
        }
    })
}

fn record_to_engine(session: &Session, record: &MatStruct) -> Result<StructValue> {
    record
        .iter()
        .map(|(name, item)| Ok((name.to_string(), to_engine_value(session, item)?)))
        .collect()
}

/// Struct of Nx1 columns, the input the engine's table constructor expects.
fn table_columns(session: &Session, table: &DataTable) -> Result<StructValue> {
    let mut columns = StructValue::new();
    for (name, column) in table.columns() {
        let encoded = match column {
            Column::Array(array) => EngineValue::Array(array.to_engine_column()?),
            Column::Values(values) => {
                let cells = values
                    .iter()
                    .map(|item| to_engine_value(session, item))
                    .collect::<Result<Vec<_>>>()?;
                EngineValue::Cell(CellArray::column(cells))
            }
        };
        columns.insert(name.clone(), encoded);
    }
    Ok(columns)
}

/// Convert an engine value into its host form.
///
/// Object handles are turned into proxies, which keep a reference to `session`.
pub fn to_host_value(session: &Arc<Session>, value: EngineValue) -> Result<HostValue> {
    Ok(match value {
        EngineValue::Empty => HostValue::None,
        EngineValue::Bool(b) => HostValue::Bool(b),
        EngineValue::Int(i) => HostValue::Int(i),
        EngineValue::Num(x) => HostValue::Float(x),
        EngineValue::Str(s) => HostValue::Str(s),
        EngineValue::Array(array) => array_to_host(array)?,
        EngineValue::Cell(cell) => cell_to_host(session, cell)?,
        EngineValue::Struct(record) => HostValue::Record(struct_to_host(session, record)?),
        EngineValue::Tuple(outputs) => HostValue::List(
            outputs
                .into_iter()
                .map(|item| to_host_value(session, item))
                .collect::<Result<_>>()?,
        ),
        EngineValue::Handle(handle) => class_proxy::resolve_handle(session, handle)?,
        raw @ EngineValue::Raw(_) => HostValue::Engine(raw),
    })
}

fn array_to_host(array: EngineArray) -> Result<HostValue> {
    if array.numel() == 1 {
        if let Some(scalar) = scalar_value(&array.data) {
            return Ok(scalar);
        }
    }
    let host = HostArray::from_engine(array)?;
    Ok(HostValue::Array(host.squeeze_vector()))
}

/// The single element of a one-element array as a bare host scalar.
fn scalar_value(data: &ArrayData) -> Option<HostValue> {
    Some(match data {
        ArrayData::Logical(v) => HostValue::Bool(*v.first()?),
        ArrayData::Int8(v) => HostValue::Int(*v.first()? as i64),
        ArrayData::Int16(v) => HostValue::Int(*v.first()? as i64),
        ArrayData::Int32(v) => HostValue::Int(*v.first()? as i64),
        ArrayData::Int64(v) => HostValue::Int(*v.first()?),
        ArrayData::UInt8(v) => HostValue::Int(*v.first()? as i64),
        ArrayData::UInt16(v) => HostValue::Int(*v.first()? as i64),
        ArrayData::UInt32(v) => HostValue::Int(*v.first()? as i64),
        ArrayData::UInt64(v) => {
            let x = *v.first()?;
            i64::try_from(x)
                .map(HostValue::Int)
                .unwrap_or(HostValue::Float(x as f64))
        }
        ArrayData::Single(v) => HostValue::Float(*v.first()? as f64),
        ArrayData::Double(v) => HostValue::Float(*v.first()?),
        ArrayData::ComplexSingle(v) => {
            let c = v.first()?;
            HostValue::Complex(Complex64::new(c.re as f64, c.im as f64))
        }
        ArrayData::ComplexDouble(v) => HostValue::Complex(*v.first()?),
    })
}

fn cell_to_host(session: &Arc<Session>, cell: CellArray) -> Result<HostValue> {
    let CellArray { data, rows, cols } = cell;
    let mut items = data
        .into_iter()
        .map(|item| to_host_value(session, item))
        .collect::<Result<Vec<_>>>()?;
    if rows * cols != items.len() {
        return Err(MatcallError::ShapeMismatch {
            len: items.len(),
            shape: vec![rows, cols],
        });
    }
    if rows <= 1 || cols <= 1 {
        return Ok(HostValue::List(items));
    }
    let mut table = Vec::with_capacity(rows);
    for _ in 0..rows {
        let rest = items.split_off(cols);
        table.push(HostValue::List(std::mem::replace(&mut items, rest)));
    }
    Ok(HostValue::List(table))
}

fn struct_to_host(session: &Arc<Session>, record: StructValue) -> Result<MatStruct> {
    let mut out = MatStruct::new();
    for (name, item) in record.fields {
        out.insert(name, to_host_value(session, item)?)?;
    }
    Ok(out)
}

/// Decode the struct-of-columns form of an engine table.
pub(crate) fn table_from_columns(session: &Arc<Session>, columns: StructValue) -> Result<DataTable> {
    let mut table = DataTable::new();
    for (name, column) in columns.fields {
        let column = match to_host_value(session, column)? {
            HostValue::Array(array) => Column::Array(array),
            HostValue::List(items) => Column::Values(items),
            scalar => Column::Values(vec![scalar]),
        };
        table.insert(name, column);
    }
    Ok(table)
}
