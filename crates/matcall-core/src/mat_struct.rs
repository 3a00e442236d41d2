//! Ordered record mirroring an engine struct. Works without an engine.

use std::fmt;

use indexmap::IndexMap;

use crate::error::{MatcallError, Result};
use crate::host::HostValue;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatStruct {
    fields: IndexMap<String, HostValue>,
}

fn validate_field_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "field names cannot be empty"
    } else if name.starts_with('_') {
        "field names cannot start with an underscore"
    } else {
        return Ok(());
    };
    Err(MatcallError::InvalidFieldName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

impl MatStruct {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field. An existing field keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<HostValue>) -> Result<()> {
        let name = name.into();
        validate_field_name(&name)?;
        self.fields.insert(name, value.into());
        Ok(())
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<HostValue>) -> Result<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<&HostValue> {
        self.fields
            .get(name)
            .ok_or_else(|| MatcallError::FieldNotFound(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut HostValue> {
        self.fields
            .get_mut(name)
            .ok_or_else(|| MatcallError::FieldNotFound(name.to_string()))
    }

    pub fn remove(&mut self, name: &str) -> Option<HostValue> {
        self.fields.shift_remove(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HostValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &HostValue> {
        self.fields.values()
    }
}

impl<'a> IntoIterator for &'a MatStruct {
    type Item = (&'a String, &'a HostValue);
    type IntoIter = indexmap::map::Iter<'a, String, HostValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

fn describe(value: &HostValue) -> String {
    match value {
        v if v.is_basic() => v.to_string(),
        HostValue::Array(a) => format!("ndarray {:?}", a.shape()),
        HostValue::Record(r) => format!("MatStruct object ({} fields)", r.len()),
        HostValue::List(items) => format!("list (length {})", items.len()),
        other => other.type_name().to_string(),
    }
}

impl fmt::Display for MatStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MatStruct with {} fields:", self.len())?;
        let longest = self.fields.keys().map(|k| k.chars().count()).max().unwrap_or(0);
        for (name, value) in &self.fields {
            let pad = longest - name.chars().count() + 4;
            writeln!(f, "{:pad$}{name}: {}", "", describe(value))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostArray;

    #[test]
    fn fields_keep_insertion_order() {
        let mut st = MatStruct::new();
        st.insert("b", 1i64).unwrap();
        st.insert("a", true).unwrap();
        st.insert("b", 2i64).unwrap();
        assert_eq!(st.keys().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(st.get("b").unwrap(), &HostValue::Int(2));
        assert_eq!(st.len(), 2);
    }

    #[test]
    fn rejects_names_the_engine_cannot_hold() {
        let mut st = MatStruct::new();
        for bad in ["", "_hidden", "__class__"] {
            let err = st.insert(bad, 0i64).unwrap_err();
            assert!(matches!(err, MatcallError::InvalidFieldName { .. }), "{bad:?}");
        }
        assert!(st.is_empty());
    }

    #[test]
    fn method_names_are_ordinary_fields() {
        let mut st = MatStruct::new();
        for name in ["len", "keys", "get", "new"] {
            st.insert(name, 1i64).unwrap();
        }
        assert_eq!(st.keys().collect::<Vec<_>>(), ["len", "keys", "get", "new"]);
        assert_eq!(st.len(), 4);
    }

    #[test]
    fn missing_field_is_an_error() {
        let st = MatStruct::new();
        assert!(matches!(st.get("nope"), Err(MatcallError::FieldNotFound(name)) if name == "nope"));
    }

    #[test]
    fn display_aligns_field_names() {
        let inner = MatStruct::new().with_field("x", 1i64).unwrap();
        let st = MatStruct::new()
            .with_field("field1", 1i64)
            .unwrap()
            .with_field("arr", HostArray::from(vec![0i64, 1, 2, 3, 4]))
            .unwrap()
            .with_field("sub", inner)
            .unwrap()
            .with_field("items", vec![HostValue::from(1i64), HostValue::from("a")])
            .unwrap();
        let text = st.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "MatStruct with 4 fields:");
        assert_eq!(lines[1], "    field1: 1");
        assert_eq!(lines[2], "       arr: ndarray [5]");
        assert_eq!(lines[3], "       sub: MatStruct object (1 fields)");
        assert_eq!(lines[4], "     items: list (length 2)");
    }
}
