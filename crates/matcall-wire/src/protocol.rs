//! Engine wire protocol
//!
//! One JSON object per line in each direction. Requests carry a sequential
//! `id` and an `op` tag; every request gets exactly one response with the
//! same `id`, holding either an `ok` payload or an `error`.

use std::path::PathBuf;

use matcall_core::{Callee, EngineError, EngineValue, ObjectHandle, StructValue};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Operations understood by the engine process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Evaluate {
        code: String,
        nargout: usize,
    },
    Call {
        callee: Callee,
        args: Vec<EngineValue>,
        nargout: usize,
    },
    EvalToText {
        code: String,
    },
    AddSearchPath {
        path: PathBuf,
    },
    DeclaredArity {
        name: String,
    },
    CanonicalText {
        handle: ObjectHandle,
    },
    PropertyNames {
        class_name: String,
    },
    MethodNames {
        class_name: String,
    },
    TableToRecord {
        table: EngineValue,
        to_scalar: bool,
    },
    RecordToTable {
        record: StructValue,
    },
    WorkspaceGet {
        name: String,
    },
    WorkspaceSet {
        name: String,
        value: EngineValue,
    },
    WorkspaceContains {
        name: String,
    },
    /// Ask the engine process to exit
    Shutdown,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Evaluate { .. } => "evaluate",
            Operation::Call { .. } => "call",
            Operation::EvalToText { .. } => "eval_to_text",
            Operation::AddSearchPath { .. } => "add_search_path",
            Operation::DeclaredArity { .. } => "declared_arity",
            Operation::CanonicalText { .. } => "canonical_text",
            Operation::PropertyNames { .. } => "property_names",
            Operation::MethodNames { .. } => "method_names",
            Operation::TableToRecord { .. } => "table_to_record",
            Operation::RecordToTable { .. } => "record_to_table",
            Operation::WorkspaceGet { .. } => "workspace_get",
            Operation::WorkspaceSet { .. } => "workspace_set",
            Operation::WorkspaceContains { .. } => "workspace_contains",
            Operation::Shutdown => "shutdown",
        }
    }
}

/// Request line sent to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    #[serde(flatten)]
    pub op: Operation,
}

/// Response line read from the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok(JsonValue),
    Error(EngineError),
}

impl Request {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Response {
    pub fn ok(id: u64, payload: JsonValue) -> Self {
        Self {
            id,
            outcome: Outcome::Ok(payload),
        }
    }

    pub fn error(id: u64, error: EngineError) -> Self {
        Self {
            id,
            outcome: Outcome::Error(error),
        }
    }

    pub fn from_json(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_layout() {
        let request = Request {
            id: 7,
            op: Operation::Evaluate {
                code: "sqrt(4)".into(),
                nargout: 1,
            },
        };
        let value: JsonValue = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"id": 7, "op": "evaluate", "code": "sqrt(4)", "nargout": 1}));
    }

    #[test]
    fn test_unit_operation_layout() {
        let request = Request {
            id: 2,
            op: Operation::Shutdown,
        };
        let value: JsonValue = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"id": 2, "op": "shutdown"}));
        assert_eq!(request.op.name(), "shutdown");
    }

    #[test]
    fn test_response_variants() {
        let ok = Response::from_json(r#"{"id": 3, "ok": [{"type": "num", "value": 2.0}]}"#).unwrap();
        assert_eq!(ok, Response::ok(3, json!([{"type": "num", "value": 2.0}])));

        let err = Response::from_json(
            r#"{"id": 4, "error": {"message": "Error: boom", "identifier": "MATLAB:boom"}}"#,
        )
        .unwrap();
        assert_eq!(
            err,
            Response::error(4, EngineError::new("Error: boom").with_identifier("MATLAB:boom"))
        );
    }

    #[test]
    fn test_call_carries_callee() {
        let request = Request {
            id: 1,
            op: Operation::Call {
                callee: Callee::name("class"),
                args: vec![EngineValue::Handle(ObjectHandle::new(9))],
                nargout: 1,
            },
        };
        let line = request.to_json().unwrap();
        let parsed: Request = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, request);
        assert!(line.contains(r#""callee":{"kind":"name","target":"class"}"#), "{line}");
    }
}
