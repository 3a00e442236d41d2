//! Blocking client side of the wire protocol

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use matcall_core::{
    Callee, Engine, EngineError, EngineResult, EngineValue, ObjectHandle, StructValue,
};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::protocol::{Operation, Outcome, Request, Response};
use crate::{WireError, TRANSPORT_IDENTIFIER};

/// [`Engine`] over any line-oriented reader/writer pair.
pub struct WireEngine<R, W> {
    reader: R,
    writer: W,
    next_id: u64,
}

impl<R: BufRead, W: Write> WireEngine<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            next_id: 1,
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Send one operation and decode its `ok` payload as `T`.
    pub fn request<T: DeserializeOwned>(&mut self, op: Operation) -> Result<T, WireError> {
        let name = op.name();
        let id = self.send(op)?;

        let response = self.receive()?;
        if response.id != id {
            return Err(WireError::Protocol(format!(
                "response id {} does not match request id {id}",
                response.id
            )));
        }
        match response.outcome {
            Outcome::Ok(payload) => {
                log::trace!("<- #{id} ok");
                Ok(serde_json::from_value(payload)?)
            }
            Outcome::Error(err) => {
                log::debug!("<- #{id} {name} failed: {err}");
                Err(WireError::Engine(err))
            }
        }
    }

    /// Write one request line without waiting for its response.
    pub fn send(&mut self, op: Operation) -> Result<u64, WireError> {
        let id = self.next_id;
        self.next_id += 1;
        log::trace!("-> #{id} {}", op.name());

        let request = Request { id, op };
        serde_json::to_writer(&mut self.writer, &request)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(id)
    }

    fn receive(&mut self) -> Result<Response, WireError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(WireError::Protocol(
                    "engine closed the connection".to_string(),
                ));
            }
            if !line.trim().is_empty() {
                return Ok(Response::from_json(line.trim_end())?);
            }
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> Engine for WireEngine<R, W> {
    fn evaluate(&mut self, code: &str, nargout: usize) -> EngineResult<Vec<EngineValue>> {
        Ok(self.request(Operation::Evaluate {
            code: code.to_string(),
            nargout,
        })?)
    }

    fn call(
        &mut self,
        callee: &Callee,
        args: &[EngineValue],
        nargout: usize,
    ) -> EngineResult<Vec<EngineValue>> {
        Ok(self.request(Operation::Call {
            callee: callee.clone(),
            args: args.to_vec(),
            nargout,
        })?)
    }

    fn eval_to_text(&mut self, code: &str) -> EngineResult<String> {
        Ok(self.request(Operation::EvalToText {
            code: code.to_string(),
        })?)
    }

    fn add_search_path(&mut self, path: &Path) -> EngineResult<()> {
        self.request::<JsonValue>(Operation::AddSearchPath {
            path: path.to_path_buf(),
        })?;
        Ok(())
    }

    fn declared_arity(&mut self, name: &str) -> EngineResult<i32> {
        Ok(self.request(Operation::DeclaredArity {
            name: name.to_string(),
        })?)
    }

    fn canonical_text(&mut self, handle: &ObjectHandle) -> EngineResult<String> {
        Ok(self.request(Operation::CanonicalText { handle: *handle })?)
    }

    fn property_names(&mut self, class_name: &str) -> EngineResult<Vec<String>> {
        Ok(self.request(Operation::PropertyNames {
            class_name: class_name.to_string(),
        })?)
    }

    fn method_names(&mut self, class_name: &str) -> EngineResult<Vec<String>> {
        Ok(self.request(Operation::MethodNames {
            class_name: class_name.to_string(),
        })?)
    }

    fn table_to_record(
        &mut self,
        table: &EngineValue,
        to_scalar: bool,
    ) -> EngineResult<StructValue> {
        Ok(self.request(Operation::TableToRecord {
            table: table.clone(),
            to_scalar,
        })?)
    }

    fn record_to_table(&mut self, record: StructValue) -> EngineResult<EngineValue> {
        Ok(self.request(Operation::RecordToTable { record })?)
    }

    fn workspace_get(&mut self, name: &str) -> EngineResult<Option<EngineValue>> {
        Ok(self.request(Operation::WorkspaceGet {
            name: name.to_string(),
        })?)
    }

    fn workspace_set(&mut self, name: &str, value: EngineValue) -> EngineResult<()> {
        self.request::<JsonValue>(Operation::WorkspaceSet {
            name: name.to_string(),
            value,
        })?;
        Ok(())
    }

    fn workspace_contains(&mut self, name: &str) -> EngineResult<bool> {
        Ok(self.request(Operation::WorkspaceContains {
            name: name.to_string(),
        })?)
    }
}

impl From<WireError> for EngineError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Engine(err) => err,
            other => EngineError::new(other.to_string()).with_identifier(TRANSPORT_IDENTIFIER),
        }
    }
}

/// How long a dropped engine may take to exit after `shutdown`.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Engine running as a child process, spoken to over its stdin/stdout.
///
/// Dropping it sends `shutdown` and gives the process [`SHUTDOWN_GRACE`] to
/// exit before killing it.
pub struct StdioEngine {
    child: Child,
    wire: WireEngine<BufReader<ChildStdout>, ChildStdin>,
}

impl StdioEngine {
    pub fn spawn(command: &str, args: &[String]) -> Result<Self, WireError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                return Err(WireError::Protocol(format!(
                    "engine process '{command}' has no stdio pipes"
                )));
            }
        };
        log::info!("Started engine process '{command}' (pid {})", child.id());

        Ok(Self {
            child,
            wire: WireEngine::new(BufReader::new(stdout), stdin),
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    fn wait_for_exit(&mut self, grace: Duration) -> std::io::Result<ExitStatus> {
        let deadline = Instant::now() + grace;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                log::warn!(
                    "Engine process {} ignored shutdown, killing it",
                    self.child.id()
                );
                self.child.kill()?;
                return self.child.wait();
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for StdioEngine {
    fn drop(&mut self) {
        // The reply is never read, so a silent engine cannot block here.
        if let Err(err) = self.wire.send(Operation::Shutdown) {
            log::debug!("Engine shutdown request failed: {err}");
        }
        match self.wait_for_exit(SHUTDOWN_GRACE) {
            Ok(status) => log::info!("Engine process exited with {status}"),
            Err(err) => log::warn!("Failed to stop engine process: {err}"),
        }
    }
}

impl Engine for StdioEngine {
    fn evaluate(&mut self, code: &str, nargout: usize) -> EngineResult<Vec<EngineValue>> {
        self.wire.evaluate(code, nargout)
    }

    fn call(
        &mut self,
        callee: &Callee,
        args: &[EngineValue],
        nargout: usize,
    ) -> EngineResult<Vec<EngineValue>> {
        self.wire.call(callee, args, nargout)
    }

    fn eval_to_text(&mut self, code: &str) -> EngineResult<String> {
        self.wire.eval_to_text(code)
    }

    fn add_search_path(&mut self, path: &Path) -> EngineResult<()> {
        self.wire.add_search_path(path)
    }

    fn declared_arity(&mut self, name: &str) -> EngineResult<i32> {
        self.wire.declared_arity(name)
    }

    fn canonical_text(&mut self, handle: &ObjectHandle) -> EngineResult<String> {
        self.wire.canonical_text(handle)
    }

    fn property_names(&mut self, class_name: &str) -> EngineResult<Vec<String>> {
        self.wire.property_names(class_name)
    }

    fn method_names(&mut self, class_name: &str) -> EngineResult<Vec<String>> {
        self.wire.method_names(class_name)
    }

    fn table_to_record(
        &mut self,
        table: &EngineValue,
        to_scalar: bool,
    ) -> EngineResult<StructValue> {
        self.wire.table_to_record(table, to_scalar)
    }

    fn record_to_table(&mut self, record: StructValue) -> EngineResult<EngineValue> {
        self.wire.record_to_table(record)
    }

    fn workspace_get(&mut self, name: &str) -> EngineResult<Option<EngineValue>> {
        self.wire.workspace_get(name)
    }

    fn workspace_set(&mut self, name: &str, value: EngineValue) -> EngineResult<()> {
        self.wire.workspace_set(name, value)
    }

    fn workspace_contains(&mut self, name: &str) -> EngineResult<bool> {
        self.wire.workspace_contains(name)
    }
}
