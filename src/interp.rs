//! Restricted interpreter driver shared by both isolation strategies.
//!
//! A fresh interpreter is created for every snippet and discarded with it,
//! so no namespace or stream-redirection state can survive into a later
//! request. The process supervisor calls [`run_snippet`] from its spawned
//! child; the thread supervisor calls it from a worker thread.

use rustpython_vm::{
    AsObject, Interpreter, PyObjectRef, PyResult, VirtualMachine,
    builtins::PyBaseExceptionRef, compiler::Mode, function::FuncArgs,
};
use serde::{Deserialize, Serialize};

use crate::namespace::{self, InputFeed};
use crate::output::OutputBuffer;

/// Raw interpreter-side result, before assembly into an `ExecutionResult`.
///
/// Also the wire format the process supervisor reads back from its child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmReport {
    pub output: String,
    pub truncated: bool,
    pub error: Option<VmError>,
}

/// A failure classified by the interpreter: exception class plus message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmError {
    pub kind: String,
    pub message: String,
}

/// Runs one snippet in a fresh capability-restricted interpreter.
///
/// Blocks until the snippet finishes; deadlines are the supervisor's job.
pub fn run_snippet(code: &str, input: &str, output_limit: usize) -> VmReport {
    let capture = OutputBuffer::new(output_limit);
    let feed = InputFeed::new(input);
    let interp = Interpreter::without_stdlib(Default::default());

    let error = interp.enter(|vm| {
        let code_obj = match vm.compile(code, Mode::Exec, "<snippet>".to_owned()) {
            Ok(obj) => obj,
            // The engine pre-checks syntax before dispatch; this path only
            // fires when the driver is used directly.
            Err(err) => {
                return Some(VmError {
                    kind: "SyntaxError".to_owned(),
                    message: err.to_string(),
                });
            }
        };

        let scope = match namespace::build_scope(vm, feed, capture.clone()) {
            Ok(scope) => scope,
            Err(exc) => return Some(classify_exception(vm, exc)),
        };

        let redirect = StreamRedirect::install(vm, capture.clone());
        let run = vm.run_code_obj(code_obj, scope);
        redirect.restore(vm);

        match run {
            Ok(_) => None,
            Err(exc) => Some(classify_exception(vm, exc)),
        }
    });

    let (output, truncated) = capture.render();
    VmReport {
        output,
        truncated,
        error,
    }
}

/// Scoped replacement of `sys.stdout`/`sys.stderr` with bounded writers.
///
/// The previous stream objects are put back on every exit path out of the
/// VM, normal completion and raised error alike.
struct StreamRedirect {
    saved_stdout: Option<PyObjectRef>,
    saved_stderr: Option<PyObjectRef>,
}

impl StreamRedirect {
    fn install(vm: &VirtualMachine, capture: OutputBuffer) -> Self {
        let saved_stdout = vm.sys_module.get_attr("stdout", vm).ok();
        let saved_stderr = vm.sys_module.get_attr("stderr", vm).ok();
        let _ = vm
            .sys_module
            .set_attr("stdout", writer_object(vm, capture.clone()), vm);
        let _ = vm.sys_module.set_attr("stderr", writer_object(vm, capture), vm);
        Self {
            saved_stdout,
            saved_stderr,
        }
    }

    fn restore(self, vm: &VirtualMachine) {
        if let Some(stdout) = self.saved_stdout {
            let _ = vm.sys_module.set_attr("stdout", stdout, vm);
        }
        if let Some(stderr) = self.saved_stderr {
            let _ = vm.sys_module.set_attr("stderr", stderr, vm);
        }
    }
}

/// A minimal file-like object whose `write` lands in the capture buffer.
///
/// `print()` goes through `sys.stdout.write`, so this is all it takes to
/// capture formatted output.
fn writer_object(vm: &VirtualMachine, capture: OutputBuffer) -> PyObjectRef {
    let write_fn = vm.new_function(
        "write",
        move |args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            let data: String = args
                .args
                .first()
                .and_then(|o| o.str(vm).ok())
                .map(|s| s.as_str().to_owned())
                .unwrap_or_default();
            capture.push(&data);
            Ok(vm.ctx.new_int(data.len()).into())
        },
    );
    let flush_fn = vm.new_function(
        "flush",
        move |_args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            Ok(vm.ctx.none())
        },
    );

    let ns = vm.new_module("<capture>", vm.ctx.new_dict(), None);
    let _ = ns.set_attr("write", write_fn, vm);
    let _ = ns.set_attr("flush", flush_fn, vm);
    let _ = ns.set_attr("closed", vm.ctx.new_bool(false), vm);
    let _ = ns.set_attr("encoding", vm.ctx.new_str("utf-8"), vm);
    ns.into()
}

/// Maps a raised exception to its class name and message.
fn classify_exception(vm: &VirtualMachine, exc: PyBaseExceptionRef) -> VmError {
    let kind = exc.class().name().to_string();
    let message = exc
        .as_object()
        .str(vm)
        .map(|s| s.as_str().to_owned())
        .unwrap_or_else(|_| "unknown error".to_owned());
    VmError { kind, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_is_captured() {
        let report = run_snippet("print('hello')", "", 10_000);
        assert!(report.error.is_none(), "unexpected error: {:?}", report.error);
        assert_eq!(report.output, "hello\n");
        assert!(!report.truncated);
    }

    #[test]
    fn test_excluded_capability_fails_at_point_of_use() {
        // The reference to `open` resolves lazily: the line before it runs.
        let report = run_snippet("print('ok')\nopen('notes.txt')", "", 10_000);
        let error = report.error.expect("open must not resolve");
        assert_eq!(error.kind, "NameError");
        assert_eq!(report.output, "ok\n");
    }

    #[test]
    fn test_runtime_error_is_classified() {
        let report = run_snippet("x = 1 / 0", "", 10_000);
        let error = report.error.expect("division by zero must raise");
        assert_eq!(error.kind, "ZeroDivisionError");
    }

    #[test]
    fn test_import_statement_is_denied() {
        let report = run_snippet("import os", "", 10_000);
        let error = report.error.expect("import must be denied");
        assert_eq!(error.kind, "ImportError");
    }

    #[test]
    fn test_input_consumes_supplied_lines() {
        let report = run_snippet(
            "a = input()\nb = input()\nprint(a + ' ' + b)",
            "Ada\nLovelace\n",
            10_000,
        );
        assert!(report.error.is_none(), "unexpected error: {:?}", report.error);
        assert_eq!(report.output, "Ada Lovelace\n");
    }

    #[test]
    fn test_exhausted_input_raises_eof() {
        let report = run_snippet("input()", "", 10_000);
        let error = report.error.expect("input on an empty feed must raise");
        assert_eq!(error.kind, "EOFError");
    }

    #[test]
    fn test_oversized_output_is_truncated() {
        let report = run_snippet("for i in range(100):\n    print('xxxx')", "", 50);
        assert!(report.truncated);
        assert_eq!(
            report.output.len(),
            50 + crate::output::TRUNCATION_MARKER.len()
        );
    }
}
