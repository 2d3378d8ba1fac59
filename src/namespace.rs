use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rustpython_vm::{
    PyObjectRef, PyResult, VirtualMachine, function::FuncArgs, scope::Scope,
};

use crate::output::OutputBuffer;

/// Primitive operations visible to a snippet: arithmetic, string/sequence/
/// mapping manipulation, formatted output, and the basics of control flow.
///
/// Filesystem access, module loading, host introspection, and process
/// control are deliberately absent. Exclusion is late-bound: a snippet that
/// references `open` or `eval` gets a `NameError` at the point of use, not
/// an error while the namespace is built.
pub const SAFE_BUILTINS: &[&str] = &[
    "abs", "all", "any", "ascii", "bin", "bool", "bytearray", "bytes",
    "chr", "complex", "dict", "divmod", "enumerate", "filter", "float",
    "format", "frozenset", "hex", "int", "isinstance", "issubclass", "iter",
    "len", "list", "map", "max", "min", "next", "oct", "ord", "pow",
    "print", "range", "repr", "reversed", "round", "set", "slice", "sorted",
    "str", "sum", "tuple", "type", "zip",
];

/// Line-oriented feed backing the sandbox `input()` builtin.
#[derive(Clone)]
pub struct InputFeed {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl InputFeed {
    pub fn new(data: &str) -> Self {
        Self {
            lines: Arc::new(Mutex::new(data.lines().map(str::to_owned).collect())),
        }
    }

    fn pop(&self) -> Option<String> {
        self.lines.lock().pop_front()
    }
}

/// Builds the scope a snippet runs in and restricts the interpreter's
/// builtins to [`SAFE_BUILTINS`] plus the sandbox `input`.
///
/// The interpreter is created fresh per snippet and owns nothing else, so
/// its builtins module is pruned in place: name resolution stays lazy and
/// anything excluded simply is not there when the snippet asks for it,
/// whichever lookup path the frame takes.
pub fn build_scope(
    vm: &VirtualMachine,
    feed: InputFeed,
    capture: OutputBuffer,
) -> PyResult<Scope> {
    restrict_builtins(vm)?;
    vm.builtins
        .set_attr("input", make_input_fn(vm, feed, capture), vm)?;
    install_import_guard(vm);

    let globals = vm.ctx.new_dict();
    globals.set_item("__name__", vm.ctx.new_str("__main__").into(), vm)?;

    Ok(Scope::with_builtins(None, globals, vm))
}

/// Empties the builtins module and rebinds only the allowlist.
fn restrict_builtins(vm: &VirtualMachine) -> PyResult<()> {
    let keep: Vec<(&str, PyObjectRef)> = SAFE_BUILTINS
        .iter()
        .filter_map(|name| {
            vm.builtins
                .get_attr(*name, vm)
                .ok()
                .map(|value| (*name, value))
        })
        .collect();

    let dict = vm.builtins.get_attr("__dict__", vm)?;
    vm.call_method(&dict, "clear", ())?;

    for (name, value) in keep {
        vm.builtins.set_attr(name, value, vm)?;
    }
    Ok(())
}

/// Rebinds `builtins.__import__` to a denial, closing the import statement
/// path: the import opcode resolves through the builtins module, not
/// through ordinary name lookup.
fn install_import_guard(vm: &VirtualMachine) {
    let hook = vm.new_function(
        "__import__",
        move |args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            let module_name: String = args
                .args
                .first()
                .and_then(|o| o.str(vm).ok())
                .map(|s| s.as_str().to_owned())
                .unwrap_or_default();
            Err(vm.new_import_error(
                format!("module imports are disabled in the sandbox: {module_name}"),
                vm.ctx.new_str(module_name),
            ))
        },
    );
    let _ = vm.builtins.set_attr("__import__", hook, vm);
}

/// Sandbox `input()`: echoes the prompt to captured stdout like CPython,
/// then pops the next pre-supplied line. Raises `EOFError` when the feed
/// is exhausted.
fn make_input_fn(vm: &VirtualMachine, feed: InputFeed, capture: OutputBuffer) -> PyObjectRef {
    vm.new_function(
        "input",
        move |args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            if let Some(prompt) = args.args.first() {
                if let Ok(text) = prompt.str(vm) {
                    capture.push(text.as_str());
                }
            }
            match feed.pop() {
                Some(line) => Ok(vm.ctx.new_str(line).into()),
                None => Err(vm.new_exception_msg(
                    vm.ctx.exceptions.eof_error.to_owned(),
                    "EOF when reading a line".to_owned(),
                )),
            }
        },
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_feed_pops_in_order() {
        let feed = InputFeed::new("first\nsecond\n");
        assert_eq!(feed.pop().as_deref(), Some("first"));
        assert_eq!(feed.pop().as_deref(), Some("second"));
        assert_eq!(feed.pop(), None);
    }

    #[test]
    fn test_empty_feed_is_immediately_exhausted() {
        let feed = InputFeed::new("");
        assert_eq!(feed.pop(), None);
    }

    #[test]
    fn test_allowlist_excludes_dangerous_names() {
        for name in [
            "open", "eval", "exec", "compile", "__import__", "globals", "getattr", "setattr",
            "vars", "breakpoint",
        ] {
            assert!(!SAFE_BUILTINS.contains(&name), "{name} must stay excluded");
        }
    }
}
