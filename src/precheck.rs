use rustpython_compiler::{CompileOpts, Mode, compile};

/// A parse/compile failure located in the snippet source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

/// Compiles the snippet without running it.
///
/// Only the compiler front end is involved: no interpreter, worker thread,
/// or process is ever allocated for a snippet that fails here.
pub fn check(code: &str) -> Result<(), SyntaxIssue> {
    match compile(code, Mode::Exec, "<snippet>".to_owned(), CompileOpts::default()) {
        Ok(_) => Ok(()),
        Err(err) => {
            let (row, col) = err.python_location();
            Err(SyntaxIssue {
                message: err.to_string(),
                line: row as u32,
                column: col as u32,
            })
        }
    }
}
