use std::fs;
use std::rc::Rc;

use crate::common::heap::Handle;
use crate::common::source::Source;
use crate::common::value::Value;
use crate::compiler;
use crate::error::SorrelError;
use crate::vm::vm::VM;

/// The embedding surface: compile and run whole sources.
impl VM {
    /// Compile a source to a script function in this VM's heap. On
    /// failure every collected syntax error is returned and no
    /// function is produced.
    pub fn compile_source(&mut self, source: &Rc<Source>) -> Result<Handle, SorrelError> {
        self.source = Some(Rc::clone(source));
        let result = if self.config.repl {
            compiler::compile_repl(&mut self.heap, source)
        } else {
            compiler::compile(&mut self.heap, source)
        };
        result.map_err(SorrelError::Compile)
    }

    pub fn exec_source(&mut self, source: &Rc<Source>) -> Result<Value, SorrelError> {
        let script = self.compile_source(source)?;
        self.execute(script).map_err(SorrelError::Runtime)
    }

    /// Compile and run a source string. Globals persist between
    /// calls, which is what makes the REPL work.
    pub fn exec(&mut self, src: &str) -> Result<Value, SorrelError> {
        let source = Source::new(src, &self.config.default_filename);
        self.exec_source(&source)
    }

    pub fn exec_file(&mut self, path: &str) -> Result<Value, SorrelError> {
        let contents = fs::read_to_string(path)
            .map_err(|err| SorrelError::Io(format!("could not read '{}': {}", path, err)))?;
        let source = Source::new(&contents, path);
        self.exec_source(&source)
    }
}
