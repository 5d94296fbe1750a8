use std::path::PathBuf;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, PartialOrd, Eq)]
pub struct Source {
    pub contents: String,
    pub path: PathBuf,
}

impl Source {
    pub fn new(source: &str, path: impl ToString) -> Rc<Source> {
        Rc::new(Source {
            contents: source.to_string(),
            path: PathBuf::from(path.to_string()),
        })
    }

    /// Create a source with a placeholder path, for strings that
    /// didn't come from a file.
    pub fn source(source: &str) -> Rc<Source> {
        Source::new(source, "./main")
    }

    /// The name used for this source in diagnostics.
    pub fn file_name(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}
