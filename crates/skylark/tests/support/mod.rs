use std::cell::RefCell;
use std::rc::Rc;

use skylark::{Dialect, Module, ModuleSource, PrintWriter, ResourceLimits, RunResult, SkylarkError, Thread};

/// Collects every line printed by `print()` during a test run, instead of
/// forwarding to stdout like [`skylark::StdoutWriter`].
#[derive(Default)]
pub struct CapturingWriter {
    pub lines: RefCell<Vec<String>>,
}

impl PrintWriter for CapturingWriter {
    fn print(&mut self, text: &str) {
        self.lines.get_mut().push(text.to_string());
    }
}

/// A [`ModuleSource`] backed by an in-memory map of module name to source
/// text, for exercising `load(...)` without touching the filesystem.
pub struct MapSource {
    pub files: Vec<(String, String)>,
}

impl MapSource {
    pub fn new(files: Vec<(&str, &str)>) -> Self {
        MapSource {
            files: files.into_iter().map(|(n, s)| (n.to_string(), s.to_string())).collect(),
        }
    }
}

impl ModuleSource for MapSource {
    fn load(&mut self, name: &str) -> RunResult<Rc<Module>> {
        let src = self
            .files
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s.clone())
            .ok_or_else(|| SkylarkError::load(format!("no such module: {name}")))?;
        let universal = skylark::universal_names();
        let predeclared = Default::default();
        let resolved = skylark::compile(&src, &predeclared, &universal, Dialect::default())?;
        let mut printer = CapturingWriter::default();
        // A fresh sub-thread per load, matching "modules don't share resource
        // budgets with their loader" (the host thread wraps sub-loads itself
        // if it wants to share a clock).
        let mut thread = Thread::new(Dialect::default(), ResourceLimits::default(), &mut printer);
        skylark::run_resolved(&mut thread, name, &resolved)
    }
}

pub fn run_source(src: &str) -> RunResult<(Rc<Module>, Vec<String>)> {
    let mut printer = CapturingWriter::default();
    let result = {
        let mut thread = Thread::new(Dialect::default(), ResourceLimits::default(), &mut printer);
        skylark::run(&mut thread, "test", src)
    };
    let lines = printer.lines.into_inner();
    result.map(|m| (m, lines))
}
