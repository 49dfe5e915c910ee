//! `Thread`: the per-evaluation context threaded through the evaluator —
//! the `print()` sink, the module loader, resource accounting, and the
//! active call stack used for recursion detection.

use ahash::AHashMap;

use crate::dialect::Dialect;
use crate::error::{RunResult, SkylarkError};
use crate::loader::{Loader, ModuleSource};
use crate::resource::{ResourceLimits, ResourceTracker};
use crate::value::Value;

pub trait PrintWriter {
    fn print(&mut self, text: &str);
}

/// A `PrintWriter` that forwards to the process's standard output, for
/// hosts that don't care to customize it.
pub struct StdoutWriter;

impl PrintWriter for StdoutWriter {
    fn print(&mut self, text: &str) {
        println!("{text}");
    }
}

pub struct Thread<'a> {
    pub dialect: Dialect,
    resources: ResourceTracker,
    printer: &'a mut dyn PrintWriter,
    loader: Option<Loader<'a>>,
    /// Host-supplied names visible to every module this thread executes,
    /// without being part of any module's globals. Lives on the thread
    /// (rather than being threaded through every eval call) because a
    /// function's closure only carries a `Weak<Module>`, not its own copy.
    predeclared: AHashMap<String, Value>,
    /// Identities of functions currently on the call stack, for recursion
    /// rejection when the dialect disallows it.
    call_stack: Vec<u64>,
}

impl<'a> Thread<'a> {
    pub fn new(dialect: Dialect, limits: ResourceLimits, printer: &'a mut dyn PrintWriter) -> Self {
        Thread {
            dialect,
            resources: ResourceTracker::new(limits),
            printer,
            loader: None,
            predeclared: AHashMap::new(),
            call_stack: Vec::new(),
        }
    }

    pub fn with_loader(mut self, source: &'a mut dyn ModuleSource) -> Self {
        self.loader = Some(Loader::new(source));
        self
    }

    pub fn with_predeclared(mut self, predeclared: AHashMap<String, Value>) -> Self {
        self.predeclared = predeclared;
        self
    }

    pub fn predeclared(&self, name: &str) -> Option<Value> {
        self.predeclared.get(name).cloned()
    }

    /// The set of predeclared names this thread supplies, for feeding a
    /// [`crate::resolver::ResolveEnv`] before compiling a module that will
    /// run on this thread.
    pub fn predeclared_names(&self) -> std::collections::HashSet<String> {
        self.predeclared.keys().cloned().collect()
    }

    pub fn print(&mut self, text: &str) {
        self.printer.print(text);
    }

    pub fn cancel(&mut self) {
        self.resources.cancel();
    }

    pub fn step(&mut self) -> RunResult<()> {
        self.resources.step()
    }

    pub fn enter_call(&mut self, callee: &Value) -> RunResult<()> {
        let id = callee.identity();
        if !self.dialect.allow_recursion && self.call_stack.contains(&id) {
            return Err(SkylarkError::recursion("function recursion is not allowed by this dialect"));
        }
        self.resources.enter_call()?;
        self.call_stack.push(id);
        Ok(())
    }

    pub fn exit_call(&mut self) {
        self.call_stack.pop();
        self.resources.exit_call();
    }

    pub fn load(&mut self, name: &str) -> RunResult<Vec<(String, Value)>> {
        let Some(loader) = self.loader.as_mut() else {
            return Err(SkylarkError::load("this thread has no module loader configured"));
        };
        let module = loader.load(name)?;
        Ok(module.exported())
    }
}
