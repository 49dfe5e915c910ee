//! `skylark`: a deterministic, embeddable Starlark-like interpreter core.
//!
//! The pipeline from source text to a finished module is four stages, each
//! its own module here: [`scanner`] (bytes → tokens), [`parser`] (tokens →
//! [`ast::Module`]), [`resolver`] (static name resolution, producing a
//! [`resolver::ResolvedModule`]), and [`eval`] (the tree-walking
//! evaluator). [`compile`] and [`Thread::run`]-style helpers below wire the
//! first three stages together; embedders drive the last stage through
//! [`Thread`] directly so they control the predeclared environment and the
//! module loader.

mod args;
mod ast;
mod builtins;
mod callable;
mod dialect;
mod error;
mod eval;
mod format;
mod frame;
mod loader;
mod module;
mod parser;
mod resolver;
mod resource;
mod scanner;
mod thread;
mod token;
mod types;
mod value;

use std::collections::HashSet;

pub use ahash::AHashMap;

pub use dialect::Dialect;
pub use error::{CodeLoc, ExcKind, RunResult, SkylarkError};
pub use loader::ModuleSource;
pub use module::Module;
pub use resolver::ResolvedModule;
pub use resource::{ResourceLimits, ResourceTracker};
pub use thread::{PrintWriter, StdoutWriter, Thread};
pub use types::attr::AttrMethod;
pub use types::dict::DictData;
pub use types::list::ListData;
pub use types::range::RangeValue;
pub use types::set::SetData;
pub use value::{BuiltinKind, BuiltinValue, CompareOrdering, Value};

/// The names every module sees without declaring or importing them
/// (`len`, `range`, `dict`, ...). Feed into [`resolver::ResolveEnv::universal`].
pub fn universal_names() -> HashSet<String> {
    builtins::names().map(str::to_string).collect()
}

/// Parses and statically resolves `source` into a [`ResolvedModule`],
/// ready to be executed with [`eval::exec_module`]. `predeclared` is the
/// set of host-supplied names (distinct from the Universal layer) this
/// module's top level may reference; `universal` is normally
/// [`universal_names`] unless the embedder customizes the builtin surface.
pub fn compile(source: &str, predeclared: &HashSet<String>, universal: &HashSet<String>, dialect: Dialect) -> RunResult<ResolvedModule> {
    let tokens = scanner::tokenize(source)?;
    let ast_module = parser::parse(tokens)?;
    let env = resolver::ResolveEnv {
        predeclared,
        universal,
        allow_toplevel_control_flow: dialect.allow_toplevel_control_flow,
        allow_recursion: dialect.allow_recursion,
    };
    resolver::resolve(ast_module, &env)
}

/// Compiles and executes `source` as a fresh module named `name`, returning
/// the frozen, executed module so its globals can be inspected or passed
/// to further `load(...)` resolution.
pub fn run(thread: &mut Thread, name: impl Into<String>, source: &str) -> RunResult<std::rc::Rc<Module>> {
    let name = name.into();
    let universal = universal_names();
    let predeclared = thread.predeclared_names();
    let resolved = compile(source, &predeclared, &universal, thread.dialect)?;
    eval::exec_module(thread, name, &resolved)
}

/// Executes an already-[`compile`]d module, for embedders (such as a
/// [`ModuleSource`] implementation) that resolve once and may re-run or
/// cache the result.
pub fn run_resolved(thread: &mut Thread, name: impl Into<String>, resolved: &ResolvedModule) -> RunResult<std::rc::Rc<Module>> {
    eval::exec_module(thread, name, resolved)
}
