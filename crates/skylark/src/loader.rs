//! `load(...)` resolution: memoizes already-loaded modules and detects
//! load cycles. Reading source text from disk is out of scope for this
//! crate — the host supplies a callback that turns a module name into a
//! compiled [`Module`], and this layer only adds the memoization/cycle
//! bookkeeping a tree of `load` statements needs.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{RunResult, SkylarkError};
use crate::module::Module;

enum LoadState {
    Loading,
    Loaded(Rc<Module>),
}

pub trait ModuleSource {
    /// Resolves `name` (exactly as written in the `load(...)` statement)
    /// to a freshly executed, frozen module.
    fn load(&mut self, name: &str) -> RunResult<Rc<Module>>;
}

pub struct Loader<'a> {
    source: &'a mut dyn ModuleSource,
    cache: HashMap<String, LoadState>,
}

impl<'a> Loader<'a> {
    pub fn new(source: &'a mut dyn ModuleSource) -> Self {
        Loader { source, cache: HashMap::new() }
    }

    pub fn load(&mut self, name: &str) -> RunResult<Rc<Module>> {
        match self.cache.get(name) {
            Some(LoadState::Loaded(m)) => return Ok(m.clone()),
            Some(LoadState::Loading) => {
                return Err(SkylarkError::load(format!("cycle in load graph while loading {name:?}")));
            }
            None => {}
        }
        self.cache.insert(name.to_string(), LoadState::Loading);
        let module = self.source.load(name)?;
        self.cache.insert(name.to_string(), LoadState::Loaded(module.clone()));
        Ok(module)
    }
}
