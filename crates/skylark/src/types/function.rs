//! The runtime representation of a `def`/`lambda` closure: the compiled
//! body plus the cells it captured from enclosing scopes at the moment the
//! `def`/`lambda` expression was evaluated.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::ast::{Expr, Param, ParamKind, Stmt};
use crate::resolver::FunctionLayout;
use crate::value::Value;

/// A function body is either a statement block (`def`) or a single
/// expression (`lambda`); both share the same calling convention.
pub enum FunctionBody {
    Block(Rc<Vec<Stmt>>),
    Lambda(Rc<Expr>),
}

pub struct FunctionValue {
    pub name: String,
    pub params: Rc<Vec<Param>>,
    pub defaults: Vec<Option<Value>>,
    pub body: FunctionBody,
    pub layout: FunctionLayout,
    /// Cells captured from the defining scope, indexed by free-slot index.
    pub captured: Vec<Rc<RefCell<Value>>>,
    /// The module this function was defined in; globals resolve against it.
    /// Held weakly so a module's globals (which may include functions
    /// defined in it) never form an uncollectable `Rc` cycle.
    pub module: Weak<crate::module::Module>,
    frozen: Cell<bool>,
}

impl FunctionValue {
    pub fn new(
        name: String,
        params: Rc<Vec<Param>>,
        body: FunctionBody,
        layout: FunctionLayout,
        defaults: Vec<Option<Value>>,
        captured: Vec<Rc<RefCell<Value>>>,
        module: Weak<crate::module::Module>,
    ) -> Self {
        FunctionValue { name, params, defaults, body, layout, captured, module, frozen: Cell::new(false) }
    }

    pub fn freeze(&self) {
        self.frozen.set(true);
        for cell in &self.captured {
            cell.borrow().freeze();
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    pub fn has_star_args(&self) -> bool {
        self.params.iter().any(|p| matches!(p.kind, ParamKind::Star))
    }

    pub fn has_double_star(&self) -> bool {
        self.params.iter().any(|p| matches!(p.kind, ParamKind::DoubleStar))
    }
}
