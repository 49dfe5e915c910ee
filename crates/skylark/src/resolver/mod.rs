//! Static name resolution: classifies every identifier use as
//! local/free/cell/load-local/global/predeclared/universal and assigns slot
//! indices.
//!
//! Comprehensions are resolved in their own lexical block, exactly like a
//! nested `def`, with their own `FunctionLayout` and runtime frame — so
//! their target names never leak into the enclosing scope, and a `lambda`
//! nested in a comprehension body captures the comprehension's variables
//! through the same free/cell chain used for functions nested in functions.

pub mod scope;

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::ast::*;
use crate::error::{RunResult, SkylarkError};
use crate::resolver::scope::{BindingKind, BindingRef};

/// Where a function's free-variable slot pulls its cell from at closure
/// construction time.
#[derive(Debug, Clone, Copy)]
pub enum FreeSource {
    /// The immediately enclosing block's cell at this index.
    ParentCell(u32),
    /// The immediately enclosing block's own free slot at this index
    /// (propagated further up the chain for deeper nesting).
    ParentFree(u32),
}

/// Per-function (or per-module, per-comprehension) slot layout computed by
/// the resolver.
#[derive(Debug, Clone, Default)]
pub struct FunctionLayout {
    pub local_count: u32,
    pub cell_count: u32,
    pub free_count: u32,
    pub free_sources: Vec<FreeSource>,
    /// For each local slot (in declaration order, params first), the cell
    /// slot it was promoted to if some nested closure captured it.
    pub cell_local_slots: Vec<Option<u32>>,
    pub has_star_args: bool,
    pub has_double_star: bool,
    pub param_count: usize,
}

/// The fully resolved module: statements plus the slot counts needed to
/// build its execution frame, and the ordered list of global names.
pub struct ResolvedModule {
    pub statements: Vec<Stmt>,
    pub module_layout: FunctionLayout,
    pub globals: Vec<String>,
    pub file_locals: Vec<String>,
}

/// Host-provided configuration for a resolve pass.
pub struct ResolveEnv<'a> {
    pub predeclared: &'a HashSet<String>,
    pub universal: &'a HashSet<String>,
    pub allow_toplevel_control_flow: bool,
    pub allow_recursion: bool,
}

struct BlockScope {
    locals: IndexMap<String, u32>,
    cells: HashSet<String>,
    free: IndexMap<String, u32>,
    free_sources: Vec<FreeSource>,
    next_local: u32,
    has_star_args: bool,
    has_double_star: bool,
    param_count: usize,
    /// Depth of enclosing for/while loops, for break/continue validity.
    loop_depth: u32,
    /// Whether `return` is syntactically valid here (true inside a function
    /// body, false at module level / inside a bare comprehension block).
    in_function: bool,
}

impl BlockScope {
    fn new(in_function: bool) -> Self {
        Self {
            locals: IndexMap::new(),
            cells: HashSet::new(),
            free: IndexMap::new(),
            free_sources: Vec::new(),
            next_local: 0,
            has_star_args: false,
            has_double_star: false,
            param_count: 0,
            loop_depth: 0,
            in_function,
        }
    }

    fn declare_local(&mut self, name: &str) -> u32 {
        if let Some(slot) = self.locals.get(name) {
            return *slot;
        }
        let slot = self.next_local;
        self.next_local += 1;
        self.locals.insert(name.to_string(), slot);
        slot
    }

    /// `cell_index` maps a promoted local's name to the cell slot the
    /// owning scope assigned it (built incrementally in `resolve_use`).
    fn into_layout(self, cell_index: &HashMap<String, u32>) -> FunctionLayout {
        let mut cell_local_slots = vec![None; self.next_local as usize];
        for (name, slot) in &self.locals {
            if let Some(cell_slot) = cell_index.get(name) {
                cell_local_slots[*slot as usize] = Some(*cell_slot);
            }
        }
        FunctionLayout {
            local_count: self.next_local,
            cell_count: self.cells.len() as u32,
            free_count: self.free.len() as u32,
            free_sources: self.free_sources,
            cell_local_slots,
            has_star_args: self.has_star_args,
            has_double_star: self.has_double_star,
            param_count: self.param_count,
        }
    }
}

pub struct Resolver<'a> {
    env: &'a ResolveEnv<'a>,
    module_globals: IndexMap<String, u32>,
    file_locals: IndexMap<String, u32>,
    stack: Vec<BlockScope>,
    /// Cell slot index assigned to each local-owning scope (index into
    /// `stack`) for a given name, once promoted.
    cell_slots: Vec<HashMap<String, u32>>,
}

pub fn resolve(module: Module, env: &ResolveEnv) -> RunResult<ResolvedModule> {
    let mut r = Resolver {
        env,
        module_globals: IndexMap::new(),
        file_locals: IndexMap::new(),
        stack: vec![BlockScope::new(false)],
        cell_slots: vec![HashMap::new()],
    };
    r.collect_block_bindings(&module.statements, true)?;
    let mut statements = module.statements;
    for stmt in &mut statements {
        r.resolve_stmt(stmt, true)?;
    }
    let cell_map = r.cell_slots.pop().unwrap();
    let module_scope = r.stack.pop().unwrap();
    Ok(ResolvedModule {
        statements,
        module_layout: module_scope.into_layout(&cell_map),
        globals: r.module_globals.into_keys().collect(),
        file_locals: r.file_locals.into_keys().collect(),
    })
}

impl<'a> Resolver<'a> {
    /// Pass 1: collect names bound directly within this block (not
    /// descending into nested `def` bodies or comprehensions, which collect
    /// their own bindings independently).
    fn collect_block_bindings(&mut self, stmts: &[Stmt], is_module: bool) -> RunResult<()> {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Assign { target, .. } => self.collect_target(target, is_module)?,
                StmtKind::AugAssign { target, .. } => self.collect_target(target, is_module)?,
                StmtKind::For { target, body, .. } => {
                    self.collect_target(target, is_module)?;
                    self.collect_block_bindings(body, is_module)?;
                }
                StmtKind::While { body, .. } => self.collect_block_bindings(body, is_module)?,
                StmtKind::If { body, orelse, .. } => {
                    self.collect_block_bindings(body, is_module)?;
                    self.collect_block_bindings(orelse, is_module)?;
                }
                StmtKind::Def(def) => {
                    self.declare_name(&def.name.name, is_module)?;
                }
                StmtKind::Load { bindings, .. } => {
                    if !is_module {
                        return Err(SkylarkError::resolve("load is only allowed at module top level"));
                    }
                    for (local, _) in bindings {
                        if self.module_globals.contains_key(&local.name) {
                            return Err(SkylarkError::resolve(format!(
                                "load binds name {:?} that is already a global",
                                local.name
                            )));
                        }
                        if self.file_locals.contains_key(&local.name) {
                            return Err(SkylarkError::resolve(format!("duplicate load binding {:?}", local.name)));
                        }
                        let slot = self.file_locals.len() as u32;
                        self.file_locals.insert(local.name.clone(), slot);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn declare_name(&mut self, name: &str, is_module: bool) -> RunResult<()> {
        if is_module {
            if self.file_locals.contains_key(name) {
                return Err(SkylarkError::resolve(format!(
                    "name {name:?} is bound both by load and at module level"
                )));
            }
            if !self.module_globals.contains_key(name) {
                let slot = self.module_globals.len() as u32;
                self.module_globals.insert(name.to_string(), slot);
            }
        } else {
            self.stack.last_mut().unwrap().declare_local(name);
        }
        Ok(())
    }

    fn collect_target(&mut self, target: &Expr, is_module: bool) -> RunResult<()> {
        match &*target.kind {
            ExprKind::Identifier(id) => self.declare_name(&id.name, is_module)?,
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                for item in items {
                    self.collect_target(item, is_module)?;
                }
            }
            ExprKind::Index { .. } | ExprKind::Attribute { .. } => {
                // Not a binding occurrence; resolved as a normal use later.
            }
            _ => return Err(SkylarkError::resolve("invalid assignment target")),
        }
        Ok(())
    }

    fn resolve_stmt(&mut self, stmt: &mut Stmt, is_module: bool) -> RunResult<()> {
        match &mut stmt.kind {
            StmtKind::Expr(e) => self.resolve_expr(e)?,
            StmtKind::Assign { target, value } => {
                self.resolve_expr(value)?;
                self.resolve_target(target, is_module)?;
            }
            StmtKind::AugAssign { target, value, .. } => {
                self.resolve_target_use(target)?;
                self.resolve_expr(value)?;
            }
            StmtKind::Def(def) => self.resolve_def(def)?,
            StmtKind::Return(value) => {
                if !self.current_in_function() {
                    return Err(SkylarkError::resolve("return used outside a function"));
                }
                if let Some(v) = value {
                    self.resolve_expr(v)?;
                }
            }
            StmtKind::If { test, body, orelse } => {
                if is_module && self.stack.len() == 1 && !self.env.allow_toplevel_control_flow {
                    return Err(SkylarkError::resolve("if statement not allowed at module top level in strict dialect"));
                }
                self.resolve_expr(test)?;
                for s in body.iter_mut() {
                    self.resolve_stmt(s, is_module)?;
                }
                for s in orelse.iter_mut() {
                    self.resolve_stmt(s, is_module)?;
                }
            }
            StmtKind::For { target, iter, body } => {
                if is_module && self.stack.len() == 1 && !self.env.allow_toplevel_control_flow {
                    return Err(SkylarkError::resolve("for statement not allowed at module top level in strict dialect"));
                }
                self.resolve_expr(iter)?;
                self.resolve_target(target, is_module)?;
                self.stack.last_mut().unwrap().loop_depth += 1;
                for s in body.iter_mut() {
                    self.resolve_stmt(s, is_module)?;
                }
                self.stack.last_mut().unwrap().loop_depth -= 1;
            }
            StmtKind::While { test, body } => {
                if is_module && self.stack.len() == 1 && !self.env.allow_toplevel_control_flow {
                    return Err(SkylarkError::resolve("while statement not allowed at module top level in strict dialect"));
                }
                self.resolve_expr(test)?;
                self.stack.last_mut().unwrap().loop_depth += 1;
                for s in body.iter_mut() {
                    self.resolve_stmt(s, is_module)?;
                }
                self.stack.last_mut().unwrap().loop_depth -= 1;
            }
            StmtKind::Break | StmtKind::Continue => {
                if self.stack.last().unwrap().loop_depth == 0 {
                    return Err(SkylarkError::resolve("break/continue outside of a loop"));
                }
            }
            StmtKind::Pass => {}
            StmtKind::Load { bindings, .. } => {
                for (local, _) in bindings.iter_mut() {
                    let slot = *self.file_locals.get(&local.name).expect("collected in pass 1");
                    local.binding = Some(BindingRef {
                        kind: BindingKind::LoadLocal,
                        index: slot,
                    });
                }
            }
        }
        Ok(())
    }

    fn current_in_function(&self) -> bool {
        self.stack.last().map(|s| s.in_function).unwrap_or(false)
    }

    fn resolve_target(&mut self, target: &mut Expr, is_module: bool) -> RunResult<()> {
        match &mut *target.kind {
            ExprKind::Identifier(id) => {
                self.bind_identifier(id, is_module)?;
            }
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                for item in items.iter_mut() {
                    self.resolve_target(item, is_module)?;
                }
            }
            ExprKind::Index { value, index } => {
                self.resolve_expr(value)?;
                self.resolve_expr(index)?;
            }
            ExprKind::Attribute { value, .. } => {
                self.resolve_expr(value)?;
            }
            _ => return Err(SkylarkError::resolve("invalid assignment target")),
        }
        Ok(())
    }

    /// Augmented-assignment targets are read-then-written but restricted to
    /// name/index/attribute; resolve as an ordinary use here, binding is
    /// identical to a plain identifier use (it must already be bound).
    fn resolve_target_use(&mut self, target: &mut Expr) -> RunResult<()> {
        match &mut *target.kind {
            ExprKind::Identifier(_) | ExprKind::Index { .. } | ExprKind::Attribute { .. } => self.resolve_expr(target),
            _ => Err(SkylarkError::resolve("invalid augmented assignment target")),
        }
    }

    fn bind_identifier(&mut self, id: &mut Identifier, is_module: bool) -> RunResult<()> {
        if is_module && self.stack.len() == 1 {
            let slot = *self
                .module_globals
                .get(&id.name)
                .expect("module-level targets were collected in pass 1");
            id.binding = Some(BindingRef {
                kind: BindingKind::Global,
                index: slot,
            });
        } else {
            let slot = self.stack.last_mut().unwrap().declare_local(&id.name);
            id.binding = Some(BindingRef {
                kind: BindingKind::Local,
                index: slot,
            });
        }
        Ok(())
    }

    fn resolve_def(&mut self, def: &mut FunctionDef) -> RunResult<()> {
        let mut scope = BlockScope::new(true);
        let mut seen = HashSet::new();
        let mut seen_star = false;
        let mut seen_double_star = false;
        let mut after_star = false;
        for param in &def.params {
            match &param.kind {
                ParamKind::Normal { .. } => {
                    if !seen.insert(param.name.name.clone()) {
                        return Err(SkylarkError::resolve(format!("duplicate parameter {:?}", param.name.name)));
                    }
                    scope.declare_local(&param.name.name);
                    scope.param_count += 1;
                }
                ParamKind::Star => {
                    if seen_star {
                        return Err(SkylarkError::resolve("at most one *args parameter is allowed"));
                    }
                    seen_star = true;
                    after_star = true;
                    scope.has_star_args = true;
                    scope.declare_local(&param.name.name);
                    scope.param_count += 1;
                }
                ParamKind::StarMarker => {
                    if seen_star {
                        return Err(SkylarkError::resolve("at most one * separator is allowed"));
                    }
                    seen_star = true;
                    after_star = true;
                }
                ParamKind::DoubleStar => {
                    if seen_double_star {
                        return Err(SkylarkError::resolve("at most one **kwargs parameter is allowed"));
                    }
                    seen_double_star = true;
                    scope.has_double_star = true;
                    scope.declare_local(&param.name.name);
                    scope.param_count += 1;
                }
            }
            let _ = after_star;
        }
        self.stack.push(scope);
        self.cell_slots.push(HashMap::new());
        self.collect_block_bindings(&def.body, false)?;
        let mut params = def.params.clone();
        for param in params.iter_mut() {
            if let ParamKind::Normal { default: Some(d) } = &mut param.kind {
                // Defaults are evaluated in the *enclosing* scope.
                self.resolve_expr(d)?;
            }
        }
        def.params = params;
        let mut body = std::mem::take(&mut def.body);
        for s in body.iter_mut() {
            self.resolve_stmt(s, false)?;
        }
        def.body = body;
        let cell_map = self.cell_slots.pop().unwrap();
        let scope = self.stack.pop().unwrap();
        def.resolved = Some(scope.into_layout(&cell_map));
        Ok(())
    }

    fn resolve_expr(&mut self, expr: &mut Expr) -> RunResult<()> {
        match &mut *expr.kind {
            ExprKind::None | ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) => {}
            ExprKind::Identifier(id) => self.resolve_use(id)?,
            ExprKind::List(items) | ExprKind::Tuple(items) | ExprKind::Set(items) => {
                for i in items.iter_mut() {
                    self.resolve_expr(i)?;
                }
            }
            ExprKind::Dict(pairs) => {
                for (k, v) in pairs.iter_mut() {
                    self.resolve_expr(k)?;
                    self.resolve_expr(v)?;
                }
            }
            ExprKind::ListComp { expr: e, clauses, resolved } | ExprKind::SetComp { expr: e, clauses, resolved } => {
                *resolved = Some(self.resolve_comprehension(clauses, |r| r.resolve_expr(e))?);
            }
            ExprKind::DictComp { key, value, clauses, resolved } => {
                *resolved = Some(self.resolve_comprehension(clauses, |r| {
                    r.resolve_expr(key)?;
                    r.resolve_expr(value)
                })?);
            }
            ExprKind::Unary { operand, .. } => self.resolve_expr(operand)?,
            ExprKind::Binary { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }
            ExprKind::BoolOp { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }
            ExprKind::Compare { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }
            ExprKind::Not(e) => self.resolve_expr(e)?,
            ExprKind::Conditional { body, test, orelse } => {
                self.resolve_expr(body)?;
                self.resolve_expr(test)?;
                self.resolve_expr(orelse)?;
            }
            ExprKind::Call { func, args } => {
                self.resolve_expr(func)?;
                for a in args.iter_mut() {
                    match a {
                        Argument::Positional(e) | Argument::Named(_, e) | Argument::Star(e) | Argument::DoubleStar(e) => {
                            self.resolve_expr(e)?;
                        }
                    }
                }
            }
            ExprKind::Index { value, index } => {
                self.resolve_expr(value)?;
                self.resolve_expr(index)?;
            }
            ExprKind::Slice { value, start, stop, step } => {
                self.resolve_expr(value)?;
                if let Some(s) = start {
                    self.resolve_expr(s)?;
                }
                if let Some(s) = stop {
                    self.resolve_expr(s)?;
                }
                if let Some(s) = step {
                    self.resolve_expr(s)?;
                }
            }
            ExprKind::Attribute { value, .. } => self.resolve_expr(value)?,
            ExprKind::Lambda { params, body, resolved } => {
                let mut scope = BlockScope::new(true);
                for p in params.iter() {
                    if let ParamKind::Normal { .. } | ParamKind::Star | ParamKind::DoubleStar = &p.kind {
                        scope.declare_local(&p.name.name);
                        scope.param_count += 1;
                    }
                    if let ParamKind::Star = &p.kind {
                        scope.has_star_args = true;
                    }
                    if let ParamKind::DoubleStar = &p.kind {
                        scope.has_double_star = true;
                    }
                }
                for p in params.iter_mut() {
                    if let ParamKind::Normal { default: Some(d) } = &mut p.kind {
                        self.resolve_expr(d)?;
                    }
                }
                self.stack.push(scope);
                self.cell_slots.push(HashMap::new());
                self.resolve_expr(body)?;
                let cell_map = self.cell_slots.pop().unwrap();
                let scope = self.stack.pop().unwrap();
                *resolved = Some(scope.into_layout(&cell_map));
            }
        }
        Ok(())
    }

    /// Resolves a comprehension's clauses and body in a dedicated block
    /// scope (so its target names never leak) and returns that scope's own
    /// runtime frame layout. Unlike `def`, `return` is never valid inside
    /// this scope, but it otherwise behaves exactly like a nested function
    /// for the purposes of free/cell variable capture.
    fn resolve_comprehension(
        &mut self,
        clauses: &mut [CompClause],
        mut resolve_body: impl FnMut(&mut Self) -> RunResult<()>,
    ) -> RunResult<FunctionLayout> {
        // The first `for` clause's iterable resolves in the *enclosing*
        // block.
        self.resolve_expr(&mut clauses[0].iter)?;

        let scope = BlockScope::new(false);
        self.stack.push(scope);
        self.cell_slots.push(HashMap::new());

        for (i, clause) in clauses.iter_mut().enumerate() {
            if i > 0 {
                self.resolve_expr(&mut clause.iter)?;
            }
            self.resolve_target(&mut clause.target, false)?;
            for cond in clause.ifs.iter_mut() {
                self.resolve_expr(cond)?;
            }
        }
        resolve_body(self)?;
        let cell_map = self.cell_slots.pop().unwrap();
        let scope = self.stack.pop().unwrap();
        Ok(scope.into_layout(&cell_map))
    }

    fn resolve_use(&mut self, id: &mut Identifier) -> RunResult<()> {
        // Search the function/comprehension stack innermost to outermost.
        for depth in (0..self.stack.len()).rev() {
            if let Some(slot) = self.stack[depth].locals.get(&id.name).copied() {
                if depth == self.stack.len() - 1 {
                    id.binding = Some(BindingRef {
                        kind: BindingKind::Local,
                        index: slot,
                    });
                } else {
                    // Promote the owning scope's binding to a cell, then
                    // register a free slot in every scope between it and
                    // the use site.
                    let cell_slot = *self.cell_slots[depth].entry(id.name.clone()).or_insert_with(|| {
                        let owner = &mut self.stack[depth];
                        let next = owner.cells.len() as u32;
                        owner.cells.insert(id.name.clone());
                        next
                    });
                    let mut prev_is_owner = true;
                    let mut prev_index = cell_slot;
                    for upper in (depth + 1)..self.stack.len() {
                        let existing = self.stack[upper].free.get(&id.name).copied();
                        let free_index = if let Some(existing) = existing {
                            existing
                        } else {
                            let idx = self.stack[upper].free.len() as u32;
                            self.stack[upper].free.insert(id.name.clone(), idx);
                            let source = if prev_is_owner {
                                FreeSource::ParentCell(prev_index)
                            } else {
                                FreeSource::ParentFree(prev_index)
                            };
                            self.stack[upper].free_sources.push(source);
                            idx
                        };
                        prev_is_owner = false;
                        prev_index = free_index;
                    }
                    id.binding = Some(BindingRef {
                        kind: BindingKind::Free,
                        index: prev_index,
                    });
                }
                return Ok(());
            }
        }
        if let Some(slot) = self.file_locals.get(&id.name).copied() {
            id.binding = Some(BindingRef {
                kind: BindingKind::LoadLocal,
                index: slot,
            });
            return Ok(());
        }
        if let Some(slot) = self.module_globals.get(&id.name).copied() {
            id.binding = Some(BindingRef {
                kind: BindingKind::Global,
                index: slot,
            });
            return Ok(());
        }
        if self.env.predeclared.contains(&id.name) {
            id.binding = Some(BindingRef {
                kind: BindingKind::Predeclared,
                index: 0,
            });
            return Ok(());
        }
        if self.env.universal.contains(&id.name) {
            id.binding = Some(BindingRef {
                kind: BindingKind::Universal,
                index: 0,
            });
            return Ok(());
        }
        Err(SkylarkError::resolve(format!("undefined name {:?}", id.name)))
    }
}
