//! The tree-walking evaluator: executes a resolved module's statements
//! against a [`Frame`], split into a statement-executing half and an
//! expression-evaluating half.

use std::cell::RefCell;
use std::rc::Rc;

use crate::args::{bind_arguments, expand_call_args, CallArgs};
use crate::ast::{Argument, BinOp, BoolOp, CompClause, CompareOp, Expr, ExprKind, FunctionDef, Stmt, StmtKind, UnaryOp};
use crate::error::{RunResult, SkylarkError};
use crate::frame::Frame;
use crate::module::Module;
use crate::resolver::scope::{BindingKind, BindingRef};
use crate::resolver::{FunctionLayout, ResolvedModule};
use crate::thread::Thread;
use crate::types::dict::DictData;
use crate::types::function::{FunctionBody, FunctionValue};
use crate::types::list::ListData;
use crate::types::set::SetData;
use crate::value::{self, CompareOrdering, Value};

/// The result of executing one statement or block: either control fell off
/// the end, or a `break`/`continue`/`return` is propagating outward.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Executes a freshly resolved module to completion, returning the module
/// object (already frozen) so it can be handed to `load(...)` callers.
pub fn exec_module(thread: &mut Thread, name: impl Into<String>, resolved: &ResolvedModule) -> RunResult<Rc<Module>> {
    let module = Rc::new(Module::new(name, resolved.globals.clone(), resolved.file_locals.len()));
    let mut frame = Frame::new(&resolved.module_layout, Vec::new());
    for stmt in &resolved.statements {
        thread.step()?;
        match exec_stmt(thread, &module, &mut frame, stmt)? {
            Flow::Normal => {}
            Flow::Return(_) => return Err(SkylarkError::resolve("return used outside a function")),
            Flow::Break | Flow::Continue => return Err(SkylarkError::resolve("break/continue outside of a loop")),
        }
    }
    module.freeze();
    Ok(module)
}

/// Calls any callable [`Value`] (a user function or a builtin) with
/// already-expanded arguments.
pub fn call_value(thread: &mut Thread, func: &Value, args: CallArgs) -> RunResult<Value> {
    match func {
        Value::Function(f) => call_function(thread, f, args),
        Value::Builtin(b) => match b.kind {
            crate::value::BuiltinKind::Universal(f) => f(thread, args),
            crate::value::BuiltinKind::Attr(method) => {
                let receiver = b.receiver.as_ref().expect("bound method always carries a receiver");
                crate::callable::call_attr(thread, receiver, method, args)
            }
        },
        other => Err(SkylarkError::type_error(format!("'{}' object is not callable", other.type_name()))),
    }
}

fn call_function(thread: &mut Thread, f: &Rc<FunctionValue>, args: CallArgs) -> RunResult<Value> {
    thread.enter_call(&Value::Function(f.clone()))?;
    let result = (|| {
        let module = f
            .module
            .upgrade()
            .ok_or_else(|| SkylarkError::value_error("function's defining module is no longer available"))?;
        let bound = bind_arguments(&f.name, &f.params, &f.defaults, args)?;
        let mut frame = Frame::new(&f.layout, f.captured.clone());
        for (i, v) in bound.into_iter().enumerate() {
            frame.set_local(i as u32, v);
        }
        match &f.body {
            FunctionBody::Block(stmts) => {
                for stmt in stmts.iter() {
                    thread.step()?;
                    match exec_stmt(thread, &module, &mut frame, stmt)? {
                        Flow::Normal => {}
                        Flow::Return(v) => return Ok(v),
                        Flow::Break | Flow::Continue => {
                            return Err(SkylarkError::resolve("break/continue outside of a loop"));
                        }
                    }
                }
                Ok(Value::None)
            }
            FunctionBody::Lambda(body) => eval_expr(thread, &module, &mut frame, body),
        }
    })();
    thread.exit_call();
    result.map_err(|e| e.push_frame(f.name.clone(), Default::default()))
}

// ---- Statement execution ----

fn exec_block(thread: &mut Thread, module: &Rc<Module>, frame: &mut Frame, stmts: &[Stmt]) -> RunResult<Flow> {
    for stmt in stmts {
        thread.step()?;
        match exec_stmt(thread, module, frame, stmt)? {
            Flow::Normal => continue,
            other => return Ok(other),
        }
    }
    Ok(Flow::Normal)
}

fn exec_stmt(thread: &mut Thread, module: &Rc<Module>, frame: &mut Frame, stmt: &Stmt) -> RunResult<Flow> {
    match &stmt.kind {
        StmtKind::Expr(e) => {
            eval_expr(thread, module, frame, e)?;
            Ok(Flow::Normal)
        }
        StmtKind::Assign { target, value } => {
            let v = eval_expr(thread, module, frame, value)?;
            assign_target(thread, module, frame, target, v)?;
            Ok(Flow::Normal)
        }
        StmtKind::AugAssign { target, op, value } => {
            let current = eval_expr(thread, module, frame, target)?;
            let rhs = eval_expr(thread, module, frame, value)?;
            let updated = apply_binop(*op, &current, &rhs)?;
            assign_target(thread, module, frame, target, updated)?;
            Ok(Flow::Normal)
        }
        StmtKind::Def(def) => {
            let f = build_function(thread, module, frame, def)?;
            let binding = def.name.binding.expect("resolver assigns a binding to every def");
            store_binding(module, frame, binding, f);
            Ok(Flow::Normal)
        }
        StmtKind::Return(value) => {
            let v = match value {
                Some(e) => eval_expr(thread, module, frame, e)?,
                None => Value::None,
            };
            Ok(Flow::Return(v))
        }
        StmtKind::If { test, body, orelse } => {
            let branch = if eval_expr(thread, module, frame, test)?.truth() { body } else { orelse };
            exec_block(thread, module, frame, branch)
        }
        StmtKind::For { target, iter, body } => exec_for(thread, module, frame, target, iter, body),
        StmtKind::While { test, body } => {
            loop {
                thread.step()?;
                if !eval_expr(thread, module, frame, test)?.truth() {
                    break;
                }
                match exec_block(thread, module, frame, body)? {
                    Flow::Normal | Flow::Continue => continue,
                    Flow::Break => break,
                    Flow::Return(v) => return Ok(Flow::Return(v)),
                }
            }
            Ok(Flow::Normal)
        }
        StmtKind::Break => Ok(Flow::Break),
        StmtKind::Continue => Ok(Flow::Continue),
        StmtKind::Pass => Ok(Flow::Normal),
        StmtKind::Load { module: name, bindings } => {
            let exported = thread.load(name)?;
            for (local, source_name) in bindings {
                let (_, v) = exported
                    .iter()
                    .find(|(n, _)| n == source_name)
                    .ok_or_else(|| SkylarkError::load(format!("module {name:?} has no exported name {source_name:?}")))?;
                let slot = match local.binding {
                    Some(BindingRef { kind: BindingKind::LoadLocal, index }) => index,
                    _ => unreachable!("load bindings are always resolved as LoadLocal"),
                };
                module.set_file_local(slot, v.clone());
            }
            Ok(Flow::Normal)
        }
    }
}

fn exec_for(thread: &mut Thread, module: &Rc<Module>, frame: &mut Frame, target: &Expr, iter: &Expr, body: &[Stmt]) -> RunResult<Flow> {
    let iterable = eval_expr(thread, module, frame, iter)?;
    let _guard = IterGuard::new(&iterable);
    let items = value::iterate(&iterable)?;
    for item in items {
        thread.step()?;
        assign_target(thread, module, frame, target, item)?;
        match exec_block(thread, module, frame, body)? {
            Flow::Normal | Flow::Continue => continue,
            Flow::Break => break,
            Flow::Return(v) => return Ok(Flow::Return(v)),
        }
    }
    Ok(Flow::Normal)
}

/// Holds the mutation-during-iteration guard on a container for the
/// duration of a `for` loop or comprehension clause, releasing it on drop
/// so an early `return`/`break`/propagated error can't leak the guard.
enum IterGuard {
    List(Rc<RefCell<ListData>>),
    Dict(Rc<RefCell<DictData>>),
    Set(Rc<RefCell<SetData>>),
    None,
}

impl IterGuard {
    fn new(v: &Value) -> Self {
        match v {
            Value::List(l) => {
                l.borrow_mut().begin_iter();
                IterGuard::List(l.clone())
            }
            Value::Dict(d) => {
                d.borrow_mut().begin_iter();
                IterGuard::Dict(d.clone())
            }
            Value::Set(s) => {
                s.borrow_mut().begin_iter();
                IterGuard::Set(s.clone())
            }
            _ => IterGuard::None,
        }
    }
}

impl Drop for IterGuard {
    fn drop(&mut self) {
        match self {
            IterGuard::List(l) => l.borrow_mut().end_iter(),
            IterGuard::Dict(d) => d.borrow_mut().end_iter(),
            IterGuard::Set(s) => s.borrow_mut().end_iter(),
            IterGuard::None => {}
        }
    }
}

/// Assigns `value` into `target`, which is either an identifier, a
/// destructuring tuple/list, or an index expression. Attribute targets are
/// rejected here (see [`eval_expr`]'s `Attribute` arm): this object model
/// has no user-settable attributes, so `x.attr = value` is an
/// evaluation-time error even though the grammar accepts the syntax.
fn assign_target(thread: &mut Thread, module: &Rc<Module>, frame: &mut Frame, target: &Expr, value: Value) -> RunResult<()> {
    match &*target.kind {
        ExprKind::Identifier(id) => {
            let binding = id.binding.expect("resolver assigns a binding to every assignment target");
            store_binding(module, frame, binding, value);
            Ok(())
        }
        ExprKind::Tuple(items) | ExprKind::List(items) => {
            let values = value::iterate(&value)?;
            if values.len() != items.len() {
                return Err(SkylarkError::value_error(format!(
                    "too {} values to unpack (expected {}, got {})",
                    if values.len() < items.len() { "few" } else { "many" },
                    items.len(),
                    values.len()
                )));
            }
            for (item, v) in items.iter().zip(values) {
                assign_target(thread, module, frame, item, v)?;
            }
            Ok(())
        }
        ExprKind::Index { value: recv, index } => {
            let recv = eval_expr(thread, module, frame, recv)?;
            let idx = eval_expr(thread, module, frame, index)?;
            set_index(&recv, &idx, value)
        }
        ExprKind::Attribute { .. } => Err(SkylarkError::type_error("attribute assignment is not supported")),
        _ => Err(SkylarkError::resolve("invalid assignment target")),
    }
}

fn store_binding(module: &Rc<Module>, frame: &mut Frame, binding: BindingRef, value: Value) {
    match binding.kind {
        BindingKind::Local => frame.set_local(binding.index, value),
        BindingKind::Free => frame.set_free(binding.index, value),
        BindingKind::Global => module
            .set_global(binding.index, value)
            .expect("a frozen module would already have rejected this assignment during resolution"),
        BindingKind::LoadLocal => module.set_file_local(binding.index, value),
        BindingKind::Cell | BindingKind::Predeclared | BindingKind::Universal => {
            unreachable!("not a valid assignment target binding")
        }
    }
}

fn set_index(recv: &Value, idx: &Value, value: Value) -> RunResult<()> {
    match recv {
        Value::List(l) => l.borrow_mut().set_index(as_index(idx)?, value),
        Value::Dict(d) => d.borrow_mut().set(idx.clone(), value),
        _ => Err(SkylarkError::type_error(format!("'{}' object does not support item assignment", recv.type_name()))),
    }
}

fn as_index(v: &Value) -> RunResult<i64> {
    match v {
        Value::Int(i) => num_traits::ToPrimitive::to_i64(i).ok_or_else(|| SkylarkError::value_error("index out of range")),
        Value::Bool(b) => Ok(*b as i64),
        _ => Err(SkylarkError::type_error(format!("index must be an int, not '{}'", v.type_name()))),
    }
}

fn build_function(thread: &mut Thread, module: &Rc<Module>, frame: &mut Frame, def: &FunctionDef) -> RunResult<Value> {
    let layout = def.resolved.clone().expect("resolver fills in every def's layout");
    let mut defaults = Vec::with_capacity(layout.param_count);
    for param in &def.params {
        if let crate::ast::ParamKind::Normal { default } = &param.kind {
            defaults.push(match default {
                Some(e) => Some(eval_expr(thread, module, frame, e)?),
                None => None,
            });
        }
    }
    let captured = frame.build_captures(&layout.free_sources);
    Ok(Value::Function(Rc::new(FunctionValue::new(
        def.name.name.clone(),
        Rc::new(def.params.clone()),
        FunctionBody::Block(Rc::new(def.body.clone())),
        layout,
        defaults,
        captured,
        Rc::downgrade(module),
    ))))
}

// ---- Expression evaluation ----

fn eval_expr(thread: &mut Thread, module: &Rc<Module>, frame: &mut Frame, expr: &Expr) -> RunResult<Value> {
    thread.step()?;
    match &*expr.kind {
        ExprKind::None => Ok(Value::None),
        ExprKind::Bool(b) => Ok(Value::Bool(*b)),
        ExprKind::Int(digits) => parse_int_literal(digits),
        ExprKind::Float(f) => Ok(Value::Float(*f)),
        ExprKind::Str(s) => Ok(Value::str(s.clone())),
        ExprKind::Identifier(id) => load_binding(thread, module, frame, id),
        ExprKind::List(items) => {
            let values = items.iter().map(|e| eval_expr(thread, module, frame, e)).collect::<RunResult<Vec<_>>>()?;
            Ok(Value::list(values))
        }
        ExprKind::Tuple(items) => {
            let values = items.iter().map(|e| eval_expr(thread, module, frame, e)).collect::<RunResult<Vec<_>>>()?;
            Ok(Value::tuple(values))
        }
        ExprKind::Set(items) => {
            let mut s = SetData::new();
            for e in items {
                s.add(eval_expr(thread, module, frame, e)?)?;
            }
            Ok(Value::Set(Rc::new(RefCell::new(s))))
        }
        ExprKind::Dict(pairs) => {
            let mut d = DictData::new();
            for (k, v) in pairs {
                let k = eval_expr(thread, module, frame, k)?;
                let v = eval_expr(thread, module, frame, v)?;
                d.set(k, v)?;
            }
            Ok(Value::Dict(Rc::new(RefCell::new(d))))
        }
        ExprKind::ListComp { expr: body, clauses, resolved } => {
            let layout = resolved.as_ref().expect("resolver fills in every comprehension's layout");
            let mut out = Vec::new();
            run_comp_clauses(thread, module, frame, layout, clauses, &mut |thread, inner| {
                out.push(eval_expr(thread, module, inner, body)?);
                Ok(())
            })?;
            Ok(Value::list(out))
        }
        ExprKind::SetComp { expr: body, clauses, resolved } => {
            let layout = resolved.as_ref().expect("resolver fills in every comprehension's layout");
            let mut out = SetData::new();
            run_comp_clauses(thread, module, frame, layout, clauses, &mut |thread, inner| {
                let v = eval_expr(thread, module, inner, body)?;
                out.add(v)?;
                Ok(())
            })?;
            Ok(Value::Set(Rc::new(RefCell::new(out))))
        }
        ExprKind::DictComp { key, value, clauses, resolved } => {
            let layout = resolved.as_ref().expect("resolver fills in every comprehension's layout");
            let mut out = DictData::new();
            run_comp_clauses(thread, module, frame, layout, clauses, &mut |thread, inner| {
                let k = eval_expr(thread, module, inner, key)?;
                let v = eval_expr(thread, module, inner, value)?;
                out.set(k, v)?;
                Ok(())
            })?;
            Ok(Value::Dict(Rc::new(RefCell::new(out))))
        }
        ExprKind::Unary { op, operand } => {
            let v = eval_expr(thread, module, frame, operand)?;
            match op {
                UnaryOp::Neg => v.unary_neg(),
                UnaryOp::Pos => v.unary_pos(),
                UnaryOp::BitNot => v.unary_bitnot(),
            }
        }
        ExprKind::Binary { op, left, right } => {
            let l = eval_expr(thread, module, frame, left)?;
            let r = eval_expr(thread, module, frame, right)?;
            apply_binop(*op, &l, &r)
        }
        ExprKind::BoolOp { op, left, right } => {
            let l = eval_expr(thread, module, frame, left)?;
            match op {
                BoolOp::And => {
                    if !l.truth() {
                        Ok(l)
                    } else {
                        eval_expr(thread, module, frame, right)
                    }
                }
                BoolOp::Or => {
                    if l.truth() {
                        Ok(l)
                    } else {
                        eval_expr(thread, module, frame, right)
                    }
                }
            }
        }
        ExprKind::Compare { op, left, right } => {
            let l = eval_expr(thread, module, frame, left)?;
            let r = eval_expr(thread, module, frame, right)?;
            apply_compare(*op, &l, &r)
        }
        ExprKind::Not(e) => Ok(Value::Bool(!eval_expr(thread, module, frame, e)?.truth())),
        ExprKind::Conditional { body, test, orelse } => {
            if eval_expr(thread, module, frame, test)?.truth() {
                eval_expr(thread, module, frame, body)
            } else {
                eval_expr(thread, module, frame, orelse)
            }
        }
        ExprKind::Call { func, args } => eval_call(thread, module, frame, func, args),
        ExprKind::Index { value: recv, index } => {
            let recv = eval_expr(thread, module, frame, recv)?;
            let idx = eval_expr(thread, module, frame, index)?;
            eval_index(&recv, &idx)
        }
        ExprKind::Slice { value: recv, start, stop, step } => {
            let recv = eval_expr(thread, module, frame, recv)?;
            let start = start.as_deref().map(|e| eval_expr(thread, module, frame, e)).transpose()?;
            let stop = stop.as_deref().map(|e| eval_expr(thread, module, frame, e)).transpose()?;
            let step = step.as_deref().map(|e| eval_expr(thread, module, frame, e)).transpose()?;
            eval_slice(&recv, start.as_ref(), stop.as_ref(), step.as_ref())
        }
        ExprKind::Attribute { value: recv, attr } => {
            let recv = eval_expr(thread, module, frame, recv)?;
            match crate::callable::lookup_attr_method(&recv, &attr.name) {
                Some(method) => Ok(Value::Builtin(Rc::new(crate::value::BuiltinValue {
                    name: attr.name.clone(),
                    receiver: Some(recv),
                    kind: crate::value::BuiltinKind::Attr(method),
                }))),
                None => Err(SkylarkError::type_error(format!("'{}' object has no attribute '{}'", recv.type_name(), attr.name))),
            }
        }
        ExprKind::Lambda { params, body, resolved } => {
            let layout = resolved.as_ref().expect("resolver fills in every lambda's layout").clone();
            let captured = frame.build_captures(&layout.free_sources);
            Ok(Value::Function(Rc::new(FunctionValue::new(
                "lambda".to_string(),
                Rc::new(params.clone()),
                FunctionBody::Lambda(Rc::new((**body).clone())),
                layout,
                Vec::new(),
                captured,
                Rc::downgrade(module),
            ))))
        }
    }
}

fn parse_int_literal(digits: &str) -> RunResult<Value> {
    let (radix, body) = if let Some(rest) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (16, rest)
    } else if let Some(rest) = digits.strip_prefix("0o").or_else(|| digits.strip_prefix("0O")) {
        (8, rest)
    } else if let Some(rest) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        (2, rest)
    } else {
        (10, digits)
    };
    num_bigint::BigInt::parse_bytes(body.as_bytes(), radix)
        .map(Value::Int)
        .ok_or_else(|| SkylarkError::syntax(format!("invalid integer literal {digits:?}")))
}

fn load_binding(thread: &Thread, module: &Rc<Module>, frame: &Frame, id: &crate::ast::Identifier) -> RunResult<Value> {
    let binding = id.binding.expect("resolver assigns a binding to every identifier use");
    match binding.kind {
        BindingKind::Local | BindingKind::Cell => Ok(frame.get_local(binding.index)),
        BindingKind::Free => Ok(frame.get_free(binding.index)),
        BindingKind::Global => Ok(module.get_global(binding.index)),
        BindingKind::LoadLocal => Ok(module.get_file_local(binding.index)),
        BindingKind::Predeclared => thread
            .predeclared(&id.name)
            .ok_or_else(|| SkylarkError::resolve(format!("predeclared name {:?} was not supplied", id.name))),
        BindingKind::Universal => crate::builtins::make_builtin(&id.name)
            .ok_or_else(|| SkylarkError::resolve(format!("universal name {:?} is not a builtin", id.name))),
    }
}

fn eval_call(thread: &mut Thread, module: &Rc<Module>, frame: &mut Frame, func: &Expr, args: &[Argument]) -> RunResult<Value> {
    let callee = eval_expr(thread, module, frame, func)?;
    let mut positional = Vec::new();
    let mut named = Vec::new();
    let mut starred = Vec::new();
    let mut double_starred = Vec::new();
    for arg in args {
        match arg {
            Argument::Positional(e) => positional.push(eval_expr(thread, module, frame, e)?),
            Argument::Named(name, e) => named.push((name.clone(), eval_expr(thread, module, frame, e)?)),
            Argument::Star(e) => starred.push(eval_expr(thread, module, frame, e)?),
            Argument::DoubleStar(e) => double_starred.push(eval_expr(thread, module, frame, e)?),
        }
    }
    let call_args = expand_call_args(positional, named, starred, double_starred)?;
    call_value(thread, &callee, call_args)
}

fn eval_index(recv: &Value, idx: &Value) -> RunResult<Value> {
    match recv {
        Value::List(l) => l.borrow().get_index(as_index(idx)?),
        Value::Tuple(t) => {
            let i = crate::types::list::normalize_index(as_index(idx)?, t.len())
                .ok_or_else(|| SkylarkError::value_error("tuple index out of range"))?;
            Ok(t[i].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = crate::types::list::normalize_index(as_index(idx)?, chars.len())
                .ok_or_else(|| SkylarkError::value_error("string index out of range"))?;
            Ok(Value::str(chars[i].to_string()))
        }
        Value::Dict(d) => d
            .borrow()
            .get(idx)?
            .ok_or_else(|| SkylarkError::value_error(format!("key {} not found in dict", idx.repr()))),
        Value::Range(r) => r
            .get(as_index(idx)?)
            .map(Value::int)
            .ok_or_else(|| SkylarkError::value_error("range index out of range")),
        _ => Err(SkylarkError::type_error(format!("'{}' object is not indexable", recv.type_name()))),
    }
}

fn eval_slice(recv: &Value, start: Option<&Value>, stop: Option<&Value>, step: Option<&Value>) -> RunResult<Value> {
    let step_i = match step {
        Some(v) => as_index(v)?,
        None => 1,
    };
    let start_i = start.map(as_index).transpose()?;
    let stop_i = stop.map(as_index).transpose()?;
    match recv {
        Value::List(l) => {
            let items = &l.borrow().items;
            let (s, e, st) = crate::types::list::resolve_slice(start_i, stop_i, step_i, items.len())?;
            Ok(Value::list(slice_indices(s, e, st).map(|i| items[i as usize].clone()).collect()))
        }
        Value::Tuple(t) => {
            let (s, e, st) = crate::types::list::resolve_slice(start_i, stop_i, step_i, t.len())?;
            Ok(Value::tuple(slice_indices(s, e, st).map(|i| t[i as usize].clone()).collect()))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (a, b, st) = crate::types::list::resolve_slice(start_i, stop_i, step_i, chars.len())?;
            let out: String = slice_indices(a, b, st).map(|i| chars[i as usize]).collect();
            Ok(Value::str(out))
        }
        _ => Err(SkylarkError::type_error(format!("'{}' object is not sliceable", recv.type_name()))),
    }
}

fn slice_indices(start: i64, stop: i64, step: i64) -> impl Iterator<Item = i64> {
    let mut i = start;
    std::iter::from_fn(move || {
        let cond = if step > 0 { i < stop } else { i > stop };
        if !cond {
            return None;
        }
        let cur = i;
        i += step;
        Some(cur)
    })
}

fn apply_binop(op: BinOp, l: &Value, r: &Value) -> RunResult<Value> {
    match op {
        BinOp::Add => value::add(l, r),
        BinOp::Sub => value::sub(l, r),
        BinOp::Mul => value::mul(l, r),
        BinOp::Div => value::div(l, r),
        BinOp::FloorDiv => value::floordiv(l, r),
        BinOp::Mod => value::modulo(l, r),
        BinOp::Pow => value::pow(l, r),
        BinOp::BitOr => value::bit_or(l, r),
        BinOp::BitAnd => value::bit_and(l, r),
        BinOp::BitXor => value::bit_xor(l, r),
        BinOp::Shl => value::shl(l, r),
        BinOp::Shr => value::shr(l, r),
    }
}

fn apply_compare(op: CompareOp, l: &Value, r: &Value) -> RunResult<Value> {
    match op {
        CompareOp::Eq => Ok(Value::Bool(l.equals(r)?)),
        CompareOp::Ne => Ok(Value::Bool(!l.equals(r)?)),
        CompareOp::In => Ok(Value::Bool(contains(r, l)?)),
        CompareOp::NotIn => Ok(Value::Bool(!contains(r, l)?)),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let ord = l
                .compare(r)?
                .ok_or_else(|| SkylarkError::type_error(format!("'{}' and '{}' are not comparable", l.type_name(), r.type_name())))?;
            Ok(Value::Bool(match op {
                CompareOp::Lt => ord == CompareOrdering::Less,
                CompareOp::Le => ord != CompareOrdering::Greater,
                CompareOp::Gt => ord == CompareOrdering::Greater,
                CompareOp::Ge => ord != CompareOrdering::Less,
                _ => unreachable!(),
            }))
        }
    }
}

fn contains(container: &Value, item: &Value) -> RunResult<bool> {
    match container {
        Value::Str(s) => {
            let Value::Str(needle) = item else {
                return Err(SkylarkError::type_error("'in <string>' requires a string"));
            };
            Ok(s.contains(needle.as_ref()))
        }
        Value::Dict(d) => d.borrow().contains(item),
        Value::Set(s) => s.borrow().contains(item),
        Value::List(l) => {
            for v in &l.borrow().items {
                if v.equals(item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Tuple(t) => {
            for v in t.iter() {
                if v.equals(item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Range(r) => match item {
            Value::Int(i) => match num_traits::ToPrimitive::to_i64(i) {
                Some(i) => Ok(r.contains(i)),
                None => Ok(false),
            },
            _ => Ok(false),
        },
        _ => Err(SkylarkError::type_error(format!("argument of type '{}' is not iterable", container.type_name()))),
    }
}

/// Walks a comprehension's `for`/`if` clauses depth-first, invoking `emit`
/// once per surviving tuple of target bindings. Clause 0's iterable was
/// already resolved in the enclosing scope (per the resolver's contract);
/// the comprehension's own frame is built once (from the enclosing frame's
/// captures) and reused across every clause and iteration, matching the
/// resolver treating the whole comprehension as one lexical block.
fn run_comp_clauses(
    thread: &mut Thread,
    module: &Rc<Module>,
    outer_frame: &mut Frame,
    layout: &FunctionLayout,
    clauses: &[CompClause],
    emit: &mut dyn FnMut(&mut Thread, &mut Frame) -> RunResult<()>,
) -> RunResult<()> {
    let first_iterable = eval_expr(thread, module, outer_frame, &clauses[0].iter)?;
    let captures = outer_frame.build_captures(&layout.free_sources);
    let mut inner_frame = Frame::new(layout, captures);
    run_clause(thread, module, &mut inner_frame, clauses, 0, Some(first_iterable), emit)
}

fn run_clause(
    thread: &mut Thread,
    module: &Rc<Module>,
    inner_frame: &mut Frame,
    clauses: &[CompClause],
    clause_idx: usize,
    precomputed_iter: Option<Value>,
    emit: &mut dyn FnMut(&mut Thread, &mut Frame) -> RunResult<()>,
) -> RunResult<()> {
    if clause_idx == clauses.len() {
        return emit(thread, inner_frame);
    }
    let clause = &clauses[clause_idx];
    let iterable = match precomputed_iter {
        Some(v) => v,
        None => eval_expr(thread, module, inner_frame, &clause.iter)?,
    };
    let _guard = IterGuard::new(&iterable);
    let items = value::iterate(&iterable)?;
    for item in items {
        thread.step()?;
        assign_target(thread, module, inner_frame, &clause.target, item)?;
        let mut keep = true;
        for cond in &clause.ifs {
            if !eval_expr(thread, module, inner_frame, cond)?.truth() {
                keep = false;
                break;
            }
        }
        if keep {
            run_clause(thread, module, inner_frame, clauses, clause_idx + 1, None, emit)?;
        }
    }
    Ok(())
}
