//! The central [`Value`] tagged union and the arithmetic/comparison/hashing
//! rules that implement the object protocol.
//!
//! Heap-allocated containers (list/dict/set) are `Rc<RefCell<...>>` rather
//! than a hand-rolled reference-counted arena: values never cross threads,
//! so `Rc`'s single-threaded-only sharing costs nothing here, and it is
//! safe without any dec-ref bookkeeping to get wrong. See DESIGN.md.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::error::{RunResult, SkylarkError};
use crate::types::attr::AttrMethod;
use crate::types::dict::DictData;
use crate::types::function::FunctionValue;
use crate::types::list::ListData;
use crate::types::range::RangeValue;
use crate::types::set::SetData;

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<ListData>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<DictData>>),
    Set(Rc<RefCell<SetData>>),
    Function(Rc<FunctionValue>),
    Builtin(Rc<BuiltinValue>),
    Range(RangeValue),
}

/// A callable built-in: either a Universal-layer free function or a bound
/// attribute method (e.g. `mylist.append` taken as a first-class value).
pub struct BuiltinValue {
    pub name: String,
    pub receiver: Option<Value>,
    pub kind: BuiltinKind,
}

#[derive(Clone, Copy)]
pub enum BuiltinKind {
    Universal(crate::builtins::UniversalFn),
    Attr(AttrMethod),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOrdering {
    Less,
    Equal,
    Greater,
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn int(i: i64) -> Self {
        Value::Int(BigInt::from(i))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(ListData::new(items))))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(items))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Range(_) => "range",
        }
    }

    pub fn truth(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => !i.is_zero(),
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.borrow().items.is_empty(),
            Value::Tuple(t) => !t.is_empty(),
            Value::Dict(d) => !d.borrow().is_empty(),
            Value::Set(s) => !s.borrow().is_empty(),
            Value::Function(_) | Value::Builtin(_) => true,
            Value::Range(r) => !r.is_empty(),
        }
    }

    /// A stable identity for `id()` / default equality of callables, using
    /// a handful of reserved high bits per kind so ids never collide
    /// across kinds.
    pub fn identity(&self) -> u64 {
        const SINGLETON_TAG: u64 = 1 << 60;
        const FUNCTION_TAG: u64 = 2 << 60;
        const BUILTIN_TAG: u64 = 3 << 60;
        const HEAP_TAG: u64 = 4 << 60;
        match self {
            Value::None => SINGLETON_TAG,
            Value::Bool(b) => SINGLETON_TAG | (*b as u64) + 1,
            Value::Function(f) => FUNCTION_TAG | (Rc::as_ptr(f) as u64 & 0x0fff_ffff_ffff_ffff),
            Value::Builtin(b) => BUILTIN_TAG | (Rc::as_ptr(b) as u64 & 0x0fff_ffff_ffff_ffff),
            Value::List(l) => HEAP_TAG | (Rc::as_ptr(l) as u64 & 0x0fff_ffff_ffff_ffff),
            Value::Dict(d) => HEAP_TAG | (Rc::as_ptr(d) as u64 & 0x0fff_ffff_ffff_ffff),
            Value::Set(s) => HEAP_TAG | (Rc::as_ptr(s) as u64 & 0x0fff_ffff_ffff_ffff),
            Value::Tuple(t) => HEAP_TAG | (Rc::as_ptr(t) as u64 & 0x0fff_ffff_ffff_ffff),
            _ => HEAP_TAG, // Int/Float/Str/Range are value types; id() is of little use on them.
        }
    }

    pub fn is_hashable(&self) -> bool {
        match self {
            Value::None | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) | Value::Function(_) | Value::Builtin(_) => true,
            Value::Tuple(items) => items.iter().all(Value::is_hashable),
            Value::List(_) | Value::Dict(_) | Value::Set(_) | Value::Range(_) => false,
        }
    }

    pub fn hash_value(&self) -> RunResult<u64> {
        if !self.is_hashable() {
            return Err(SkylarkError::type_error(format!("unhashable type: '{}'", self.type_name())));
        }
        Ok(match self {
            Value::None => 0x1,
            Value::Bool(b) => numeric_hash_i64(*b as i64),
            Value::Int(i) => numeric_hash_bigint(i),
            Value::Float(f) => numeric_hash_float(*f),
            Value::Str(s) => polynomial_utf16_hash(s),
            Value::Function(f) => Rc::as_ptr(f) as u64,
            Value::Builtin(b) => Rc::as_ptr(b) as u64,
            Value::Tuple(items) => {
                let mut h: u64 = 0x345678;
                for item in items.iter() {
                    h = h.wrapping_mul(1_000_003) ^ item.hash_value()?;
                }
                h
            }
            _ => unreachable!("checked by is_hashable"),
        })
    }

    pub fn equals(&self, other: &Value) -> RunResult<bool> {
        Ok(match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(_) | Value::Float(_) | Value::Bool(_), Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
                numbers_equal(self, other)
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    true
                } else {
                    let (a, b) = (a.borrow(), b.borrow());
                    a.items.len() == b.items.len()
                        && a.items
                            .iter()
                            .zip(b.items.iter())
                            .map(|(x, y)| x.equals(y))
                            .collect::<RunResult<Vec<_>>>()?
                            .into_iter()
                            .all(|x| x)
                }
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .map(|(x, y)| x.equals(y))
                        .collect::<RunResult<Vec<_>>>()?
                        .into_iter()
                        .all(|x| x)
            }
            (Value::Dict(a), Value::Dict(b)) => a.borrow().py_eq(&b.borrow())?,
            (Value::Set(a), Value::Set(b)) => a.borrow().py_eq(&b.borrow())?,
            (Value::Range(a), Value::Range(b)) => a.py_eq(b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            _ => false,
        })
    }

    pub fn compare(&self, other: &Value) -> RunResult<Option<CompareOrdering>> {
        use CompareOrdering::{Equal, Greater, Less};
        Ok(match (self, other) {
            (Value::Int(_) | Value::Float(_) | Value::Bool(_), Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
                numbers_compare(self, other)
            }
            (Value::Str(a), Value::Str(b)) => Some(match a.as_ref().cmp(b.as_ref()) {
                std::cmp::Ordering::Less => Less,
                std::cmp::Ordering::Equal => Equal,
                std::cmp::Ordering::Greater => Greater,
            }),
            (Value::None, Value::None) => Some(Equal),
            (Value::List(a), Value::List(b)) => lexicographic_compare(&a.borrow().items, &b.borrow().items)?,
            (Value::Tuple(a), Value::Tuple(b)) => lexicographic_compare(a, b)?,
            (Value::Set(a), Value::Set(b)) => a.borrow().subset_compare(&b.borrow())?,
            _ => None,
        })
    }

    pub fn repr(&self) -> String {
        let mut out = String::new();
        let _ = self.repr_fmt(&mut out, &mut Vec::new());
        out
    }

    pub fn to_display_string(&self) -> String {
        if let Value::Str(s) = self {
            return s.to_string();
        }
        self.repr()
    }

    pub(crate) fn repr_fmt(&self, f: &mut String, seen: &mut Vec<u64>) -> std::fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Str(s) => write!(f, "{}", quote_string(s)),
            Value::List(l) => {
                let id = self.identity();
                if seen.contains(&id) {
                    return write!(f, "[...]");
                }
                seen.push(id);
                write!(f, "[")?;
                for (i, item) in l.borrow().items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.repr_fmt(f, seen)?;
                }
                seen.pop();
                write!(f, "]")
            }
            Value::Tuple(t) => {
                write!(f, "(")?;
                for (i, item) in t.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.repr_fmt(f, seen)?;
                }
                if t.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Dict(d) => {
                let id = self.identity();
                if seen.contains(&id) {
                    return write!(f, "{{...}}");
                }
                seen.push(id);
                write!(f, "{{")?;
                for (i, (k, v)) in d.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    k.repr_fmt(f, seen)?;
                    write!(f, ": ")?;
                    v.repr_fmt(f, seen)?;
                }
                seen.pop();
                write!(f, "}}")
            }
            Value::Set(s) => {
                write!(f, "set([")?;
                for (i, item) in s.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.repr_fmt(f, seen)?;
                }
                write!(f, "])")
            }
            Value::Function(func) => write!(f, "<function {}>", func.name),
            Value::Builtin(b) => write!(f, "<built-in function {}>", b.name),
            Value::Range(r) => write!(f, "range({}, {}, {})", r.start, r.stop, r.step),
        }
    }

    pub fn freeze(&self) {
        match self {
            Value::List(l) => {
                let mut l = l.borrow_mut();
                if l.frozen {
                    return;
                }
                l.frozen = true;
                let items = l.items.clone();
                drop(l);
                for item in items {
                    item.freeze();
                }
            }
            Value::Dict(d) => {
                let mut d = d.borrow_mut();
                if d.frozen {
                    return;
                }
                d.frozen = true;
                let pairs: Vec<(Value, Value)> = d.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                drop(d);
                for (k, v) in pairs {
                    k.freeze();
                    v.freeze();
                }
            }
            Value::Set(s) => {
                let mut s = s.borrow_mut();
                if s.frozen {
                    return;
                }
                s.frozen = true;
                let items: Vec<Value> = s.iter().cloned().collect();
                drop(s);
                for item in items {
                    item.freeze();
                }
            }
            Value::Function(func) => func.freeze(),
            Value::Tuple(items) => {
                for item in items.iter() {
                    item.freeze();
                }
            }
            _ => {}
        }
    }

    pub fn is_frozen(&self) -> bool {
        match self {
            Value::List(l) => l.borrow().frozen,
            Value::Dict(d) => d.borrow().frozen,
            Value::Set(s) => s.borrow().frozen,
            Value::Function(f) => f.is_frozen(),
            _ => true,
        }
    }

    pub fn len(&self) -> RunResult<usize> {
        match self {
            Value::Str(s) => Ok(s.chars().count()),
            Value::List(l) => Ok(l.borrow().items.len()),
            Value::Tuple(t) => Ok(t.len()),
            Value::Dict(d) => Ok(d.borrow().len()),
            Value::Set(s) => Ok(s.borrow().len()),
            Value::Range(r) => Ok(r.len()),
            _ => Err(SkylarkError::type_error(format!("object of type '{}' has no len()", self.type_name()))),
        }
    }

    pub fn unary_neg(&self) -> RunResult<Value> {
        match self {
            Value::Int(i) => Ok(Value::Int(-i.clone())),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Bool(b) => Ok(Value::int(-(*b as i64))),
            _ => Err(SkylarkError::type_error(format!("bad operand type for unary -: '{}'", self.type_name()))),
        }
    }

    pub fn unary_pos(&self) -> RunResult<Value> {
        match self {
            Value::Int(_) | Value::Float(_) => Ok(self.clone()),
            Value::Bool(b) => Ok(Value::int(*b as i64)),
            _ => Err(SkylarkError::type_error(format!("bad operand type for unary +: '{}'", self.type_name()))),
        }
    }

    pub fn unary_bitnot(&self) -> RunResult<Value> {
        match self {
            Value::Int(i) => Ok(Value::Int(!i.clone())),
            Value::Bool(b) => Ok(Value::Int(!BigInt::from(*b as i64))),
            _ => Err(SkylarkError::type_error(format!("bad operand type for unary ~: '{}'", self.type_name()))),
        }
    }
}

fn as_bigint(v: &Value) -> Option<BigInt> {
    match v {
        Value::Int(i) => Some(i.clone()),
        Value::Bool(b) => Some(BigInt::from(*b as i64)),
        _ => None,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => i.to_f64(),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(*b as i64 as f64),
        _ => None,
    }
}

fn is_float_value(v: &Value) -> bool {
    matches!(v, Value::Float(_))
}

fn numbers_equal(a: &Value, b: &Value) -> bool {
    if is_float_value(a) || is_float_value(b) {
        match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    } else {
        match (as_bigint(a), as_bigint(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}

fn numbers_compare(a: &Value, b: &Value) -> Option<CompareOrdering> {
    use CompareOrdering::{Equal, Greater, Less};
    if is_float_value(a) || is_float_value(b) {
        let (x, y) = (as_f64(a)?, as_f64(b)?);
        if x.is_nan() || y.is_nan() {
            return None;
        }
        return Some(if x < y {
            Less
        } else if x > y {
            Greater
        } else {
            Equal
        });
    }
    let (x, y) = (as_bigint(a)?, as_bigint(b)?);
    Some(match x.cmp(&y) {
        std::cmp::Ordering::Less => Less,
        std::cmp::Ordering::Equal => Equal,
        std::cmp::Ordering::Greater => Greater,
    })
}

fn lexicographic_compare(a: &[Value], b: &[Value]) -> RunResult<Option<CompareOrdering>> {
    use CompareOrdering::{Equal, Greater, Less};
    for (x, y) in a.iter().zip(b.iter()) {
        match x.compare(y)? {
            Some(Equal) => continue,
            other => return Ok(other),
        }
    }
    Ok(Some(match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Less => Less,
        std::cmp::Ordering::Equal => Equal,
        std::cmp::Ordering::Greater => Greater,
    }))
}

fn numeric_hash_i64(i: i64) -> u64 {
    // fits within f64 exactness too, so ints and equal floats hash alike.
    i as u64 ^ 0x9e37_79b9_7f4a_7c15
}

fn numeric_hash_bigint(i: &BigInt) -> u64 {
    if let Some(small) = i.to_i64() {
        return numeric_hash_i64(small);
    }
    let mut h: u64 = if i.is_negative() { 0xffff_ffff } else { 0 };
    for byte in i.to_signed_bytes_le() {
        h = h.wrapping_mul(257).wrapping_add(byte as u64);
    }
    h
}

fn numeric_hash_float(f: f64) -> u64 {
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        return numeric_hash_i64(f as i64);
    }
    f.to_bits()
}

/// Hashes a string as a polynomial accumulator over its UTF-16 transcoding.
/// `Str` is always valid UTF-8 (backed by `Rc<str>`), so there's no
/// invalid-sub-sequence case to special-case.
fn polynomial_utf16_hash(s: &str) -> u64 {
    let mut h: u64 = 0;
    for unit in s.encode_utf16() {
        h = h.wrapping_mul(31).wrapping_add(u64::from(unit));
    }
    h
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "+inf".to_string() } else { "-inf".to_string() };
    }
    if f.fract() == 0.0 && f.abs() < 1e17 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// ---- Binary arithmetic / bitwise operators ----

pub fn add(a: &Value, b: &Value) -> RunResult<Value> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Value::str(format!("{x}{y}"))),
        (Value::List(x), Value::List(y)) => {
            let mut items = x.borrow().items.clone();
            items.extend(y.borrow().items.iter().cloned());
            Ok(Value::list(items))
        }
        (Value::Tuple(x), Value::Tuple(y)) => {
            let mut items = x.as_ref().clone();
            items.extend(y.iter().cloned());
            Ok(Value::tuple(items))
        }
        _ if is_numeric(a) && is_numeric(b) => numeric_binop(a, b, |x, y| x + y, |x, y| x + y),
        _ => Err(SkylarkError::type_error(format!(
            "unsupported operand types for +: '{}' and '{}'",
            a.type_name(),
            b.type_name()
        ))),
    }
}

pub fn sub(a: &Value, b: &Value) -> RunResult<Value> {
    if is_numeric(a) && is_numeric(b) {
        return numeric_binop(a, b, |x, y| x - y, |x, y| x - y);
    }
    if let (Value::Set(x), Value::Set(y)) = (a, b) {
        return Ok(Value::Set(Rc::new(RefCell::new(x.borrow().difference(&y.borrow())))));
    }
    Err(SkylarkError::type_error(format!(
        "unsupported operand types for -: '{}' and '{}'",
        a.type_name(),
        b.type_name()
    )))
}

pub fn mul(a: &Value, b: &Value) -> RunResult<Value> {
    match (a, b) {
        (Value::Str(s), other) | (other, Value::Str(s)) if matches!(other, Value::Int(_) | Value::Bool(_)) => {
            let n = as_bigint(other).unwrap().to_i64().unwrap_or(0).max(0) as usize;
            Ok(Value::str(s.repeat(n)))
        }
        (Value::List(l), other) | (other, Value::List(l)) if matches!(other, Value::Int(_) | Value::Bool(_)) => {
            let n = as_bigint(other).unwrap().to_i64().unwrap_or(0).max(0) as usize;
            let items = l.borrow();
            let mut out = Vec::with_capacity(items.items.len() * n);
            for _ in 0..n {
                out.extend(items.items.iter().cloned());
            }
            Ok(Value::list(out))
        }
        (Value::Tuple(t), other) | (other, Value::Tuple(t)) if matches!(other, Value::Int(_) | Value::Bool(_)) => {
            let n = as_bigint(other).unwrap().to_i64().unwrap_or(0).max(0) as usize;
            let mut out = Vec::with_capacity(t.len() * n);
            for _ in 0..n {
                out.extend(t.iter().cloned());
            }
            Ok(Value::tuple(out))
        }
        _ if is_numeric(a) && is_numeric(b) => numeric_binop(a, b, |x, y| x * y, |x, y| x * y),
        _ => Err(SkylarkError::type_error(format!(
            "unsupported operand types for *: '{}' and '{}'",
            a.type_name(),
            b.type_name()
        ))),
    }
}

pub fn div(a: &Value, b: &Value) -> RunResult<Value> {
    if !(is_numeric(a) && is_numeric(b)) {
        return Err(SkylarkError::type_error(format!(
            "unsupported operand types for /: '{}' and '{}'",
            a.type_name(),
            b.type_name()
        )));
    }
    let (x, y) = (as_f64(a).unwrap(), as_f64(b).unwrap());
    if y == 0.0 {
        return Err(SkylarkError::arithmetic("float division by zero"));
    }
    Ok(Value::Float(x / y))
}

pub fn floordiv(a: &Value, b: &Value) -> RunResult<Value> {
    if !(is_numeric(a) && is_numeric(b)) {
        return Err(SkylarkError::type_error(format!(
            "unsupported operand types for //: '{}' and '{}'",
            a.type_name(),
            b.type_name()
        )));
    }
    if is_float_value(a) || is_float_value(b) {
        let (x, y) = (as_f64(a).unwrap(), as_f64(b).unwrap());
        if y == 0.0 {
            return Err(SkylarkError::arithmetic("float floor division by zero"));
        }
        return Ok(Value::Float((x / y).floor()));
    }
    let (x, y) = (as_bigint(a).unwrap(), as_bigint(b).unwrap());
    if y.is_zero() {
        return Err(SkylarkError::arithmetic("integer division by zero"));
    }
    let (q, _) = x.div_mod_floor(&y);
    Ok(Value::Int(q))
}

pub fn modulo(a: &Value, b: &Value) -> RunResult<Value> {
    if let (Value::Str(fmt), _) = (a, b) {
        return crate::format::percent_format(fmt, b);
    }
    if !(is_numeric(a) && is_numeric(b)) {
        return Err(SkylarkError::type_error(format!(
            "unsupported operand types for %: '{}' and '{}'",
            a.type_name(),
            b.type_name()
        )));
    }
    if is_float_value(a) || is_float_value(b) {
        let (x, y) = (as_f64(a).unwrap(), as_f64(b).unwrap());
        if y == 0.0 {
            return Err(SkylarkError::arithmetic("float modulo by zero"));
        }
        let r = x - (x / y).floor() * y;
        return Ok(Value::Float(r));
    }
    let (x, y) = (as_bigint(a).unwrap(), as_bigint(b).unwrap());
    if y.is_zero() {
        return Err(SkylarkError::arithmetic("integer modulo by zero"));
    }
    let (_, r) = x.div_mod_floor(&y);
    Ok(Value::Int(r))
}

pub fn pow(a: &Value, b: &Value) -> RunResult<Value> {
    if !(is_numeric(a) && is_numeric(b)) {
        return Err(SkylarkError::type_error(format!(
            "unsupported operand types for ** : '{}' and '{}'",
            a.type_name(),
            b.type_name()
        )));
    }
    if is_float_value(a) || is_float_value(b) {
        return Ok(Value::Float(as_f64(a).unwrap().powf(as_f64(b).unwrap())));
    }
    let base = as_bigint(a).unwrap();
    let exp = as_bigint(b).unwrap();
    if exp.is_negative() {
        return Err(SkylarkError::arithmetic("negative exponent not supported for int ** int"));
    }
    let exp_u32 = exp
        .to_u32()
        .ok_or_else(|| SkylarkError::arithmetic("exponent too large"))?;
    Ok(Value::Int(num_traits::pow::pow(base, exp_u32 as usize)))
}

fn bitwise(a: &Value, b: &Value, op_name: &str, f: impl Fn(&BigInt, &BigInt) -> BigInt) -> RunResult<Value> {
    match (as_bigint(a), as_bigint(b)) {
        (Some(x), Some(y)) => Ok(Value::Int(f(&x, &y))),
        _ => Err(SkylarkError::type_error(format!(
            "unsupported operand types for {op_name}: '{}' and '{}'",
            a.type_name(),
            b.type_name()
        ))),
    }
}

pub fn bit_or(a: &Value, b: &Value) -> RunResult<Value> {
    if let (Value::Dict(x), Value::Dict(y)) = (a, b) {
        return Ok(Value::Dict(Rc::new(RefCell::new(DictData::union(&x.borrow(), &y.borrow())?))));
    }
    if let (Value::Set(x), Value::Set(y)) = (a, b) {
        return Ok(Value::Set(Rc::new(RefCell::new(x.borrow().union(&y.borrow())?))));
    }
    bitwise(a, b, "|", |x, y| x | y)
}

pub fn bit_and(a: &Value, b: &Value) -> RunResult<Value> {
    if let (Value::Set(x), Value::Set(y)) = (a, b) {
        return Ok(Value::Set(Rc::new(RefCell::new(x.borrow().intersection(&y.borrow())?))));
    }
    bitwise(a, b, "&", |x, y| x & y)
}

pub fn bit_xor(a: &Value, b: &Value) -> RunResult<Value> {
    bitwise(a, b, "^", |x, y| x ^ y)
}

pub fn shl(a: &Value, b: &Value) -> RunResult<Value> {
    let (x, y) = match (as_bigint(a), as_bigint(b)) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(SkylarkError::type_error(format!(
                "unsupported operand types for <<: '{}' and '{}'",
                a.type_name(),
                b.type_name()
            )))
        }
    };
    if y.is_negative() {
        return Err(SkylarkError::arithmetic("negative shift count"));
    }
    let shift = y.to_u64().ok_or_else(|| SkylarkError::arithmetic("shift count too large"))?;
    Ok(Value::Int(x << shift as usize))
}

pub fn shr(a: &Value, b: &Value) -> RunResult<Value> {
    let (x, y) = match (as_bigint(a), as_bigint(b)) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(SkylarkError::type_error(format!(
                "unsupported operand types for >>: '{}' and '{}'",
                a.type_name(),
                b.type_name()
            )))
        }
    };
    if y.is_negative() {
        return Err(SkylarkError::arithmetic("negative shift count"));
    }
    let shift = y.to_u64().ok_or_else(|| SkylarkError::arithmetic("shift count too large"))?;
    Ok(Value::Int(x >> shift as usize))
}

/// Materializes any built-in iterable into a `Vec<Value>`, used everywhere
/// a `for` loop, comprehension, or builtin like `list()`/`sorted()` needs to
/// walk a value's elements. `Dict` yields its keys, matching `for k in d`.
pub fn iterate(v: &Value) -> RunResult<Vec<Value>> {
    match v {
        Value::List(l) => Ok(l.borrow().items.clone()),
        Value::Tuple(t) => Ok(t.as_ref().clone()),
        Value::Range(r) => Ok(r.iter().map(Value::int).collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
        Value::Set(s) => Ok(s.borrow().iter().cloned().collect()),
        Value::Dict(d) => Ok(d.borrow().keys().cloned().collect()),
        _ => Err(SkylarkError::type_error(format!("'{}' object is not iterable", v.type_name()))),
    }
}

fn is_numeric(v: &Value) -> bool {
    matches!(v, Value::Int(_) | Value::Float(_) | Value::Bool(_))
}

fn numeric_binop(a: &Value, b: &Value, f_int: impl Fn(BigInt, BigInt) -> BigInt, f_float: impl Fn(f64, f64) -> f64) -> RunResult<Value> {
    if is_float_value(a) || is_float_value(b) {
        Ok(Value::Float(f_float(as_f64(a).unwrap(), as_f64(b).unwrap())))
    } else {
        Ok(Value::Int(f_int(as_bigint(a).unwrap(), as_bigint(b).unwrap())))
    }
}
