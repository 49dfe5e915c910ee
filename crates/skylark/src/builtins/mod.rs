//! The Universal layer: names every module sees without declaring or
//! importing them, one function per builtin, collected into a single
//! dispatch table.

use std::rc::Rc;

use num_traits::ToPrimitive;

use crate::args::CallArgs;
use crate::error::{RunResult, SkylarkError};
use crate::thread::Thread;
use crate::types::dict::DictData;
use crate::types::range::RangeValue;
use crate::types::set::SetData;
use crate::value::Value;

/// A Universal-layer builtin: a plain function pointer, so `BuiltinKind`
/// (which must be `Copy` to keep `Value` cheaply cloneable) can hold one
/// directly rather than through an `Rc<dyn Fn>`.
pub type UniversalFn = fn(&mut Thread, CallArgs) -> RunResult<Value>;

/// The full builtin table, in the order the module doc lists them. Used
/// both to build a [`Value::Builtin`] by name and to seed the resolver's
/// universal-name set.
const TABLE: &[(&str, UniversalFn)] = &[
    ("len", len),
    ("range", range),
    ("type", type_of),
    ("bool", bool_),
    ("int", int_),
    ("float", float_),
    ("str", str_),
    ("list", list_),
    ("tuple", tuple_),
    ("dict", dict_),
    ("set", set_),
    ("repr", repr),
    ("print", print),
    ("dir", dir),
    ("getattr", getattr),
    ("hasattr", hasattr),
    ("min", min),
    ("max", max),
    ("sorted", sorted),
    ("reversed", reversed),
    ("enumerate", enumerate),
    ("zip", zip),
    ("all", all),
    ("any", any),
    ("abs", abs),
    ("chr", chr),
    ("ord", ord),
    ("hash", hash),
    ("fail", fail),
];

pub fn names() -> impl Iterator<Item = &'static str> {
    TABLE.iter().map(|(name, _)| *name)
}

pub fn lookup(name: &str) -> Option<UniversalFn> {
    TABLE.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
}

pub fn make_builtin(name: &str) -> Option<Value> {
    let f = lookup(name)?;
    Some(Value::Builtin(Rc::new(crate::value::BuiltinValue {
        name: name.to_string(),
        receiver: None,
        kind: crate::value::BuiltinKind::Universal(f),
    })))
}

fn one_positional(args: &CallArgs, name: &str) -> RunResult<Value> {
    args.positional.first().cloned().ok_or_else(|| SkylarkError::argument(format!("{name}() takes exactly one argument")))
}

fn as_index(v: &Value, name: &str) -> RunResult<i64> {
    match v {
        Value::Int(i) => i.to_i64().ok_or_else(|| SkylarkError::value_error(format!("{name}(): value too large"))),
        Value::Bool(b) => Ok(*b as i64),
        _ => Err(SkylarkError::type_error(format!("{name}() requires an int"))),
    }
}

fn named(args: &CallArgs, name: &str) -> Option<Value> {
    args.named.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
}

fn len(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    Ok(Value::int(one_positional(&args, "len")?.len()? as i64))
}

/// `range(stop)`, `range(start, stop)`, `range(start, stop, step)`.
fn range(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let a = &args.positional;
    let (start, stop, step) = match a.len() {
        1 => (0, as_index(&a[0], "range")?, 1),
        2 => (as_index(&a[0], "range")?, as_index(&a[1], "range")?, 1),
        3 => (as_index(&a[0], "range")?, as_index(&a[1], "range")?, as_index(&a[2], "range")?),
        _ => return Err(SkylarkError::argument("range() takes 1 to 3 arguments")),
    };
    let r = RangeValue::new(start, stop, step).ok_or_else(|| SkylarkError::value_error("range() step argument must not be zero"))?;
    Ok(Value::Range(r))
}

fn type_of(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    Ok(Value::str(one_positional(&args, "type")?.type_name()))
}

fn bool_(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    Ok(Value::Bool(args.positional.first().map(Value::truth).unwrap_or(false)))
}

fn int_(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let Some(v) = args.positional.first() else {
        return Ok(Value::int(0));
    };
    let base = match named(&args, "base") {
        Some(b) => Some(as_index(&b, "int")? as u32),
        None => None,
    };
    match v {
        Value::Int(i) => {
            if base.is_some() {
                return Err(SkylarkError::type_error("int() cannot take a base when argument is not a string"));
            }
            Ok(Value::Int(i.clone()))
        }
        Value::Bool(b) => {
            if base.is_some() {
                return Err(SkylarkError::type_error("int() cannot take a base when argument is not a string"));
            }
            Ok(Value::int(*b as i64))
        }
        Value::Float(f) => Ok(Value::Int(num_bigint::BigInt::from(*f as i64))),
        Value::Str(s) => {
            let radix = base.unwrap_or(10);
            let trimmed = s.trim();
            num_bigint::BigInt::parse_bytes(trimmed.as_bytes(), radix)
                .map(Value::Int)
                .ok_or_else(|| SkylarkError::value_error(format!("invalid literal for int() with base {radix}: {s:?}")))
        }
        _ => Err(SkylarkError::type_error(format!("int() cannot convert '{}'", v.type_name()))),
    }
}

fn float_(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let Some(v) = args.positional.first() else {
        return Ok(Value::Float(0.0));
    };
    match v {
        Value::Int(i) => Ok(Value::Float(i.to_f64().ok_or_else(|| SkylarkError::value_error("int too large for float()"))?)),
        Value::Bool(b) => Ok(Value::Float(*b as i64 as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| SkylarkError::value_error(format!("invalid literal for float(): {s:?}"))),
        _ => Err(SkylarkError::type_error(format!("float() cannot convert '{}'", v.type_name()))),
    }
}

fn str_(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    Ok(Value::str(args.positional.first().map(Value::to_display_string).unwrap_or_default()))
}

fn list_(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    match args.positional.first() {
        Some(v) => Ok(Value::list(crate::value::iterate(v)?)),
        None => Ok(Value::list(Vec::new())),
    }
}

fn tuple_(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    match args.positional.first() {
        Some(v) => Ok(Value::tuple(crate::value::iterate(v)?)),
        None => Ok(Value::tuple(Vec::new())),
    }
}

fn dict_(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let mut d = DictData::new();
    if let Some(v) = args.positional.first() {
        match v {
            Value::Dict(other) => {
                for (k, val) in other.borrow().iter() {
                    d.set(k.clone(), val.clone())?;
                }
            }
            other => {
                for item in crate::value::iterate(other)? {
                    let Value::Tuple(pair) = item else {
                        return Err(SkylarkError::type_error("dict() iterable must yield (key, value) pairs"));
                    };
                    if pair.len() != 2 {
                        return Err(SkylarkError::value_error("dict() update sequence element has wrong length"));
                    }
                    d.set(pair[0].clone(), pair[1].clone())?;
                }
            }
        }
    }
    for (k, v) in &args.named {
        d.set(Value::str(k.clone()), v.clone())?;
    }
    Ok(Value::Dict(Rc::new(std::cell::RefCell::new(d))))
}

fn set_(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let items = match args.positional.first() {
        Some(v) => crate::value::iterate(v)?,
        None => Vec::new(),
    };
    Ok(Value::Set(Rc::new(std::cell::RefCell::new(SetData::from_values(items)?))))
}

fn repr(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    Ok(Value::str(one_positional(&args, "repr")?.repr()))
}

fn print(t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let sep = match named(&args, "sep") {
        Some(Value::Str(s)) => s.to_string(),
        _ => " ".to_string(),
    };
    let parts: Vec<String> = args.positional.iter().map(Value::to_display_string).collect();
    t.print(&parts.join(&sep));
    Ok(Value::None)
}

fn dir(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let v = one_positional(&args, "dir")?;
    let mut names: Vec<&str> = match &v {
        Value::List(_) => vec!["append", "clear", "count", "extend", "index", "insert", "pop", "remove", "sort"],
        Value::Dict(_) => vec!["clear", "get", "items", "keys", "pop", "setdefault", "update", "values"],
        Value::Set(_) => vec!["add", "clear", "difference", "discard", "intersection", "union"],
        Value::Str(_) => vec![
            "codepoints", "count", "elems", "endswith", "format", "index", "join", "lower", "replace", "split", "startswith", "strip", "upper",
        ],
        _ => Vec::new(),
    };
    names.sort_unstable();
    Ok(Value::list(names.into_iter().map(Value::str).collect()))
}

fn getattr(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let recv = args.positional.first().cloned().ok_or_else(|| SkylarkError::argument("getattr() requires a receiver"))?;
    let Some(Value::Str(name)) = args.positional.get(1) else {
        return Err(SkylarkError::argument("getattr() requires an attribute name"));
    };
    match crate::callable::lookup_attr_method(&recv, name) {
        Some(method) => Ok(Value::Builtin(Rc::new(crate::value::BuiltinValue {
            name: name.to_string(),
            receiver: Some(recv),
            kind: crate::value::BuiltinKind::Attr(method),
        }))),
        None => match args.positional.get(2) {
            Some(default) => Ok(default.clone()),
            None => Err(SkylarkError::type_error(format!("'{}' object has no attribute '{}'", recv.type_name(), name))),
        },
    }
}

fn hasattr(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let recv = args.positional.first().cloned().ok_or_else(|| SkylarkError::argument("hasattr() requires a receiver"))?;
    let Some(Value::Str(name)) = args.positional.get(1) else {
        return Err(SkylarkError::argument("hasattr() requires an attribute name"));
    };
    Ok(Value::Bool(crate::callable::lookup_attr_method(&recv, name).is_some()))
}

fn min_max(thread: &mut Thread, args: CallArgs, want_max: bool) -> RunResult<Value> {
    let items: Vec<Value> = if args.positional.len() == 1 {
        crate::value::iterate(&args.positional[0])?
    } else {
        args.positional.clone()
    };
    if items.is_empty() {
        return Err(SkylarkError::value_error(if want_max { "max() of empty sequence" } else { "min() of empty sequence" }));
    }
    let key_fn = named(&args, "key");
    let mut best = items[0].clone();
    let mut best_key = match &key_fn {
        Some(f) => crate::eval::call_value(thread, f, CallArgs { positional: vec![best.clone()], named: Vec::new() })?,
        None => best.clone(),
    };
    for item in items.into_iter().skip(1) {
        let k = match &key_fn {
            Some(f) => crate::eval::call_value(thread, f, CallArgs { positional: vec![item.clone()], named: Vec::new() })?,
            None => item.clone(),
        };
        let replace = match k.compare(&best_key)? {
            Some(ord) => {
                if want_max {
                    ord == crate::value::CompareOrdering::Greater
                } else {
                    ord == crate::value::CompareOrdering::Less
                }
            }
            None => return Err(SkylarkError::type_error("elements are not comparable")),
        };
        if replace {
            best = item;
            best_key = k;
        }
    }
    Ok(best)
}

fn min(t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    min_max(t, args, false)
}

fn max(t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    min_max(t, args, true)
}

fn sorted(thread: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let items = crate::value::iterate(&one_positional(&args, "sorted")?)?;
    let reverse = named(&args, "reverse").map(|v| v.truth()).unwrap_or(false);
    let key_fn = named(&args, "key");
    let mut keyed: Vec<(Value, Value)> = Vec::with_capacity(items.len());
    for item in items {
        let k = match &key_fn {
            Some(f) => crate::eval::call_value(thread, f, CallArgs { positional: vec![item.clone()], named: Vec::new() })?,
            None => item.clone(),
        };
        keyed.push((k, item));
    }
    let mut err = None;
    keyed.sort_by(|(ka, _), (kb, _)| match ka.compare(kb) {
        Ok(Some(crate::value::CompareOrdering::Less)) => std::cmp::Ordering::Less,
        Ok(Some(crate::value::CompareOrdering::Equal)) => std::cmp::Ordering::Equal,
        Ok(Some(crate::value::CompareOrdering::Greater)) => std::cmp::Ordering::Greater,
        Ok(None) => {
            err.get_or_insert(SkylarkError::type_error("elements are not comparable for sorting"));
            std::cmp::Ordering::Equal
        }
        Err(e) => {
            err.get_or_insert(e);
            std::cmp::Ordering::Equal
        }
    });
    if let Some(e) = err {
        return Err(e);
    }
    let mut out: Vec<Value> = keyed.into_iter().map(|(_, v)| v).collect();
    if reverse {
        out.reverse();
    }
    Ok(Value::list(out))
}

fn reversed(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let mut items = crate::value::iterate(&one_positional(&args, "reversed")?)?;
    items.reverse();
    Ok(Value::list(items))
}

fn enumerate(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let items = crate::value::iterate(&one_positional(&args, "enumerate")?)?;
    let start = match named(&args, "start").or_else(|| args.positional.get(1).cloned()) {
        Some(v) => as_index(&v, "enumerate")?,
        None => 0,
    };
    Ok(Value::list(
        items.into_iter().enumerate().map(|(i, v)| Value::tuple(vec![Value::int(start + i as i64), v])).collect(),
    ))
}

fn zip(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    if args.positional.is_empty() {
        return Ok(Value::list(Vec::new()));
    }
    let iterables: Vec<Vec<Value>> = args.positional.iter().map(crate::value::iterate).collect::<RunResult<_>>()?;
    let len = iterables.iter().map(Vec::len).min().unwrap_or(0);
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        out.push(Value::tuple(iterables.iter().map(|it| it[i].clone()).collect()));
    }
    Ok(Value::list(out))
}

fn all(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let items = crate::value::iterate(&one_positional(&args, "all")?)?;
    Ok(Value::Bool(items.iter().all(Value::truth)))
}

fn any(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let items = crate::value::iterate(&one_positional(&args, "any")?)?;
    Ok(Value::Bool(items.iter().any(Value::truth)))
}

fn abs(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    match one_positional(&args, "abs")? {
        Value::Int(i) => Ok(Value::Int(i.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Bool(b) => Ok(Value::int(b as i64)),
        other => Err(SkylarkError::type_error(format!("bad operand type for abs(): '{}'", other.type_name()))),
    }
}

fn chr(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let i = as_index(&one_positional(&args, "chr")?, "chr")?;
    let c = u32::try_from(i)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| SkylarkError::value_error(format!("chr() arg {i} not in valid Unicode range")))?;
    Ok(Value::str(c.to_string()))
}

fn ord(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let Value::Str(s) = one_positional(&args, "ord")? else {
        return Err(SkylarkError::type_error("ord() requires a string"));
    };
    let mut chars = s.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return Err(SkylarkError::value_error("ord() expects a string of length 1"));
    };
    Ok(Value::int(c as i64))
}

fn hash(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    Ok(Value::int(one_positional(&args, "hash")?.hash_value()? as i64))
}

fn fail(_t: &mut Thread, args: CallArgs) -> RunResult<Value> {
    let msg: Vec<String> = args.positional.iter().map(Value::to_display_string).collect();
    Err(SkylarkError::value_error(msg.join(" ")))
}
