//! Dispatch for bound attribute methods (`mylist.append`, `mystr.split`,
//! ...): one big match over [`AttrMethod`] that pulls its receiver and
//! arguments apart by hand, since there's no generic argument-binding
//! machinery for these fixed-arity methods.

use std::cell::RefCell;
use std::rc::Rc;

use crate::args::CallArgs;
use crate::error::{RunResult, SkylarkError};
use crate::format::str_format;
use crate::thread::Thread;
use crate::types::attr::AttrMethod;
use crate::types::dict::DictData;
use crate::types::set::SetData;
use crate::value::Value;

pub fn call_attr(thread: &mut Thread, receiver: &Value, method: AttrMethod, args: CallArgs) -> RunResult<Value> {
    let positional = args.positional;
    if !args.named.is_empty() && !matches!(method, AttrMethod::Sort | AttrMethod::Replace | AttrMethod::Split) {
        return Err(SkylarkError::argument(format!("{method} takes no keyword arguments")));
    }
    match (receiver, method) {
        (Value::List(l), AttrMethod::Append) => {
            l.borrow_mut().append(one(&positional, "append")?)?;
            Ok(Value::None)
        }
        (Value::List(l), AttrMethod::Extend) => {
            let items = crate::value::iterate(&one(&positional, "extend")?)?;
            l.borrow_mut().extend(items)?;
            Ok(Value::None)
        }
        (Value::List(l), AttrMethod::Insert) => {
            let (idx, v) = two(&positional, "insert")?;
            l.borrow_mut().insert(as_index(&idx)?, v)?;
            Ok(Value::None)
        }
        (Value::List(l), AttrMethod::Pop) => {
            let idx = positional.first().map(as_index).transpose()?.unwrap_or(-1);
            l.borrow_mut().pop(idx)
        }
        (Value::List(l), AttrMethod::Remove) => {
            l.borrow_mut().remove(&one(&positional, "remove")?)?;
            Ok(Value::None)
        }
        (Value::List(l), AttrMethod::Clear) => {
            l.borrow_mut().clear()?;
            Ok(Value::None)
        }
        (Value::Dict(d), AttrMethod::Clear) => {
            d.borrow_mut().clear()?;
            Ok(Value::None)
        }
        (Value::Set(s), AttrMethod::Clear) => {
            s.borrow_mut().clear()?;
            Ok(Value::None)
        }
        (Value::List(l), AttrMethod::Index) => Ok(Value::int(l.borrow().index_of(&one(&positional, "index")?)?)),
        (Value::List(l), AttrMethod::Count) => Ok(Value::int(l.borrow().count(&one(&positional, "count")?)?)),
        (Value::List(l), AttrMethod::Sort) => {
            let reverse = args
                .named
                .iter()
                .find(|(n, _)| n == "reverse")
                .map(|(_, v)| v.truth())
                .unwrap_or(false);
            let key = args.named.iter().find(|(n, _)| n == "key").map(|(_, v)| v.clone());
            l.borrow_mut().sort(reverse, key.as_ref(), |f, item| apply_key(thread, f, item))?;
            Ok(Value::None)
        }
        (Value::Dict(d), AttrMethod::Get) => {
            let key = positional.first().ok_or_else(|| SkylarkError::argument("get() requires a key"))?;
            match d.borrow().get(key)? {
                Some(v) => Ok(v),
                None => Ok(positional.get(1).cloned().unwrap_or(Value::None)),
            }
        }
        (Value::Dict(d), AttrMethod::Setdefault) => {
            let (k, default) = (
                positional.first().cloned().ok_or_else(|| SkylarkError::argument("setdefault() requires a key"))?,
                positional.get(1).cloned().unwrap_or(Value::None),
            );
            d.borrow_mut().setdefault(k, default)
        }
        (Value::Dict(d), AttrMethod::Pop) => {
            let key = positional.first().ok_or_else(|| SkylarkError::argument("pop() requires a key"))?;
            match d.borrow_mut().pop(key)? {
                Some(v) => Ok(v),
                None => positional
                    .get(1)
                    .cloned()
                    .ok_or_else(|| SkylarkError::value_error("pop(): key not found and no default given")),
            }
        }
        (Value::Dict(d), AttrMethod::Update) => {
            let other = one(&positional, "update")?;
            let Value::Dict(other) = other else {
                return Err(SkylarkError::type_error("update() requires a dict"));
            };
            let snapshot = DictData::union(&DictData::new(), &other.borrow())?;
            d.borrow_mut().update(&snapshot)?;
            Ok(Value::None)
        }
        (Value::Dict(d), AttrMethod::Keys) => Ok(Value::list(d.borrow().keys().cloned().collect())),
        (Value::Dict(d), AttrMethod::Values) => Ok(Value::list(d.borrow().values().cloned().collect())),
        (Value::Dict(d), AttrMethod::Items) => Ok(Value::list(
            d.borrow().iter().map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()])).collect(),
        )),
        (Value::Set(s), AttrMethod::Add) => {
            s.borrow_mut().add(one(&positional, "add")?)?;
            Ok(Value::None)
        }
        (Value::Set(s), AttrMethod::Discard) => {
            s.borrow_mut().discard(&one(&positional, "discard")?)?;
            Ok(Value::None)
        }
        (Value::Set(s), AttrMethod::Union) => {
            let other = set_operand(&one(&positional, "union")?)?;
            Ok(Value::Set(Rc::new(RefCell::new(s.borrow().union(&other)?))))
        }
        (Value::Set(s), AttrMethod::Intersection) => {
            let other = set_operand(&one(&positional, "intersection")?)?;
            Ok(Value::Set(Rc::new(RefCell::new(s.borrow().intersection(&other)?))))
        }
        (Value::Set(s), AttrMethod::Difference) => {
            let other = set_operand(&one(&positional, "difference")?)?;
            Ok(Value::Set(Rc::new(RefCell::new(s.borrow().difference(&other)?))))
        }
        (Value::Str(s), AttrMethod::Split) => string_split(s, &positional, &args.named),
        (Value::Str(s), AttrMethod::Join) => {
            let items = crate::value::iterate(&one(&positional, "join")?)?;
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                let Value::Str(piece) = item else {
                    return Err(SkylarkError::type_error("join() requires an iterable of strings"));
                };
                parts.push(piece.to_string());
            }
            Ok(Value::str(parts.join(s)))
        }
        (Value::Str(s), AttrMethod::Strip) => {
            let chars = positional.first();
            Ok(Value::str(match chars {
                Some(Value::Str(cs)) => s.trim_matches(|c| cs.contains(c)).to_string(),
                _ => s.trim().to_string(),
            }))
        }
        (Value::Str(s), AttrMethod::Upper) => Ok(Value::str(s.to_uppercase())),
        (Value::Str(s), AttrMethod::Lower) => Ok(Value::str(s.to_lowercase())),
        (Value::Str(s), AttrMethod::Replace) => {
            let (old, new) = two(&positional, "replace")?;
            let (Value::Str(old), Value::Str(new)) = (old, new) else {
                return Err(SkylarkError::type_error("replace() requires strings"));
            };
            Ok(Value::str(s.replace(old.as_ref(), new.as_ref())))
        }
        (Value::Str(s), AttrMethod::Startswith) => {
            let prefix = one(&positional, "startswith")?;
            let Value::Str(prefix) = prefix else {
                return Err(SkylarkError::type_error("startswith() requires a string"));
            };
            Ok(Value::Bool(s.starts_with(prefix.as_ref())))
        }
        (Value::Str(s), AttrMethod::Endswith) => {
            let suffix = one(&positional, "endswith")?;
            let Value::Str(suffix) = suffix else {
                return Err(SkylarkError::type_error("endswith() requires a string"));
            };
            Ok(Value::Bool(s.ends_with(suffix.as_ref())))
        }
        (Value::Str(s), AttrMethod::Format) => Ok(Value::str(str_format(s, &positional, &args.named)?)),
        (Value::Str(s), AttrMethod::Index) => {
            let needle = one(&positional, "index")?;
            let Value::Str(needle) = needle else {
                return Err(SkylarkError::type_error("index() requires a string"));
            };
            s.find(needle.as_ref())
                .map(|byte_idx| Value::int(s[..byte_idx].chars().count() as i64))
                .ok_or_else(|| SkylarkError::value_error("substring not found"))
        }
        (Value::Str(s), AttrMethod::Count) => {
            let needle = one(&positional, "count")?;
            let Value::Str(needle) = needle else {
                return Err(SkylarkError::type_error("count() requires a string"));
            };
            if needle.is_empty() {
                Ok(Value::int(s.chars().count() as i64 + 1))
            } else {
                Ok(Value::int(s.matches(needle.as_ref()).count() as i64))
            }
        }
        (Value::Str(s), AttrMethod::Elems) => Ok(Value::list(s.chars().map(|c| Value::str(c.to_string())).collect())),
        (Value::Str(s), AttrMethod::Codepoints) => Ok(Value::list(s.chars().map(|c| Value::int(c as i64)).collect())),
        (recv, method) => Err(SkylarkError::type_error(format!(
            "'{}' object has no attribute '{}'",
            recv.type_name(),
            method
        ))),
    }
}

fn apply_key(thread: &mut Thread, key_fn: &Value, item: &Value) -> RunResult<Value> {
    crate::eval::call_value(
        thread,
        key_fn,
        CallArgs { positional: vec![item.clone()], named: Vec::new() },
    )
}

fn one(args: &[Value], name: &str) -> RunResult<Value> {
    args.first().cloned().ok_or_else(|| SkylarkError::argument(format!("{name}() missing a required argument")))
}

fn two(args: &[Value], name: &str) -> RunResult<(Value, Value)> {
    if args.len() < 2 {
        return Err(SkylarkError::argument(format!("{name}() requires two arguments")));
    }
    Ok((args[0].clone(), args[1].clone()))
}

fn as_index(v: &Value) -> RunResult<i64> {
    match v {
        Value::Int(i) => num_traits::ToPrimitive::to_i64(i).ok_or_else(|| SkylarkError::value_error("index out of range")),
        Value::Bool(b) => Ok(*b as i64),
        _ => Err(SkylarkError::type_error("index must be an int")),
    }
}

fn set_operand(v: &Value) -> RunResult<SetData> {
    match v {
        Value::Set(s) => Ok(SetData::from_values(s.borrow().iter().cloned())?),
        other => SetData::from_values(crate::value::iterate(other)?),
    }
}

fn string_split(s: &str, positional: &[Value], named: &[(String, Value)]) -> RunResult<Value> {
    let maxsplit = named
        .iter()
        .find(|(n, _)| n == "maxsplit")
        .map(|(_, v)| v.clone())
        .or_else(|| positional.get(1).cloned());
    let maxsplit = match maxsplit {
        Some(v) => Some(as_index(&v)?),
        None => None,
    };
    let sep = positional.first().cloned();
    let pieces: Vec<&str> = match (&sep, maxsplit) {
        (Some(Value::Str(sep)), Some(n)) if n >= 0 => s.splitn(n as usize + 1, sep.as_ref()).collect(),
        (Some(Value::Str(sep)), _) => s.split(sep.as_ref()).collect(),
        (None, _) | (Some(Value::None), _) => s.split_whitespace().collect(),
        _ => return Err(SkylarkError::type_error("split() separator must be a string")),
    };
    Ok(Value::list(pieces.into_iter().map(Value::str).collect()))
}

/// Builtin attribute-method resolution used by `getattr`/attribute lookup.
pub fn lookup_attr_method(receiver: &Value, name: &str) -> Option<AttrMethod> {
    use std::str::FromStr;
    let method = AttrMethod::from_str(name).ok()?;
    let valid = matches!(
        (receiver, method),
        (Value::List(_), AttrMethod::Append | AttrMethod::Extend | AttrMethod::Insert | AttrMethod::Pop | AttrMethod::Remove | AttrMethod::Clear | AttrMethod::Index | AttrMethod::Count | AttrMethod::Sort)
            | (Value::Dict(_), AttrMethod::Get | AttrMethod::Setdefault | AttrMethod::Pop | AttrMethod::Update | AttrMethod::Keys | AttrMethod::Values | AttrMethod::Items | AttrMethod::Clear)
            | (Value::Set(_), AttrMethod::Add | AttrMethod::Discard | AttrMethod::Union | AttrMethod::Intersection | AttrMethod::Difference | AttrMethod::Clear)
            | (Value::Str(_), AttrMethod::Split | AttrMethod::Join | AttrMethod::Strip | AttrMethod::Upper | AttrMethod::Lower | AttrMethod::Replace | AttrMethod::Startswith | AttrMethod::Endswith | AttrMethod::Format | AttrMethod::Index | AttrMethod::Count | AttrMethod::Elems | AttrMethod::Codepoints)
    );
    valid.then_some(method)
}
