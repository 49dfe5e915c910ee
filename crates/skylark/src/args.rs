//! Argument binding: positional arguments fill parameters left to right,
//! named arguments fill by name, unfilled parameters take their default,
//! and any overflow is captured by `*args`/`**kwargs` if present.

use crate::ast::{Param, ParamKind};
use crate::error::{RunResult, SkylarkError};
use crate::value::Value;

/// A call's arguments after any call-site `*iter`/`**mapping` unpacking has
/// already been expanded by the evaluator.
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub named: Vec<(String, Value)>,
}

/// Binds `args` against `params`, returning one `Value` per parameter slot
/// in declaration order (the same order the resolver assigned param
/// locals). `defaults` is parallel to the *normal* parameters only, `None`
/// where a parameter has no default.
pub fn bind_arguments(func_name: &str, params: &[Param], defaults: &[Option<Value>], args: CallArgs) -> RunResult<Vec<Value>> {
    let mut out = Vec::with_capacity(params.len());
    let mut positional = args.positional.into_iter();
    let mut named = args.named;
    let mut default_idx = 0;
    let mut seen_star = false;

    for param in params {
        match &param.kind {
            ParamKind::Normal { .. } => {
                if !seen_star {
                    if let Some(idx) = named.iter().position(|(n, _)| n == &param.name.name) {
                        out.push(named.remove(idx).1);
                    } else if let Some(v) = positional.next() {
                        out.push(v);
                    } else if let Some(Some(d)) = defaults.get(default_idx) {
                        out.push(d.clone());
                    } else {
                        return Err(SkylarkError::argument(format!(
                            "{func_name}() missing required argument: {:?}",
                            param.name.name
                        )));
                    }
                } else if let Some(idx) = named.iter().position(|(n, _)| n == &param.name.name) {
                    out.push(named.remove(idx).1);
                } else if let Some(Some(d)) = defaults.get(default_idx) {
                    out.push(d.clone());
                } else {
                    return Err(SkylarkError::argument(format!(
                        "{func_name}() missing required keyword-only argument: {:?}",
                        param.name.name
                    )));
                }
                default_idx += 1;
            }
            ParamKind::Star => {
                seen_star = true;
                let rest: Vec<Value> = positional.by_ref().collect();
                out.push(Value::tuple(rest));
            }
            ParamKind::StarMarker => {
                seen_star = true;
            }
            ParamKind::DoubleStar => {
                let mut dict = crate::types::dict::DictData::new();
                for (name, value) in named.drain(..) {
                    dict.set(Value::str(name), value)?;
                }
                out.push(Value::Dict(std::rc::Rc::new(std::cell::RefCell::new(dict))));
            }
        }
    }

    if let Some(extra) = positional.next() {
        let mut count = 1;
        for _ in positional.by_ref() {
            count += 1;
        }
        return Err(SkylarkError::argument(format!(
            "{func_name}() got {} too many positional argument(s), starting with {}",
            count,
            extra.repr()
        )));
    }
    if let Some((name, _)) = named.first() {
        return Err(SkylarkError::argument(format!("{func_name}() got an unexpected keyword argument {name:?}")));
    }
    Ok(out)
}

/// Expands call-site `*expr`/`**expr` arguments into plain positional/named
/// entries, detecting duplicate keyword names and non-string mapping keys.
pub fn expand_call_args(
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
    starred: Vec<Value>,
    double_starred: Vec<Value>,
) -> RunResult<CallArgs> {
    let mut out_positional = positional;
    for v in starred {
        out_positional.extend(crate::value::iterate(&v)?);
    }
    let mut out_named = named;
    for v in double_starred {
        let Value::Dict(d) = v else {
            return Err(SkylarkError::type_error("argument after ** must be a dict"));
        };
        for (k, val) in d.borrow().iter() {
            let Value::Str(name) = k else {
                return Err(SkylarkError::type_error("keyword arguments must be strings"));
            };
            if out_named.iter().any(|(n, _)| n == name.as_ref()) {
                return Err(SkylarkError::argument(format!("duplicate keyword argument {name:?}")));
            }
            out_named.push((name.to_string(), val.clone()));
        }
    }
    Ok(CallArgs { positional: out_positional, named: out_named })
}
