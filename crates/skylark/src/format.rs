//! `%`-formatting and the `str.format` mini-language.

use crate::error::{RunResult, SkylarkError};
use crate::value::Value;

/// Applies Python-style `%` formatting: `fmt % value` where `value` is
/// either a single value or a tuple supplying multiple conversions.
pub fn percent_format(fmt: &str, arg: &Value) -> RunResult<Value> {
    let args: Vec<Value> = match arg {
        Value::Tuple(items) => items.as_ref().clone(),
        other => vec![other.clone()],
    };
    let mut out = String::new();
    let mut chars = fmt.chars().peekable();
    let mut arg_idx = 0;
    let mut next_arg = |out_err: &mut Option<SkylarkError>| -> Value {
        if let Some(v) = args.get(arg_idx) {
            arg_idx += 1;
            v.clone()
        } else {
            *out_err = Some(SkylarkError::value_error("not enough arguments for format string"));
            Value::None
        }
    };
    let mut err = None;
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') => {
                let v = next_arg(&mut err);
                out.push_str(&v.to_display_string());
            }
            Some('r') => {
                let v = next_arg(&mut err);
                out.push_str(&v.repr());
            }
            Some('d') | Some('i') => {
                let v = next_arg(&mut err);
                out.push_str(&format_int_conversion(&v)?);
            }
            Some('o') => {
                let v = next_arg(&mut err);
                out.push_str(&format_radix_conversion(&v, 8)?);
            }
            Some('x') => {
                let v = next_arg(&mut err);
                out.push_str(&format_radix_conversion(&v, 16)?);
            }
            Some('X') => {
                let v = next_arg(&mut err);
                out.push_str(&format_radix_conversion(&v, 16)?.to_uppercase());
            }
            Some('f') | Some('F') => {
                let v = next_arg(&mut err);
                let f = as_format_float(&v, "%f")?;
                out.push_str(&format!("{f:.6}"));
            }
            Some('e') => {
                let v = next_arg(&mut err);
                let f = as_format_float(&v, "%e")?;
                out.push_str(&format!("{f:e}"));
            }
            Some('E') => {
                let v = next_arg(&mut err);
                let f = as_format_float(&v, "%E")?;
                out.push_str(&format!("{f:E}"));
            }
            Some('g') | Some('G') => {
                let v = next_arg(&mut err);
                let f = as_format_float(&v, "%g")?;
                out.push_str(&format!("{f}"));
            }
            Some('c') => {
                let v = next_arg(&mut err);
                out.push_str(&format_char_conversion(&v)?);
            }
            Some(other) => return Err(SkylarkError::value_error(format!("unsupported format conversion %{other}"))),
            None => return Err(SkylarkError::value_error("incomplete format string")),
        }
        if let Some(e) = err {
            return Err(e);
        }
    }
    Ok(Value::str(out))
}

fn format_int_conversion(v: &Value) -> RunResult<String> {
    match v {
        Value::Int(i) => Ok(i.to_string()),
        Value::Bool(b) => Ok((*b as i64).to_string()),
        Value::Float(f) => Ok((*f as i64).to_string()),
        _ => Err(SkylarkError::type_error(format!("%d requires a number, not '{}'", v.type_name()))),
    }
}

fn format_radix_conversion(v: &Value, radix: u32) -> RunResult<String> {
    let n = match v {
        Value::Int(i) => i.clone(),
        Value::Bool(b) => num_bigint::BigInt::from(*b as i64),
        _ => return Err(SkylarkError::type_error("expected an integer")),
    };
    Ok(match radix {
        8 => format!("{n:o}"),
        16 => format!("{n:x}"),
        _ => n.to_string(),
    })
}

fn as_format_float(v: &Value, verb: &str) -> RunResult<f64> {
    match v {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(num_traits::ToPrimitive::to_f64(i).unwrap_or(f64::NAN)),
        _ => Err(SkylarkError::type_error(format!("{verb} requires a number"))),
    }
}

/// `%c`: an int in `0..=0x10FFFF` is converted like `chr()`; a string must
/// already be exactly one codepoint and passes through unchanged.
fn format_char_conversion(v: &Value) -> RunResult<String> {
    match v {
        Value::Str(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c.to_string()),
                _ => Err(SkylarkError::value_error("%c requires a single-character string")),
            }
        }
        Value::Int(i) => {
            let n: i64 = num_traits::ToPrimitive::to_i64(i)
                .ok_or_else(|| SkylarkError::value_error("%c arg not in valid Unicode range"))?;
            let c = u32::try_from(n)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| SkylarkError::value_error("%c arg not in valid Unicode range"))?;
            Ok(c.to_string())
        }
        _ => Err(SkylarkError::type_error("%c requires an int or a single-character string")),
    }
}

#[derive(PartialEq)]
enum IndexMode {
    Unset,
    Auto,
    Manual,
}

/// `str.format(*args, **kwargs)`: `{[field][!conv][:spec]}` replacement
/// fields, with `{{`/`}}` escaping literal braces. `field` is an integer
/// index (all-implicit or all-explicit, never mixed) or a keyword name;
/// `conv` is `r` or `s`; `spec` must be empty.
pub fn str_format(template: &str, positional: &[Value], named: &[(String, Value)]) -> RunResult<String> {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    let mut auto_index = 0;
    let mut mode = IndexMode::Unset;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut raw = String::new();
                for fc in chars.by_ref() {
                    if fc == '}' {
                        break;
                    }
                    raw.push(fc);
                }
                let (before_spec, spec) = match raw.find(':') {
                    Some(i) => (&raw[..i], Some(&raw[i + 1..])),
                    None => (raw.as_str(), None),
                };
                if let Some(spec) = spec {
                    if !spec.is_empty() {
                        return Err(SkylarkError::value_error("format spec is not supported"));
                    }
                }
                let (field, conv) = match before_spec.find('!') {
                    Some(i) => (&before_spec[..i], Some(&before_spec[i + 1..])),
                    None => (before_spec, None),
                };
                let value = if field.is_empty() {
                    if mode == IndexMode::Manual {
                        return Err(SkylarkError::value_error(
                            "cannot switch from manual to automatic field numbering",
                        ));
                    }
                    mode = IndexMode::Auto;
                    let v = positional
                        .get(auto_index)
                        .cloned()
                        .ok_or_else(|| SkylarkError::value_error("not enough positional arguments for format"))?;
                    auto_index += 1;
                    v
                } else if let Ok(idx) = field.parse::<usize>() {
                    if mode == IndexMode::Auto {
                        return Err(SkylarkError::value_error(
                            "cannot switch from automatic to manual field numbering",
                        ));
                    }
                    mode = IndexMode::Manual;
                    positional
                        .get(idx)
                        .cloned()
                        .ok_or_else(|| SkylarkError::value_error(format!("format index {idx} out of range")))?
                } else {
                    named
                        .iter()
                        .find(|(n, _)| n == field)
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| SkylarkError::value_error(format!("format field {field:?} not found")))?
                };
                match conv {
                    None => out.push_str(&value.to_display_string()),
                    Some("s") => out.push_str(&value.to_display_string()),
                    Some("r") => out.push_str(&value.repr()),
                    Some(other) => return Err(SkylarkError::value_error(format!("unknown format conversion !{other}"))),
                }
            }
            '}' => return Err(SkylarkError::value_error("single '}' encountered in format string")),
            c => out.push(c),
        }
    }
    Ok(out)
}
