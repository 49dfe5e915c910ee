//! The mutable `list` container: an insertion-ordered `Vec<Value>` guarded
//! by an iterator count so that mutation during iteration is rejected.

use crate::error::{RunResult, SkylarkError};
use crate::value::Value;

pub struct ListData {
    pub items: Vec<Value>,
    pub frozen: bool,
    iter_count: u32,
}

impl ListData {
    pub fn new(items: Vec<Value>) -> Self {
        ListData { items, frozen: false, iter_count: 0 }
    }

    pub fn check_mutable(&self) -> RunResult<()> {
        if self.frozen {
            return Err(SkylarkError::mutation("cannot modify a frozen list"));
        }
        if self.iter_count > 0 {
            return Err(SkylarkError::mutation("list modified during iteration"));
        }
        Ok(())
    }

    /// Guard used by the evaluator while executing a `for` loop or
    /// comprehension clause over this list; released when the scope exits.
    pub fn begin_iter(&mut self) {
        self.iter_count += 1;
    }

    pub fn end_iter(&mut self) {
        self.iter_count -= 1;
    }

    pub fn append(&mut self, v: Value) -> RunResult<()> {
        self.check_mutable()?;
        self.items.push(v);
        Ok(())
    }

    pub fn extend(&mut self, values: Vec<Value>) -> RunResult<()> {
        self.check_mutable()?;
        self.items.extend(values);
        Ok(())
    }

    pub fn insert(&mut self, index: i64, v: Value) -> RunResult<()> {
        self.check_mutable()?;
        let i = clamp_index(index, self.items.len());
        self.items.insert(i, v);
        Ok(())
    }

    pub fn pop(&mut self, index: i64) -> RunResult<Value> {
        self.check_mutable()?;
        if self.items.is_empty() {
            return Err(SkylarkError::value_error("pop from empty list"));
        }
        let i = normalize_index(index, self.items.len())
            .ok_or_else(|| SkylarkError::value_error("pop index out of range"))?;
        Ok(self.items.remove(i))
    }

    pub fn remove(&mut self, v: &Value) -> RunResult<()> {
        self.check_mutable()?;
        for (i, item) in self.items.iter().enumerate() {
            if item.equals(v)? {
                self.items.remove(i);
                return Ok(());
            }
        }
        Err(SkylarkError::value_error("remove: element not found"))
    }

    pub fn clear(&mut self) -> RunResult<()> {
        self.check_mutable()?;
        self.items.clear();
        Ok(())
    }

    pub fn set_index(&mut self, index: i64, v: Value) -> RunResult<()> {
        self.check_mutable()?;
        let i = normalize_index(index, self.items.len())
            .ok_or_else(|| SkylarkError::value_error("list index out of range"))?;
        self.items[i] = v;
        Ok(())
    }

    pub fn get_index(&self, index: i64) -> RunResult<Value> {
        let i = normalize_index(index, self.items.len())
            .ok_or_else(|| SkylarkError::value_error("list index out of range"))?;
        Ok(self.items[i].clone())
    }

    pub fn index_of(&self, v: &Value) -> RunResult<i64> {
        for (i, item) in self.items.iter().enumerate() {
            if item.equals(v)? {
                return Ok(i as i64);
            }
        }
        Err(SkylarkError::value_error("value not found in list"))
    }

    pub fn count(&self, v: &Value) -> RunResult<i64> {
        let mut n = 0;
        for item in &self.items {
            if item.equals(v)? {
                n += 1;
            }
        }
        Ok(n)
    }

    pub fn sort(&mut self, reverse: bool, key: Option<&Value>, apply_key: impl Fn(&Value, &Value) -> RunResult<Value>) -> RunResult<()> {
        self.check_mutable()?;
        let mut keyed: Vec<(Value, Value)> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let k = match key {
                Some(f) => apply_key(f, item)?,
                None => item.clone(),
            };
            keyed.push((k, item.clone()));
        }
        // Starlark's sort is stable and total comparisons may fail; surface
        // the first comparison error rather than silently falling back.
        let mut err = None;
        keyed.sort_by(|(ka, _), (kb, _)| match ka.compare(kb) {
            Ok(Some(ord)) => match ord {
                crate::value::CompareOrdering::Less => std::cmp::Ordering::Less,
                crate::value::CompareOrdering::Equal => std::cmp::Ordering::Equal,
                crate::value::CompareOrdering::Greater => std::cmp::Ordering::Greater,
            },
            Ok(None) => {
                if err.is_none() {
                    err = Some(SkylarkError::type_error("elements are not comparable for sorting"));
                }
                std::cmp::Ordering::Equal
            }
            Err(e) => {
                if err.is_none() {
                    err = Some(e);
                }
                std::cmp::Ordering::Equal
            }
        });
        if let Some(e) = err {
            return Err(e);
        }
        self.items = keyed.into_iter().map(|(_, v)| v).collect();
        if reverse {
            self.items.reverse();
        }
        Ok(())
    }
}

/// Resolves a Python-style negative-or-positive index into a valid position,
/// returning `None` when it falls outside `[0, len)`.
pub fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { index + len } else { index };
    if i < 0 || i >= len {
        None
    } else {
        Some(i as usize)
    }
}

/// Clamps an index used for insertion (where `len` itself is valid).
fn clamp_index(index: i64, len: usize) -> usize {
    let len_i = len as i64;
    let i = if index < 0 { (index + len_i).max(0) } else { index };
    i.min(len_i).max(0) as usize
}

pub fn resolve_slice(start: Option<i64>, stop: Option<i64>, step: i64, len: usize) -> RunResult<(i64, i64, i64)> {
    if step == 0 {
        return Err(SkylarkError::value_error("slice step cannot be zero"));
    }
    let len_i = len as i64;
    let clamp = |v: i64, lo: i64, hi: i64| v.max(lo).min(hi);
    if step > 0 {
        let start = start.map_or(0, |s| clamp(if s < 0 { s + len_i } else { s }, 0, len_i));
        let stop = stop.map_or(len_i, |s| clamp(if s < 0 { s + len_i } else { s }, 0, len_i));
        Ok((start, stop, step))
    } else {
        let start = start.map_or(len_i - 1, |s| clamp(if s < 0 { s + len_i } else { s }, -1, len_i - 1));
        let stop = stop.map_or(-1, |s| clamp(if s < 0 { s + len_i } else { s }, -1, len_i - 1));
        Ok((start, stop, step))
    }
}
