//! The mutable `dict` container: buckets keyed by hash, each holding the
//! (rare) colliding `(key, value)` pairs, with `IndexMap` preserving
//! bucket insertion order so iteration order matches the language's
//! insertion-order guarantee.

use indexmap::IndexMap;

use crate::error::{RunResult, SkylarkError};
use crate::value::Value;

#[derive(Default)]
pub struct DictData {
    buckets: IndexMap<u64, Vec<(Value, Value)>>,
    len: usize,
    pub frozen: bool,
    iter_count: u32,
}

impl DictData {
    pub fn new() -> Self {
        DictData::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn check_mutable(&self) -> RunResult<()> {
        if self.frozen {
            return Err(SkylarkError::mutation("cannot modify a frozen dict"));
        }
        if self.iter_count > 0 {
            return Err(SkylarkError::mutation("dict modified during iteration"));
        }
        Ok(())
    }

    pub fn begin_iter(&mut self) {
        self.iter_count += 1;
    }

    pub fn end_iter(&mut self) {
        self.iter_count -= 1;
    }

    pub fn get(&self, key: &Value) -> RunResult<Option<Value>> {
        let h = key.hash_value()?;
        let Some(bucket) = self.buckets.get(&h) else { return Ok(None) };
        for (k, v) in bucket {
            if k.equals(key)? {
                return Ok(Some(v.clone()));
            }
        }
        Ok(None)
    }

    pub fn contains(&self, key: &Value) -> RunResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    pub fn set(&mut self, key: Value, value: Value) -> RunResult<()> {
        self.check_mutable()?;
        let h = key.hash_value()?;
        let bucket = self.buckets.entry(h).or_default();
        for (k, v) in bucket.iter_mut() {
            if k.equals(&key)? {
                *v = value;
                return Ok(());
            }
        }
        bucket.push((key, value));
        self.len += 1;
        Ok(())
    }

    pub fn delete(&mut self, key: &Value) -> RunResult<Option<Value>> {
        self.check_mutable()?;
        let h = key.hash_value()?;
        let Some(bucket) = self.buckets.get_mut(&h) else { return Ok(None) };
        for i in 0..bucket.len() {
            if bucket[i].0.equals(key)? {
                let (_, v) = bucket.remove(i);
                self.len -= 1;
                if bucket.is_empty() {
                    self.buckets.shift_remove(&h);
                }
                return Ok(Some(v));
            }
        }
        Ok(None)
    }

    pub fn clear(&mut self) -> RunResult<()> {
        self.check_mutable()?;
        self.buckets.clear();
        self.len = 0;
        Ok(())
    }

    pub fn pop(&mut self, key: &Value) -> RunResult<Option<Value>> {
        self.delete(key)
    }

    pub fn setdefault(&mut self, key: Value, default: Value) -> RunResult<Value> {
        if let Some(existing) = self.get(&key)? {
            return Ok(existing);
        }
        self.set(key.clone(), default.clone())?;
        Ok(default)
    }

    pub fn update(&mut self, other: &DictData) -> RunResult<()> {
        self.check_mutable()?;
        for (k, v) in other.iter() {
            self.set(k.clone(), v.clone())?;
        }
        Ok(())
    }

    /// Iterates `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.buckets.values().flat_map(|bucket| bucket.iter().map(|(k, v)| (k, v)))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.iter().map(|(_, v)| v)
    }

    pub fn py_eq(&self, other: &DictData) -> RunResult<bool> {
        if self.len != other.len {
            return Ok(false);
        }
        for (k, v) in self.iter() {
            match other.get(k)? {
                Some(ov) if v.equals(&ov)? => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    pub fn union(a: &DictData, b: &DictData) -> RunResult<DictData> {
        let mut out = DictData::new();
        for (k, v) in a.iter() {
            out.set(k.clone(), v.clone())?;
        }
        for (k, v) in b.iter() {
            out.set(k.clone(), v.clone())?;
        }
        Ok(out)
    }
}
