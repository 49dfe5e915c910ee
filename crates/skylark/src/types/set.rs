//! The mutable `set` container, structured exactly like [`super::dict`]'s
//! hash-bucket-of-collisions scheme but with values instead of pairs.

use indexmap::IndexMap;

use crate::error::{RunResult, SkylarkError};
use crate::value::{CompareOrdering, Value};

#[derive(Default)]
pub struct SetData {
    buckets: IndexMap<u64, Vec<Value>>,
    len: usize,
    pub frozen: bool,
    iter_count: u32,
}

impl SetData {
    pub fn new() -> Self {
        SetData::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> RunResult<Self> {
        let mut s = SetData::new();
        for v in values {
            s.add(v)?;
        }
        Ok(s)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn check_mutable(&self) -> RunResult<()> {
        if self.frozen {
            return Err(SkylarkError::mutation("cannot modify a frozen set"));
        }
        if self.iter_count > 0 {
            return Err(SkylarkError::mutation("set modified during iteration"));
        }
        Ok(())
    }

    pub fn begin_iter(&mut self) {
        self.iter_count += 1;
    }

    pub fn end_iter(&mut self) {
        self.iter_count -= 1;
    }

    pub fn contains(&self, v: &Value) -> RunResult<bool> {
        let h = v.hash_value()?;
        let Some(bucket) = self.buckets.get(&h) else { return Ok(false) };
        for item in bucket {
            if item.equals(v)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn add(&mut self, v: Value) -> RunResult<bool> {
        self.check_mutable()?;
        let h = v.hash_value()?;
        let bucket = self.buckets.entry(h).or_default();
        for item in bucket.iter() {
            if item.equals(&v)? {
                return Ok(false);
            }
        }
        bucket.push(v);
        self.len += 1;
        Ok(true)
    }

    pub fn discard(&mut self, v: &Value) -> RunResult<bool> {
        self.check_mutable()?;
        let h = v.hash_value()?;
        let Some(bucket) = self.buckets.get_mut(&h) else { return Ok(false) };
        for i in 0..bucket.len() {
            if bucket[i].equals(v)? {
                bucket.remove(i);
                self.len -= 1;
                if bucket.is_empty() {
                    self.buckets.shift_remove(&h);
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn clear(&mut self) -> RunResult<()> {
        self.check_mutable()?;
        self.buckets.clear();
        self.len = 0;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.buckets.values().flat_map(|bucket| bucket.iter())
    }

    pub fn py_eq(&self, other: &SetData) -> RunResult<bool> {
        if self.len != other.len {
            return Ok(false);
        }
        for item in self.iter() {
            if !other.contains(item)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_subset(&self, other: &SetData) -> RunResult<bool> {
        for item in self.iter() {
            if !other.contains(item)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn subset_compare(&self, other: &SetData) -> RunResult<Option<CompareOrdering>> {
        Ok(if self.py_eq(other)? {
            Some(CompareOrdering::Equal)
        } else if self.is_subset(other)? {
            Some(CompareOrdering::Less)
        } else if other.is_subset(self)? {
            Some(CompareOrdering::Greater)
        } else {
            None
        })
    }

    pub fn union(&self, other: &SetData) -> RunResult<SetData> {
        let mut out = SetData::new();
        for item in self.iter() {
            out.add(item.clone())?;
        }
        for item in other.iter() {
            out.add(item.clone())?;
        }
        Ok(out)
    }

    pub fn intersection(&self, other: &SetData) -> RunResult<SetData> {
        let mut out = SetData::new();
        for item in self.iter() {
            if other.contains(item)? {
                out.add(item.clone())?;
            }
        }
        Ok(out)
    }

    pub fn difference(&self, other: &SetData) -> RunResult<SetData> {
        let mut out = SetData::new();
        for item in self.iter() {
            if !other.contains(item)? {
                out.add(item.clone())?;
            }
        }
        Ok(out)
    }
}
