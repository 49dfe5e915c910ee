//! The runtime activation record for one function call or comprehension
//! evaluation: a slot array for plain locals plus, for any local promoted
//! by the resolver, a cell shared with nested closures.
//!
//! This mirrors the resolver's `BlockScope` one-to-one: every scope that
//! got its own [`crate::resolver::FunctionLayout`] (module, `def`, `lambda`,
//! or comprehension) gets exactly one `Frame` at evaluation time.

use std::cell::RefCell;
use std::rc::Rc;

use crate::resolver::{FreeSource, FunctionLayout};
use crate::value::Value;

pub struct Frame {
    slots: Vec<Value>,
    cells: Vec<Rc<RefCell<Value>>>,
    free: Vec<Rc<RefCell<Value>>>,
    cell_local_slots: Vec<Option<u32>>,
}

impl Frame {
    pub fn new(layout: &FunctionLayout, free: Vec<Rc<RefCell<Value>>>) -> Self {
        debug_assert_eq!(free.len(), layout.free_count as usize);
        Frame {
            slots: vec![Value::None; layout.local_count as usize],
            cells: (0..layout.cell_count).map(|_| Rc::new(RefCell::new(Value::None))).collect(),
            free,
            cell_local_slots: layout.cell_local_slots.clone(),
        }
    }

    /// Builds the `free` vector a nested closure/comprehension should
    /// capture, reading this frame's cells/free array according to the
    /// child's `free_sources` chain.
    pub fn build_captures(&self, free_sources: &[FreeSource]) -> Vec<Rc<RefCell<Value>>> {
        free_sources
            .iter()
            .map(|src| match src {
                FreeSource::ParentCell(i) => self.cells[*i as usize].clone(),
                FreeSource::ParentFree(i) => self.free[*i as usize].clone(),
            })
            .collect()
    }

    pub fn get_local(&self, slot: u32) -> Value {
        match self.cell_local_slots[slot as usize] {
            Some(cell) => self.cells[cell as usize].borrow().clone(),
            None => self.slots[slot as usize].clone(),
        }
    }

    pub fn set_local(&mut self, slot: u32, value: Value) {
        match self.cell_local_slots[slot as usize] {
            Some(cell) => *self.cells[cell as usize].borrow_mut() = value,
            None => self.slots[slot as usize] = value,
        }
    }

    pub fn get_free(&self, slot: u32) -> Value {
        self.free[slot as usize].borrow().clone()
    }

    pub fn set_free(&self, slot: u32, value: Value) {
        *self.free[slot as usize].borrow_mut() = value;
    }
}
