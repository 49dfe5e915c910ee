//! Step/recursion accounting for one execution: a plain data struct
//! describing the limits, and a tracker the evaluator consults on every
//! step.

use crate::error::{RunResult, SkylarkError};

#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    /// Maximum number of evaluator steps (statement executions plus
    /// expression reductions) before execution is aborted. `None` means
    /// unbounded.
    pub max_steps: Option<u64>,
    /// Maximum call-stack depth.
    pub max_call_depth: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        ResourceLimits { max_steps: None, max_call_depth: 1000 }
    }
}

pub struct ResourceTracker {
    limits: ResourceLimits,
    steps: u64,
    call_depth: u32,
    cancelled: bool,
}

impl ResourceTracker {
    pub fn new(limits: ResourceLimits) -> Self {
        ResourceTracker { limits, steps: 0, call_depth: 0, cancelled: false }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn step(&mut self) -> RunResult<()> {
        if self.cancelled {
            return Err(SkylarkError::cancelled("execution cancelled"));
        }
        self.steps += 1;
        if let Some(max) = self.limits.max_steps {
            if self.steps > max {
                return Err(SkylarkError::step_limit(format!("exceeded step limit of {max}")));
            }
        }
        Ok(())
    }

    pub fn enter_call(&mut self) -> RunResult<()> {
        self.call_depth += 1;
        if self.call_depth > self.limits.max_call_depth {
            return Err(SkylarkError::recursion(format!(
                "exceeded maximum call depth of {}",
                self.limits.max_call_depth
            )));
        }
        Ok(())
    }

    pub fn exit_call(&mut self) {
        self.call_depth -= 1;
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps
    }
}
