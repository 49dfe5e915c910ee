//! Dialect flags controlling which syntactic forms the resolver accepts.

#[derive(Debug, Clone, Copy)]
pub struct Dialect {
    /// Allow `if`/`for`/`while` at module top level (outside any function).
    pub allow_toplevel_control_flow: bool,
    /// Allow a function to call itself (directly or through a cycle).
    /// Off by default; hosts opt in explicitly.
    pub allow_recursion: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect { allow_toplevel_control_flow: true, allow_recursion: false }
    }
}

impl Dialect {
    pub fn strict() -> Self {
        Dialect { allow_toplevel_control_flow: false, allow_recursion: false }
    }
}
