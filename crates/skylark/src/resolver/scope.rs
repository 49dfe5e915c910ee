//! Binding classification produced by the resolver and attached to every
//! identifier use in the AST.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Bound in the current function/comprehension block.
    Local,
    /// Owned by this function but captured by a nested function; accessed
    /// through a cell rather than a plain slot.
    Cell,
    /// Bound in an enclosing function block; the current function holds a
    /// reference to that function's cell.
    Free,
    /// Bound via `load(...)` in the current file's file-block.
    LoadLocal,
    /// Bound at module level (a global).
    Global,
    /// Host-provided, visible to the module but not part of it.
    Predeclared,
    /// Implementation-provided base layer (`None`, `len`, `range`, ...).
    Universal,
}

/// A resolved reference to a binding: its kind plus the slot index within
/// whatever storage that kind uses (locals array, cell array, globals
/// vector, predeclared/universal table).
#[derive(Debug, Clone, Copy)]
pub struct BindingRef {
    pub kind: BindingKind,
    pub index: u32,
}
