//! Names of the built-in attribute methods on List/Dict/Set/String, shared
//! between attribute lookup (`get_attr`) and the bound-method call path.

use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AttrMethod {
    Append,
    Extend,
    Insert,
    Pop,
    Remove,
    Clear,
    Index,
    Count,
    #[strum(serialize = "sort")]
    Sort,
    Get,
    Setdefault,
    Update,
    Keys,
    Values,
    Items,
    Add,
    Discard,
    Union,
    Intersection,
    Difference,
    Split,
    Join,
    Strip,
    Upper,
    Lower,
    Replace,
    Startswith,
    Endswith,
    Format,
    Elems,
    Codepoints,
}
