//! The slice of the program representation the dependency analysis consumes:
//! opaque value/block/function handles with pointer identity, an instruction
//! kind discriminator with operand accessors, and the predicates that
//! distinguish environment accesses and `main`'s arguments.

use std::collections::HashSet;
use std::fmt::{Debug, Formatter, Result};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

lazy_static! {
    /// Names under which the process environment pointer is visible.
    static ref ENVIRONMENT_GLOBAL_NAMES: HashSet<&'static str> =
        ["environ", "_environ", "__environ"].iter().cloned().collect();
}

/// What role a program value plays for the analysis. Most values are plain;
/// `main`'s arguments are seeded specially on unresolved stores.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ValueKind {
    Plain,
    MainArgument,
}

pub struct ValueInfo {
    name: String,
    kind: ValueKind,
}

/// Handle to a program value. Identity follows the shared cell, not the name:
/// two handles are equal iff they were cloned from the same `new` call. This
/// mirrors how the host engine identifies values by their defining occurrence.
#[derive(Clone)]
pub struct ValueRef(Rc<ValueInfo>);

impl ValueRef {
    pub fn new(name: impl Into<String>) -> Self {
        ValueRef(Rc::new(ValueInfo {
            name: name.into(),
            kind: ValueKind::Plain,
        }))
    }

    pub fn main_argument(name: impl Into<String>) -> Self {
        ValueRef(Rc::new(ValueInfo {
            name: name.into(),
            kind: ValueKind::MainArgument,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Tests if this value is an argument of the program's entry point.
    pub fn is_main_argument(&self) -> bool {
        self.0.kind == ValueKind::MainArgument
    }

    /// Tests if this value names the read-only process environment.
    pub fn is_environment_global(&self) -> bool {
        ENVIRONMENT_GLOBAL_NAMES.contains(self.0.name.as_str())
    }
}

impl PartialEq for ValueRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ValueRef {}

impl Hash for ValueRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(Rc::as_ptr(&self.0) as usize);
    }
}

impl Debug for ValueRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "%{}", self.0.name)
    }
}

pub struct BlockInfo {
    name: String,
}

/// Basic-block identity, used only to select the matching phi edge.
#[derive(Clone)]
pub struct BlockRef(Rc<BlockInfo>);

impl BlockRef {
    pub fn new(name: impl Into<String>) -> Self {
        BlockRef(Rc::new(BlockInfo { name: name.into() }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}

impl PartialEq for BlockRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for BlockRef {}

impl Debug for BlockRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "bb:{}", self.0.name)
    }
}

pub struct FunctionInfo {
    name: String,
    parameters: Vec<ValueRef>,
}

/// Function handle carrying the formal parameters needed for call binding.
#[derive(Clone)]
pub struct FunctionRef(Rc<FunctionInfo>);

impl FunctionRef {
    pub fn new(name: impl Into<String>, parameters: Vec<ValueRef>) -> Self {
        FunctionRef(Rc::new(FunctionInfo {
            name: name.into(),
            parameters,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parameters(&self) -> &[ValueRef] {
        &self.0.parameters
    }
}

impl Debug for FunctionRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "@{}", self.0.name)
    }
}

/// The closed set of instruction shapes the abstract semantics dispatches on.
/// Index operands of `GetElementPtr` are deliberately absent: the analysis is
/// field-insensitive, so only the base pointer matters.
#[derive(Clone, Debug)]
pub enum InstructionKind {
    Alloca,
    Store { value: ValueRef, address: ValueRef },
    Load { address: ValueRef },
    GetElementPtr { base: ValueRef },
    Unary { operand: ValueRef },
    Binary { left: ValueRef, right: ValueRef },
    Phi { incoming: Vec<(BlockRef, ValueRef)> },
    Call { callee: FunctionRef, arguments: Vec<ValueRef> },
    Return { value: Option<ValueRef> },
}

/// One instruction of the path being executed. `result` is the value the
/// instruction defines, if any (a store or a void return defines none).
#[derive(Clone, Debug)]
pub struct Instruction {
    pub result: Option<ValueRef>,
    pub block: BlockRef,
    pub kind: InstructionKind,
}

impl Instruction {
    pub fn new(result: Option<ValueRef>, block: BlockRef, kind: InstructionKind) -> Self {
        Instruction { result, block, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_identity_is_per_occurrence() {
        let a = ValueRef::new("x");
        let b = ValueRef::new("x");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_environment_global_names() {
        assert!(ValueRef::new("_environ").is_environment_global());
        assert!(ValueRef::new("environ").is_environment_global());
        assert!(!ValueRef::new("env").is_environment_global());
    }

    #[test]
    fn test_main_argument_flag() {
        assert!(ValueRef::main_argument("argv").is_main_argument());
        assert!(!ValueRef::new("argv").is_main_argument());
    }

    #[test]
    fn test_handle_names() {
        assert_eq!(ValueRef::new("x").name(), "x");
        assert_eq!(BlockRef::new("entry").name(), "entry");
        let f = FunctionRef::new("f", vec![ValueRef::new("arg0")]);
        assert_eq!(f.name(), "f");
        assert_eq!(f.parameters().len(), 1);
    }
}
