//! The symbolic expression handle consumed by the dependency analysis: an
//! opaque, reference-shared, structurally comparable term. Only the queries
//! the analysis needs are exposed here; the full expression language lives
//! with the solver side of the host engine.

use std::fmt::{Debug, Formatter, Result};
use std::rc::Rc;

/// A named symbolic array. Arrays are the unit of shadow renaming: producing
/// a syntactically comparable copy of an expression amounts to substituting
/// every array it reads from.
#[derive(Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Array {
    name: String,
}

pub type ArrayRef = Rc<Array>;

impl Array {
    pub fn create(name: impl Into<String>) -> ArrayRef {
        Rc::new(Array { name: name.into() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Debug for Array {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum BinaryKind {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Lt,
    Le,
}

#[derive(Eq, PartialEq, Hash)]
pub enum Expression {
    /// A concrete machine word, e.g. a constant address.
    Constant(u64),
    /// A read of a symbolic array at the given index.
    Read { array: ArrayRef, index: ExprRef },
    Binary {
        kind: BinaryKind,
        left: ExprRef,
        right: ExprRef,
    },
}

/// A symbolic term. Shared by reference; equality and hashing are structural.
#[derive(Eq, PartialEq, Hash)]
pub struct SymExpr {
    pub expression: Expression,
}

pub type ExprRef = Rc<SymExpr>;

impl SymExpr {
    pub fn constant(value: u64) -> ExprRef {
        Rc::new(SymExpr {
            expression: Expression::Constant(value),
        })
    }

    pub fn read(array: ArrayRef, index: ExprRef) -> ExprRef {
        Rc::new(SymExpr {
            expression: Expression::Read { array, index },
        })
    }

    pub fn binary(kind: BinaryKind, left: ExprRef, right: ExprRef) -> ExprRef {
        Rc::new(SymExpr {
            expression: Expression::Binary { kind, left, right },
        })
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.expression, Expression::Constant(_))
    }

    pub fn as_constant(&self) -> Option<u64> {
        match self.expression {
            Expression::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Rebuilds a binary expression of the same operator as `original` with
    /// the given operands. Non-binary originals are returned unchanged.
    pub fn binary_of_same_kind(original: &ExprRef, left: ExprRef, right: ExprRef) -> ExprRef {
        match &original.expression {
            Expression::Binary { kind, .. } => SymExpr::binary(*kind, left, right),
            _ => original.clone(),
        }
    }
}

impl Debug for SymExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match &self.expression {
            Expression::Constant(value) => write!(f, "{}", value),
            Expression::Read { array, index } => write!(f, "{:?}[{:?}]", array, index),
            Expression::Binary { kind, left, right } => {
                write!(f, "({:?} {:?} {:?})", kind, left, right)
            }
        }
    }
}
