//! Shadow renaming of symbolic arrays. Interpolants are matched syntactically
//! across call sites, so the expressions stored in them are rewritten over
//! renamed ("shadow") copies of their arrays. The rename state is an explicit
//! context scoped to one interpolant-construction request.

use super::expression::{Array, ArrayRef, ExprRef, Expression, SymExpr};
use std::collections::{HashMap, HashSet};

pub fn shadow_name(name: &str) -> String {
    format!("__shadow__{}", name)
}

/// One interpolant-construction request's worth of rename state: the
/// source-to-shadow array map plus the set of shadow arrays introduced,
/// which the subsumption layer needs for its solver declarations.
#[derive(Default)]
pub struct RenameContext {
    shadows: HashMap<ArrayRef, ArrayRef>,
    replacements: HashSet<ArrayRef>,
}

impl RenameContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shadow arrays substituted so far.
    pub fn replacements(&self) -> &HashSet<ArrayRef> {
        &self.replacements
    }

    fn shadow_array(&mut self, array: &ArrayRef) -> ArrayRef {
        if let Some(shadow) = self.shadows.get(array) {
            return shadow.clone();
        }
        let shadow = Array::create(shadow_name(array.name()));
        self.shadows.insert(array.clone(), shadow.clone());
        self.replacements.insert(shadow.clone());
        shadow
    }

    /// Structurally rewrites `expr`, substituting every array it reads from
    /// with its shadow copy. Constants need no renaming.
    pub fn shadow_expression(&mut self, expr: &ExprRef) -> ExprRef {
        match &expr.expression {
            Expression::Constant(_) => expr.clone(),
            Expression::Read { array, index } => {
                let shadow = self.shadow_array(array);
                let index = self.shadow_expression(index);
                SymExpr::read(shadow, index)
            }
            Expression::Binary { left, right, .. } => {
                let left = self.shadow_expression(left);
                let right = self.shadow_expression(right);
                SymExpr::binary_of_same_kind(expr, left, right)
            }
        }
    }
}
