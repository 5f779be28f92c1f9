//! Allocations and versioned values: the two entity kinds the dependency
//! relations range over. An allocation names a memory location by its
//! (site, address-expression) pair and is re-versioned on every destructive
//! update; a versioned value is one point-in-time binding of a program value
//! to a symbolic expression.

use crate::analysis::ir::ValueRef;
use crate::analysis::memory::expression::ExprRef;
use std::cell::Cell;
use std::fmt::{Debug, Formatter, Result};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AllocationKind {
    /// No allocation could be resolved; the conservative catch-all location.
    /// It is never versioned: every unresolved access shares the one sentinel.
    Unknown,
    /// The read-only process environment. All environment accesses share one
    /// canonical site, so they deduplicate to a single logical allocation.
    Environment,
    /// An ordinary allocation. Multiple instances may share a site but differ
    /// in identity, modeling program-point-specific memory versions.
    Versioned,
}

pub struct Allocation {
    kind: AllocationKind,
    site: Option<ValueRef>,
    address: Option<ExprRef>,
    /// Whether any unsatisfiability core depends on this allocation. The only
    /// mutable attribute; set during core-allocation computation.
    core: Cell<bool>,
}

/// Handle to an allocation. Identity is per instance: two handles are equal
/// iff they denote the same version of the same location.
#[derive(Clone)]
pub struct AllocationRef(Rc<Allocation>);

impl AllocationRef {
    pub fn versioned(site: ValueRef, address: ExprRef) -> Self {
        AllocationRef(Rc::new(Allocation {
            kind: AllocationKind::Versioned,
            site: Some(site),
            address: Some(address),
            core: Cell::new(false),
        }))
    }

    pub fn environment(site: ValueRef, address: ExprRef) -> Self {
        AllocationRef(Rc::new(Allocation {
            kind: AllocationKind::Environment,
            site: Some(site),
            address: Some(address),
            core: Cell::new(false),
        }))
    }

    pub fn unknown() -> Self {
        AllocationRef(Rc::new(Allocation {
            kind: AllocationKind::Unknown,
            site: None,
            address: None,
            core: Cell::new(false),
        }))
    }

    pub fn kind(&self) -> AllocationKind {
        self.0.kind
    }

    pub fn site(&self) -> Option<&ValueRef> {
        self.0.site.as_ref()
    }

    pub fn address(&self) -> Option<&ExprRef> {
        self.0.address.as_ref()
    }

    /// Tests whether this allocation is the one named by `(site, address)`.
    /// The environment matches by site alone: any environment global, or the
    /// canonical site itself, names it regardless of address.
    pub fn has_allocation_site(&self, site: &ValueRef, address: &ExprRef) -> bool {
        match self.0.kind {
            AllocationKind::Environment => {
                site.is_environment_global() || self.0.site.as_ref() == Some(site)
            }
            _ => {
                self.0.site.as_ref() == Some(site)
                    && self.0.address.as_ref().map(|a| a == address).unwrap_or(false)
            }
        }
    }

    pub fn has_constant_address(&self) -> bool {
        self.0
            .address
            .as_ref()
            .map(|a| a.is_constant())
            .unwrap_or(false)
    }

    pub fn get_uint_address(&self) -> Option<u64> {
        self.0.address.as_ref().and_then(|a| a.as_constant())
    }

    pub fn set_as_core(&self) {
        self.0.core.set(true);
    }

    pub fn is_core(&self) -> bool {
        self.0.core.get()
    }
}

impl PartialEq for AllocationRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for AllocationRef {}

impl Hash for AllocationRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(Rc::as_ptr(&self.0) as usize);
    }
}

impl Debug for AllocationRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match (self.0.kind, self.0.site.as_ref(), self.0.address.as_ref()) {
            (AllocationKind::Unknown, ..) => write!(f, "Unknown"),
            (AllocationKind::Environment, ..) => write!(f, "Environment"),
            (AllocationKind::Versioned, Some(site), Some(address)) => {
                write!(f, "{:?}@{:?}", site, address)
            }
            (AllocationKind::Versioned, ..) => write!(f, "Versioned"),
        }
    }
}

pub struct VersionedValue {
    value: ValueRef,
    /// Immutable after construction; a redefinition gets a fresh instance.
    expression: ExprRef,
    /// Whether any unsatisfiability core depends on this value.
    core: Cell<bool>,
}

/// Handle to one SSA-like binding occurrence. Identity is per instance.
#[derive(Clone)]
pub struct VersionedValueRef(Rc<VersionedValue>);

impl VersionedValueRef {
    pub fn new(value: ValueRef, expression: ExprRef) -> Self {
        VersionedValueRef(Rc::new(VersionedValue {
            value,
            expression,
            core: Cell::new(false),
        }))
    }

    pub fn has_value(&self, value: &ValueRef) -> bool {
        &self.0.value == value
    }

    pub fn value(&self) -> &ValueRef {
        &self.0.value
    }

    pub fn expression(&self) -> &ExprRef {
        &self.0.expression
    }

    pub fn set_as_core(&self) {
        self.0.core.set(true);
    }

    pub fn is_core(&self) -> bool {
        self.0.core.get()
    }
}

impl PartialEq for VersionedValueRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for VersionedValueRef {}

impl Hash for VersionedValueRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(Rc::as_ptr(&self.0) as usize);
    }
}

impl Debug for VersionedValueRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{:?} -> {:?}", self.0.value, self.0.expression)?;
        if self.is_core() {
            write!(f, " (core)")?;
        }
        Ok(())
    }
}
