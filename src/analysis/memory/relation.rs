//! The relation facts a dependency node owns: pointer equalities
//! (value == address of allocation) and flow edges (target depends on source,
//! optionally via a store/load indirection through an allocation).

use super::allocation::{AllocationRef, VersionedValueRef};
use std::fmt::{Debug, Formatter, Result};

/// The fact that `value`'s expression denotes the address of `allocation`.
pub struct PointerEquality {
    value: VersionedValueRef,
    allocation: AllocationRef,
}

impl PointerEquality {
    pub fn new(value: VersionedValueRef, allocation: AllocationRef) -> Self {
        PointerEquality { value, allocation }
    }

    pub fn equals(&self, value: &VersionedValueRef) -> Option<&AllocationRef> {
        if &self.value == value {
            Some(&self.allocation)
        } else {
            None
        }
    }
}

impl Debug for PointerEquality {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "({:?}) == ({:?})", self.value, self.allocation)
    }
}

/// The fact that `target`'s binding depends on `source`'s. `via` is present
/// when the dependency passed through a store/load on an allocation;
/// otherwise the dependency is direct (arithmetic or structural).
pub struct FlowsTo {
    source: VersionedValueRef,
    target: VersionedValueRef,
    via: Option<AllocationRef>,
}

impl FlowsTo {
    pub fn direct(source: VersionedValueRef, target: VersionedValueRef) -> Self {
        FlowsTo {
            source,
            target,
            via: None,
        }
    }

    pub fn via_allocation(
        source: VersionedValueRef,
        target: VersionedValueRef,
        via: AllocationRef,
    ) -> Self {
        FlowsTo {
            source,
            target,
            via: Some(via),
        }
    }

    pub fn source(&self) -> &VersionedValueRef {
        &self.source
    }

    pub fn target(&self) -> &VersionedValueRef {
        &self.target
    }

    pub fn allocation(&self) -> Option<&AllocationRef> {
        self.via.as_ref()
    }
}

impl Debug for FlowsTo {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{:?} => {:?}", self.source, self.target)?;
        if let Some(via) = &self.via {
            write!(f, " via {:?}", via)?;
        }
        Ok(())
    }
}
