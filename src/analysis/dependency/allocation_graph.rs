//! A short-lived graph over allocations, built backward from the values an
//! unsatisfiability core mentions. Its sinks are the frontier of minimal
//! allocations not yet explained by the core's syntactic constraints; layered
//! sink consumption peels explained allocations away until the frontier is
//! exactly the set the remaining core depends on.
//!
//! Nodes are owned by an arena and edges are arena indices, so ancestor
//! traversal stays O(1) without any lifetime juggling.

use crate::analysis::analysis_result::{AnalysisError, Result};
use crate::analysis::memory::allocation::AllocationRef;
use itertools::Itertools;

type NodeIndex = usize;

struct AllocationNode {
    allocation: AllocationRef,
    /// Distance from the sink layer this node was first attached under.
    level: u64,
    /// Dependency-graph parents: allocations this one is reached from, one
    /// more indirection step away from the core.
    ancestors: Vec<NodeIndex>,
}

#[derive(Default)]
pub struct AllocationGraph {
    nodes: Vec<AllocationNode>,
    /// The current frontier of least-depended-upon nodes.
    sinks: Vec<NodeIndex>,
}

impl AllocationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, allocation: &AllocationRef) -> Option<NodeIndex> {
        self.nodes
            .iter()
            .position(|node| &node.allocation == allocation)
    }

    pub fn is_visited(&self, allocation: &AllocationRef) -> bool {
        self.find(allocation).is_some()
    }

    fn push_node(&mut self, allocation: AllocationRef, level: u64) -> NodeIndex {
        // Anything that enters the graph is, by definition, part of the
        // dependency frontier of interest.
        allocation.set_as_core();
        self.nodes.push(AllocationNode {
            allocation,
            level,
            ancestors: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Inserts a level-0 sink for `allocation`, marking it core. A second
    /// insertion of the same allocation is a no-op.
    pub fn add_new_sink(&mut self, allocation: AllocationRef) {
        if self.is_visited(&allocation) {
            return;
        }
        trace!("allocation graph: new sink {:?}", allocation);
        let index = self.push_node(allocation, 0);
        self.sinks.push(index);
    }

    /// Attaches `source` as an ancestor of `target`, one level deeper, and
    /// marks it core. A `target` not yet present is first added as an
    /// implicit sink.
    pub fn add_new_edge(&mut self, source: AllocationRef, target: AllocationRef) {
        let target_index = match self.find(&target) {
            Some(index) => index,
            None => {
                let index = self.push_node(target, 0);
                self.sinks.push(index);
                index
            }
        };
        let source_index = match self.find(&source) {
            Some(index) => index,
            None => {
                let level = self.nodes[target_index].level + 1;
                self.push_node(source, level)
            }
        };
        if !self.nodes[target_index].ancestors.contains(&source_index) {
            trace!(
                "allocation graph: edge {:?} -> {:?}",
                self.nodes[source_index].allocation,
                self.nodes[target_index].allocation
            );
            self.nodes[target_index].ancestors.push(source_index);
        }
    }

    /// The allocations on the current frontier.
    pub fn get_sink_allocations(&self) -> Vec<AllocationRef> {
        self.sinks
            .iter()
            .map(|&index| self.nodes[index].allocation.clone())
            .unique()
            .collect()
    }

    /// The frontier allocations present in `candidates`.
    pub fn get_sinks_with_allocations(&self, candidates: &[AllocationRef]) -> Vec<AllocationRef> {
        self.get_sink_allocations()
            .into_iter()
            .filter(|allocation| candidates.contains(allocation))
            .collect()
    }

    /// Removes every sink matching `allocation` and promotes its ancestors to
    /// sinks, skipping slots another sink already occupies. Errors if no sink
    /// holds the allocation; that indicates a driver bug upstream.
    fn consume_sink_node(&mut self, allocation: &AllocationRef) -> Result<()> {
        let consumed: Vec<NodeIndex> = self
            .sinks
            .iter()
            .cloned()
            .filter(|&index| &self.nodes[index].allocation == allocation)
            .collect();
        if consumed.is_empty() {
            return Err(AnalysisError::SinkNotFound(format!("{:?}", allocation)).into());
        }
        self.sinks.retain(|index| !consumed.contains(index));
        for index in consumed {
            let ancestors = self.nodes[index].ancestors.clone();
            for ancestor in ancestors {
                if !self.sinks.contains(&ancestor) {
                    self.sinks.push(ancestor);
                }
            }
        }
        Ok(())
    }

    /// The minimization step: peel away sinks whose allocations the core's
    /// syntactic constraints already account for, exposing the next layer the
    /// remaining unexplained part of the core depends on.
    pub fn consume_sinks_with_allocations(&mut self, allocations: &[AllocationRef]) -> Result<()> {
        for allocation in allocations {
            debug!("allocation graph: consuming sink {:?}", allocation);
            self.consume_sink_node(allocation)?;
        }
        Ok(())
    }
}
