//! The per-path dependency tracker. One `Dependency` node is created per
//! analysis increment (one instruction, or one interpolation-tree node,
//! depending on driver granularity); it owns the versioned values,
//! allocations and relation facts created at that point and chains to its
//! parent for anything not locally defined.
//!
//! The chain models an immutable-prefix, growable-suffix history: a node is
//! mutable only while it is the tip. Forking wraps the node in `Rc`, after
//! which children can read but never write it, so the append-only discipline
//! the analysis relies on is enforced by the type system.
//!
//! The per-instruction abstract semantics implemented by `execute` follow a
//! fixed rule system over three relations: `stores(allocation, value)` for
//! memory state, `depends(value, value)` for value flow, and
//! `equals(value, allocation)` for pointer equality. Indirection is derived:
//! a value reaches an allocation at level 0 through `depends*` then `equals`,
//! and at level i+1 through the values stored in a level-i allocation.

use super::allocation_graph::AllocationGraph;
use crate::analysis::analysis_result::{AnalysisError, Result};
use crate::analysis::ir::{BlockRef, Instruction, InstructionKind, ValueRef};
use crate::analysis::memory::allocation::{AllocationKind, AllocationRef, VersionedValueRef};
use crate::analysis::memory::expression::ExprRef;
use crate::analysis::memory::relation::{FlowsTo, PointerEquality};
use crate::analysis::memory::shadow::RenameContext;
use itertools::Itertools;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

pub type AddressValuePair = (ExprRef, ExprRef);
/// Stores with a constant address, keyed by that address.
pub type ConcreteStoreMap = BTreeMap<u64, AddressValuePair>;
/// Stores with a symbolic address, in recency order (latest first).
pub type SymbolicStoreMap = Vec<AddressValuePair>;
pub type ConcreteStore = HashMap<ValueRef, ConcreteStoreMap>;
pub type SymbolicStore = HashMap<ValueRef, SymbolicStoreMap>;

/// State shared by every node of one analysis session: the canonical
/// environment allocation (all environment accesses deduplicate to the first
/// one observed), the single non-versionable unknown allocation, and the
/// sentinel value standing for arbitrary environment contents.
struct SessionState {
    environment_allocation: RefCell<Option<AllocationRef>>,
    unknown_allocation: AllocationRef,
    environment_contents: RefCell<Option<VersionedValueRef>>,
}

impl SessionState {
    fn new() -> Self {
        SessionState {
            environment_allocation: RefCell::new(None),
            unknown_allocation: AllocationRef::unknown(),
            environment_contents: RefCell::new(None),
        }
    }
}

pub struct Dependency {
    /// The previous node of the path; `None` at the tree root. A parent is
    /// never dropped while any descendant is alive.
    parent: Option<Rc<Dependency>>,
    session: Rc<SessionState>,
    /// Argument values pending transfer onto a callee's formal parameters.
    argument_values: Vec<VersionedValueRef>,
    /// Equality of value to address.
    equalities: Vec<PointerEquality>,
    /// The latest stored value per allocation. Older stores in ancestors are
    /// superseded by shadowing, never by mutation.
    stores_map: HashMap<AllocationRef, VersionedValueRef>,
    /// Inverse of `stores_map`: the allocations each value was stored in at
    /// this node.
    storage_of_map: HashMap<VersionedValueRef, Vec<AllocationRef>>,
    /// Flow relations from one value to another.
    flows_to: Vec<FlowsTo>,
    values: Vec<VersionedValueRef>,
    allocations: Vec<AllocationRef>,
    /// Allocations of this node and its ancestors that the core needs and
    /// that dominate other allocations.
    core_allocations: HashSet<AllocationRef>,
    /// The basic block of the last-executed non-phi instruction, consulted
    /// for phi resolution.
    incoming_block: Option<BlockRef>,
}

/// Walks a node chain from the most recent node toward the root.
struct Chain<'a> {
    node: Option<&'a Dependency>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Dependency;

    fn next(&mut self) -> Option<&'a Dependency> {
        let node = self.node?;
        self.node = node.parent.as_deref();
        Some(node)
    }
}

impl Default for Dependency {
    fn default() -> Self {
        Self::new()
    }
}

impl Dependency {
    /// Creates the root node of a fresh analysis session.
    pub fn new() -> Self {
        Self::with_session(None, Rc::new(SessionState::new()))
    }

    /// Creates a successor node. The parent is frozen from here on; this node
    /// and any siblings may read it but never extend it.
    pub fn with_parent(parent: Rc<Dependency>) -> Self {
        let session = parent.session.clone();
        let incoming_block = parent.incoming_block.clone();
        let mut node = Self::with_session(Some(parent), session);
        node.incoming_block = incoming_block;
        node
    }

    fn with_session(parent: Option<Rc<Dependency>>, session: Rc<SessionState>) -> Self {
        Dependency {
            parent,
            session,
            argument_values: Vec::new(),
            equalities: Vec::new(),
            stores_map: HashMap::new(),
            storage_of_map: HashMap::new(),
            flows_to: Vec::new(),
            values: Vec::new(),
            allocations: Vec::new(),
            core_allocations: HashSet::new(),
            incoming_block: None,
        }
    }

    /// The parent node, for callers that inspect ancestor state without
    /// extending the chain.
    pub fn cdr(&self) -> Option<&Rc<Dependency>> {
        self.parent.as_ref()
    }

    fn chain(&self) -> Chain<'_> {
        Chain { node: Some(self) }
    }

    // ---- value/allocation resolution ------------------------------------

    /// Always creates and registers a fresh binding occurrence; a value is
    /// never rebound in place.
    fn get_new_versioned_value(&mut self, value: ValueRef, expression: ExprRef) -> VersionedValueRef {
        let versioned = VersionedValueRef::new(value, expression);
        self.values.push(versioned.clone());
        versioned
    }

    /// Creates the first allocation for a site. Environment sites resolve to
    /// the session's canonical environment allocation, created on first
    /// observation.
    fn get_initial_allocation(&mut self, site: ValueRef, address: &ExprRef) -> AllocationRef {
        if site.is_environment_global() {
            let mut slot = self.session.environment_allocation.borrow_mut();
            if let Some(environment) = slot.as_ref() {
                return environment.clone();
            }
            let environment = AllocationRef::environment(site, address.clone());
            *slot = Some(environment.clone());
            return environment;
        }
        let allocation = AllocationRef::versioned(site, address.clone());
        self.allocations.push(allocation.clone());
        allocation
    }

    /// Creates a successor version of an allocation, modeling a destructive
    /// update. The old version stays reachable through history but is no
    /// longer the latest.
    fn get_new_allocation_version(&mut self, site: ValueRef, address: &ExprRef) -> AllocationRef {
        let allocation = AllocationRef::versioned(site, address.clone());
        self.allocations.push(allocation.clone());
        allocation
    }

    /// The most recently created allocation matching `(site, address)`,
    /// walking the chain most-recent node first so the latest version wins.
    fn get_latest_allocation(&self, site: &ValueRef, address: &ExprRef) -> Option<AllocationRef> {
        for node in self.chain() {
            for allocation in node.allocations.iter().rev() {
                if allocation.has_allocation_site(site, address) {
                    return Some(allocation.clone());
                }
            }
        }
        if site.is_environment_global() {
            return self.session.environment_allocation.borrow().clone();
        }
        None
    }

    /// The most recent binding of `value`, unless `expression` is a constant:
    /// constants need no provenance tracking, so no lookup occurs.
    pub fn get_latest_value(
        &self,
        value: &ValueRef,
        expression: &ExprRef,
    ) -> Option<VersionedValueRef> {
        if expression.is_constant() {
            return None;
        }
        self.get_latest_value_no_constant_check(value)
    }

    fn get_latest_value_no_constant_check(&self, value: &ValueRef) -> Option<VersionedValueRef> {
        for node in self.chain() {
            for versioned in node.values.iter().rev() {
                if versioned.has_value(value) {
                    return Some(versioned.clone());
                }
            }
        }
        None
    }

    /// Every versioned allocation of the chain, latest first.
    fn get_all_versioned_allocations(&self, core_only: bool) -> Vec<AllocationRef> {
        self.chain()
            .flat_map(|node| node.allocations.iter().rev().cloned())
            .filter(|allocation| allocation.kind() == AllocationKind::Versioned)
            .filter(|allocation| !core_only || allocation.is_core())
            .collect()
    }

    /// The sentinel value standing for whatever the read-only environment
    /// holds, shared by every environment read of the session.
    fn environment_contents(&self, expression: &ExprRef) -> VersionedValueRef {
        let mut slot = self.session.environment_contents.borrow_mut();
        if let Some(sentinel) = slot.as_ref() {
            return sentinel.clone();
        }
        let sentinel =
            VersionedValueRef::new(ValueRef::new("__environ_contents"), expression.clone());
        *slot = Some(sentinel.clone());
        sentinel
    }

    // ---- relation construction ------------------------------------------

    fn add_pointer_equality(&mut self, value: VersionedValueRef, allocation: AllocationRef) {
        self.equalities.push(PointerEquality::new(value, allocation));
    }

    fn update_store(&mut self, allocation: AllocationRef, value: VersionedValueRef) {
        trace!("store {:?} <- {:?}", allocation, value);
        self.stores_map.insert(allocation.clone(), value.clone());
        self.storage_of_map
            .entry(value)
            .or_insert_with(Vec::new)
            .push(allocation);
    }

    fn add_dependency(&mut self, source: VersionedValueRef, target: VersionedValueRef) {
        self.flows_to.push(FlowsTo::direct(source, target));
    }

    fn add_dependency_via_allocation(
        &mut self,
        source: VersionedValueRef,
        target: VersionedValueRef,
        via: AllocationRef,
    ) {
        self.flows_to.push(FlowsTo::via_allocation(source, target, via));
    }

    /// The allocation `value`'s pointer equality directly names, superseded
    /// by the latest version of that location: destructive updates shadow
    /// older versions.
    fn resolve_allocation(&self, value: &VersionedValueRef) -> Option<AllocationRef> {
        for node in self.chain() {
            for equality in node.equalities.iter().rev() {
                if let Some(allocation) = equality.equals(value) {
                    return match (allocation.site(), allocation.address()) {
                        (Some(site), Some(address)) => Some(
                            self.get_latest_allocation(site, address)
                                .unwrap_or_else(|| allocation.clone()),
                        ),
                        _ => Some(allocation.clone()),
                    };
                }
            }
        }
        None
    }

    /// Every allocation reachable from `value` through any number of
    /// indirection levels: follow `depends*` then `equals` for level 0, then
    /// descend through the values stored in each discovered allocation.
    /// Terminates because the path is finite and the chain acyclic.
    fn resolve_allocation_transitively(&self, value: &VersionedValueRef) -> Vec<AllocationRef> {
        let mut result: Vec<AllocationRef> = Vec::new();
        let mut seen: HashSet<VersionedValueRef> = HashSet::new();
        let mut work = vec![value.clone()];
        while let Some(current) = work.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let mut pointees = Vec::new();
            if let Some(allocation) = self.resolve_allocation(&current) {
                pointees.push(allocation);
            }
            for source in self.all_flow_sources(&current) {
                if let Some(allocation) = self.resolve_allocation(&source) {
                    pointees.push(allocation);
                }
            }
            for allocation in pointees {
                if !result.contains(&allocation) {
                    result.push(allocation.clone());
                    for stored in self.stores(&allocation) {
                        work.push(stored);
                    }
                }
            }
        }
        result
    }

    /// The values stored in `allocation`, latest node first. A versioned
    /// allocation holds at most one value; the unknown sentinel accumulates
    /// one per node that stored through an unresolved pointer.
    fn stores(&self, allocation: &AllocationRef) -> Vec<VersionedValueRef> {
        let mut result = Vec::new();
        for node in self.chain() {
            if let Some(value) = node.stores_map.get(allocation) {
                if !result.contains(value) {
                    result.push(value.clone());
                }
            }
        }
        result
    }

    /// The allocations `value` has been stored in across the chain, the
    /// inverse of `stores`.
    pub fn storage_of(&self, value: &VersionedValueRef) -> Vec<AllocationRef> {
        self.chain()
            .flat_map(|node| {
                node.storage_of_map
                    .get(value)
                    .into_iter()
                    .flatten()
                    .cloned()
            })
            .unique()
            .collect()
    }

    // ---- flow queries ----------------------------------------------------

    /// One-step flow sources recorded at this node only.
    fn direct_local_flow_sources(&self, target: &VersionedValueRef) -> Vec<VersionedValueRef> {
        self.flows_to
            .iter()
            .filter(|flow| flow.target() == target)
            .map(|flow| flow.source().clone())
            .collect()
    }

    /// One-step flow sources across the whole chain.
    pub fn direct_flow_sources(&self, target: &VersionedValueRef) -> Vec<VersionedValueRef> {
        self.chain()
            .flat_map(|node| node.direct_local_flow_sources(target))
            .unique()
            .collect()
    }

    /// The transitive closure of flow sources. The visited set keeps
    /// diamond-shaped dependency graphs linear.
    pub fn all_flow_sources(&self, target: &VersionedValueRef) -> Vec<VersionedValueRef> {
        let mut visited: HashSet<VersionedValueRef> = HashSet::new();
        let mut work = self.direct_flow_sources(target);
        while let Some(source) = work.pop() {
            if visited.insert(source.clone()) {
                work.extend(self.direct_flow_sources(&source));
            }
        }
        visited.into_iter().collect()
    }

    /// The leaves of the closure: sources with no further sources.
    pub fn all_flow_sources_ends(&self, target: &VersionedValueRef) -> Vec<VersionedValueRef> {
        self.all_flow_sources(target)
            .into_iter()
            .filter(|source| self.direct_flow_sources(source).is_empty())
            .collect()
    }

    /// One-step sources of `target` local to this node, each with the
    /// allocation the edge passed through, if any.
    fn direct_local_allocation_sources(
        &self,
        target: &VersionedValueRef,
    ) -> HashMap<VersionedValueRef, Option<AllocationRef>> {
        let mut sources = HashMap::new();
        for flow in &self.flows_to {
            if flow.target() == target {
                sources.insert(flow.source().clone(), flow.allocation().cloned());
            }
        }
        sources
    }

    /// One-step sources of `target` across the chain. The nearest node's
    /// entry wins for a source recorded more than once.
    fn direct_allocation_sources(
        &self,
        target: &VersionedValueRef,
    ) -> HashMap<VersionedValueRef, Option<AllocationRef>> {
        let mut sources = HashMap::new();
        for node in self.chain() {
            for (source, allocation) in node.direct_local_allocation_sources(target) {
                sources.entry(source).or_insert(allocation);
            }
        }
        sources
    }

    // ---- instruction semantics -------------------------------------------

    fn expect_args(
        &self,
        instruction: &Instruction,
        args: &[ExprRef],
        expected: usize,
    ) -> Result<()> {
        if args.len() < expected {
            return Err(AnalysisError::MalformedArguments {
                instruction: format!("{:?}", instruction.kind),
                expected,
                actual: args.len(),
            }
            .into());
        }
        Ok(())
    }

    fn result_value(&self, instruction: &Instruction) -> Result<ValueRef> {
        instruction
            .result
            .clone()
            .ok_or_else(|| AnalysisError::MissingResult(format!("{:?}", instruction.kind)).into())
    }

    /// One abstract state transition per instruction. `args[0]` is the result
    /// expression of the instruction (for a store, the stored value's
    /// expression); `args[1..]` are the operand expressions in operand order.
    pub fn execute(&mut self, instruction: &Instruction, args: &[ExprRef]) -> Result<()> {
        debug!("execute {:?}", instruction.kind);
        match &instruction.kind {
            InstructionKind::Alloca => {
                self.expect_args(instruction, args, 1)?;
                let result = self.result_value(instruction)?;
                let address = args[0].clone();
                let value = self.get_new_versioned_value(result.clone(), address.clone());
                let allocation = self.get_initial_allocation(result, &address);
                self.add_pointer_equality(value, allocation);
            }
            InstructionKind::Store { value, address } => {
                self.expect_args(instruction, args, 2)?;
                let value = value.clone();
                let address = address.clone();
                self.execute_store(&value, &address, args);
            }
            InstructionKind::Load { address } => {
                self.expect_args(instruction, args, 2)?;
                let result = self.result_value(instruction)?;
                let address = address.clone();
                self.execute_load(&result, &address, args);
            }
            InstructionKind::GetElementPtr { base } => {
                self.expect_args(instruction, args, 2)?;
                let result = self.result_value(instruction)?;
                let base = base.clone();
                // Field-insensitive: index operands are ignored.
                let target = self.get_new_versioned_value(result, args[0].clone());
                if let Some(source) = self.get_latest_value(&base, &args[1]) {
                    self.add_dependency(source, target);
                }
            }
            InstructionKind::Unary { operand } => {
                self.expect_args(instruction, args, 2)?;
                let result = self.result_value(instruction)?;
                let operand = operand.clone();
                let target = self.get_new_versioned_value(result, args[0].clone());
                if let Some(source) = self.get_latest_value(&operand, &args[1]) {
                    self.add_dependency(source, target);
                }
            }
            InstructionKind::Binary { left, right } => {
                self.expect_args(instruction, args, 3)?;
                let result = self.result_value(instruction)?;
                let left = left.clone();
                let right = right.clone();
                let target = self.get_new_versioned_value(result, args[0].clone());
                if let Some(source) = self.get_latest_value(&left, &args[1]) {
                    self.add_dependency(source, target.clone());
                }
                if let Some(source) = self.get_latest_value(&right, &args[2]) {
                    self.add_dependency(source, target);
                }
            }
            InstructionKind::Phi { incoming } => {
                self.expect_args(instruction, args, 1)?;
                let result = self.result_value(instruction)?;
                let incoming = incoming.clone();
                let target = self.get_new_versioned_value(result, args[0].clone());
                if let Some(block) = self.incoming_block.clone() {
                    for (predecessor, value) in &incoming {
                        if predecessor == &block {
                            if let Some(source) = self.get_latest_value_no_constant_check(value) {
                                self.add_dependency(source, target.clone());
                            }
                        }
                    }
                }
            }
            InstructionKind::Call { .. } | InstructionKind::Return { .. } => {
                // Call boundaries are handled by bind_call_arguments and
                // bind_return_value on the nodes either side of the frame.
            }
        }
        self.update_incoming_block(instruction);
        Ok(())
    }

    /// `store value, address`. Every resolved allocation gets a fresh version
    /// holding the stored value; the environment rejects the store as a
    /// no-op; an unresolved address degrades to the unknown allocation,
    /// except through `main`'s arguments, which seed an initial allocation.
    fn execute_store(&mut self, value: &ValueRef, address: &ValueRef, args: &[ExprRef]) {
        let data = match self.get_latest_value(value, &args[0]) {
            Some(existing) => existing,
            // Constants and operands never seen before still need a binding
            // occurrence to be storable.
            None => self.get_new_versioned_value(value.clone(), args[0].clone()),
        };
        let resolved = match self.get_latest_value_no_constant_check(address) {
            Some(pointer) => self.resolve_allocation_transitively(&pointer),
            None => Vec::new(),
        };
        if resolved.is_empty() {
            if address.is_main_argument() {
                // Stores through main's arguments (e.g. argv) set up the
                // initial process state; give them a real location.
                let allocation = self.get_initial_allocation(address.clone(), &args[1]);
                self.update_store(allocation, data);
            } else {
                debug!("store through unresolved {:?} recorded against unknown", address);
                let unknown = self.session.unknown_allocation.clone();
                self.update_store(unknown, data);
            }
            return;
        }
        for allocation in resolved {
            match allocation.kind() {
                AllocationKind::Environment => {
                    // The environment is read-only; drop the store and
                    // continue with the store-less state.
                    debug!("store into the environment rejected");
                }
                AllocationKind::Unknown => {
                    self.update_store(allocation, data.clone());
                }
                AllocationKind::Versioned => {
                    let (site, address_expr) = match (allocation.site(), allocation.address()) {
                        (Some(site), Some(address_expr)) => (site.clone(), address_expr.clone()),
                        _ => continue,
                    };
                    let successor = self.get_new_allocation_version(site, &address_expr);
                    self.update_store(successor, data.clone());
                }
            }
        }
    }

    /// `result = load address`. A load of an environment global binds the
    /// result to the canonical environment allocation; otherwise the result
    /// depends on the latest value stored in every resolved allocation, or on
    /// the unknown allocation's contents when nothing resolves.
    fn execute_load(&mut self, result: &ValueRef, address: &ValueRef, args: &[ExprRef]) {
        if address.is_environment_global() {
            let value = self.get_new_versioned_value(result.clone(), args[0].clone());
            let environment = self.get_initial_allocation(address.clone(), &args[0]);
            self.add_pointer_equality(value, environment);
            return;
        }
        let target = self.get_new_versioned_value(result.clone(), args[0].clone());
        let pointer = self.get_latest_value_no_constant_check(address);
        let loaded = match pointer {
            Some(pointer) => self.build_load_dependency(&pointer, &target, &args[0]),
            None => false,
        };
        if !loaded {
            // Any unresolved pointer may alias anything previously stored
            // through an unresolved pointer.
            let unknown = self.session.unknown_allocation.clone();
            let stored = self.stores(&unknown);
            for source in stored {
                self.add_dependency(source, target.clone());
            }
        }
    }

    /// Adds the dependencies a load through `pointer` induces on `target`.
    /// Returns false if no allocation resolves, leaving the fallback to the
    /// caller.
    fn build_load_dependency(
        &mut self,
        pointer: &VersionedValueRef,
        target: &VersionedValueRef,
        result_expr: &ExprRef,
    ) -> bool {
        let resolved = self.resolve_allocation_transitively(pointer);
        if resolved.is_empty() {
            return false;
        }
        for allocation in resolved {
            if allocation.kind() == AllocationKind::Environment {
                let sentinel = self.environment_contents(result_expr);
                self.add_dependency(sentinel, target.clone());
                continue;
            }
            let stored = self.stores(&allocation);
            for source in stored {
                self.add_dependency_via_allocation(source, target.clone(), allocation.clone());
            }
        }
        true
    }

    /// Records the block of the last-executed instruction. Phis are skipped
    /// so the predecessor block stays visible while a run of phis at a block
    /// head executes, each selecting the correct incoming edge.
    pub fn update_incoming_block(&mut self, instruction: &Instruction) {
        if !matches!(instruction.kind, InstructionKind::Phi { .. }) {
            self.incoming_block = Some(instruction.block.clone());
        }
    }

    // ---- call boundaries -------------------------------------------------

    /// Snapshots the caller-side binding of each actual argument, creating
    /// one where none exists (constant arguments).
    fn populate_argument_values_list(
        &mut self,
        actuals: &[ValueRef],
        arguments: &[ExprRef],
    ) -> Vec<VersionedValueRef> {
        actuals
            .iter()
            .zip(arguments)
            .map(|(value, expression)| match self.get_latest_value(value, expression) {
                Some(existing) => existing,
                None => self.get_new_versioned_value(value.clone(), expression.clone()),
            })
            .collect()
    }

    /// Binds caller-side argument expressions onto the callee's formal
    /// parameters in this (freshly created) node. Non-call instructions are
    /// ignored.
    pub fn bind_call_arguments(
        &mut self,
        instruction: &Instruction,
        arguments: &[ExprRef],
    ) -> Result<()> {
        let (callee, actuals) = match &instruction.kind {
            InstructionKind::Call { callee, arguments } => (callee.clone(), arguments.clone()),
            _ => return Ok(()),
        };
        if actuals.len() != arguments.len() || callee.parameters().len() != arguments.len() {
            return Err(AnalysisError::MalformedArguments {
                instruction: format!("{:?}", instruction.kind),
                expected: callee.parameters().len(),
                actual: arguments.len(),
            }
            .into());
        }
        debug!("binding {} arguments of {:?}", arguments.len(), callee);
        self.argument_values = self.populate_argument_values_list(&actuals, arguments);
        let pending = self.argument_values.clone();
        for (formal, (actual, expression)) in callee
            .parameters()
            .iter()
            .zip(pending.iter().zip(arguments))
        {
            let parameter = self.get_new_versioned_value(formal.clone(), expression.clone());
            self.add_dependency(actual.clone(), parameter);
        }
        Ok(())
    }

    /// Propagates a dependency from the callee's returned value back to the
    /// call site's result value in this node.
    pub fn bind_return_value(
        &mut self,
        call: &Instruction,
        returned: Option<&ValueRef>,
        return_expr: &ExprRef,
    ) {
        let result = match &call.result {
            Some(result) => result.clone(),
            None => return,
        };
        let source = returned.and_then(|value| self.get_latest_value(value, return_expr));
        let target = self.get_new_versioned_value(result, return_expr.clone());
        if let Some(source) = source {
            self.add_dependency(source, target);
        }
    }

    // ---- core computation ------------------------------------------------

    fn recursively_build_allocation_graph(
        &self,
        graph: &mut AllocationGraph,
        value: &VersionedValueRef,
        parent: Option<&AllocationRef>,
        visited: &mut HashSet<(VersionedValueRef, Option<AllocationRef>)>,
    ) {
        if !visited.insert((value.clone(), parent.cloned())) {
            return;
        }
        for (source, via) in self.direct_allocation_sources(value) {
            match (&via, parent) {
                (Some(allocation), None) => {
                    graph.add_new_sink(allocation.clone());
                    self.recursively_build_allocation_graph(graph, &source, Some(allocation), visited);
                }
                (Some(allocation), Some(parent)) => {
                    if allocation != parent {
                        graph.add_new_edge(allocation.clone(), parent.clone());
                    }
                    self.recursively_build_allocation_graph(graph, &source, Some(allocation), visited);
                }
                (None, parent) => {
                    self.recursively_build_allocation_graph(graph, &source, parent, visited);
                }
            }
        }
    }

    fn build_allocation_graph(&self, graph: &mut AllocationGraph, value: &VersionedValueRef) {
        let mut visited = HashSet::new();
        self.recursively_build_allocation_graph(graph, value, None, &mut visited);
    }

    /// Backward walk from `value`: marks it and every transitive flow source
    /// as core, and grows `graph` with every allocation discovered along the
    /// way.
    pub fn mark_all_values(&self, graph: &mut AllocationGraph, value: &VersionedValueRef) {
        self.build_allocation_graph(graph, value);
        value.set_as_core();
        for source in self.all_flow_sources(value) {
            source.set_as_core();
        }
    }

    /// As `mark_all_values`, starting from a program value. Errors if the
    /// value was never bound at any node of the chain; that is a driver bug.
    pub fn mark_all_values_of(&self, graph: &mut AllocationGraph, value: &ValueRef) -> Result<()> {
        let versioned = self
            .get_latest_value_no_constant_check(value)
            .ok_or_else(|| AnalysisError::ValueNotRegistered(format!("{:?}", value)))?;
        self.mark_all_values(graph, &versioned);
        Ok(())
    }

    /// Drains the graph's current sinks into this node's core-allocation set,
    /// marking each allocation core.
    pub fn compute_core_allocations(&mut self, graph: &AllocationGraph) {
        for allocation in graph.get_sink_allocations() {
            allocation.set_as_core();
            self.core_allocations.insert(allocation);
        }
    }

    pub fn core_allocations(&self) -> &HashSet<AllocationRef> {
        &self.core_allocations
    }

    // ---- store extraction ------------------------------------------------

    /// Serializes the current memory state: stores with constant addresses
    /// keyed by site then address, stores with symbolic addresses keyed by
    /// site in recency order. With `core_only`, only allocations marked core
    /// are included and every expression is rewritten over shadow arrays,
    /// recording the substitutions in `rename`.
    pub fn get_stored_expressions(
        &self,
        rename: &mut RenameContext,
        core_only: bool,
    ) -> (ConcreteStore, SymbolicStore) {
        let mut concrete: ConcreteStore = HashMap::new();
        let mut symbolic: SymbolicStore = HashMap::new();
        for allocation in self.get_all_versioned_allocations(core_only) {
            let stored = self.stores(&allocation);
            let value = match stored.first() {
                Some(value) => value,
                None => continue,
            };
            let (site, address) = match (allocation.site(), allocation.address()) {
                (Some(site), Some(address)) => (site.clone(), address.clone()),
                _ => continue,
            };
            let pair = if core_only {
                (
                    rename.shadow_expression(&address),
                    rename.shadow_expression(value.expression()),
                )
            } else {
                (address, value.expression().clone())
            };
            match allocation.get_uint_address() {
                Some(concrete_address) => {
                    // Latest version first; an older version of the same
                    // location must not shadow it.
                    concrete
                        .entry(site)
                        .or_insert_with(BTreeMap::new)
                        .entry(concrete_address)
                        .or_insert(pair);
                }
                None => {
                    symbolic.entry(site).or_insert_with(Vec::new).push(pair);
                }
            }
        }
        (concrete, symbolic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ir::FunctionRef;
    use crate::analysis::memory::expression::{Array, SymExpr};

    fn init_logging() {
        let _ = pretty_env_logger::try_init();
    }

    fn sym(name: &str) -> ExprRef {
        SymExpr::read(Array::create(name), SymExpr::constant(0))
    }

    fn alloca(node: &mut Dependency, block: &BlockRef, name: &str, address: ExprRef) -> ValueRef {
        let result = ValueRef::new(name);
        let instruction =
            Instruction::new(Some(result.clone()), block.clone(), InstructionKind::Alloca);
        node.execute(&instruction, &[address]).unwrap();
        result
    }

    fn store(
        node: &mut Dependency,
        block: &BlockRef,
        value: &ValueRef,
        address: &ValueRef,
        value_expr: ExprRef,
        address_expr: ExprRef,
    ) {
        let instruction = Instruction::new(
            None,
            block.clone(),
            InstructionKind::Store {
                value: value.clone(),
                address: address.clone(),
            },
        );
        node.execute(&instruction, &[value_expr, address_expr]).unwrap();
    }

    fn load(
        node: &mut Dependency,
        block: &BlockRef,
        name: &str,
        address: &ValueRef,
        result_expr: ExprRef,
        address_expr: ExprRef,
    ) -> ValueRef {
        let result = ValueRef::new(name);
        let instruction = Instruction::new(
            Some(result.clone()),
            block.clone(),
            InstructionKind::Load {
                address: address.clone(),
            },
        );
        node.execute(&instruction, &[result_expr, address_expr]).unwrap();
        result
    }

    #[test]
    fn test_alloca_store_load_scenario() {
        init_logging();
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        let address = SymExpr::constant(0x1000);

        let a = alloca(&mut node, &block, "a", address.clone());
        let five = ValueRef::new("c5");
        store(&mut node, &block, &five, &a, SymExpr::constant(5), address.clone());
        let v = load(&mut node, &block, "v", &a, SymExpr::constant(5), address);

        let loaded = node.get_latest_value_no_constant_check(&v).unwrap();
        let sources = node.direct_flow_sources(&loaded);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].expression().as_constant(), Some(5));

        let mut graph = AllocationGraph::new();
        node.mark_all_values(&mut graph, &loaded);
        node.compute_core_allocations(&graph);
        assert_eq!(node.core_allocations().len(), 1);
        let core = node.core_allocations().iter().next().unwrap();
        assert_eq!(core.site(), Some(&a));
        assert!(core.is_core());
        assert!(loaded.is_core());
    }

    #[test]
    fn test_versioning_monotonicity() {
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        let address = SymExpr::constant(0x2000);
        let a = alloca(&mut node, &block, "a", address.clone());
        let x = ValueRef::new("x");
        store(&mut node, &block, &x, &a, sym("x0"), address.clone());
        store(&mut node, &block, &x, &a, sym("x1"), address.clone());
        // One allocation per alloca plus one version per store; the latest
        // created version always wins the lookup.
        assert_eq!(node.allocations.len(), 3);
        let latest = node.get_latest_allocation(&a, &address).unwrap();
        assert_eq!(&latest, node.allocations.last().unwrap());
    }

    #[test]
    fn test_latest_allocation_prefers_nearest_node() {
        let block = BlockRef::new("entry");
        let mut root = Dependency::new();
        let address = SymExpr::constant(0x2000);
        let a = alloca(&mut root, &block, "a", address.clone());
        let x = ValueRef::new("x");
        let shared = Rc::new(root);
        let mut child = Dependency::with_parent(shared.clone());
        store(&mut child, &block, &x, &a, sym("x0"), address.clone());
        let latest = child.get_latest_allocation(&a, &address).unwrap();
        assert_eq!(&latest, child.allocations.last().unwrap());
        assert!(!shared.allocations.contains(&latest));
    }

    #[test]
    fn test_environment_store_is_noop() {
        init_logging();
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        let environ = ValueRef::new("_environ");
        let v = load(&mut node, &block, "v", &environ, sym("env_ptr"), sym("env_addr"));
        let w = ValueRef::new("w");
        store(&mut node, &block, &w, &v, sym("data"), sym("env_ptr"));
        // The environment is read-only: no stores fact, no new version.
        assert!(node.stores_map.is_empty());
        assert!(node.allocations.is_empty());
        let mut rename = RenameContext::new();
        let (concrete, symbolic) = node.get_stored_expressions(&mut rename, false);
        assert!(concrete.is_empty() && symbolic.is_empty());
    }

    #[test]
    fn test_canonical_environment_identity() {
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        let first = load(
            &mut node,
            &block,
            "e1",
            &ValueRef::new("_environ"),
            sym("p1"),
            sym("a1"),
        );
        let second = load(
            &mut node,
            &block,
            "e2",
            &ValueRef::new("environ"),
            sym("p2"),
            sym("a2"),
        );
        let v1 = node.get_latest_value_no_constant_check(&first).unwrap();
        let v2 = node.get_latest_value_no_constant_check(&second).unwrap();
        let m1 = node.resolve_allocation(&v1).unwrap();
        let m2 = node.resolve_allocation(&v2).unwrap();
        // Different sites, one canonical allocation.
        assert_eq!(m1, m2);
        assert_eq!(m1.kind(), AllocationKind::Environment);
    }

    #[test]
    fn test_environment_load_depends_on_sentinel() {
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        let pointer = load(
            &mut node,
            &block,
            "p",
            &ValueRef::new("_environ"),
            sym("env_ptr"),
            sym("env_addr"),
        );
        let v = load(&mut node, &block, "v", &pointer, sym("c0"), sym("env_ptr"));
        let w = load(&mut node, &block, "w", &pointer, sym("c1"), sym("env_ptr"));
        let vv = node.get_latest_value_no_constant_check(&v).unwrap();
        let wv = node.get_latest_value_no_constant_check(&w).unwrap();
        let v_sources = node.direct_flow_sources(&vv);
        let w_sources = node.direct_flow_sources(&wv);
        assert_eq!(v_sources.len(), 1);
        // Every environment read depends on the one contents sentinel.
        assert_eq!(v_sources, w_sources);
    }

    #[test]
    fn test_flow_closure_on_diamond() {
        let mut node = Dependency::new();
        let a = node.get_new_versioned_value(ValueRef::new("a"), sym("a"));
        let b = node.get_new_versioned_value(ValueRef::new("b"), sym("b"));
        let c = node.get_new_versioned_value(ValueRef::new("c"), sym("c"));
        let d = node.get_new_versioned_value(ValueRef::new("d"), sym("d"));
        node.add_dependency(a.clone(), b.clone());
        node.add_dependency(a.clone(), c.clone());
        node.add_dependency(b.clone(), d.clone());
        node.add_dependency(c.clone(), d.clone());
        let closure = node.all_flow_sources(&d);
        assert_eq!(closure.len(), 3);
        assert!(closure.contains(&a) && closure.contains(&b) && closure.contains(&c));
        let ends = node.all_flow_sources_ends(&d);
        assert_eq!(ends, vec![a]);
    }

    #[test]
    fn test_flow_closure_spans_chained_nodes() {
        let mut root = Dependency::new();
        let a = root.get_new_versioned_value(ValueRef::new("a"), sym("a"));
        let b = root.get_new_versioned_value(ValueRef::new("b"), sym("b"));
        root.add_dependency(a.clone(), b.clone());
        let mut child = Dependency::with_parent(Rc::new(root));
        let c = child.get_new_versioned_value(ValueRef::new("c"), sym("c"));
        child.add_dependency(b.clone(), c.clone());
        // The closure from the tip crosses the node boundary into the
        // ancestor's edges.
        let closure = child.all_flow_sources(&c);
        assert_eq!(closure.len(), 2);
        assert!(closure.contains(&a) && closure.contains(&b));
        assert_eq!(child.all_flow_sources_ends(&c), vec![a]);
    }

    #[test]
    fn test_storage_of_is_inverse_of_stores() {
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        let address = SymExpr::constant(0x6000);
        let a = alloca(&mut node, &block, "a", address.clone());
        let c = ValueRef::new("c9");
        store(&mut node, &block, &c, &a, SymExpr::constant(9), address);
        let stored = node.get_latest_value_no_constant_check(&c).unwrap();
        let holding = node.storage_of(&stored);
        assert_eq!(holding.len(), 1);
        assert_eq!(holding[0].site(), Some(&a));
        assert_eq!(node.stores(&holding[0]), vec![stored.clone()]);
        // The inverse lookup also walks the chain.
        let child = Dependency::with_parent(Rc::new(node));
        assert_eq!(child.storage_of(&stored), holding);
    }

    #[test]
    fn test_unresolved_store_then_load_meet_at_unknown() {
        init_logging();
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        // Neither pointer was ever bound; both degrade to the one unknown
        // allocation, so the load conservatively sees the store.
        let p = ValueRef::new("p");
        let q = ValueRef::new("q");
        let c = ValueRef::new("c7");
        store(&mut node, &block, &c, &p, SymExpr::constant(7), sym("p"));
        let v = load(&mut node, &block, "v", &q, sym("v"), sym("q"));
        let vv = node.get_latest_value_no_constant_check(&v).unwrap();
        let sources = node.direct_flow_sources(&vv);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].expression().as_constant(), Some(7));
    }

    #[test]
    fn test_store_through_main_argument_seeds_allocation() {
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        let argv = ValueRef::main_argument("argv");
        let c = ValueRef::new("arg0");
        store(&mut node, &block, &c, &argv, sym("arg0"), sym("argv_addr"));
        assert_eq!(node.allocations.len(), 1);
        assert_eq!(node.allocations[0].site(), Some(&argv));
        assert_eq!(node.stores_map.len(), 1);
        let mut rename = RenameContext::new();
        let (_, symbolic) = node.get_stored_expressions(&mut rename, false);
        assert!(symbolic.contains_key(&argv));
    }

    #[test]
    fn test_getelementptr_is_field_insensitive() {
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        let address = sym("p_addr");
        let p = alloca(&mut node, &block, "p", address.clone());
        let g = ValueRef::new("g");
        let gep = Instruction::new(
            Some(g.clone()),
            block.clone(),
            InstructionKind::GetElementPtr { base: p.clone() },
        );
        node.execute(&gep, &[sym("g_addr"), address.clone()]).unwrap();
        // A store through the derived pointer versions the base allocation.
        let c = ValueRef::new("c7");
        store(&mut node, &block, &c, &g, SymExpr::constant(7), sym("g_addr"));
        let v = load(&mut node, &block, "v", &p, SymExpr::constant(7), address);
        let vv = node.get_latest_value_no_constant_check(&v).unwrap();
        let sources = node.direct_flow_sources(&vv);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].expression().as_constant(), Some(7));
    }

    #[test]
    fn test_binary_depends_on_both_operands() {
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        let x = ValueRef::new("x");
        let y = ValueRef::new("y");
        let unary_x = Instruction::new(
            Some(x.clone()),
            block.clone(),
            InstructionKind::Unary {
                operand: ValueRef::new("u"),
            },
        );
        node.execute(&unary_x, &[sym("x"), sym("u")]).unwrap();
        let unary_y = Instruction::new(
            Some(y.clone()),
            block.clone(),
            InstructionKind::Unary {
                operand: ValueRef::new("u2"),
            },
        );
        node.execute(&unary_y, &[sym("y"), sym("u2")]).unwrap();

        let z = ValueRef::new("z");
        let add = Instruction::new(
            Some(z.clone()),
            block.clone(),
            InstructionKind::Binary {
                left: x.clone(),
                right: y.clone(),
            },
        );
        node.execute(&add, &[sym("z"), sym("x"), sym("y")]).unwrap();
        let zv = node.get_latest_value_no_constant_check(&z).unwrap();
        assert_eq!(node.direct_flow_sources(&zv).len(), 2);

        // A constant operand carries no provenance: the result depends only
        // on the symbolic side.
        let w = ValueRef::new("w");
        let add_const = Instruction::new(
            Some(w.clone()),
            block,
            InstructionKind::Binary {
                left: x,
                right: ValueRef::new("c1"),
            },
        );
        node.execute(&add_const, &[sym("w"), sym("x"), SymExpr::constant(1)])
            .unwrap();
        let wv = node.get_latest_value_no_constant_check(&w).unwrap();
        assert_eq!(node.direct_flow_sources(&wv).len(), 1);
    }

    #[test]
    fn test_phi_selects_matching_incoming_edge() {
        let b1 = BlockRef::new("then");
        let b2 = BlockRef::new("else");
        let b3 = BlockRef::new("join");
        let mut node = Dependency::new();
        let x = ValueRef::new("x");
        let y = ValueRef::new("y");
        let bind_x = Instruction::new(
            Some(x.clone()),
            b1.clone(),
            InstructionKind::Unary {
                operand: ValueRef::new("u"),
            },
        );
        node.execute(&bind_x, &[sym("x"), sym("u")]).unwrap();
        let bind_y = Instruction::new(
            Some(y.clone()),
            b2.clone(),
            InstructionKind::Unary {
                operand: ValueRef::new("u2"),
            },
        );
        node.execute(&bind_y, &[sym("y"), sym("u2")]).unwrap();

        // Arriving in the join block from `else`, only y's edge applies.
        let z = ValueRef::new("z");
        let phi = Instruction::new(
            Some(z.clone()),
            b3,
            InstructionKind::Phi {
                incoming: vec![(b1, x), (b2, y.clone())],
            },
        );
        node.execute(&phi, &[sym("z")]).unwrap();
        let zv = node.get_latest_value_no_constant_check(&z).unwrap();
        let sources = node.direct_flow_sources(&zv);
        assert_eq!(sources.len(), 1);
        assert!(sources[0].has_value(&y));
    }

    #[test]
    fn test_sibling_forks_do_not_observe_each_other() {
        let block = BlockRef::new("entry");
        let mut root = Dependency::new();
        let address = SymExpr::constant(0x3000);
        let a = alloca(&mut root, &block, "a", address.clone());
        let shared = Rc::new(root);
        let shared_allocations = shared.allocations.clone();

        let mut left = Dependency::with_parent(shared.clone());
        let mut right = Dependency::with_parent(shared.clone());
        let x = ValueRef::new("x");
        store(&mut left, &block, &x, &a, sym("left"), address.clone());
        store(&mut right, &block, &x, &a, sym("right"), address.clone());

        let left_latest = left.get_latest_allocation(&a, &address).unwrap();
        let right_latest = right.get_latest_allocation(&a, &address).unwrap();
        assert_ne!(left_latest, right_latest);
        assert_eq!(&left_latest, left.allocations.last().unwrap());
        assert_eq!(&right_latest, right.allocations.last().unwrap());
        // The shared ancestor is untouched by either branch.
        assert_eq!(shared.allocations, shared_allocations);
        assert!(shared.stores_map.is_empty());
    }

    #[test]
    fn test_store_extraction_round_trip() {
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        let concrete_address = SymExpr::constant(0x4000);
        let a = alloca(&mut node, &block, "a", concrete_address.clone());
        let b = alloca(&mut node, &block, "b", sym("b_addr"));
        let x = ValueRef::new("x");
        let y = ValueRef::new("y");
        store(&mut node, &block, &x, &a, SymExpr::constant(5), concrete_address.clone());
        store(&mut node, &block, &y, &b, sym("x1"), sym("b_addr"));

        let mut rename = RenameContext::new();
        let (concrete, symbolic) = node.get_stored_expressions(&mut rename, false);
        assert_eq!(concrete.len(), 1);
        assert_eq!(symbolic.len(), 1);
        let a_stores = &concrete[&a];
        assert_eq!(a_stores.len(), 1);
        let (stored_address, stored_value) = &a_stores[&0x4000];
        assert_eq!(stored_address.as_constant(), Some(0x4000));
        assert_eq!(stored_value.as_constant(), Some(5));
        let b_stores = &symbolic[&b];
        assert_eq!(b_stores.len(), 1);
        assert_eq!(b_stores[0].1, sym("x1"));
        assert!(rename.replacements().is_empty());
    }

    #[test]
    fn test_extraction_keeps_latest_version_of_a_location() {
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        let address = SymExpr::constant(0x5000);
        let a = alloca(&mut node, &block, "a", address.clone());
        let x = ValueRef::new("x");
        store(&mut node, &block, &x, &a, SymExpr::constant(1), address.clone());
        store(&mut node, &block, &x, &a, SymExpr::constant(2), address);
        let mut rename = RenameContext::new();
        let (concrete, _) = node.get_stored_expressions(&mut rename, false);
        assert_eq!(concrete[&a][&0x5000].1.as_constant(), Some(2));
    }

    #[test]
    fn test_core_only_extraction_shadows_expressions() {
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        let a = alloca(&mut node, &block, "a", sym("a_addr"));
        let other = alloca(&mut node, &block, "other", sym("other_addr"));
        let x = ValueRef::new("x");
        let y = ValueRef::new("y");
        store(&mut node, &block, &x, &a, sym("x0"), sym("a_addr"));
        store(&mut node, &block, &y, &other, sym("x2"), sym("other_addr"));
        let v = load(&mut node, &block, "v", &a, sym("x0"), sym("a_addr"));

        let loaded = node.get_latest_value_no_constant_check(&v).unwrap();
        let mut graph = AllocationGraph::new();
        node.mark_all_values(&mut graph, &loaded);
        node.compute_core_allocations(&graph);

        let mut rename = RenameContext::new();
        let (_, symbolic) = node.get_stored_expressions(&mut rename, true);
        // Only the core allocation survives, and its expressions are rewritten
        // over shadow arrays.
        assert_eq!(symbolic.len(), 1);
        assert!(symbolic.contains_key(&a));
        assert!(!rename.replacements().is_empty());
        assert!(rename
            .replacements()
            .iter()
            .all(|array| array.name().starts_with("__shadow__")));
    }

    #[test]
    fn test_layered_core_minimization() {
        init_logging();
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        let p = alloca(&mut node, &block, "p", sym("p_addr"));
        let q = alloca(&mut node, &block, "q", sym("q_addr"));
        let x = ValueRef::new("x");
        store(&mut node, &block, &x, &p, sym("x0"), sym("p_addr"));
        let y = load(&mut node, &block, "y", &p, sym("x0"), sym("p_addr"));
        store(&mut node, &block, &y, &q, sym("x0"), sym("q_addr"));
        let z = load(&mut node, &block, "z", &q, sym("x0"), sym("q_addr"));

        let zv = node.get_latest_value_no_constant_check(&z).unwrap();
        let mut graph = AllocationGraph::new();
        node.mark_all_values(&mut graph, &zv);
        node.compute_core_allocations(&graph);

        // z reads q directly; p is one indirection layer behind it.
        let sinks = graph.get_sink_allocations();
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].site(), Some(&q));
        graph.consume_sinks_with_allocations(&sinks).unwrap();
        let next = graph.get_sink_allocations();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].site(), Some(&p));
        node.compute_core_allocations(&graph);
        assert_eq!(node.core_allocations().len(), 2);

        // Every visited value is core.
        for source in node.all_flow_sources(&zv) {
            assert!(source.is_core());
        }
    }

    #[test]
    fn test_call_argument_and_return_binding() {
        let block = BlockRef::new("entry");
        let mut caller = Dependency::new();
        let x = ValueRef::new("x");
        let bind_x = Instruction::new(
            Some(x.clone()),
            block.clone(),
            InstructionKind::Unary {
                operand: ValueRef::new("u"),
            },
        );
        caller.execute(&bind_x, &[sym("x"), sym("u")]).unwrap();
        let xv = caller.get_latest_value_no_constant_check(&x).unwrap();

        let param = ValueRef::new("arg0");
        let callee = FunctionRef::new("f", vec![param.clone()]);
        let result = ValueRef::new("call_result");
        let call = Instruction::new(
            Some(result.clone()),
            block.clone(),
            InstructionKind::Call {
                callee,
                arguments: vec![x],
            },
        );

        let mut frame = Dependency::with_parent(Rc::new(caller));
        frame.bind_call_arguments(&call, &[sym("x")]).unwrap();
        let bound = frame.get_latest_value_no_constant_check(&param).unwrap();
        assert_eq!(frame.direct_flow_sources(&bound), vec![xv]);

        // The callee computes its return value from the parameter.
        let r = ValueRef::new("r");
        let bind_r = Instruction::new(
            Some(r.clone()),
            block,
            InstructionKind::Unary {
                operand: param.clone(),
            },
        );
        frame.execute(&bind_r, &[sym("r"), sym("x")]).unwrap();
        frame.bind_return_value(&call, Some(&r), &sym("r"));
        let returned = frame.get_latest_value_no_constant_check(&result).unwrap();
        let sources = frame.direct_flow_sources(&returned);
        assert_eq!(sources.len(), 1);
        assert!(sources[0].has_value(&r));
    }

    #[test]
    fn test_malformed_arguments_error() {
        let block = BlockRef::new("entry");
        let mut node = Dependency::new();
        let instruction = Instruction::new(
            Some(ValueRef::new("a")),
            block,
            InstructionKind::Alloca,
        );
        assert!(node.execute(&instruction, &[]).is_err());
    }

    #[test]
    fn test_marking_unregistered_value_errors() {
        let node = Dependency::new();
        let mut graph = AllocationGraph::new();
        assert!(node
            .mark_all_values_of(&mut graph, &ValueRef::new("ghost"))
            .is_err());
    }

    #[test]
    fn test_cdr_exposes_ancestors_read_only() {
        let block = BlockRef::new("entry");
        let mut root = Dependency::new();
        alloca(&mut root, &block, "a", sym("a_addr"));
        let child = Dependency::with_parent(Rc::new(root));
        let parent = child.cdr().unwrap();
        assert_eq!(parent.allocations.len(), 1);
        assert!(parent.cdr().is_none());
    }
}
