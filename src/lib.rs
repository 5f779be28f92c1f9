//! Flow-sensitive, field-insensitive value/allocation dependency analysis for
//! symbolic execution. Given a finite execution path, the analysis tracks how
//! program values and memory allocations influence each other so that, once
//! the path's constraints are found unsatisfiable, the minimal set of
//! allocations the unsatisfiability core depends upon can be computed and
//! later serialized into an interpolant.

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate log;

pub mod analysis {
    // For error handling
    pub mod analysis_result;
    // The program representation consumed by the analysis
    pub mod ir;
    // Memory model
    pub mod memory {
        pub mod allocation;
        pub mod expression;
        pub mod relation;
        pub mod shadow;
    }
    // The per-path dependency tracker and its derived allocation graph
    pub mod dependency {
        pub mod allocation_graph;
        pub mod node;
    }
}
