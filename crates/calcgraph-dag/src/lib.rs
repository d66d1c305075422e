//! # calcgraph-dag
//!
//! A dependency DAG independent of cell semantics. Nodes carry an opaque
//! payload and a dirty flag; an [`Executor`] recomputes the dirty nodes in
//! dependency order, either one at a time or level by level with the nodes of
//! a level computed concurrently.
//!
//! ## Example
//!
//! ```rust
//! use calcgraph_dag::{DirtyGraph, Executor};
//!
//! let mut graph: DirtyGraph<&str, f64> = DirtyGraph::new();
//! graph.add_node("radius", 2.0);
//! graph.add_node("area", 0.0);
//! graph.update_dependencies(&"area", ["radius"]).unwrap();
//!
//! Executor::level_parallel()
//!     .run(&mut graph, |id, g| match *id {
//!         "area" => std::f64::consts::PI * g.payload(&"radius").copied().unwrap_or(0.0).powi(2),
//!         _ => *g.payload(id).unwrap_or(&0.0),
//!     })
//!     .unwrap();
//!
//! assert!(graph.payload(&"area").unwrap() > &12.5);
//! ```

pub mod error;
pub mod executor;
pub mod graph;

#[cfg(feature = "parallel")]
mod parallel;

pub use error::{DagError, DagResult};
pub use executor::{ExecutionMode, ExecutionReport, Executor};
pub use graph::{DirtyGraph, Node, NodeId};
