//! # calcgraph-plot
//!
//! Graph support for calcgraph: graph definitions written in the formula
//! language, sampling them into points, and a render cache stamped with the
//! versions of the cells each graph reads.

mod axis;
mod cache;
mod graph;
mod point;
mod sampler;

pub use axis::Bounds;
pub use cache::{CacheKey, CacheStats, RenderCache};
pub use graph::{GraphDefinition, GraphId, GraphKind, DEFAULT_COLOR};
pub use point::{Point, SampledGraph};
pub use sampler::{data_argument_count, sample, SamplingOptions};
