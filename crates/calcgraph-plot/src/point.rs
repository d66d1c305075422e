//! Sampled output

use calcgraph_core::VersionSnapshot;

/// A sampled point with two or three coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub fn with_z(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    /// Build a point from 2 or 3 finite coordinates
    pub fn from_coords(coords: &[f64]) -> Option<Self> {
        if !coords.iter().all(|c| c.is_finite()) {
            return None;
        }
        match *coords {
            [x, y] => Some(Self::new(x, y)),
            [x, y, z] => Some(Self::with_z(x, y, z)),
            _ => None,
        }
    }
}

/// The result of sampling one graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledGraph {
    pub points: Vec<Point>,
    /// Indices into `points` where a new segment starts after a gap
    pub breaks: Vec<usize>,
    /// Versions of the bound cells at sampling time
    pub versions: VersionSnapshot,
}

impl SampledGraph {
    /// Split the points into continuous segments
    pub fn segments(&self) -> Vec<&[Point]> {
        let mut segments = Vec::with_capacity(self.breaks.len() + 1);
        let mut start = 0;
        for &brk in &self.breaks {
            if brk > start && brk <= self.points.len() {
                segments.push(&self.points[start..brk]);
                start = brk;
            }
        }
        if start < self.points.len() {
            segments.push(&self.points[start..]);
        }
        segments
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
