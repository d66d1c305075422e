//! Dependency tracking for formula calculation
//!
//! Edges run from a formula cell to the cells it reads. Both directions are
//! stored and always mutated together, so `b ∈ dependents(a)` exactly when
//! `a ∈ precedents(b)`.
//!
//! Ranges larger than [`EXPANDED_RANGE_LIMIT`] cells are kept as ranges: a
//! cell inside one counts as a precedent of the formula without an edge per
//! covered cell.

use crate::ast::FormulaExpr;
use crate::evaluator::CellStore;
use ahash::{AHashMap, AHashSet};
use calcgraph_core::{CellAddress, CellRange};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Ranges up to this many cells are expanded into single-cell edges
pub const EXPANDED_RANGE_LIMIT: u64 = 1024;

/// The cells a formula reads: single cells plus ranges too large to expand
#[derive(Debug, Clone, Default, PartialEq)]
pub struct References {
    cells: AHashSet<CellAddress>,
    ranges: Vec<CellRange>,
}

impl References {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single cell
    pub fn add_cell(&mut self, cell: CellAddress) {
        self.cells.insert(cell);
    }

    /// Add a range, expanded into cells when it is small enough
    pub fn add_range(&mut self, range: CellRange) {
        if range.cell_count() <= EXPANDED_RANGE_LIMIT {
            self.cells.extend(range.cells());
        } else if !self.ranges.contains(&range) {
            self.ranges.push(range);
        }
    }

    /// Single cells and cells of expanded ranges
    pub fn cells(&self) -> &AHashSet<CellAddress> {
        &self.cells
    }

    /// Ranges kept unexpanded
    pub fn ranges(&self) -> &[CellRange] {
        &self.ranges
    }

    pub fn contains(&self, cell: &CellAddress) -> bool {
        self.cells.contains(cell) || self.ranges.iter().any(|range| range.contains(cell))
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.ranges.is_empty()
    }

    /// Every referenced cell once, unexpanded ranges walked lazily
    pub fn iter(&self) -> impl Iterator<Item = CellAddress> + '_ {
        distinct_cells(self.cells.iter().copied(), &self.ranges)
    }
}

impl FromIterator<CellAddress> for References {
    fn from_iter<I: IntoIterator<Item = CellAddress>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
            ranges: Vec::new(),
        }
    }
}

/// Chain single cells and range cells, skipping cells already covered
fn distinct_cells<'a, I>(cells: I, ranges: &'a [CellRange]) -> impl Iterator<Item = CellAddress> + 'a
where
    I: Iterator<Item = CellAddress> + 'a,
{
    let singles = cells.filter(move |cell| !ranges.iter().any(|range| range.contains(cell)));
    let covered = ranges.iter().enumerate().flat_map(move |(i, range)| {
        range
            .cells()
            .filter(move |cell| !ranges[..i].iter().any(|earlier| earlier.contains(cell)))
    });
    singles.chain(covered)
}

/// Dependency graph for formula cells
///
/// Tracks which cells depend on which other cells,
/// enabling efficient recalculation.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Cell → Cells it depends on (precedents)
    precedents: AHashMap<CellAddress, AHashSet<CellAddress>>,
    /// Cell → Cells that depend on it (dependents)
    dependents: AHashMap<CellAddress, AHashSet<CellAddress>>,
    /// Cell → Unexpanded ranges it depends on
    range_precedents: AHashMap<CellAddress, Vec<CellRange>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the precedents of a cell with single cells
    ///
    /// The caller is expected to have checked [`would_create_cycle`] first.
    ///
    /// [`would_create_cycle`]: DependencyGraph::would_create_cycle
    pub fn set_dependencies<I>(&mut self, cell: CellAddress, precedents: I)
    where
        I: IntoIterator<Item = CellAddress>,
    {
        self.set_references(cell, precedents.into_iter().collect());
    }

    /// Replace the precedents of a cell with extracted references
    pub fn set_references(&mut self, cell: CellAddress, references: References) {
        self.clear_dependencies(cell);

        let References { cells, ranges } = references;
        for &precedent in &cells {
            self.dependents.entry(precedent).or_default().insert(cell);
        }
        if !cells.is_empty() {
            self.precedents.insert(cell, cells);
        }
        if !ranges.is_empty() {
            self.range_precedents.insert(cell, ranges);
        }
    }

    /// Remove the outgoing edges of a cell; cells that read it keep their edges
    pub fn clear_dependencies(&mut self, cell: CellAddress) {
        self.range_precedents.remove(&cell);
        if let Some(precedents) = self.precedents.remove(&cell) {
            for precedent in precedents {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.remove(&cell);
                    if deps.is_empty() {
                        self.dependents.remove(&precedent);
                    }
                }
            }
        }
    }

    /// Get cells the given cell depends on
    ///
    /// Cells of unexpanded ranges are produced lazily.
    pub fn precedents(&self, cell: CellAddress) -> impl Iterator<Item = CellAddress> + '_ {
        let ranges = self
            .range_precedents
            .get(&cell)
            .map_or(&[][..], Vec::as_slice);
        let singles = self
            .precedents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied());
        distinct_cells(singles, ranges)
    }

    /// Get cells that depend directly on the given cell
    pub fn dependents(&self, cell: CellAddress) -> impl Iterator<Item = CellAddress> + '_ {
        let direct = self.dependents.get(&cell);
        let through_ranges = self
            .range_precedents
            .iter()
            .filter(move |(_, ranges)| ranges.iter().any(|range| range.contains(&cell)))
            .map(|(dependent, _)| *dependent)
            .filter(move |dependent| !direct.map_or(false, |set| set.contains(dependent)));

        direct
            .into_iter()
            .flat_map(|set| set.iter().copied())
            .chain(through_ranges)
    }

    /// Check if any cell reads the given cell
    pub fn has_dependents(&self, cell: CellAddress) -> bool {
        self.dependents(cell).next().is_some()
    }

    /// Check if the cell has any precedents
    pub fn has_precedents(&self, cell: CellAddress) -> bool {
        self.precedents.contains_key(&cell) || self.range_precedents.contains_key(&cell)
    }

    /// Check whether `cell` reads `other`, directly or through a range
    pub fn reads(&self, cell: CellAddress, other: CellAddress) -> bool {
        self.precedents
            .get(&cell)
            .map_or(false, |set| set.contains(&other))
            || self
                .range_precedents
                .get(&cell)
                .map_or(false, |ranges| ranges.iter().any(|range| range.contains(&other)))
    }

    /// Precedents of `cell` among `candidates` (sorted), without walking
    /// unexpanded ranges cell by cell
    pub fn precedents_among(&self, cell: CellAddress, candidates: &[CellAddress]) -> Vec<CellAddress> {
        if self.range_precedents.contains_key(&cell) {
            return candidates
                .iter()
                .copied()
                .filter(|&candidate| self.reads(cell, candidate))
                .collect();
        }
        let mut found: Vec<CellAddress> = self
            .precedents
            .get(&cell)
            .into_iter()
            .flatten()
            .copied()
            .filter(|precedent| candidates.binary_search(precedent).is_ok())
            .collect();
        found.sort_unstable();
        found
    }

    /// Would giving `cell` these references make it reachable from itself?
    ///
    /// True when the cell or anything that reads it, directly or not, is
    /// among the new references.
    pub fn would_create_cycle(&self, cell: CellAddress, references: &References) -> bool {
        if references.contains(&cell) {
            return true;
        }
        self.transitive_dependents(cell)
            .iter()
            .any(|dependent| references.contains(dependent))
    }

    /// Check whether the graph contains a cycle
    pub fn has_cycle(&self) -> bool {
        self.topological_order().len() < self.node_count()
    }

    /// Every cell that directly or indirectly reads the given cell
    pub fn transitive_dependents(&self, cell: CellAddress) -> AHashSet<CellAddress> {
        let mut result = AHashSet::new();
        let mut stack: Vec<CellAddress> = self.dependents(cell).collect();

        while let Some(current) = stack.pop() {
            if result.insert(current) {
                stack.extend(self.dependents(current));
            }
        }

        result
    }

    /// Cells that have at least one edge
    fn nodes(&self) -> AHashSet<CellAddress> {
        self.precedents
            .keys()
            .chain(self.dependents.keys())
            .chain(self.range_precedents.keys())
            .copied()
            .collect()
    }

    /// All cells with edges, dependencies before their dependents (Kahn).
    ///
    /// Ties are broken in row-major address order. Cells on a cycle are left
    /// out of the order.
    pub fn topological_order(&self) -> Vec<CellAddress> {
        let nodes = self.nodes();

        let mut in_degree: AHashMap<CellAddress, usize> = AHashMap::with_capacity(nodes.len());
        for &cell in &nodes {
            let direct = self.precedents.get(&cell);
            let mut degree = direct.map_or(0, |set| set.len());
            if let Some(ranges) = self.range_precedents.get(&cell) {
                degree += nodes
                    .iter()
                    .filter(|node| ranges.iter().any(|range| range.contains(node)))
                    .filter(|node| !direct.map_or(false, |set| set.contains(*node)))
                    .count();
            }
            in_degree.insert(cell, degree);
        }

        let mut ready: BinaryHeap<Reverse<CellAddress>> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(cell, _)| Reverse(*cell))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(cell)) = ready.pop() {
            order.push(cell);
            for dependent in self.dependents(cell) {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(dependent));
                    }
                }
            }
        }

        order
    }

    /// Cells to recalculate after the given cells changed, in dependency order
    ///
    /// The changed cells themselves are not included.
    pub fn recalc_order(&self, changed: &[CellAddress]) -> Vec<CellAddress> {
        let mut affected = AHashSet::new();
        for &cell in changed {
            affected.extend(self.transitive_dependents(cell));
        }
        for cell in changed {
            affected.remove(cell);
        }

        if affected.is_empty() {
            return Vec::new();
        }

        self.topological_order()
            .into_iter()
            .filter(|cell| affected.contains(cell))
            .collect()
    }

    /// Replace the whole graph from `(cell, precedents)` pairs
    pub fn rebuild<I, P>(&mut self, edges: I)
    where
        I: IntoIterator<Item = (CellAddress, P)>,
        P: IntoIterator<Item = CellAddress>,
    {
        self.clear();
        for (cell, precedents) in edges {
            self.set_dependencies(cell, precedents);
        }
    }

    /// Number of cells that have at least one edge
    pub fn node_count(&self) -> usize {
        self.nodes().len()
    }

    /// Check if the graph has no edges
    pub fn is_empty(&self) -> bool {
        self.precedents.is_empty() && self.range_precedents.is_empty()
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.dependents.clear();
        self.precedents.clear();
        self.range_precedents.clear();
    }
}

/// Collect every cell a formula reads
///
/// Cell references contribute themselves, ranges the cells they cover, and
/// variables naming a named range the cells of that range. Ranges above
/// [`EXPANDED_RANGE_LIMIT`] cells stay ranges.
pub fn extract_references(expr: &FormulaExpr, store: &dyn CellStore) -> References {
    let mut references = References::new();
    collect_references(expr, store, &mut references);
    references
}

fn collect_references(expr: &FormulaExpr, store: &dyn CellStore, references: &mut References) {
    match expr {
        FormulaExpr::Literal(_) => {}
        FormulaExpr::CellRef(address) => references.add_cell(*address),
        FormulaExpr::Range(range) => references.add_range(*range),
        FormulaExpr::Variable(name) => {
            if let Some(range) = store.named_range(name) {
                references.add_range(range);
            }
        }
        FormulaExpr::Function { args, .. } => {
            for arg in args {
                collect_references(arg, store, references);
            }
        }
        FormulaExpr::BinaryOp { left, right, .. } => {
            collect_references(left, store, references);
            collect_references(right, store, references);
        }
        FormulaExpr::UnaryOp { operand, .. } => collect_references(operand, store, references),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use calcgraph_core::{CellRange, CellValue};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn addr(a1: &str) -> CellAddress {
        CellAddress::parse(a1).unwrap()
    }

    fn refs(cells: &[&str]) -> References {
        cells.iter().map(|a1| addr(a1)).collect()
    }

    struct Names;

    impl CellStore for Names {
        fn get(&self, _row: u32, _col: u32) -> Option<&CellValue> {
            None
        }

        fn named_range(&self, name: &str) -> Option<CellRange> {
            name.eq_ignore_ascii_case("rates")
                .then(|| CellRange::from_indices(1, 4, 2, 4))
        }
    }

    #[test]
    fn test_edges_are_paired() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies(addr("C1"), [addr("A1"), addr("B1")]);

        assert!(graph.dependents(addr("A1")).any(|c| c == addr("C1")));
        assert!(graph.dependents(addr("B1")).any(|c| c == addr("C1")));
        assert_eq!(graph.precedents(addr("C1")).count(), 2);

        // Replacing precedents rewires the back references
        graph.set_dependencies(addr("C1"), [addr("B1")]);
        assert!(!graph.has_dependents(addr("A1")));
        assert!(graph.has_dependents(addr("B1")));
    }

    #[test]
    fn test_clear_keeps_incoming_edges() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies(addr("B1"), [addr("A1")]);
        graph.set_dependencies(addr("C1"), [addr("B1")]);

        graph.clear_dependencies(addr("B1"));

        assert!(!graph.has_precedents(addr("B1")));
        assert!(graph.has_dependents(addr("B1")));
        assert!(!graph.has_dependents(addr("A1")));
    }

    #[test]
    fn test_would_create_cycle() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies(addr("B1"), [addr("A1")]);
        graph.set_dependencies(addr("C1"), [addr("B1")]);

        assert!(graph.would_create_cycle(addr("A1"), &refs(&["A1"])));
        assert!(graph.would_create_cycle(addr("A1"), &refs(&["C1"])));
        assert!(!graph.would_create_cycle(addr("A1"), &refs(&["D1"])));
        assert!(!graph.would_create_cycle(addr("D1"), &refs(&["C1"])));
        assert!(!graph.has_cycle());
    }

    #[test]
    fn test_has_cycle_detects_installed_cycle() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies(addr("B1"), [addr("A1")]);
        graph.set_dependencies(addr("A1"), [addr("B1")]);
        assert!(graph.has_cycle());
    }

    #[test]
    fn test_topological_order_puts_dependencies_first() {
        let mut graph = DependencyGraph::new();
        // D1 = B1 + C1, B1 = A1, C1 = A1
        graph.set_dependencies(addr("D1"), [addr("B1"), addr("C1")]);
        graph.set_dependencies(addr("B1"), [addr("A1")]);
        graph.set_dependencies(addr("C1"), [addr("A1")]);

        assert_eq!(
            graph.topological_order(),
            vec![addr("A1"), addr("B1"), addr("C1"), addr("D1")]
        );
    }

    #[test]
    fn test_recalc_order_is_the_dependent_closure() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies(addr("B1"), [addr("A1")]);
        graph.set_dependencies(addr("C1"), [addr("B1")]);
        graph.set_dependencies(addr("E1"), [addr("D1")]);

        assert_eq!(
            graph.recalc_order(&[addr("A1")]),
            vec![addr("B1"), addr("C1")]
        );
        assert_eq!(graph.recalc_order(&[addr("C1")]), Vec::<CellAddress>::new());
        assert_eq!(
            graph.transitive_dependents(addr("D1")),
            [addr("E1")].into_iter().collect()
        );
    }

    #[test]
    fn test_rebuild() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies(addr("B1"), [addr("A1")]);

        graph.rebuild(vec![(addr("B2"), vec![addr("A2")])]);

        assert!(!graph.has_dependents(addr("A1")));
        assert!(graph.has_dependents(addr("A2")));
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_extract_references() {
        let ast = parse_formula("=A1 + SUM(B1:C2) * rates - x").unwrap();
        let refs = extract_references(&ast, &Names);

        assert!(refs.ranges().is_empty());
        let mut sorted: Vec<_> = refs.iter().collect();
        sorted.sort();
        assert_eq!(
            sorted,
            vec![
                addr("A1"),
                addr("B1"),
                addr("C1"),
                addr("D1"),
                addr("B2"),
                addr("C2"),
                addr("D2"),
            ]
        );
    }

    #[test]
    fn test_large_ranges_stay_ranges() {
        let ast = parse_formula("=SUM(A1:A1048576) + B1").unwrap();
        let refs = extract_references(&ast, &Names);

        assert_eq!(refs.cells().len(), 1);
        assert_eq!(refs.ranges(), &[CellRange::from_indices(1, 1, 1_048_576, 1)]);
        assert!(refs.contains(&addr("A500000")));
        assert!(!refs.contains(&addr("B2")));
    }

    #[test]
    fn test_range_edges() {
        let mut graph = DependencyGraph::new();
        let column = extract_references(&parse_formula("=SUM(A1:A5000)").unwrap(), &Names);
        graph.set_references(addr("C1"), column);
        graph.set_dependencies(addr("A10"), [addr("B1")]);
        graph.set_dependencies(addr("D1"), [addr("C1")]);

        // Covered cells see the formula without an edge per cell
        assert_eq!(graph.dependents(addr("A4000")).collect::<Vec<_>>(), vec![addr("C1")]);
        assert!(graph.has_dependents(addr("A1")));
        assert!(!graph.has_dependents(addr("A5001")));
        assert!(graph.reads(addr("C1"), addr("A10")));
        assert_eq!(graph.precedents(addr("C1")).count(), 5000);
        assert_eq!(graph.node_count(), 4);

        assert_eq!(
            graph.recalc_order(&[addr("B1")]),
            vec![addr("A10"), addr("C1"), addr("D1")]
        );
        assert_eq!(
            graph.precedents_among(addr("C1"), &[addr("A10"), addr("D1")]),
            vec![addr("A10")]
        );

        // A cell inside the range that reads the formula closes a cycle
        assert!(graph.would_create_cycle(addr("A20"), &refs(&["D1"])));
        assert!(!graph.would_create_cycle(addr("B20"), &refs(&["D1"])));
        assert!(!graph.has_cycle());

        graph.clear_dependencies(addr("C1"));
        assert!(!graph.has_dependents(addr("A4000")));
    }

    proptest! {
        /// Installing only edges that pass the cycle check keeps the graph acyclic
        #[test]
        fn prop_checked_writes_stay_acyclic(
            writes in prop::collection::vec(
                (1u32..6, prop::collection::vec(1u32..6, 0..4)),
                1..40,
            )
        ) {
            let mut graph = DependencyGraph::new();
            for (cell, precedents) in writes {
                let cell = CellAddress::new(cell, 1);
                let precedents: References =
                    precedents.into_iter().map(|r| CellAddress::new(r, 1)).collect();
                if graph.would_create_cycle(cell, &precedents) {
                    graph.clear_dependencies(cell);
                } else {
                    graph.set_references(cell, precedents);
                }
                prop_assert!(!graph.has_cycle());
            }
        }
    }
}
