//! Graph definitions

use crate::axis::Bounds;
use calcgraph_core::CellAddress;
use calcgraph_formula::{
    extract_references, parse_formula, CellStore, FormulaExpr, FormulaResult, PLOT_FUNCTION,
};
use std::fmt;

/// Default stroke color for new graphs
pub const DEFAULT_COLOR: &str = "#1f77b4";

/// Graph identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GraphId {
    /// Added explicitly through the graph API
    Explicit(u32),
    /// Synthesized from a cell whose formula is a top-level `PLOT(...)`
    Cell(CellAddress),
}

impl GraphId {
    /// Check if the graph was synthesized from a `PLOT` cell
    pub fn is_synthesized(&self) -> bool {
        matches!(self, GraphId::Cell(_))
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphId::Explicit(n) => write!(f, "graph-{}", n),
            GraphId::Cell(address) => write!(f, "{}", address),
        }
    }
}

/// Graph types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GraphKind {
    /// `y = f(x)`
    Function,
    /// `(x, y[, z]) = f(t)`
    Parametric,
    /// `f(x, y) = 0`
    Implicit,
    /// Rows of a cell range as points
    Scatter,
    /// `PLOT(...)` arguments as axes or points
    DataPlot,
}

impl GraphKind {
    /// Guess the kind from the variables a formula uses
    pub fn infer(ast: &FormulaExpr) -> Self {
        if ast.top_level_function() == Some(PLOT_FUNCTION) {
            return GraphKind::DataPlot;
        }

        let x = ast.mentions_variable("x");
        let y = ast.mentions_variable("y");
        let t = ast.mentions_variable("t");

        match (x, y, t) {
            (_, _, true) if !x => GraphKind::Parametric,
            (true, true, _) => GraphKind::Implicit,
            (false, false, false) => GraphKind::Scatter,
            _ => GraphKind::Function,
        }
    }

    /// Whether sampling walks a continuous domain
    pub fn is_sampled(&self) -> bool {
        matches!(
            self,
            GraphKind::Function | GraphKind::Parametric | GraphKind::Implicit
        )
    }
}

/// Graph definition
#[derive(Debug, Clone, PartialEq)]
pub struct GraphDefinition {
    pub id: GraphId,
    pub kind: GraphKind,
    /// Formula text as entered
    pub formula: String,
    pub ast: FormulaExpr,
    pub color: String,
    pub visible: bool,
    /// Cells the formula reads, named ranges expanded, in row-major order
    pub bindings: Vec<CellAddress>,
    /// x domain (the `t` range for parametric graphs)
    pub domain: Option<Bounds>,
    /// y range
    pub range: Option<Bounds>,
}

impl GraphDefinition {
    /// Create a new graph by parsing its formula
    pub fn new<S: Into<String>>(id: GraphId, kind: GraphKind, formula: S) -> FormulaResult<Self> {
        let formula = formula.into();
        let ast = parse_formula(&formula)?;

        Ok(Self {
            id,
            kind,
            formula,
            ast,
            color: DEFAULT_COLOR.to_string(),
            visible: true,
            bindings: Vec::new(),
            domain: None,
            range: None,
        })
    }

    /// Create a graph whose kind is inferred from the formula
    pub fn inferred<S: Into<String>>(id: GraphId, formula: S) -> FormulaResult<Self> {
        let mut graph = Self::new(id, GraphKind::Function, formula)?;
        graph.kind = GraphKind::infer(&graph.ast);
        Ok(graph)
    }

    /// Set the stroke color
    pub fn with_color<S: Into<String>>(mut self, color: S) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_domain(mut self, domain: Bounds) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn with_range(mut self, range: Bounds) -> Self {
        self.range = Some(range);
        self
    }

    /// Replace the formula; on a parse error the graph is left unchanged
    pub fn set_formula<S: Into<String>>(&mut self, formula: S) -> FormulaResult<()> {
        let formula = formula.into();
        self.ast = parse_formula(&formula)?;
        self.formula = formula;
        Ok(())
    }

    /// Recompute the cells this graph reads
    pub fn refresh_bindings(&mut self, store: &dyn CellStore) {
        let mut bindings: Vec<CellAddress> = extract_references(&self.ast, store).iter().collect();
        bindings.sort_unstable();
        self.bindings = bindings;
    }

    /// Check whether the graph reads a cell
    pub fn is_bound_to(&self, address: CellAddress) -> bool {
        self.bindings.binary_search(&address).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calcgraph_core::{CellRange, CellValue};
    use pretty_assertions::assert_eq;

    struct Empty;

    impl CellStore for Empty {
        fn get(&self, _row: u32, _col: u32) -> Option<&CellValue> {
            None
        }

        fn named_range(&self, name: &str) -> Option<CellRange> {
            (name == "xs").then(|| CellRange::from_indices(1, 1, 3, 1))
        }
    }

    fn infer(formula: &str) -> GraphKind {
        GraphKind::infer(&parse_formula(formula).unwrap())
    }

    #[test]
    fn test_infer_kind() {
        assert_eq!(infer("sin(x)"), GraphKind::Function);
        assert_eq!(infer("POINT(cos(t), sin(t))"), GraphKind::Parametric);
        assert_eq!(infer("x^2 + y^2 - 4"), GraphKind::Implicit);
        assert_eq!(infer("PLOT(A1:A5, B1:B5)"), GraphKind::DataPlot);
        assert_eq!(infer("A1:B5"), GraphKind::Scatter);
    }

    #[test]
    fn test_graph_id_display() {
        assert_eq!(GraphId::Explicit(3).to_string(), "graph-3");
        assert_eq!(GraphId::Cell(CellAddress::new(2, 3)).to_string(), "C2");
        assert!(GraphId::Cell(CellAddress::new(1, 1)).is_synthesized());
    }

    #[test]
    fn test_bindings_expand_ranges_and_names() {
        let mut graph = GraphDefinition::new(
            GraphId::Explicit(1),
            GraphKind::DataPlot,
            "PLOT(xs, B2)",
        )
        .unwrap();
        graph.refresh_bindings(&Empty);

        assert_eq!(
            graph.bindings,
            vec![
                CellAddress::new(1, 1),
                CellAddress::new(2, 1),
                CellAddress::new(2, 2),
                CellAddress::new(3, 1),
            ]
        );
        assert!(graph.is_bound_to(CellAddress::new(2, 2)));
        assert!(!graph.is_bound_to(CellAddress::new(4, 1)));
    }

    #[test]
    fn test_set_formula_keeps_old_on_error() {
        let mut graph = GraphDefinition::inferred(GraphId::Explicit(1), "x*2").unwrap();
        assert!(graph.set_formula("x*(2").is_err());
        assert_eq!(graph.formula, "x*2");

        graph.set_formula("x*3").unwrap();
        assert_eq!(graph.formula, "x*3");
    }
}
