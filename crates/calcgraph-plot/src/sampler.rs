//! Graph sampling
//!
//! Turns a graph definition into points by evaluating its AST, either once
//! per sample with a graph variable bound (function, parametric, implicit) or
//! once per argument (data plots, scatter). Failing samples are skipped.

use crate::axis::Bounds;
use crate::graph::{GraphDefinition, GraphKind};
use crate::point::{Point, SampledGraph};
use calcgraph_core::CellValue;
use calcgraph_formula::{
    evaluate, CellStore, EvaluationContext, FormulaExpr, VariableBindings, PLOT_FUNCTION,
};

/// Sampling configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingOptions {
    /// Samples across the domain for function and parametric graphs
    pub resolution: usize,
    /// Grid points per axis for implicit graphs
    pub implicit_grid: usize,
    /// `|f(x, y)|` below this counts as a zero crossing
    pub implicit_threshold: f64,
    /// x domain when the graph has none
    pub domain: Bounds,
    /// y range when the graph has none
    pub range: Bounds,
    /// `t` range when a parametric graph has no domain
    pub t_range: Bounds,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            resolution: 200,
            implicit_grid: 100,
            implicit_threshold: 0.05,
            domain: Bounds::default_axis(),
            range: Bounds::default_axis(),
            t_range: Bounds::full_turn(),
        }
    }
}

impl SamplingOptions {
    /// The interval the sampler walks for a graph
    pub fn domain_for(&self, graph: &GraphDefinition) -> Bounds {
        match (graph.kind, graph.domain) {
            (_, Some(domain)) => domain,
            (GraphKind::Parametric, None) => self.t_range,
            _ => self.domain,
        }
    }

    /// The y range used for implicit graphs
    pub fn range_for(&self, graph: &GraphDefinition) -> Bounds {
        graph.range.unwrap_or(self.range)
    }
}

/// Sample a graph against the current cell values
///
/// The returned graph carries an empty version snapshot; the render cache
/// stamps it.
pub fn sample(graph: &GraphDefinition, store: &dyn CellStore, options: &SamplingOptions) -> SampledGraph {
    let domain = options.domain_for(graph);

    let (points, breaks) = match graph.kind {
        GraphKind::Function => sample_function(&graph.ast, store, domain, options.resolution),
        GraphKind::Parametric => (
            sample_parametric(&graph.ast, store, domain, options.resolution),
            Vec::new(),
        ),
        GraphKind::Implicit => (
            sample_implicit(&graph.ast, store, domain, options.range_for(graph), options),
            Vec::new(),
        ),
        GraphKind::DataPlot => (sample_data_plot(&graph.ast, store), Vec::new()),
        GraphKind::Scatter => (sample_scatter(&graph.ast, store), Vec::new()),
    };

    tracing::trace!(graph = %graph.id, kind = ?graph.kind, points = points.len(), "sampled");

    SampledGraph {
        points,
        breaks,
        versions: Default::default(),
    }
}

fn eval_with(ast: &FormulaExpr, store: &dyn CellStore, vars: &VariableBindings) -> Option<CellValue> {
    let ctx = EvaluationContext::new(store).with_variables(vars);
    evaluate(ast, &ctx).ok()
}

fn finite_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        _ => None,
    }
}

/// Walk the domain binding `x`; a skipped sample starts a new segment
fn sample_function(
    ast: &FormulaExpr,
    store: &dyn CellStore,
    domain: Bounds,
    resolution: usize,
) -> (Vec<Point>, Vec<usize>) {
    let mut points = Vec::with_capacity(resolution);
    let mut breaks = Vec::new();
    let mut in_gap = false;

    for x in domain.steps(resolution) {
        let vars = VariableBindings::new().with_x(x);
        match eval_with(ast, store, &vars).as_ref().and_then(finite_number) {
            Some(y) => {
                if in_gap && !points.is_empty() {
                    breaks.push(points.len());
                }
                in_gap = false;
                points.push(Point::new(x, y));
            }
            None => in_gap = true,
        }
    }

    (points, breaks)
}

/// Walk the `t` range; each sample must be 2 or 3 finite numbers
fn sample_parametric(
    ast: &FormulaExpr,
    store: &dyn CellStore,
    t_range: Bounds,
    resolution: usize,
) -> Vec<Point> {
    t_range
        .steps(resolution)
        .filter_map(|t| {
            let vars = VariableBindings::new().with_t(t);
            let value = eval_with(ast, store, &vars)?;
            let coords = value
                .scalars()
                .map(finite_number)
                .collect::<Option<Vec<f64>>>()?;
            Point::from_coords(&coords)
        })
        .collect()
}

/// Grid search for approximate zeros of `f(x, y)`
fn sample_implicit(
    ast: &FormulaExpr,
    store: &dyn CellStore,
    domain: Bounds,
    range: Bounds,
    options: &SamplingOptions,
) -> Vec<Point> {
    let mut points = Vec::new();

    for y in range.steps(options.implicit_grid) {
        for x in domain.steps(options.implicit_grid) {
            let vars = VariableBindings::new().with_x(x).with_y(y);
            let hit = eval_with(ast, store, &vars)
                .as_ref()
                .and_then(finite_number)
                .map_or(false, |v| v.abs() < options.implicit_threshold);
            if hit {
                points.push(Point::new(x, y));
            }
        }
    }

    points
}

/// One `PLOT` argument after evaluation
#[derive(Debug, PartialEq)]
enum Series {
    /// One slot per cell along an axis; `None` where the cell is not a
    /// finite number
    Axis(Vec<Option<f64>>),
    /// Complete points
    Points(Vec<Point>),
}

/// Rows of equal length 2 or 3 are points; anything else is read as an axis
fn classify(value: &CellValue) -> Series {
    if let CellValue::Array(rows) = value {
        let width = rows.first().map_or(0, Vec::len);
        if (2..=3).contains(&width) && rows.iter().all(|row| row.len() == width) {
            return Series::Points(rows.iter().filter_map(|row| row_point(row)).collect());
        }
    }

    Series::Axis(value.scalars().map(finite_number).collect())
}

fn row_point(row: &[CellValue]) -> Option<Point> {
    let coords = row.iter().map(finite_number).collect::<Option<Vec<f64>>>()?;
    Point::from_coords(&coords)
}

/// Zip up to three axes into points by slot, truncating to the shortest.
/// A lone axis is plotted against its 1-based index. Slots where any axis
/// holds no number are dropped after zipping, so later values keep their row.
fn zip_axes(axes: &[Vec<Option<f64>>]) -> Vec<Point> {
    match axes {
        [] => Vec::new(),
        [only] => only
            .iter()
            .enumerate()
            .filter_map(|(i, y)| y.map(|y| Point::new((i + 1) as f64, y)))
            .collect(),
        _ => {
            let axes = &axes[..axes.len().min(3)];
            let len = axes.iter().map(Vec::len).min().unwrap_or(0);
            (0..len)
                .filter_map(|i| {
                    let coords = axes.iter().map(|axis| axis[i]).collect::<Option<Vec<f64>>>()?;
                    Point::from_coords(&coords)
                })
                .collect()
        }
    }
}

/// Evaluate each top-level `PLOT` argument once
fn sample_data_plot(ast: &FormulaExpr, store: &dyn CellStore) -> Vec<Point> {
    let args: Vec<&FormulaExpr> = match ast {
        FormulaExpr::Function { name, args } if name == PLOT_FUNCTION => args.iter().collect(),
        other => vec![other],
    };

    let ctx = EvaluationContext::new(store);
    let mut points = Vec::new();
    let mut axes = Vec::new();

    for arg in args {
        match evaluate(arg, &ctx) {
            Ok(value) => match classify(&value) {
                Series::Axis(axis) => axes.push(axis),
                Series::Points(pts) => points.extend(pts),
            },
            Err(err) => tracing::trace!(%err, "skipping plot argument"),
        }
    }

    points.extend(zip_axes(&axes));
    points
}

/// Evaluate the formula once and read every row as a point
fn sample_scatter(ast: &FormulaExpr, store: &dyn CellStore) -> Vec<Point> {
    let ctx = EvaluationContext::new(store);
    let Ok(value) = evaluate(ast, &ctx) else {
        return Vec::new();
    };

    match value {
        CellValue::Array(rows) => rows
            .iter()
            .filter_map(|row| {
                let coords = row
                    .iter()
                    .take(3)
                    .map(finite_number)
                    .collect::<Option<Vec<f64>>>()?;
                Point::from_coords(&coords)
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Number of top-level arguments of a data plot, used in its cache key
pub fn data_argument_count(ast: &FormulaExpr) -> usize {
    match ast {
        FormulaExpr::Function { name, args } if name == PLOT_FUNCTION => args.len(),
        _ => 1,
    }
}
